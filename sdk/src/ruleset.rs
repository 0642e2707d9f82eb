//! Style ruleset types
//!
//! A ruleset is the declarative description of a brand's style rules, loaded
//! from a TOML file and validated before the engine starts. Rules are tagged
//! variants dispatched through a fixed evaluation interface in the engine's
//! guideline checker; there is no runtime reflection over arbitrary
//! predicates.
//!
//! Validation is fail-fast: a malformed ruleset is a `Configuration` error at
//! startup, never a per-request failure.

use crate::errors::EngineError;
use crate::types::FieldType;
use serde::{Deserialize, Serialize};

/// Severity a rule assigns to its violations
///
/// Ordering puts `Block` before `Warn` so violation lists sort
/// blocking-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    /// Makes a candidate unacceptable
    Block,
    /// Surfaced to the author but does not block acceptance
    Warn,
}

impl RuleSeverity {
    pub fn as_str(&self) -> &str {
        match self {
            RuleSeverity::Block => "block",
            RuleSeverity::Warn => "warn",
        }
    }
}

/// A single declarative style rule
///
/// The `fields` list scopes a rule to specific newsletter fields; an empty
/// list applies the rule to every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    /// Regex pattern that must not appear in the candidate
    Pattern {
        id: String,
        pattern: String,
        severity: RuleSeverity,
        message: String,
        #[serde(default)]
        fields: Vec<FieldType>,
    },

    /// Character-length bounds for a field
    Length {
        id: String,
        #[serde(default)]
        min_chars: Option<usize>,
        #[serde(default)]
        max_chars: Option<usize>,
        severity: RuleSeverity,
        message: String,
        #[serde(default)]
        fields: Vec<FieldType>,
    },

    /// Phrase that must be present (e.g. a required disclosure)
    RequiredPhrase {
        id: String,
        phrase: String,
        severity: RuleSeverity,
        message: String,
        #[serde(default)]
        fields: Vec<FieldType>,
    },

    /// Forbidden tone markers, matched as case-insensitive words
    ToneMarkers {
        id: String,
        markers: Vec<String>,
        severity: RuleSeverity,
        message: String,
        #[serde(default)]
        fields: Vec<FieldType>,
    },
}

impl Rule {
    pub fn id(&self) -> &str {
        match self {
            Rule::Pattern { id, .. }
            | Rule::Length { id, .. }
            | Rule::RequiredPhrase { id, .. }
            | Rule::ToneMarkers { id, .. } => id,
        }
    }

    pub fn severity(&self) -> RuleSeverity {
        match self {
            Rule::Pattern { severity, .. }
            | Rule::Length { severity, .. }
            | Rule::RequiredPhrase { severity, .. }
            | Rule::ToneMarkers { severity, .. } => *severity,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Rule::Pattern { message, .. }
            | Rule::Length { message, .. }
            | Rule::RequiredPhrase { message, .. }
            | Rule::ToneMarkers { message, .. } => message,
        }
    }

    fn fields(&self) -> &[FieldType] {
        match self {
            Rule::Pattern { fields, .. }
            | Rule::Length { fields, .. }
            | Rule::RequiredPhrase { fields, .. }
            | Rule::ToneMarkers { fields, .. } => fields,
        }
    }

    /// Check whether this rule applies to the given field
    pub fn applies_to(&self, field: FieldType) -> bool {
        let fields = self.fields();
        fields.is_empty() || fields.contains(&field)
    }
}

/// A validated collection of style rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ruleset {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Ruleset {
    /// Parse a ruleset from TOML and validate it
    pub fn from_toml_str(toml_str: &str) -> Result<Self, EngineError> {
        let ruleset: Ruleset = toml::from_str(toml_str)
            .map_err(|e| EngineError::Configuration(format!("Invalid ruleset TOML: {}", e)))?;
        ruleset.validate()?;
        Ok(ruleset)
    }

    /// Validate the ruleset
    ///
    /// Checks: ids are non-empty and unique, patterns compile as regex,
    /// length rules declare at least one consistent bound, word lists and
    /// required phrases are non-empty.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen_ids = std::collections::HashSet::new();

        for rule in &self.rules {
            let id = rule.id();
            if id.is_empty() {
                return Err(EngineError::Configuration(
                    "Rule with empty id".to_string(),
                ));
            }
            if !seen_ids.insert(id.to_string()) {
                return Err(EngineError::Configuration(format!(
                    "Duplicate rule id: {}",
                    id
                )));
            }

            match rule {
                Rule::Pattern { pattern, .. } => {
                    regex::Regex::new(pattern).map_err(|e| {
                        EngineError::Configuration(format!(
                            "Rule {}: invalid pattern: {}",
                            id, e
                        ))
                    })?;
                }
                Rule::Length {
                    min_chars,
                    max_chars,
                    ..
                } => {
                    if min_chars.is_none() && max_chars.is_none() {
                        return Err(EngineError::Configuration(format!(
                            "Rule {}: length rule needs min_chars or max_chars",
                            id
                        )));
                    }
                    if let (Some(min), Some(max)) = (min_chars, max_chars) {
                        if min > max {
                            return Err(EngineError::Configuration(format!(
                                "Rule {}: min_chars {} exceeds max_chars {}",
                                id, min, max
                            )));
                        }
                    }
                }
                Rule::RequiredPhrase { phrase, .. } => {
                    if phrase.trim().is_empty() {
                        return Err(EngineError::Configuration(format!(
                            "Rule {}: empty required phrase",
                            id
                        )));
                    }
                }
                Rule::ToneMarkers { markers, .. } => {
                    if markers.is_empty() || markers.iter().any(|m| m.trim().is_empty()) {
                        return Err(EngineError::Configuration(format!(
                            "Rule {}: tone marker list must be non-empty words",
                            id
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Get a rule by id
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id() == id)
    }
}
