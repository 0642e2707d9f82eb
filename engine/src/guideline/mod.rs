//! Guideline checking
//!
//! Evaluates a candidate draft against the declarative style ruleset,
//! independent of history. Rules are compiled once at startup (malformed
//! rules fail fast as configuration errors); evaluation is pure and
//! order-independent: every applicable rule runs against the full
//! candidate text and the result is the union of all violations, sorted by
//! severity then rule id for determinism. A `block`-severity violation makes
//! the candidate unacceptable; `warn` severities are surfaced but do not
//! block.

use regex::Regex;
use sdk::errors::EngineError;
use sdk::ruleset::{Rule, RuleSeverity, Ruleset};
use sdk::types::{FieldType, ViolationReport};

/// A rule with its patterns compiled
enum CompiledRule {
    Pattern {
        id: String,
        regex: Regex,
        severity: RuleSeverity,
        message: String,
        fields: Vec<FieldType>,
    },
    Length {
        id: String,
        min_chars: Option<usize>,
        max_chars: Option<usize>,
        severity: RuleSeverity,
        message: String,
        fields: Vec<FieldType>,
    },
    RequiredPhrase {
        id: String,
        phrase: String,
        severity: RuleSeverity,
        message: String,
        fields: Vec<FieldType>,
    },
    ToneMarkers {
        id: String,
        regex: Regex,
        severity: RuleSeverity,
        message: String,
        fields: Vec<FieldType>,
    },
}

impl CompiledRule {
    fn applies_to(&self, field: FieldType) -> bool {
        let fields = match self {
            CompiledRule::Pattern { fields, .. }
            | CompiledRule::Length { fields, .. }
            | CompiledRule::RequiredPhrase { fields, .. }
            | CompiledRule::ToneMarkers { fields, .. } => fields,
        };
        fields.is_empty() || fields.contains(&field)
    }
}

/// Rule-driven style checker
///
/// Holds no mutable state; `check` has no side effects.
pub struct GuidelineChecker {
    rules: Vec<CompiledRule>,
}

impl GuidelineChecker {
    /// Compile a validated ruleset into a checker
    ///
    /// Validation and compilation failures are `Configuration` errors and
    /// should abort startup, not a drafting request.
    pub fn new(ruleset: &Ruleset) -> Result<Self, EngineError> {
        ruleset.validate()?;

        let mut rules = Vec::with_capacity(ruleset.rules.len());
        for rule in &ruleset.rules {
            rules.push(compile_rule(rule)?);
        }

        Ok(Self { rules })
    }

    /// Evaluate a candidate against every applicable rule
    ///
    /// Returns the union of all violations sorted by severity (blocks
    /// first) then rule id.
    pub fn check(&self, candidate_text: &str, field_type: FieldType) -> Vec<ViolationReport> {
        let mut violations = Vec::new();

        for rule in &self.rules {
            if !rule.applies_to(field_type) {
                continue;
            }

            match rule {
                CompiledRule::Pattern {
                    id,
                    regex,
                    severity,
                    message,
                    ..
                } => {
                    if let Some(m) = regex.find(candidate_text) {
                        violations.push(ViolationReport {
                            rule_id: id.clone(),
                            severity: *severity,
                            span: Some((m.start(), m.end())),
                            message: message.clone(),
                        });
                    }
                }
                CompiledRule::Length {
                    id,
                    min_chars,
                    max_chars,
                    severity,
                    message,
                    ..
                } => {
                    let length = candidate_text.chars().count();
                    let too_short = min_chars.map(|min| length < min).unwrap_or(false);
                    let too_long = max_chars.map(|max| length > max).unwrap_or(false);
                    if too_short || too_long {
                        violations.push(ViolationReport {
                            rule_id: id.clone(),
                            severity: *severity,
                            span: None,
                            message: format!("{} ({} characters)", message, length),
                        });
                    }
                }
                CompiledRule::RequiredPhrase {
                    id,
                    phrase,
                    severity,
                    message,
                    ..
                } => {
                    if !candidate_text
                        .to_lowercase()
                        .contains(&phrase.to_lowercase())
                    {
                        violations.push(ViolationReport {
                            rule_id: id.clone(),
                            severity: *severity,
                            span: None,
                            message: message.clone(),
                        });
                    }
                }
                CompiledRule::ToneMarkers {
                    id,
                    regex,
                    severity,
                    message,
                    ..
                } => {
                    if let Some(m) = regex.find(candidate_text) {
                        violations.push(ViolationReport {
                            rule_id: id.clone(),
                            severity: *severity,
                            span: Some((m.start(), m.end())),
                            message: format!("{} (found \"{}\")", message, m.as_str()),
                        });
                    }
                }
            }
        }

        violations.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });

        violations
    }
}

fn compile_rule(rule: &Rule) -> Result<CompiledRule, EngineError> {
    match rule {
        Rule::Pattern {
            id,
            pattern,
            severity,
            message,
            fields,
        } => {
            let regex = Regex::new(pattern).map_err(|e| {
                EngineError::Configuration(format!("Rule {}: invalid pattern: {}", id, e))
            })?;
            Ok(CompiledRule::Pattern {
                id: id.clone(),
                regex,
                severity: *severity,
                message: message.clone(),
                fields: fields.clone(),
            })
        }
        Rule::Length {
            id,
            min_chars,
            max_chars,
            severity,
            message,
            fields,
        } => Ok(CompiledRule::Length {
            id: id.clone(),
            min_chars: *min_chars,
            max_chars: *max_chars,
            severity: *severity,
            message: message.clone(),
            fields: fields.clone(),
        }),
        Rule::RequiredPhrase {
            id,
            phrase,
            severity,
            message,
            fields,
        } => Ok(CompiledRule::RequiredPhrase {
            id: id.clone(),
            phrase: phrase.clone(),
            severity: *severity,
            message: message.clone(),
            fields: fields.clone(),
        }),
        Rule::ToneMarkers {
            id,
            markers,
            severity,
            message,
            fields,
        } => {
            let alternation = markers
                .iter()
                .map(|marker| regex::escape(marker))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&format!(r"(?i)\b({})\b", alternation)).map_err(|e| {
                EngineError::Configuration(format!("Rule {}: invalid markers: {}", id, e))
            })?;
            Ok(CompiledRule::ToneMarkers {
                id: id.clone(),
                regex,
                severity: *severity,
                message: message.clone(),
                fields: fields.clone(),
            })
        }
    }
}

/// Whether any report in the list blocks acceptance
pub fn has_blocking_violation(reports: &[ViolationReport]) -> bool {
    reports
        .iter()
        .any(|report| report.severity == RuleSeverity::Block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> GuidelineChecker {
        let ruleset = Ruleset::from_toml_str(
            r#"
[[rules]]
type = "pattern"
id = "no-exclamation-runs"
pattern = "!{2,}"
severity = "block"
message = "Avoid runs of exclamation marks"

[[rules]]
type = "length"
id = "subject-length"
max_chars = 40
severity = "warn"
message = "Subject too long"
fields = ["subject"]

[[rules]]
type = "length"
id = "cta-minimum"
min_chars = 5
severity = "block"
message = "CTA too short"
fields = ["cta"]

[[rules]]
type = "required_phrase"
id = "unsubscribe-disclosure"
phrase = "unsubscribe"
severity = "block"
message = "Body copy must mention unsubscribe"
fields = ["body"]

[[rules]]
type = "tone_markers"
id = "no-hype"
markers = ["insane", "unbelievable"]
severity = "warn"
message = "Hype words clash with the brand voice"
"#,
        )
        .unwrap();
        GuidelineChecker::new(&ruleset).unwrap()
    }

    #[test]
    fn test_clean_subject_passes() {
        let violations = checker().check("Meet the autumn collection", FieldType::Subject);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_pattern_rule_reports_span() {
        let violations = checker().check("Huge savings!!", FieldType::Subject);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "no-exclamation-runs");
        assert_eq!(violations[0].severity, RuleSeverity::Block);
        assert_eq!(violations[0].span, Some((12, 14)));
    }

    #[test]
    fn test_length_rule_scoped_to_field() {
        let long = "This subject line is definitely much longer than forty characters in total";
        let violations = checker().check(long, FieldType::Subject);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "subject-length");
        assert_eq!(violations[0].severity, RuleSeverity::Warn);

        // The same text as body copy is not length-checked (but misses the
        // unsubscribe disclosure).
        let violations = checker().check(long, FieldType::Body);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "unsubscribe-disclosure");
    }

    #[test]
    fn test_minimum_length() {
        let violations = checker().check("Go", FieldType::Cta);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "cta-minimum");
    }

    #[test]
    fn test_required_phrase_case_insensitive() {
        let violations = checker().check(
            "Our story this month. You can Unsubscribe at any time.",
            FieldType::Body,
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_tone_marker_word_boundary() {
        let violations = checker().check("An unbelievable offer", FieldType::Subject);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "no-hype");
        assert!(violations[0].message.contains("unbelievable"));

        // Substring inside another word does not fire
        let violations = checker().check("unbelievably good", FieldType::Subject);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_violations_sorted_severity_then_id() {
        // Triggers: no-exclamation-runs (block), subject-length (warn),
        // no-hype (warn).
        let text = "This insane subject line runs way past forty characters, honestly!!";
        let violations = checker().check(text, FieldType::Subject);

        let ids: Vec<&str> = violations.iter().map(|v| v.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["no-exclamation-runs", "no-hype", "subject-length"]);
        assert_eq!(violations[0].severity, RuleSeverity::Block);
    }

    #[test]
    fn test_check_is_deterministic() {
        let c = checker();
        let text = "An insane deal!! Act today";
        assert_eq!(
            c.check(text, FieldType::Subject),
            c.check(text, FieldType::Subject)
        );
    }

    #[test]
    fn test_has_blocking_violation() {
        let c = checker();
        let blocking = c.check("Wow!!", FieldType::Subject);
        assert!(has_blocking_violation(&blocking));

        let warning_only = c.check("An insane deal", FieldType::Subject);
        assert!(!warning_only.is_empty());
        assert!(!has_blocking_violation(&warning_only));
    }

    #[test]
    fn test_invalid_ruleset_fails_construction() {
        let ruleset = Ruleset {
            rules: vec![Rule::Pattern {
                id: "broken".to_string(),
                pattern: "(".to_string(),
                severity: RuleSeverity::Block,
                message: "m".to_string(),
                fields: vec![],
            }],
        };
        assert!(GuidelineChecker::new(&ruleset).is_err());
    }
}
