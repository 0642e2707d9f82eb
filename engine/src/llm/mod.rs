//! LLM Provider Abstraction Layer
//!
//! This module defines the two external collaborator boundaries of the
//! drafting pipeline: text generation and (optionally) embeddings. The
//! orchestrator assembles a `PromptContext` from retrieved passages, the
//! author's brief, and memory-derived constraints; a `GenerationProvider`
//! turns it into candidate text. An `EmbeddingProvider` is a capability, not
//! a requirement; its absence degrades collision detection to n-gram-only
//! and never fails the pipeline.

use async_trait::async_trait;
use sdk::types::{FieldType, KnowledgeChunk};
use serde::{Deserialize, Serialize};

pub mod openai;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Everything a generation call is grounded in
///
/// Assembled by the orchestrator per attempt. On revisions the `feedback`
/// list carries the violations and collisions of prior attempts so the
/// provider can steer away from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptContext {
    /// Which newsletter field is being drafted
    pub field_type: Option<FieldType>,

    /// The author's brief
    pub brief: String,

    /// Caller-supplied constraints
    pub constraints: Vec<String>,

    /// Retrieved knowledge passages, most relevant first
    pub passages: Vec<KnowledgeChunk>,

    /// Active banned phrases from brand memory
    pub banned_phrases: Vec<String>,

    /// Glossary terms as (term, canonical form) pairs
    pub glossary: Vec<(String, String)>,

    /// Unexpired approved claims the copy may use
    pub approved_claims: Vec<String>,

    /// Violation/collision feedback accumulated across revision attempts
    pub feedback: Vec<String>,
}

impl PromptContext {
    /// Render the context as a (system, user) message pair
    ///
    /// The system message carries the grounding passages and all standing
    /// constraints in labeled sections; the user message carries the brief
    /// and, on revisions, the feedback to address.
    pub fn render_messages(&self) -> (String, String) {
        let mut system = String::from(
            "You are a newsletter copywriter. Draft on-brand copy grounded in the \
             editorial guidelines below. Output only the copy itself.",
        );

        if let Some(field) = self.field_type {
            system.push_str(&format!("\n\nField to draft: {}", field));
        }

        if !self.passages.is_empty() {
            system.push_str("\n\n--- Editorial Guidelines ---\n");
            for chunk in &self.passages {
                match &chunk.section {
                    Some(section) => {
                        system.push_str(&format!("[{} / {}]\n{}\n\n", chunk.source_path, section, chunk.text))
                    }
                    None => system.push_str(&format!("[{}]\n{}\n\n", chunk.source_path, chunk.text)),
                }
            }
        }

        if !self.banned_phrases.is_empty() {
            system.push_str("\n--- Never Use These Phrases ---\n");
            for phrase in &self.banned_phrases {
                system.push_str(&format!("- {}\n", phrase));
            }
        }

        if !self.glossary.is_empty() {
            system.push_str("\n--- Brand Glossary ---\n");
            for (term, canonical) in &self.glossary {
                system.push_str(&format!("- write \"{}\" as \"{}\"\n", term, canonical));
            }
        }

        if !self.approved_claims.is_empty() {
            system.push_str("\n--- Approved Claims ---\n");
            for claim in &self.approved_claims {
                system.push_str(&format!("- {}\n", claim));
            }
        }

        let mut user = self.brief.clone();
        if !self.constraints.is_empty() {
            user.push_str("\n\nConstraints:\n");
            for constraint in &self.constraints {
                user.push_str(&format!("- {}\n", constraint));
            }
        }
        if !self.feedback.is_empty() {
            user.push_str("\n\nThe previous attempt was rejected. Fix these issues:\n");
            for item in &self.feedback {
                user.push_str(&format!("- {}\n", item));
            }
        }

        (system, user)
    }
}

/// Generation boundary all providers must implement
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "openai")
    fn name(&self) -> &str;

    /// Generate candidate text for the given context
    ///
    /// # Returns
    /// * `Ok(String)` - Raw candidate text
    /// * `Err(LLMError)` - If the request fails; the orchestrator translates
    ///   this into a consumed retry attempt, never a hard failure
    async fn generate(&self, context: &PromptContext) -> Result<String>;

    /// Check if the provider is currently healthy and available.
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Optional embedding boundary
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the name of the provider
    fn name(&self) -> &str;

    /// Embed a text into a dense vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.to_string(),
            source_path: "voice.md".to_string(),
            section: Some("Tone".to_string()),
            text: text.to_string(),
            embedding: None,
        }
    }

    #[test]
    fn test_render_includes_all_sections() {
        let context = PromptContext {
            field_type: Some(FieldType::Subject),
            brief: "Announce the fall collection".to_string(),
            constraints: vec!["under 8 words".to_string()],
            passages: vec![chunk("voice.md#0", "Keep subjects playful.")],
            banned_phrases: vec!["limited time".to_string()],
            glossary: vec![("e-mail".to_string(), "email".to_string())],
            approved_claims: vec!["Free returns within 30 days".to_string()],
            feedback: vec![],
        };

        let (system, user) = context.render_messages();
        assert!(system.contains("--- Editorial Guidelines ---"));
        assert!(system.contains("Keep subjects playful."));
        assert!(system.contains("--- Never Use These Phrases ---"));
        assert!(system.contains("limited time"));
        assert!(system.contains("--- Brand Glossary ---"));
        assert!(system.contains("--- Approved Claims ---"));
        assert!(system.contains("Field to draft: subject"));

        assert!(user.contains("Announce the fall collection"));
        assert!(user.contains("under 8 words"));
        assert!(!user.contains("previous attempt"));
    }

    #[test]
    fn test_render_feedback_on_revision() {
        let context = PromptContext {
            brief: "Announce the fall collection".to_string(),
            feedback: vec!["Too similar to the September subject line".to_string()],
            ..Default::default()
        };

        let (_, user) = context.render_messages();
        assert!(user.contains("previous attempt was rejected"));
        assert!(user.contains("Too similar to the September subject line"));
    }

    #[test]
    fn test_render_omits_empty_sections() {
        let context = PromptContext {
            brief: "A brief".to_string(),
            ..Default::default()
        };

        let (system, user) = context.render_messages();
        assert!(!system.contains("--- Editorial Guidelines ---"));
        assert!(!system.contains("--- Never Use These Phrases ---"));
        assert_eq!(user, "A brief");
    }
}
