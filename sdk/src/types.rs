//! Core data model types
//!
//! Shared types for the drafting pipeline: knowledge chunks produced by the
//! retriever, draft requests/candidates flowing through the orchestrator,
//! validation reports, and the tagged brand-memory records.

use crate::ruleset::RuleSeverity;
use serde::{Deserialize, Serialize};

/// Newsletter field a draft is produced for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Subject line
    Subject,
    /// Preheader (inbox preview text)
    Preheader,
    /// Body copy
    Body,
    /// Call to action
    Cta,
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Subject => "subject",
            FieldType::Preheader => "preheader",
            FieldType::Body => "body",
            FieldType::Cta => "cta",
        }
    }

    /// Parse a field type from its database/config string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subject" => Some(FieldType::Subject),
            "preheader" => Some(FieldType::Preheader),
            "body" => Some(FieldType::Body),
            "cta" => Some(FieldType::Cta),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk of the editorial knowledge base
///
/// Immutable once ingested; chunks are re-created from scratch when the
/// source documents are re-ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Chunk identifier, `<source_path>#<index>`
    pub id: String,

    /// Path of the source document this chunk was cut from
    pub source_path: String,

    /// Heading of the section the chunk belongs to, if any
    pub section: Option<String>,

    /// Chunk text
    pub text: String,

    /// Embedding vector, present only when an embedding provider is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Request for a single draft
///
/// Created per drafting call and consumed by the orchestrator; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRequest {
    /// Campaign the draft belongs to
    pub campaign_id: String,

    /// Which newsletter field to draft
    pub field_type: FieldType,

    /// The author's brief for this draft
    pub brief: String,

    /// Free-form constraints supplied by the caller
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl DraftRequest {
    pub fn new(
        campaign_id: impl Into<String>,
        field_type: FieldType,
        brief: impl Into<String>,
    ) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            field_type,
            brief: brief.into(),
            constraints: Vec::new(),
        }
    }

    /// Add a caller constraint
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }
}

/// A generated candidate text under validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftCandidate {
    /// Identifier of the originating request
    pub request_id: String,

    /// Candidate text as returned by the generation provider
    pub text: String,

    /// Ids of the knowledge chunks that grounded the generation
    pub retrieval_context_ids: Vec<String>,

    /// Zero-based revision index (0 = first attempt)
    pub revision_index: u32,
}

/// A single style-rule violation found in a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationReport {
    /// Id of the rule that fired
    pub rule_id: String,

    /// Severity declared by the rule
    pub severity: RuleSeverity,

    /// Byte span of the offending text, when the rule can localize it
    pub span: Option<(usize, usize)>,

    /// Human-readable message from the rule
    pub message: String,
}

/// Similarity method that produced a collision report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionMethod {
    /// Word-shingle Jaccard similarity
    Ngram,
    /// Embedding cosine similarity
    Embedding,
}

impl std::fmt::Display for CollisionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionMethod::Ngram => f.write_str("ngram"),
            CollisionMethod::Embedding => f.write_str("embedding"),
        }
    }
}

/// Verdict of a similarity comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionVerdict {
    /// At or above the exact threshold, or an absolute phrase ban
    Exact,
    /// At or above the near threshold
    Near,
    /// Below both thresholds
    None,
}

/// A near-duplicate or reuse signal against stored history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionReport {
    /// Id of the memory entry the candidate collided with
    pub matched_entry_id: i64,

    /// Similarity score in [0, 1]
    pub similarity: f64,

    /// Method that produced this report
    pub method: CollisionMethod,

    /// Verdict under the configured thresholds
    pub verdict: CollisionVerdict,
}

/// Kind discriminant for memory entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Decision,
    BannedPhrase,
    ApprovedClaim,
    Glossary,
}

impl EntryKind {
    pub fn as_str(&self) -> &str {
        match self {
            EntryKind::Decision => "decision",
            EntryKind::BannedPhrase => "banned_phrase",
            EntryKind::ApprovedClaim => "approved_claim",
            EntryKind::Glossary => "glossary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision" => Some(EntryKind::Decision),
            "banned_phrase" => Some(EntryKind::BannedPhrase),
            "approved_claim" => Some(EntryKind::ApprovedClaim),
            "glossary" => Some(EntryKind::Glossary),
            _ => None,
        }
    }

    /// Decision records are append-only; every other kind may be superseded
    pub fn is_mutable(&self) -> bool {
        !matches!(self, EntryKind::Decision)
    }
}

/// Payload of a memory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryRecord {
    /// Finalized, accepted copy for a campaign field
    Decision {
        campaign_id: String,
        field_type: FieldType,
        final_text: String,
        /// Per-campaign sequence number, assigned by the store at commit
        campaign_seq: i64,
        /// Embedding of the final text, when a provider was configured
        #[serde(skip_serializing_if = "Option::is_none")]
        embedding: Option<Vec<f32>>,
    },

    /// A phrase that must never appear in drafts
    BannedPhrase { pattern: String, reason: String },

    /// A factual claim approved for use in copy
    ApprovedClaim {
        claim_text: String,
        /// Unix timestamp after which the claim may no longer be used
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_at: Option<i64>,
    },

    /// A brand glossary term and its canonical form
    Glossary {
        term: String,
        canonical_form: String,
        notes: String,
    },
}

impl MemoryRecord {
    pub fn kind(&self) -> EntryKind {
        match self {
            MemoryRecord::Decision { .. } => EntryKind::Decision,
            MemoryRecord::BannedPhrase { .. } => EntryKind::BannedPhrase,
            MemoryRecord::ApprovedClaim { .. } => EntryKind::ApprovedClaim,
            MemoryRecord::Glossary { .. } => EntryKind::Glossary,
        }
    }
}

/// A committed memory entry as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Store-wide entry id
    pub id: i64,

    /// The record payload
    pub record: MemoryRecord,

    /// Id of the entry that superseded this one, if any
    pub superseded_by: Option<i64>,

    /// Unix timestamp of the commit
    pub created_at: i64,
}

impl MemoryEntry {
    /// An entry is active until it has been superseded
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }

    pub fn kind(&self) -> EntryKind {
        self.record.kind()
    }
}
