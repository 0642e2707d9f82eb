//! Copydesk SDK
//!
//! Shared library providing the data model, error taxonomy, and style ruleset
//! used by the Copydesk engine and by external integrators.

/// Error types and handling
pub mod errors;

/// Style ruleset types
pub mod ruleset;

/// Core data model types
pub mod types;

// Re-export commonly used types
pub use errors::{CopydeskErrorExt, EngineError};
pub use ruleset::{Rule, RuleSeverity, Ruleset};
pub use types::{
    CollisionMethod, CollisionReport, CollisionVerdict, DraftCandidate, DraftRequest, EntryKind,
    FieldType, KnowledgeChunk, MemoryEntry, MemoryRecord, ViolationReport,
};
