//! Error types and handling
//!
//! This module provides the error types used throughout the Copydesk engine.
//! All errors implement the `CopydeskErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! Recoverable failures are handled inside the drafting pipeline (an empty
//! knowledge base degrades to an ungrounded draft, a generation failure
//! consumes a retry attempt, a supersede conflict asks the caller to
//! re-lookup). Only configuration and storage failures surface as hard
//! errors.

use thiserror::Error;

/// Trait for Copydesk error extensions
///
/// Provides additional context for errors: a hint safe to show to authors,
/// and whether the pipeline can recover from the failure on its own.
pub trait CopydeskErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors are absorbed by the drafting pipeline or resolved
    /// by retrying. Non-recoverable errors require fixing configuration or
    /// storage before drafting can continue.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Retrieval**: the knowledge base has nothing to ground against
/// - **Generation**: the external generation call failed or timed out
/// - **Memory**: supersede conflicts and append-only violations
/// - **Configuration**: malformed config or ruleset; fails fast at startup
/// - **Storage**: unrecoverable persistence failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{CopydeskErrorExt, EngineError};
///
/// let error = EngineError::RetrievalUnavailable;
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::Configuration("bad ruleset".to_string());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Retrieval errors
    #[error("Knowledge base is empty")]
    RetrievalUnavailable,

    // Generation errors
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Generation timed out")]
    GenerationTimeout,

    // Memory store errors
    #[error("Entry {entry_id} was already superseded")]
    Conflict { entry_id: i64 },

    #[error("Entry {entry_id} is append-only and cannot be superseded")]
    ImmutableEntry { entry_id: i64 },

    #[error("Entry not found: {0}")]
    EntryNotFound(i64),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Cancellation
    #[error("Draft request cancelled")]
    Cancelled,
}

impl CopydeskErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::RetrievalUnavailable => {
                "No editorial guidelines ingested yet. The draft will be ungrounded"
            }

            Self::Generation(_) => "Generation provider unavailable. Check API keys and network",
            Self::GenerationTimeout => "Generation provider took too long to respond. Try again",

            Self::Conflict { .. } => "Entry changed underneath you. Re-fetch and retry",
            Self::ImmutableEntry { .. } => "Decision records cannot be edited after commit",
            Self::EntryNotFound(_) => "No memory entry with that id",

            Self::Configuration(_) => "Check your config and ruleset files for errors",

            Self::Storage(_) => "Memory store operation failed. Check the database file",

            Self::Cancelled => "The draft request was cancelled before completion",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::ImmutableEntry { .. }
            | Self::EntryNotFound(_)
            | Self::Configuration(_)
            | Self::Storage(_) => false,

            // All other errors are absorbed or retried
            _ => true,
        }
    }
}
