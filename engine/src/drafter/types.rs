//! Draft orchestration types

use sdk::types::{CollisionReport, DraftCandidate, ViolationReport};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// States of the drafting state machine
///
/// `Retrieving → Generating → Validating → {Accepted | Revising | Rejected}`;
/// `Revising` re-enters `Generating` with augmented feedback until the retry
/// budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftState {
    Retrieving,
    Generating,
    Validating,
    Revising,
    Accepted,
    Rejected,
}

/// Cooperative cancellation flag
///
/// Checked at state boundaries only, never mid-external-call. A cancel
/// observed after commit has begun does not interrupt the commit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation at the next state boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Record of one generate-validate attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftAttempt {
    /// Zero-based revision index
    pub revision_index: u32,

    /// The generated candidate; `None` when generation itself failed
    pub candidate: Option<DraftCandidate>,

    /// Style violations found in this attempt
    pub violations: Vec<ViolationReport>,

    /// Collision reports found in this attempt
    pub collisions: Vec<CollisionReport>,

    /// Generation failure message, when the attempt never reached validation
    pub generation_error: Option<String>,
}

/// Why a request ended `Rejected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// A blocking violation or collision persisted through every attempt
    ValidationBlocked,
    /// The final attempt failed to generate at all
    GenerationFailed,
    /// The final attempt timed out
    Timeout,
}

/// Terminal outcome of a draft request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DraftOutcome {
    /// The candidate passed validation and was committed to brand memory
    Accepted {
        /// Memory entry id of the committed DecisionRecord
        entry_id: i64,
        /// Sequence number within the campaign
        campaign_seq: i64,
        /// The accepted text
        text: String,
    },

    /// The retry budget was exhausted without an acceptable candidate
    Rejected { reason: RejectReason },
}

/// Full result handed back to the caller
///
/// A rejected draft always carries the complete violation/collision trail
/// across every attempt, not just the last one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftReport {
    /// Id assigned to the request by the orchestrator
    pub request_id: String,

    /// Terminal outcome
    pub outcome: DraftOutcome,

    /// Every attempt in order
    pub attempts: Vec<DraftAttempt>,

    /// False when retrieval was unavailable and the draft ran ungrounded
    pub grounded: bool,
}

impl DraftReport {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, DraftOutcome::Accepted { .. })
    }
}
