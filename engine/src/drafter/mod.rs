//! Draft Orchestration
//!
//! Drives the retrieve-generate-validate-revise cycle and commits accepted
//! drafts to brand memory.

pub mod pipeline;
pub mod types;

pub use pipeline::Drafter;
pub use types::{
    CancelToken, DraftAttempt, DraftOutcome, DraftReport, DraftState, RejectReason,
};
