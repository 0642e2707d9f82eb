//! Copydesk Engine Library
//!
//! This library provides the core drafting pipeline of the Copydesk engine:
//! retrieval over an editorial knowledge base, rule-driven style checking,
//! near-duplicate detection against campaign history, and the bounded
//! retrieve-generate-validate loop that commits accepted copy to brand
//! memory. It is used by integrations and by the test suites.

/// Configuration management module
pub mod config;

/// Collision detection module
pub mod collision;

/// Draft orchestration module
pub mod drafter;

/// Guideline checking module
pub mod guideline;

/// Knowledge base retrieval module
pub mod knowledge;

/// LLM provider abstraction layer
pub mod llm;

/// Brand memory persistence module
pub mod memory;

/// Telemetry and Observability
pub mod telemetry;
