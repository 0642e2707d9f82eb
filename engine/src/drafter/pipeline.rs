//! Drafting pipeline
//!
//! The orchestrator behind a draft request: an explicit bounded state
//! machine rather than a chain of callbacks. Each request runs
//! independently; the memory store is the only shared resource. Retrieval
//! and generation are the only suspension points; validation and memory
//! reads are fast in-process work.
//!
//! Failure policy: an empty knowledge base degrades the draft to ungrounded,
//! a generation failure or timeout consumes a retry attempt, and a blocking
//! validation result after the retry budget is spent surfaces as a
//! `Rejected` outcome carrying the full attempt history. Only storage and
//! configuration failures propagate as errors.

use crate::collision::CollisionDetector;
use crate::config::{DraftingConfig, RetrievalConfig};
use crate::drafter::types::{
    CancelToken, DraftAttempt, DraftOutcome, DraftReport, DraftState, RejectReason,
};
use crate::guideline::{has_blocking_violation, GuidelineChecker};
use crate::knowledge::{KnowledgeBase, RetrievalFilter};
use crate::llm::{EmbeddingProvider, GenerationProvider, LLMError, PromptContext};
use crate::memory::MemoryStore;
use sdk::errors::EngineError;
use sdk::types::{
    CollisionReport, CollisionVerdict, DraftCandidate, DraftRequest, KnowledgeChunk, MemoryRecord,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates the retrieve-generate-validate-revise cycle
pub struct Drafter {
    knowledge: Arc<KnowledgeBase>,
    store: Arc<MemoryStore>,
    checker: GuidelineChecker,
    detector: CollisionDetector,
    generator: Arc<dyn GenerationProvider>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    retrieval: RetrievalConfig,
    drafting: DraftingConfig,
}

impl Drafter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        store: Arc<MemoryStore>,
        checker: GuidelineChecker,
        detector: CollisionDetector,
        generator: Arc<dyn GenerationProvider>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        retrieval: RetrievalConfig,
        drafting: DraftingConfig,
    ) -> Self {
        Self {
            knowledge,
            store,
            checker,
            detector,
            generator,
            embedder,
            retrieval,
            drafting,
        }
    }

    /// Run a draft request to a terminal state
    ///
    /// Returns the report for both `Accepted` and `Rejected` outcomes.
    /// `Err` is reserved for cancellation and for storage/configuration
    /// failures.
    pub async fn draft(
        &self,
        request: DraftRequest,
        cancel: &CancelToken,
    ) -> Result<DraftReport, EngineError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut state = DraftState::Retrieving;
        debug!("Request {} entering {:?}", request_id, state);

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Retrieving: an empty knowledge base is non-fatal; the draft just
        // runs ungrounded.
        let (passages, grounded) = self.retrieve_context(&request).await;

        let mut attempts: Vec<DraftAttempt> = Vec::new();
        let mut feedback: Vec<String> = Vec::new();
        let mut last_failure: Option<RejectReason> = None;

        for revision_index in 0..=self.drafting.max_retries {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let snapshot = self.store.snapshot().await?;
            let now = chrono::Utc::now().timestamp();

            let context = PromptContext {
                field_type: Some(request.field_type),
                brief: request.brief.clone(),
                constraints: request.constraints.clone(),
                passages: passages.clone(),
                banned_phrases: snapshot
                    .active_banned_phrases()
                    .into_iter()
                    .map(|(_, pattern)| pattern.to_string())
                    .collect(),
                glossary: snapshot.active_glossary(),
                approved_claims: snapshot.active_claims(now),
                feedback: feedback.clone(),
            };

            state = DraftState::Generating;
            debug!(
                "Request {} entering {:?} (attempt {})",
                request_id, state, revision_index
            );

            let text = match self.generator.generate(&context).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Request {} generation failed: {}", request_id, e);
                    last_failure = Some(match e {
                        LLMError::Timeout => RejectReason::Timeout,
                        _ => RejectReason::GenerationFailed,
                    });
                    attempts.push(DraftAttempt {
                        revision_index,
                        candidate: None,
                        violations: Vec::new(),
                        collisions: Vec::new(),
                        generation_error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            state = DraftState::Validating;
            debug!("Request {} entering {:?}", request_id, state);

            let candidate = DraftCandidate {
                request_id: request_id.clone(),
                text: text.clone(),
                retrieval_context_ids: passages.iter().map(|c| c.id.clone()).collect(),
                revision_index,
            };

            let embedding = self.embed_candidate(&text).await;
            let violations = self.checker.check(&text, request.field_type);
            let collisions = self.detector.detect(
                &text,
                request.field_type,
                &snapshot,
                embedding.as_deref(),
            );

            let blocked = has_blocking_violation(&violations)
                || has_blocking_collision(&collisions, self.drafting.near_blocks);

            attempts.push(DraftAttempt {
                revision_index,
                candidate: Some(candidate),
                violations: violations.clone(),
                collisions: collisions.clone(),
                generation_error: None,
            });

            if !blocked {
                // Commit is the last boundary where cancellation is honored;
                // once the append starts it runs to completion.
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }

                state = DraftState::Accepted;
                debug!("Request {} entering {:?}", request_id, state);
                let committed = self
                    .store
                    .append(MemoryRecord::Decision {
                        campaign_id: request.campaign_id.clone(),
                        field_type: request.field_type,
                        final_text: text.clone(),
                        campaign_seq: 0,
                        embedding,
                    })
                    .await?;

                let campaign_seq = match &committed.record {
                    MemoryRecord::Decision { campaign_seq, .. } => *campaign_seq,
                    _ => unreachable!("append returned a non-decision record"),
                };

                info!(
                    "Request {} accepted on attempt {} (entry {})",
                    request_id, revision_index, committed.id
                );

                return Ok(DraftReport {
                    request_id,
                    outcome: DraftOutcome::Accepted {
                        entry_id: committed.id,
                        campaign_seq,
                        text,
                    },
                    attempts,
                    grounded,
                });
            }

            last_failure = None;
            extend_feedback(&mut feedback, &violations, &collisions);

            if revision_index < self.drafting.max_retries {
                state = DraftState::Revising;
                debug!("Request {} entering {:?}", request_id, state);
            }
        }

        state = DraftState::Rejected;
        let reason = last_failure.unwrap_or(RejectReason::ValidationBlocked);
        info!(
            "Request {} {:?} after {} attempts ({:?})",
            request_id,
            state,
            attempts.len(),
            reason
        );

        Ok(DraftReport {
            request_id,
            outcome: DraftOutcome::Rejected { reason },
            attempts,
            grounded,
        })
    }

    /// Retrieve grounding passages, degrading to ungrounded when the base
    /// is empty
    async fn retrieve_context(&self, request: &DraftRequest) -> (Vec<KnowledgeChunk>, bool) {
        let query_embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(&request.brief).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!("Query embedding failed, ranking lexically: {}", e);
                    None
                }
            },
            None => None,
        };

        match self.knowledge.retrieve(
            &request.brief,
            query_embedding.as_deref(),
            self.retrieval.top_k,
            &RetrievalFilter::default(),
        ) {
            Ok(passages) => (passages, true),
            Err(EngineError::RetrievalUnavailable) => {
                warn!("Knowledge base empty; drafting ungrounded");
                (Vec::new(), false)
            }
            Err(e) => {
                warn!("Retrieval failed ({}); drafting ungrounded", e);
                (Vec::new(), false)
            }
        }
    }

    /// Embed a candidate, degrading to n-gram-only detection on failure
    async fn embed_candidate(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!("Candidate embedding failed, n-gram stage only: {}", e);
                None
            }
        }
    }
}

/// Whether any collision report blocks acceptance under the configured
/// policy
fn has_blocking_collision(reports: &[CollisionReport], near_blocks: bool) -> bool {
    reports.iter().any(|report| match report.verdict {
        CollisionVerdict::Exact => true,
        CollisionVerdict::Near => near_blocks,
        CollisionVerdict::None => false,
    })
}

/// Turn this attempt's findings into feedback for the next one
fn extend_feedback(
    feedback: &mut Vec<String>,
    violations: &[sdk::types::ViolationReport],
    collisions: &[CollisionReport],
) {
    for violation in violations {
        feedback.push(format!(
            "Style rule {}: {}",
            violation.rule_id, violation.message
        ));
    }
    for collision in collisions {
        feedback.push(format!(
            "Too close to earlier copy (entry {}, {} similarity {:.2})",
            collision.matched_entry_id, collision.method, collision.similarity
        ));
    }
}
