//! Collision detection
//!
//! Computes near-duplicate and reuse signals for a candidate against the
//! brand memory. Two independent stages run over a `MemorySnapshot`:
//!
//! 1. **n-gram stage**: normalized word shingles (default 3-gram) compared
//!    by Jaccard similarity against prior DecisionRecords of the same field
//!    type within the recency window.
//! 2. **embedding stage** (when a candidate embedding is supplied): cosine
//!    similarity against stored decision embeddings.
//!
//! Each stage applies its own exact/near thresholds and reports
//! independently; reports are concatenated, never merged. Banned phrases
//! are absolute: any match reports verdict `exact` with similarity 1.0
//! regardless of overall text similarity.
//!
//! For a fixed snapshot and fixed text the output is identical across
//! calls: entries are visited in id order and nothing here is randomized.

use crate::config::CollisionConfig;
use crate::knowledge::cosine_similarity;
use crate::memory::MemorySnapshot;
use regex::Regex;
use sdk::types::{CollisionMethod, CollisionReport, CollisionVerdict, FieldType, MemoryRecord};
use std::collections::HashSet;
use tracing::debug;

/// Detects reuse of prior copy and banned phrases
pub struct CollisionDetector {
    config: CollisionConfig,
}

impl CollisionDetector {
    pub fn new(config: CollisionConfig) -> Self {
        Self { config }
    }

    /// Detect collisions for a candidate against a memory snapshot
    ///
    /// `candidate_embedding` enables the embedding stage; pass `None` when
    /// no embedding provider is configured and the detector degrades to
    /// n-gram-only. Only `exact` and `near` verdicts are reported.
    pub fn detect(
        &self,
        candidate_text: &str,
        field_type: FieldType,
        snapshot: &MemorySnapshot,
        candidate_embedding: Option<&[f32]>,
    ) -> Vec<CollisionReport> {
        let mut reports = Vec::new();

        let candidate_shingles = shingles(candidate_text, self.config.shingle_size);
        let candidate_normalized = normalize(candidate_text);

        let decisions = self.decisions_in_window(snapshot, field_type);

        // Stage 1: n-gram Jaccard against prior decisions.
        for (entry_id, final_text, _) in &decisions {
            let prior_shingles = shingles(final_text, self.config.shingle_size);
            let similarity = if candidate_shingles.is_empty() || prior_shingles.is_empty() {
                // Degenerate texts: equality of the normalized forms decides.
                if candidate_normalized == normalize(final_text) {
                    1.0
                } else {
                    0.0
                }
            } else {
                jaccard(&candidate_shingles, &prior_shingles)
            };

            let verdict = classify(similarity, self.config.ngram_near, self.config.ngram_exact);
            if verdict != CollisionVerdict::None {
                reports.push(CollisionReport {
                    matched_entry_id: *entry_id,
                    similarity,
                    method: CollisionMethod::Ngram,
                    verdict,
                });
            }
        }

        // Stage 2: embedding cosine, independently reported.
        if let Some(candidate_vec) = candidate_embedding {
            for (entry_id, _, embedding) in &decisions {
                let Some(prior_vec) = embedding else { continue };
                let similarity = cosine_similarity(candidate_vec, prior_vec).max(0.0) as f64;

                let verdict = classify(
                    similarity,
                    self.config.embedding_near,
                    self.config.embedding_exact,
                );
                if verdict != CollisionVerdict::None {
                    reports.push(CollisionReport {
                        matched_entry_id: *entry_id,
                        similarity,
                        method: CollisionMethod::Embedding,
                        verdict,
                    });
                }
            }
        }

        // Phrase bans are absolute, not probabilistic.
        for (entry_id, pattern) in snapshot.active_banned_phrases() {
            if banned_phrase_matches(pattern, candidate_text) {
                reports.push(CollisionReport {
                    matched_entry_id: entry_id,
                    similarity: 1.0,
                    method: CollisionMethod::Ngram,
                    verdict: CollisionVerdict::Exact,
                });
            }
        }

        debug!(
            "Collision detection for {} produced {} reports",
            field_type,
            reports.len()
        );

        reports
    }

    /// Prior decisions of the field, restricted to the recency window
    ///
    /// The window is the last N distinct campaigns by first appearance in
    /// commit order; `None` means all history.
    fn decisions_in_window<'a>(
        &self,
        snapshot: &'a MemorySnapshot,
        field_type: FieldType,
    ) -> Vec<(i64, &'a str, &'a Option<Vec<f32>>)> {
        let decisions: Vec<(&str, i64, &str, &Option<Vec<f32>>)> = snapshot
            .decisions(field_type)
            .into_iter()
            .filter_map(|entry| match &entry.record {
                MemoryRecord::Decision {
                    campaign_id,
                    final_text,
                    embedding,
                    ..
                } => Some((campaign_id.as_str(), entry.id, final_text.as_str(), embedding)),
                _ => None,
            })
            .collect();

        let allowed: Option<HashSet<&str>> = self.config.recent_campaigns.map(|window| {
            let mut campaigns: Vec<&str> = Vec::new();
            for (campaign_id, ..) in &decisions {
                if !campaigns.contains(campaign_id) {
                    campaigns.push(*campaign_id);
                }
            }
            campaigns
                .into_iter()
                .rev()
                .take(window)
                .collect()
        });

        decisions
            .into_iter()
            .filter(|(campaign_id, ..)| match &allowed {
                Some(allowed) => allowed.contains(campaign_id),
                None => true,
            })
            .map(|(_, id, text, embedding)| (id, text, embedding))
            .collect()
    }
}

/// Lowercase and strip punctuation, collapsing whitespace
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Word shingles of the normalized text
///
/// Texts shorter than the shingle size fall back to their word set so that
/// one- and two-word fields stay comparable.
pub fn shingles(text: &str, size: usize) -> HashSet<String> {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();

    if words.is_empty() {
        return HashSet::new();
    }
    if words.len() < size {
        return words.into_iter().map(String::from).collect();
    }

    words
        .windows(size)
        .map(|window| window.join(" "))
        .collect()
}

/// Jaccard similarity between two shingle sets
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Map a similarity score onto a verdict under the two-threshold policy
pub fn classify(similarity: f64, near: f64, exact: f64) -> CollisionVerdict {
    if similarity >= exact {
        CollisionVerdict::Exact
    } else if similarity >= near {
        CollisionVerdict::Near
    } else {
        CollisionVerdict::None
    }
}

/// Check a banned-phrase pattern against the raw candidate text
///
/// Patterns are tried as case-insensitive regex; a pattern that does not
/// compile is matched as a case-insensitive literal substring instead, so a
/// malformed ban still bans.
fn banned_phrase_matches(pattern: &str, text: &str) -> bool {
    match Regex::new(&format!("(?i){}", pattern)) {
        Ok(re) => re.is_match(text),
        Err(_) => text.to_lowercase().contains(&pattern.to_lowercase()),
    }
}
