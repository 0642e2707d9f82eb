//! Knowledge base retrieval
//!
//! Builds the grounding context for generation. Documents come from a
//! `DocumentSource` collaborator; the engine owns chunking (by markdown
//! heading) and ranking. Ranking blends lexical overlap with embedding
//! cosine similarity when an embedding provider is configured, and degrades
//! to lexical-only scoring otherwise. The resulting order is a deterministic
//! total order: score descending, ties broken by source path then chunk id,
//! so retrieval is reproducible in tests.

use crate::config::RetrievalConfig;
use crate::llm::EmbeddingProvider;
use anyhow::Result;
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::KnowledgeChunk;
use tracing::{debug, warn};

pub mod markdown;

pub use markdown::MarkdownDirSource;

/// A raw document handed over by a `DocumentSource`
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: String,
    pub raw_text: String,
}

/// Document-loading collaborator boundary
///
/// Ingestion mechanics (filesystem, CMS, fixtures) live behind this trait;
/// the engine only sees paths and raw text.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<SourceDocument>>;
}

/// Filters narrowing a retrieval call
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilter {
    /// Only chunks whose source path starts with this prefix
    pub source_prefix: Option<String>,

    /// Only chunks from a section with this exact heading
    pub section: Option<String>,
}

/// The ingested knowledge base
///
/// Chunks are immutable once ingested; re-ingesting a source rebuilds the
/// base from scratch.
pub struct KnowledgeBase {
    chunks: Vec<KnowledgeChunk>,
    lexical_weight: f64,
}

impl KnowledgeBase {
    /// Ingest all documents from a source, chunking by markdown heading
    ///
    /// When an embedding provider is given, each chunk is embedded at
    /// ingestion time; an embedding failure logs a warning and leaves that
    /// chunk lexical-only rather than failing ingestion.
    pub async fn ingest(
        source: &dyn DocumentSource,
        embedder: Option<&dyn EmbeddingProvider>,
        config: &RetrievalConfig,
    ) -> Result<Self, EngineError> {
        let documents = source
            .list_documents()
            .await
            .map_err(|e| EngineError::Storage(format!("Document source failed: {}", e)))?;

        let mut chunks = Vec::new();
        for doc in &documents {
            chunks.extend(chunk_document(doc));
        }

        if let Some(embedder) = embedder {
            for chunk in &mut chunks {
                match embedder.embed(&chunk.text).await {
                    Ok(vector) => chunk.embedding = Some(vector),
                    Err(e) => {
                        warn!("Embedding failed for chunk {}: {}", chunk.id, e);
                    }
                }
            }
        }

        debug!(
            "Ingested {} chunks from {} documents",
            chunks.len(),
            documents.len()
        );

        Ok(Self {
            chunks,
            lexical_weight: config.lexical_weight,
        })
    }

    /// Build a knowledge base directly from chunks (tests, re-hydration)
    pub fn from_chunks(chunks: Vec<KnowledgeChunk>, config: &RetrievalConfig) -> Self {
        Self {
            chunks,
            lexical_weight: config.lexical_weight,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Retrieve the `top_k` most relevant chunks for a query
    ///
    /// `query_embedding` is the pre-computed embedding of the query; pass
    /// `None` to rank by lexical overlap alone. Chunks without a stored
    /// embedding are also scored lexical-only.
    ///
    /// # Errors
    ///
    /// `RetrievalUnavailable` when the knowledge base holds no chunks at
    /// all. Callers treat this as non-fatal and proceed ungrounded.
    pub fn retrieve(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        top_k: usize,
        filter: &RetrievalFilter,
    ) -> Result<Vec<KnowledgeChunk>, EngineError> {
        if self.chunks.is_empty() {
            return Err(EngineError::RetrievalUnavailable);
        }

        let query_terms = tokenize(query);

        let mut scored: Vec<(f64, &KnowledgeChunk)> = self
            .chunks
            .iter()
            .filter(|chunk| filter_matches(filter, chunk))
            .map(|chunk| (self.score(&query_terms, query_embedding, chunk), chunk))
            .collect();

        // Score descending, then source path, then chunk id: a total order
        // independent of input iteration details.
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.source_path.cmp(&b.1.source_path))
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }

    fn score(
        &self,
        query_terms: &[String],
        query_embedding: Option<&[f32]>,
        chunk: &KnowledgeChunk,
    ) -> f64 {
        let lexical = lexical_overlap(query_terms, &chunk.text);

        match (query_embedding, &chunk.embedding) {
            (Some(query_vec), Some(chunk_vec)) => {
                let cosine = cosine_similarity(query_vec, chunk_vec).max(0.0) as f64;
                self.lexical_weight * lexical + (1.0 - self.lexical_weight) * cosine
            }
            _ => lexical,
        }
    }
}

/// Cut a document into chunks at markdown headings
///
/// Text before the first heading becomes a chunk with no section. Chunk ids
/// are `<path>#<index>` in document order.
pub fn chunk_document(doc: &SourceDocument) -> Vec<KnowledgeChunk> {
    let mut chunks = Vec::new();
    let mut section: Option<String> = None;
    let mut buffer = String::new();

    let flush = |section: &Option<String>, buffer: &mut String, chunks: &mut Vec<KnowledgeChunk>| {
        let text = buffer.trim();
        if !text.is_empty() {
            chunks.push(KnowledgeChunk {
                id: format!("{}#{}", doc.path, chunks.len()),
                source_path: doc.path.clone(),
                section: section.clone(),
                text: text.to_string(),
                embedding: None,
            });
        }
        buffer.clear();
    };

    for line in doc.raw_text.lines() {
        if let Some(heading) = line.strip_prefix('#') {
            flush(&section, &mut buffer, &mut chunks);
            section = Some(heading.trim_start_matches('#').trim().to_string());
        } else {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }
    flush(&section, &mut buffer, &mut chunks);

    chunks
}

fn filter_matches(filter: &RetrievalFilter, chunk: &KnowledgeChunk) -> bool {
    if let Some(prefix) = &filter.source_prefix {
        if !chunk.source_path.starts_with(prefix.as_str()) {
            return false;
        }
    }
    if let Some(section) = &filter.section {
        if chunk.section.as_deref() != Some(section.as_str()) {
            return false;
        }
    }
    true
}

/// Lowercased alphanumeric word tokens
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(String::from)
        .collect()
}

/// Fraction of query terms present in the chunk text
fn lexical_overlap(query_terms: &[String], chunk_text: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let chunk_terms: std::collections::HashSet<String> =
        tokenize(chunk_text).into_iter().collect();
    let matched = query_terms
        .iter()
        .filter(|term| chunk_terms.contains(*term))
        .count();
    matched as f64 / query_terms.len() as f64
}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero-length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
