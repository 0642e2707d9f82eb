//! Markdown directory document source
//!
//! Loads every `.md` file from a directory, sorted by file name so that
//! ingestion order (and therefore chunk ids) is reproducible.

use super::{DocumentSource, SourceDocument};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

pub struct MarkdownDirSource {
    dir: PathBuf,
}

impl MarkdownDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DocumentSource for MarkdownDirSource {
    async fn list_documents(&self) -> Result<Vec<SourceDocument>> {
        let mut paths = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("md") {
                paths.push(path);
            }
        }

        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            let raw_text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            documents.push(SourceDocument {
                path: path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or_default()
                    .to_string(),
                raw_text,
            });
        }

        debug!("Loaded {} markdown documents from {}", documents.len(), self.dir.display());

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::fs;

    #[tokio::test]
    async fn test_loads_only_markdown_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "# B\nbeta\n").await.unwrap();
        fs::write(dir.path().join("a.md"), "# A\nalpha\n").await.unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").await.unwrap();

        let source = MarkdownDirSource::new(dir.path());
        let docs = source.list_documents().await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].path, "a.md");
        assert_eq!(docs[1].path, "b.md");
        assert!(docs[1].raw_text.contains("beta"));
    }

    #[tokio::test]
    async fn test_missing_directory_errors() {
        let source = MarkdownDirSource::new("/nonexistent/copydesk-knowledge");
        assert!(source.list_documents().await.is_err());
    }
}
