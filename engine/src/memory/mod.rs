//! Brand memory persistence
//!
//! The Memory Store is the single shared mutable resource of the drafting
//! pipeline: the durable record of past decisions, banned phrases, approved
//! claims, and glossary terms. It uses sqlx with SQLite in WAL mode.
//!
//! Guarantees:
//!
//! - `append` is atomic with respect to concurrent appends: writers take a
//!   per-store mutex, so no two writers can observe the same pre-append
//!   state. DecisionRecord sequence numbers are strictly increasing and
//!   gap-free within a campaign.
//! - DecisionRecords are append-only and never mutated after commit.
//! - Mutable kinds (banned phrases, claims, glossary) are superseded, never
//!   hard-deleted; prior versions remain auditable via `superseded_by`.
//! - `snapshot` reads are consistent: a snapshot never contains a
//!   partially-written entry.

use sdk::errors::EngineError;
use sdk::types::{EntryKind, FieldType, MemoryEntry, MemoryRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Row};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};

fn storage(e: impl std::fmt::Display) -> EngineError {
    EngineError::Storage(e.to_string())
}

/// Durable brand memory store
pub struct MemoryStore {
    pool: SqlitePool,
    // Serializes writers; sequence assignment depends on it.
    append_lock: Mutex<()>,
}

impl MemoryStore {
    /// Open (or create) the store at the given path
    ///
    /// Enables WAL mode for concurrent readers and runs the embedded
    /// migrations. SQLite recovers the WAL automatically after an unclean
    /// shutdown when the database is reopened.
    pub async fn new(db_path: &Path) -> Result<Self, EngineError> {
        info!("Initializing memory store at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage)?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(storage)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(storage)?;

        sqlx::raw_sql(include_str!("../../migrations/001_initial.sql"))
            .execute(&pool)
            .await
            .map_err(storage)?;

        debug!("Memory store ready");

        Ok(Self {
            pool,
            append_lock: Mutex::new(()),
        })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append a record, returning the committed entry
    ///
    /// For DecisionRecords the store assigns `campaign_seq` itself (any
    /// value in the passed record is replaced) as the next sequence number
    /// within the campaign. The insert is a single transaction under the
    /// store's write lock: either the full entry exists afterwards or none
    /// does.
    pub async fn append(&self, record: MemoryRecord) -> Result<MemoryEntry, EngineError> {
        let _guard = self.append_lock.lock().await;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let record = match record {
            MemoryRecord::Decision {
                campaign_id,
                field_type,
                final_text,
                embedding,
                ..
            } => {
                let next_seq: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(campaign_seq), 0) + 1 FROM memory_entries \
                     WHERE kind = 'decision' AND campaign_id = ?",
                )
                .bind(&campaign_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(storage)?;

                MemoryRecord::Decision {
                    campaign_id,
                    field_type,
                    final_text,
                    campaign_seq: next_seq,
                    embedding,
                }
            }
            other => other,
        };

        let (campaign_id, field_type, campaign_seq) = match &record {
            MemoryRecord::Decision {
                campaign_id,
                field_type,
                campaign_seq,
                ..
            } => (
                Some(campaign_id.clone()),
                Some(field_type.as_str().to_string()),
                Some(*campaign_seq),
            ),
            _ => (None, None, None),
        };

        let body = serde_json::to_string(&record).map_err(storage)?;

        let result = sqlx::query(
            "INSERT INTO memory_entries (kind, campaign_id, field_type, campaign_seq, body, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.kind().as_str())
        .bind(&campaign_id)
        .bind(&field_type)
        .bind(campaign_seq)
        .bind(&body)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        let id = result.last_insert_rowid();
        debug!("Appended {} entry {}", record.kind().as_str(), id);

        Ok(MemoryEntry {
            id,
            record,
            superseded_by: None,
            created_at: now,
        })
    }

    /// Fetch a single entry by id
    pub async fn get(&self, entry_id: i64) -> Result<Option<MemoryEntry>, EngineError> {
        let row = sqlx::query(
            "SELECT id, body, superseded_by, created_at FROM memory_entries WHERE id = ?",
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(decode_row).transpose()
    }

    /// Look up entries of a kind matching a predicate, in commit order
    pub async fn lookup<F>(&self, kind: EntryKind, predicate: F) -> Result<Vec<MemoryEntry>, EngineError>
    where
        F: Fn(&MemoryEntry) -> bool,
    {
        let rows = sqlx::query(
            "SELECT id, body, superseded_by, created_at FROM memory_entries \
             WHERE kind = ? ORDER BY id ASC",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut entries = Vec::new();
        for row in rows {
            let entry = decode_row(row)?;
            if predicate(&entry) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Replace a mutable-kind entry, keeping the old version auditable
    ///
    /// The new record must be of the same kind as the entry it supersedes.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if `entry_id` does not exist
    /// - `ImmutableEntry` if the target is a DecisionRecord
    /// - `Conflict` if the target was already superseded (stale write);
    ///   the caller should re-lookup and retry
    pub async fn supersede(
        &self,
        entry_id: i64,
        new_record: MemoryRecord,
    ) -> Result<MemoryEntry, EngineError> {
        let _guard = self.append_lock.lock().await;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row = sqlx::query("SELECT kind, superseded_by FROM memory_entries WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?;

        let row = row.ok_or(EngineError::EntryNotFound(entry_id))?;
        let kind_str: String = row.get("kind");
        let kind = EntryKind::parse(&kind_str)
            .ok_or_else(|| EngineError::Storage(format!("Unknown entry kind: {}", kind_str)))?;

        if !kind.is_mutable() {
            return Err(EngineError::ImmutableEntry { entry_id });
        }
        if row.get::<Option<i64>, _>("superseded_by").is_some() {
            return Err(EngineError::Conflict { entry_id });
        }
        if new_record.kind() != kind {
            return Err(EngineError::Configuration(format!(
                "Cannot supersede a {} entry with a {} record",
                kind.as_str(),
                new_record.kind().as_str()
            )));
        }

        let body = serde_json::to_string(&new_record).map_err(storage)?;
        let result = sqlx::query(
            "INSERT INTO memory_entries (kind, body, created_at) VALUES (?, ?, ?)",
        )
        .bind(new_record.kind().as_str())
        .bind(&body)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;
        let new_id = result.last_insert_rowid();

        let updated = sqlx::query(
            "UPDATE memory_entries SET superseded_by = ? WHERE id = ? AND superseded_by IS NULL",
        )
        .bind(new_id)
        .bind(entry_id)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        if updated.rows_affected() == 0 {
            // Stale write slipped past the earlier check.
            return Err(EngineError::Conflict { entry_id });
        }

        tx.commit().await.map_err(storage)?;

        debug!("Superseded entry {} with {}", entry_id, new_id);

        Ok(MemoryEntry {
            id: new_id,
            record: new_record,
            superseded_by: None,
            created_at: now,
        })
    }

    /// Read a consistent snapshot of the whole store
    ///
    /// The snapshot is what validation runs against: a read started before a
    /// concurrent append is not required to see it, but will never see a
    /// partial entry.
    pub async fn snapshot(&self) -> Result<MemorySnapshot, EngineError> {
        let rows = sqlx::query(
            "SELECT id, body, superseded_by, created_at FROM memory_entries ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let entries = rows
            .into_iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MemorySnapshot { entries })
    }

    /// Flush the WAL to disk
    ///
    /// Call during graceful shutdown to ensure all pending writes are
    /// persisted to the database file.
    pub async fn flush_wal(&self) -> Result<(), EngineError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    /// Close the store, flushing the WAL first
    pub async fn close(self) -> Result<(), EngineError> {
        info!("Closing memory store");
        self.flush_wal().await?;
        self.pool.close().await;
        Ok(())
    }
}

fn decode_row(row: sqlx::sqlite::SqliteRow) -> Result<MemoryEntry, EngineError> {
    let body: String = row.get("body");
    let record: MemoryRecord = serde_json::from_str(&body)
        .map_err(|e| EngineError::Storage(format!("Corrupt entry body: {}", e)))?;
    Ok(MemoryEntry {
        id: row.get("id"),
        record,
        superseded_by: row.get("superseded_by"),
        created_at: row.get("created_at"),
    })
}

/// A point-in-time, read-only view of the store
///
/// Handed to the collision detector and the prompt assembly; neither ever
/// writes back.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    pub entries: Vec<MemoryEntry>,
}

impl MemorySnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decision entries for a field, in commit order
    pub fn decisions(&self, field: FieldType) -> Vec<&MemoryEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                matches!(
                    &entry.record,
                    MemoryRecord::Decision { field_type, .. } if *field_type == field
                )
            })
            .collect()
    }

    /// Active banned phrases as (entry id, pattern) pairs
    pub fn active_banned_phrases(&self) -> Vec<(i64, &str)> {
        self.entries
            .iter()
            .filter(|entry| entry.is_active())
            .filter_map(|entry| match &entry.record {
                MemoryRecord::BannedPhrase { pattern, .. } => Some((entry.id, pattern.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Active glossary terms as (term, canonical form) pairs
    pub fn active_glossary(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|entry| entry.is_active())
            .filter_map(|entry| match &entry.record {
                MemoryRecord::Glossary {
                    term,
                    canonical_form,
                    ..
                } => Some((term.clone(), canonical_form.clone())),
                _ => None,
            })
            .collect()
    }

    /// Active approved claims that have not expired as of `now`
    pub fn active_claims(&self, now: i64) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.is_active())
            .filter_map(|entry| match &entry.record {
                MemoryRecord::ApprovedClaim {
                    claim_text,
                    expires_at,
                } => match expires_at {
                    Some(expiry) if *expiry <= now => None,
                    _ => Some(claim_text.clone()),
                },
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, MemoryStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = MemoryStore::new(&temp_dir.path().join("memory.db"))
            .await
            .unwrap();
        (temp_dir, store)
    }

    fn decision(campaign: &str, text: &str) -> MemoryRecord {
        MemoryRecord::Decision {
            campaign_id: campaign.to_string(),
            field_type: FieldType::Subject,
            final_text: text.to_string(),
            campaign_seq: 0,
            embedding: None,
        }
    }

    #[tokio::test]
    async fn test_append_assigns_campaign_seq() {
        let (_dir, store) = open_store().await;

        let first = store.append(decision("c1", "Subject one")).await.unwrap();
        let second = store.append(decision("c1", "Subject two")).await.unwrap();
        let other = store.append(decision("c2", "Other campaign")).await.unwrap();

        let seq = |entry: &MemoryEntry| match &entry.record {
            MemoryRecord::Decision { campaign_seq, .. } => *campaign_seq,
            _ => panic!("not a decision"),
        };

        assert_eq!(seq(&first), 1);
        assert_eq!(seq(&second), 2);
        // Sequences are per campaign
        assert_eq!(seq(&other), 1);
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_round_trip_via_snapshot() {
        let (_dir, store) = open_store().await;

        let committed = store
            .append(MemoryRecord::BannedPhrase {
                pattern: "limited time".to_string(),
                reason: "overused urgency".to_string(),
            })
            .await
            .unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries[0].id, committed.id);
        assert_eq!(snapshot.entries[0].record, committed.record);
        assert!(snapshot.entries[0].is_active());
    }

    #[tokio::test]
    async fn test_lookup_with_predicate() {
        let (_dir, store) = open_store().await;

        store.append(decision("c1", "One")).await.unwrap();
        store.append(decision("c2", "Two")).await.unwrap();

        let entries = store
            .lookup(EntryKind::Decision, |entry| {
                matches!(&entry.record, MemoryRecord::Decision { campaign_id, .. } if campaign_id == "c2")
            })
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_supersede_keeps_audit_trail() {
        let (_dir, store) = open_store().await;

        let original = store
            .append(MemoryRecord::Glossary {
                term: "e-mail".to_string(),
                canonical_form: "Email".to_string(),
                notes: String::new(),
            })
            .await
            .unwrap();

        let replacement = store
            .supersede(
                original.id,
                MemoryRecord::Glossary {
                    term: "e-mail".to_string(),
                    canonical_form: "email".to_string(),
                    notes: "lowercase".to_string(),
                },
            )
            .await
            .unwrap();

        // The old version is still there, pointing at its replacement.
        let old = store.get(original.id).await.unwrap().unwrap();
        assert_eq!(old.superseded_by, Some(replacement.id));

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.active_glossary().len(), 1);
        assert_eq!(snapshot.active_glossary()[0].1, "email");
    }

    #[tokio::test]
    async fn test_supersede_stale_write_conflicts() {
        let (_dir, store) = open_store().await;

        let original = store
            .append(MemoryRecord::BannedPhrase {
                pattern: "act now".to_string(),
                reason: "urgency".to_string(),
            })
            .await
            .unwrap();

        let newer = MemoryRecord::BannedPhrase {
            pattern: "act fast".to_string(),
            reason: "urgency".to_string(),
        };
        store.supersede(original.id, newer.clone()).await.unwrap();

        // A second supersede against the same entry is a stale write.
        let err = store.supersede(original.id, newer).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict { entry_id } if entry_id == original.id));
    }

    #[tokio::test]
    async fn test_decisions_are_append_only() {
        let (_dir, store) = open_store().await;

        let committed = store.append(decision("c1", "Final subject")).await.unwrap();
        let err = store
            .supersede(committed.id, decision("c1", "Edited subject"))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::ImmutableEntry { .. }));
    }

    #[tokio::test]
    async fn test_supersede_missing_entry() {
        let (_dir, store) = open_store().await;
        let err = store
            .supersede(
                99,
                MemoryRecord::Glossary {
                    term: "x".to_string(),
                    canonical_form: "y".to_string(),
                    notes: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EntryNotFound(99)));
    }

    #[tokio::test]
    async fn test_snapshot_claim_expiry() {
        let (_dir, store) = open_store().await;

        store
            .append(MemoryRecord::ApprovedClaim {
                claim_text: "evergreen claim".to_string(),
                expires_at: None,
            })
            .await
            .unwrap();
        store
            .append(MemoryRecord::ApprovedClaim {
                claim_text: "expired claim".to_string(),
                expires_at: Some(1_000),
            })
            .await
            .unwrap();

        let snapshot = store.snapshot().await.unwrap();
        let claims = snapshot.active_claims(2_000);
        assert_eq!(claims, vec!["evergreen claim".to_string()]);
        // Expired entries remain in the store for audit.
        assert_eq!(snapshot.len(), 2);
    }
}
