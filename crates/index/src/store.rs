//! Durable storage for the classification index.
//!
//! Pure persistence, no policy: the store loads and saves whole
//! [`IndexState`] snapshots. The orchestrator decides *when* to flush; this
//! module only guarantees that a flush is atomic (one transaction) and that
//! a load reconstructs exactly what was saved.
//!
//! Layout is five logical keys in one key-value table, each value JSON:
//!
//! | key | content |
//! |---|---|
//! | `spatial-ids` | array of confirmed spatial item ids |
//! | `scanned-ids` | array of all ids ever classified |
//! | `spatial-metadata` | map of id to display record |
//! | `hidden-spatial-metadata` | map of id to display record for pruned items |
//! | `last-scan-timestamp` | RFC 3339 datetime (absent until a scan completes) |

use crate::db::Database;
use crate::error::{ErrorKind, Result};
use crate::models::IndexState;
use exn::ResultExt;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const KEY_SPATIAL_IDS: &str = "spatial-ids";
const KEY_SCANNED_IDS: &str = "scanned-ids";
const KEY_SPATIAL_METADATA: &str = "spatial-metadata";
const KEY_HIDDEN_SPATIAL_METADATA: &str = "hidden-spatial-metadata";
const KEY_LAST_SCAN_TIMESTAMP: &str = "last-scan-timestamp";

const UPSERT: &str = "INSERT INTO index_state (key, value) VALUES (?, ?) \
                      ON CONFLICT (key) DO UPDATE SET value = excluded.value";

/// Store for [`IndexState`] snapshots.
#[derive(Debug, Clone)]
pub struct IndexStore {
    pool: SqlitePool,
}

impl From<&Database> for IndexStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl IndexStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the persisted index, or an empty one on first use.
    ///
    /// Unknown keys are ignored so an older build can open a newer database.
    pub async fn load(&self) -> Result<IndexState> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM index_state")
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut state = IndexState::default();
        for (key, value) in rows {
            match key.as_str() {
                KEY_SPATIAL_IDS => {
                    state.spatial =
                        serde_json::from_str(&value).or_raise(|| ErrorKind::InvalidData(KEY_SPATIAL_IDS))?;
                },
                KEY_SCANNED_IDS => {
                    state.scanned =
                        serde_json::from_str(&value).or_raise(|| ErrorKind::InvalidData(KEY_SCANNED_IDS))?;
                },
                KEY_SPATIAL_METADATA => {
                    state.spatial_records =
                        serde_json::from_str(&value).or_raise(|| ErrorKind::InvalidData(KEY_SPATIAL_METADATA))?;
                },
                KEY_HIDDEN_SPATIAL_METADATA => {
                    state.hidden_records = serde_json::from_str(&value)
                        .or_raise(|| ErrorKind::InvalidData(KEY_HIDDEN_SPATIAL_METADATA))?;
                },
                KEY_LAST_SCAN_TIMESTAMP => {
                    state.last_scan = Some(
                        OffsetDateTime::parse(&value, &Rfc3339)
                            .or_raise(|| ErrorKind::InvalidData(KEY_LAST_SCAN_TIMESTAMP))?,
                    );
                },
                other => tracing::debug!(key = other, "ignoring unknown index key"),
            }
        }
        Ok(state)
    }

    /// Persist a snapshot, replacing whatever was stored before.
    ///
    /// All five keys are written in one transaction, so a reader never
    /// observes a half-flushed checkpoint.
    pub async fn save(&self, state: &IndexState) -> Result<()> {
        // Serialize before opening the transaction; a serialization failure
        // must leave the database untouched.
        let spatial = serde_json::to_string(&state.spatial).or_raise(|| ErrorKind::InvalidData(KEY_SPATIAL_IDS))?;
        let scanned = serde_json::to_string(&state.scanned).or_raise(|| ErrorKind::InvalidData(KEY_SCANNED_IDS))?;
        let records =
            serde_json::to_string(&state.spatial_records).or_raise(|| ErrorKind::InvalidData(KEY_SPATIAL_METADATA))?;
        let hidden = serde_json::to_string(&state.hidden_records)
            .or_raise(|| ErrorKind::InvalidData(KEY_HIDDEN_SPATIAL_METADATA))?;

        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for (key, value) in [
            (KEY_SPATIAL_IDS, spatial),
            (KEY_SCANNED_IDS, scanned),
            (KEY_SPATIAL_METADATA, records),
            (KEY_HIDDEN_SPATIAL_METADATA, hidden),
        ] {
            sqlx::query(UPSERT).bind(key).bind(value).execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        }
        match &state.last_scan {
            Some(at) => {
                let formatted = at.format(&Rfc3339).or_raise(|| ErrorKind::InvalidData(KEY_LAST_SCAN_TIMESTAMP))?;
                sqlx::query(UPSERT)
                    .bind(KEY_LAST_SCAN_TIMESTAMP)
                    .bind(formatted)
                    .execute(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
            },
            None => {
                sqlx::query("DELETE FROM index_state WHERE key = ?")
                    .bind(KEY_LAST_SCAN_TIMESTAMP)
                    .execute(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
            },
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)
    }

    /// Drop every persisted key. The next [`load`](Self::load) starts empty.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM index_state").execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
