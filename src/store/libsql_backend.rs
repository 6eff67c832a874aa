//! libSQL backend: async `HistoryStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::pipeline::types::ConversationTurn;
use crate::store::migrations;
use crate::store::traits::{HistoryStore, TurnRecord};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "History database opened");
        Ok(backend)
    }

    /// Create an in-memory database (tests, or when the file cannot be opened).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl HistoryStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn append_turn(&self, record: &TurnRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO civic_conversations (session_id, user_message, agent_response, need_category, urgency_level, search_performed, search_query, resources_count, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.session_id.as_str(),
                    record.user_message.as_str(),
                    record.agent_response.as_str(),
                    opt_text(record.need_category.map(|c| c.as_str())),
                    record.urgency_level.as_str(),
                    record.search_performed as i64,
                    opt_text(record.search_query.as_deref()),
                    record.resources_count as i64,
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_turn: {e}")))?;

        debug!(session_id = %record.session_id, "Conversation turn saved");
        Ok(())
    }

    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, DatabaseError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut rows = self
            .conn()
            .query(
                "SELECT user_message, agent_response, created_at FROM civic_conversations
                 WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
                params![session_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_turns: {e}")))?;

        let mut exchanges = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_turns row: {e}")))?
        {
            let user_message: String = row.get(0).unwrap_or_default();
            let agent_response: String = row.get(1).unwrap_or_default();
            let created_str: String = row.get(2).unwrap_or_default();
            exchanges.push((user_message, agent_response, parse_datetime(&created_str)));
        }

        // Newest-first from the query; flip to chronological.
        let turns = exchanges
            .into_iter()
            .rev()
            .flat_map(|(user, assistant, at)| {
                [
                    ConversationTurn::user(user, at),
                    ConversationTurn::assistant(assistant, at),
                ]
            })
            .collect();
        Ok(turns)
    }
}
