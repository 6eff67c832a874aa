//! `HistoryStore` trait: async interface for conversation persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::pipeline::types::{ConversationTurn, NeedCategory, UrgencyLevel};

/// One completed exchange as persisted.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub session_id: String,
    pub user_message: String,
    pub agent_response: String,
    pub need_category: Option<NeedCategory>,
    pub urgency_level: UrgencyLevel,
    pub search_performed: bool,
    pub search_query: Option<String>,
    pub resources_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic conversation history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Persist one exchange.
    async fn append_turn(&self, record: &TurnRecord) -> Result<(), DatabaseError>;

    /// The last `limit` exchanges for a session, flattened into
    /// chronological user/assistant turns.
    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, DatabaseError>;
}
