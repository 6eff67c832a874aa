//! Context initializer: loads recent history for the session.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::pipeline::types::SessionState;
use crate::store::HistoryStore;

/// Loads prior turns into a fresh session state.
pub struct ContextInitializer {
    store: Option<Arc<dyn HistoryStore>>,
    history_limit: usize,
    timeout: Duration,
}

impl ContextInitializer {
    pub fn new(store: Option<Arc<dyn HistoryStore>>, history_limit: usize, timeout: Duration) -> Self {
        Self {
            store,
            history_limit,
            timeout,
        }
    }

    /// Fill `conversation_history`. A store error or timeout leaves it empty.
    pub async fn initialize(&self, state: &mut SessionState) {
        let Some(store) = &self.store else {
            return;
        };

        let lookup = store.recent_turns(&state.session_id, self.history_limit);
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(turns)) => {
                debug!(
                    session_id = %state.session_id,
                    turns = turns.len(),
                    "Loaded conversation history"
                );
                state.conversation_history = turns;
            }
            Ok(Err(e)) => {
                warn!(session_id = %state.session_id, error = %e, "History lookup failed, starting fresh");
            }
            Err(_) => {
                warn!(
                    session_id = %state.session_id,
                    timeout = ?self.timeout,
                    "History lookup timed out, starting fresh"
                );
            }
        }
    }
}
