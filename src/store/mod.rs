//! Persistence layer: libSQL-backed conversation history.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{HistoryStore, TurnRecord};
