//! Per-run event recording and stage timing.
//!
//! Each pipeline run owns one `PipelineEvents`. Collaborator calls are recorded
//! as `ToolEvent`s and, when a progress channel is attached, forwarded as
//! human-readable lines for streaming clients.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Lifecycle of a collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolEventKind {
    Started,
    Finished,
    Error,
}

/// One collaborator call event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolEvent {
    pub kind: ToolEventKind,
    pub tool: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Event sink scoped to a single pipeline run.
#[derive(Clone, Default)]
pub struct PipelineEvents {
    events: Arc<Mutex<Vec<ToolEvent>>>,
    progress: Option<mpsc::UnboundedSender<String>>,
}

impl PipelineEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward progress lines to `tx` as well as recording them.
    pub fn with_progress(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            events: Arc::default(),
            progress: Some(tx),
        }
    }

    /// Send a progress line to the attached client, if any.
    pub fn progress(&self, line: impl Into<String>) {
        if let Some(tx) = &self.progress {
            // Receiver gone means the client disconnected.
            let _ = tx.send(line.into());
        }
    }

    pub fn tool_started(&self, tool: &str, message: impl Into<String>) {
        let message = message.into();
        self.progress(format!("🔧 {tool}: {message}"));
        self.record(ToolEventKind::Started, tool, message);
    }

    pub fn tool_finished(&self, tool: &str, message: impl Into<String>) {
        let message = message.into();
        self.progress(format!("✅ {tool}: {message}"));
        self.record(ToolEventKind::Finished, tool, message);
    }

    pub fn tool_error(&self, tool: &str, message: impl Into<String>) {
        let message = message.into();
        self.progress(format!("⚠️ {tool}: {message}"));
        self.record(ToolEventKind::Error, tool, message);
    }

    /// Snapshot of recorded events, in order.
    pub fn snapshot(&self) -> Vec<ToolEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, kind: ToolEventKind, tool: &str, message: String) {
        debug!(tool, ?kind, %message, "Tool event");
        let event = ToolEvent {
            kind,
            tool: tool.to_string(),
            message,
            timestamp: Utc::now(),
        };
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Wall-clock timer for pipeline stages.
pub struct StepTimer {
    started: Instant,
    current: Option<(&'static str, Instant)>,
    timings: BTreeMap<String, u64>,
}

impl StepTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            current: None,
            timings: BTreeMap::new(),
        }
    }

    /// Close the running step (if any) and open `name`.
    pub fn step(&mut self, name: &'static str) {
        self.close_current();
        self.current = Some((name, Instant::now()));
    }

    /// Close the last step and return `(total_ms, per-step ms)`.
    pub fn finish(mut self, session_id: &str) -> (u64, BTreeMap<String, u64>) {
        self.close_current();
        let total = self.started.elapsed().as_millis() as u64;
        let breakdown = self
            .timings
            .iter()
            .map(|(name, ms)| format!("{name}={ms}ms"))
            .collect::<Vec<_>>()
            .join(" ");
        info!(session_id, total_ms = total, steps = %breakdown, "Pipeline timing");
        (total, self.timings)
    }

    fn close_current(&mut self) {
        if let Some((name, started)) = self.current.take() {
            *self.timings.entry(name.to_string()).or_default() +=
                started.elapsed().as_millis() as u64;
        }
    }
}
