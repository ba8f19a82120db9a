use chrono::{DateTime, Utc};
use monthgate_core::{Reconciler, ReconciliationReport, RunGuard};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What started a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Process start, to catch up on a boundary missed while down.
    Startup,
    /// A calendar-month boundary.
    Scheduled,
    /// An authorized operator request.
    Manual,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent finished run, kept in memory only.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub trigger: Trigger,
    pub finished_at: DateTime<Utc>,
    /// `completed` when the run reached the write phase, `aborted` otherwise.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReconciliationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared application state passed to all route handlers and the scheduler.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    pub guard: RunGuard,
    pub last_run: Arc<RwLock<Option<RunRecord>>>,
    /// Bearer token required on `/api/*`. `None` locks the API.
    pub api_token: Option<String>,
}

impl AppState {
    pub fn new(reconciler: Reconciler, api_token: Option<String>) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            guard: RunGuard::new(),
            last_run: Arc::new(RwLock::new(None)),
            api_token: api_token.filter(|t| !t.trim().is_empty()),
        }
    }
}
