use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ACTION_MODEL_LOADED: &str = "model_loaded";
pub const ACTION_PREDICTION_SUCCESS: &str = "prediction_success";
pub const ACTION_PREDICTION_ERROR: &str = "prediction_error";

/// One append-only audit record of model access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub actor: String,
    pub subject: String,
    pub action: String,
}

impl AuditEntry {
    pub fn new(actor: &str, subject: &str, action: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            actor: actor.to_string(),
            subject: subject.to_string(),
            action: action.into(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn submit(&self, entry: AuditEntry);
}

/// Writes audit entries as JSON through `tracing` on the `audit` target.
pub struct TracingSink;

impl TracingSink {
    pub fn shared() -> Arc<dyn AuditSink> {
        Arc::new(TracingSink)
    }
}

impl AuditSink for TracingSink {
    fn submit(&self, entry: AuditEntry) {
        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "audit", "Model Access: {}", json),
            Err(_) => info!(
                target: "audit",
                actor = %entry.actor,
                subject = %entry.subject,
                action = %entry.action,
                "Model Access"
            ),
        }
    }
}

/// Keeps entries in memory; used by tests and local tooling.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.action.clone()).collect()
    }
}

impl AuditSink for MemorySink {
    fn submit(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}
