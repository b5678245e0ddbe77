//! Audit trail. One event per terminal outcome of a mutating operation,
//! emitted under the `audit` target. Nothing is persisted here; the log
//! subscriber decides where events go.

use crate::domain::{ApplyResult, ApplyStage, SnapshotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub action: &'static str,
    pub outcome: Outcome,
    pub target: Option<String>,
    pub snapshot_id: Option<SnapshotId>,
    pub stage: Option<ApplyStage>,
    pub rolled_back: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn apply(result: &ApplyResult) -> Self {
        Self {
            action: "apply",
            outcome: if result.success {
                Outcome::Success
            } else {
                Outcome::Failure
            },
            target: None,
            snapshot_id: result.snapshot_id.clone(),
            stage: Some(result.terminal_stage()),
            rolled_back: result.rolled_back,
            error: result.error.clone(),
        }
    }

    pub fn rollback(snapshot_id: &SnapshotId, error: Option<String>) -> Self {
        Self {
            action: "rollback",
            outcome: if error.is_none() {
                Outcome::Success
            } else {
                Outcome::Failure
            },
            target: None,
            snapshot_id: Some(snapshot_id.clone()),
            stage: None,
            rolled_back: error.is_none(),
            error,
        }
    }

    /// Restart or flush of a named target.
    pub fn service(action: &'static str, target: impl Into<String>, error: Option<String>) -> Self {
        Self {
            action,
            outcome: if error.is_none() {
                Outcome::Success
            } else {
                Outcome::Failure
            },
            target: Some(target.into()),
            snapshot_id: None,
            stage: None,
            rolled_back: false,
            error,
        }
    }

    pub fn emit(&self) {
        let snapshot_id = self.snapshot_id.as_ref().map(SnapshotId::as_str);
        let stage = self.stage.map(|s| s.to_string());
        match self.outcome {
            Outcome::Success => tracing::info!(
                target: "audit",
                action = self.action,
                outcome = self.outcome.as_str(),
                target_name = self.target.as_deref(),
                snapshot_id,
                stage = stage.as_deref(),
                rolled_back = self.rolled_back,
                "{} succeeded",
                self.action
            ),
            Outcome::Failure => tracing::warn!(
                target: "audit",
                action = self.action,
                outcome = self.outcome.as_str(),
                target_name = self.target.as_deref(),
                snapshot_id,
                stage = stage.as_deref(),
                rolled_back = self.rolled_back,
                error = self.error.as_deref(),
                "{} failed",
                self.action
            ),
        }
    }
}
