use std::fmt;

use serde::Serialize;

use super::value_objects::SnapshotId;

/// Orchestrator states. `failed_stage` in [`ApplyResult`] names the state
/// whose transition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStage {
    Idle,
    Snapshotting,
    Rendering,
    Validating,
    Writing,
    Reloading,
    SelfTesting,
    Committed,
    RollingBack,
    RolledBack,
    RollbackFailed,
}

impl fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Snapshotting => "snapshotting",
            Self::Rendering => "rendering",
            Self::Validating => "validating",
            Self::Writing => "writing",
            Self::Reloading => "reloading",
            Self::SelfTesting => "self_testing",
            Self::Committed => "committed",
            Self::RollingBack => "rolling_back",
            Self::RolledBack => "rolled_back",
            Self::RollbackFailed => "rollback_failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    pub run_self_test: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            run_self_test: true,
        }
    }
}

/// Outcome of one apply invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub success: bool,
    pub snapshot_id: Option<SnapshotId>,
    pub validation_passed: bool,
    pub reload_passed: bool,
    /// True when the self-test passed or was skipped on request.
    pub self_test_passed: bool,
    pub self_test_skipped: bool,
    pub rolled_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<ApplyStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyResult {
    /// A request refused before any state was touched.
    pub fn rejected(stage: ApplyStage, error: impl Into<String>) -> Self {
        Self {
            failed_stage: Some(stage),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Terminal state reached by this result.
    pub fn terminal_stage(&self) -> ApplyStage {
        if self.success {
            ApplyStage::Committed
        } else if self.rolled_back {
            ApplyStage::RolledBack
        } else if self.snapshot_id.is_some() {
            ApplyStage::RollbackFailed
        } else {
            ApplyStage::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_result_shape() {
        let result = ApplyResult::rejected(ApplyStage::Snapshotting, "disk full");
        assert!(!result.success);
        assert!(!result.rolled_back);
        assert_eq!(result.snapshot_id, None);
        assert_eq!(result.terminal_stage(), ApplyStage::Idle);
    }

    #[test]
    fn test_serializes_camel_case() {
        let result = ApplyResult::rejected(ApplyStage::Validating, "bad");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failedStage"], "validating");
        assert_eq!(json["rolledBack"], false);
        assert!(json.get("selfTestPassed").is_some());
    }
}
