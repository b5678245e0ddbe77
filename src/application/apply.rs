use std::path::Path;

use thiserror::Error;

use crate::domain::render::render;
use crate::domain::{
    ApplyOptions, ApplyResult, ApplyStage, SnapshotId, StagedPath, UpstreamConfig,
};
use crate::infrastructure::atomic_write::{AtomicWriter, MODE_SHARED};
use crate::infrastructure::audit::AuditEvent;
use crate::infrastructure::gateway::{Command, Gateway};
use crate::infrastructure::lock::ApplyLock;
use crate::infrastructure::paths::PilotPaths;
use crate::infrastructure::self_test::{SelfTestEngine, SelfTestMode};
use crate::infrastructure::snapshots::SnapshotManager;
use crate::infrastructure::upstream_store::UpstreamStore;

/// A failed transition: the stage that failed and why.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApplyError {
    pub stage: ApplyStage,
    pub message: String,
}

impl ApplyError {
    fn new(stage: ApplyStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Use case: move the resolver to a new upstream configuration, or leave it
/// exactly as it was.
pub struct ApplyOrchestrator<'a> {
    gateway: &'a dyn Gateway,
    snapshots: &'a SnapshotManager,
    store: &'a UpstreamStore,
    lock: &'a ApplyLock,
    self_test: &'a SelfTestEngine,
    paths: &'a PilotPaths,
    writer: AtomicWriter,
}

impl<'a> ApplyOrchestrator<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        snapshots: &'a SnapshotManager,
        store: &'a UpstreamStore,
        lock: &'a ApplyLock,
        self_test: &'a SelfTestEngine,
        paths: &'a PilotPaths,
    ) -> Self {
        Self {
            gateway,
            snapshots,
            store,
            lock,
            self_test,
            paths,
            writer: AtomicWriter::new(),
        }
    }

    /// Run one apply. Every outcome, including refusals, is reported through
    /// the returned result and one audit event.
    pub async fn apply(&self, candidate: &UpstreamConfig, options: ApplyOptions) -> ApplyResult {
        let mut result = self.run(candidate, options).await;
        if !options.run_self_test {
            // Opting out reports the self-test as passed on every path.
            result.self_test_passed = true;
            result.self_test_skipped = true;
        }
        AuditEvent::apply(&result).emit();
        result
    }

    async fn run(&self, candidate: &UpstreamConfig, options: ApplyOptions) -> ApplyResult {
        if let Err(e) = candidate.validate() {
            tracing::warn!(error = %e, "Rejected invalid upstream configuration");
            return ApplyResult::rejected(
                ApplyStage::Idle,
                format!("Invalid upstream configuration: {e}"),
            );
        }

        let _guard = match self.lock.try_acquire() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(error = %e, "Apply refused");
                return ApplyResult::rejected(ApplyStage::Idle, e.to_string());
            }
        };

        tracing::info!(mode = %candidate.mode, stage = %ApplyStage::Snapshotting, "Apply started");
        let snapshot = match self.snapshots.create() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Snapshot failed; nothing was changed");
                return ApplyResult::rejected(
                    ApplyStage::Snapshotting,
                    format!("Snapshot failed: {e}"),
                );
            }
        };

        let mut result = ApplyResult {
            snapshot_id: Some(snapshot.id.clone()),
            ..ApplyResult::default()
        };

        let staged = self.paths.staged_resolver_config();
        let outcome = self.mutate(candidate, options, &staged, &mut result).await;

        if let Err(e) = self.writer.remove(&staged) {
            tracing::warn!(error = %e, "Failed to remove staged config");
        }

        match outcome {
            Ok(()) => {
                result.success = true;
                tracing::info!(snapshot_id = %snapshot.id, stage = %ApplyStage::Committed, "Apply committed");
            }
            Err(failure) => {
                tracing::warn!(
                    stage = %failure.stage,
                    error = %failure.message,
                    "Apply failed, rolling back"
                );
                result.failed_stage = Some(failure.stage);
                self.roll_back(&snapshot.id, failure.message, &mut result)
                    .await;
            }
        }
        result
    }

    /// Transitions Rendering through SelfTesting. Flags on `result` are set
    /// as each stage passes.
    async fn mutate(
        &self,
        candidate: &UpstreamConfig,
        options: ApplyOptions,
        staged: &Path,
        result: &mut ApplyResult,
    ) -> Result<(), ApplyError> {
        tracing::debug!(stage = %ApplyStage::Rendering, "Rendering resolver config");
        let text = render(candidate, &self.paths.ca_bundle);

        tracing::debug!(stage = %ApplyStage::Writing, path = %staged.display(), "Staging candidate config");
        self.writer
            .write(staged, text.as_bytes(), MODE_SHARED)
            .map_err(|e| ApplyError::new(ApplyStage::Writing, format!("Staging failed: {e}")))?;

        tracing::debug!(stage = %ApplyStage::Validating, "Validating staged config");
        let staged_path = StagedPath::new(staged, &self.paths.staging_dir)
            .map_err(|e| ApplyError::new(ApplyStage::Validating, e.to_string()))?;
        self.gateway
            .execute(&Command::CheckConfigFile(staged_path))
            .await
            .map_err(|e| {
                ApplyError::new(ApplyStage::Validating, format!("Validation failed: {e}"))
            })?;
        result.validation_passed = true;

        tracing::debug!(stage = %ApplyStage::Writing, "Writing live config");
        self.writer
            .write(&self.paths.resolver_config, text.as_bytes(), MODE_SHARED)
            .map_err(|e| ApplyError::new(ApplyStage::Writing, format!("Write failed: {e}")))?;
        self.store.save(candidate).map_err(|e| {
            ApplyError::new(
                ApplyStage::Writing,
                format!("Persisting upstream configuration failed: {e}"),
            )
        })?;

        tracing::debug!(stage = %ApplyStage::Reloading, "Reloading resolver");
        self.gateway
            .execute(&Command::Reload)
            .await
            .map_err(|e| ApplyError::new(ApplyStage::Reloading, format!("Reload failed: {e}")))?;
        result.reload_passed = true;

        if !options.run_self_test {
            return Ok(());
        }

        tracing::debug!(stage = %ApplyStage::SelfTesting, "Running quick self-test");
        let report = self.self_test.run(candidate, SelfTestMode::Quick).await;
        if let Some(step) = report.first_failure() {
            let reason = step.error.as_deref().unwrap_or(&step.details);
            return Err(ApplyError::new(
                ApplyStage::SelfTesting,
                format!("Self-test failed at {}: {reason}", step.name),
            ));
        }
        result.self_test_passed = true;
        Ok(())
    }

    /// Restore the snapshot's files, then reload again. On failure the
    /// error keeps both the original and the rollback message.
    async fn roll_back(&self, id: &SnapshotId, original: String, result: &mut ApplyResult) {
        tracing::info!(snapshot_id = %id, stage = %ApplyStage::RollingBack, "Rolling back");

        let rollback = match self.snapshots.restore_files(id) {
            Ok(_) => self
                .gateway
                .execute(&Command::Reload)
                .await
                .map_err(|e| format!("reload after restore failed: {e}")),
            Err(e) => Err(format!("restore failed: {e}")),
        };

        match rollback {
            Ok(_) => {
                result.rolled_back = true;
                result.error = Some(original);
                tracing::info!(snapshot_id = %id, stage = %ApplyStage::RolledBack, "Rolled back");
            }
            Err(rollback_error) => {
                result.rolled_back = false;
                result.error = Some(format!("{original}; rollback failed: {rollback_error}"));
                tracing::error!(
                    snapshot_id = %id,
                    stage = %ApplyStage::RollbackFailed,
                    error = %rollback_error,
                    "Rollback failed; resolver state is unknown"
                );
            }
        }
    }
}
