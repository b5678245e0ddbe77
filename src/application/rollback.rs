use anyhow::{Context, Result};

use crate::domain::{Snapshot, SnapshotId};
use crate::infrastructure::audit::AuditEvent;
use crate::infrastructure::gateway::Gateway;
use crate::infrastructure::lock::ApplyLock;
use crate::infrastructure::snapshots::SnapshotManager;

/// Use case: operator-requested return to an earlier snapshot.
pub struct Rollback<'a> {
    gateway: &'a dyn Gateway,
    snapshots: &'a SnapshotManager,
    lock: &'a ApplyLock,
}

impl<'a> Rollback<'a> {
    pub fn new(gateway: &'a dyn Gateway, snapshots: &'a SnapshotManager, lock: &'a ApplyLock) -> Self {
        Self {
            gateway,
            snapshots,
            lock,
        }
    }

    /// Restore `id` and reload. Holds the apply lock so it cannot interleave
    /// with an apply.
    pub async fn execute(&self, id: &SnapshotId) -> Result<Snapshot> {
        let _guard = self.lock.try_acquire()?;

        let outcome = self.snapshots.restore(id, self.gateway).await;
        AuditEvent::rollback(id, outcome.as_ref().err().map(|e| e.to_string())).emit();

        outcome.with_context(|| format!("Rollback to snapshot {id} failed"))
    }
}
