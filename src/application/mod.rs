pub mod apply;
pub mod rollback;
pub mod service_control;

use std::sync::Arc;

use crate::infrastructure::config::Settings;
use crate::infrastructure::gateway::{Gateway, ProcessGateway};
use crate::infrastructure::lock::ApplyLock;
use crate::infrastructure::paths::PilotPaths;
use crate::infrastructure::self_test::SelfTestEngine;
use crate::infrastructure::snapshots::{LiveFiles, SnapshotManager};
use crate::infrastructure::upstream_store::UpstreamStore;

use apply::ApplyOrchestrator;
use rollback::Rollback;
use service_control::ServiceControl;

/// Everything a command needs, built once at startup and passed down.
pub struct Pilot {
    settings: Settings,
    paths: PilotPaths,
    gateway: Arc<dyn Gateway>,
    store: UpstreamStore,
    snapshots: SnapshotManager,
    lock: ApplyLock,
    self_test: SelfTestEngine,
}

impl Pilot {
    /// Production wiring: commands run as real processes.
    pub fn new(settings: Settings) -> Self {
        let gateway = Arc::new(ProcessGateway::new(
            settings.programs.clone(),
            settings.paths.staging_dir.clone(),
        ));
        Self::with_gateway(settings, gateway)
    }

    pub fn with_gateway(settings: Settings, gateway: Arc<dyn Gateway>) -> Self {
        let paths = settings.paths();
        let store = UpstreamStore::new(paths.upstream_config.clone());
        let snapshots = SnapshotManager::new(
            paths.snapshot_dir.clone(),
            LiveFiles {
                resolver_config: paths.resolver_config.clone(),
                upstream_config: paths.upstream_config.clone(),
            },
            settings.snapshots.retention,
        );
        let lock = ApplyLock::new(paths.lock_file.clone());
        let self_test = SelfTestEngine::new(
            gateway.clone(),
            settings.self_test.clone(),
            paths.ca_bundle.clone(),
        );

        Self {
            settings,
            paths,
            gateway,
            store,
            snapshots,
            lock,
            self_test,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn paths(&self) -> &PilotPaths {
        &self.paths
    }

    pub fn gateway(&self) -> &dyn Gateway {
        self.gateway.as_ref()
    }

    pub fn store(&self) -> &UpstreamStore {
        &self.store
    }

    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    pub fn lock(&self) -> &ApplyLock {
        &self.lock
    }

    pub fn self_test(&self) -> &SelfTestEngine {
        &self.self_test
    }

    pub fn orchestrator(&self) -> ApplyOrchestrator<'_> {
        ApplyOrchestrator::new(
            self.gateway(),
            &self.snapshots,
            &self.store,
            &self.lock,
            &self.self_test,
            &self.paths,
        )
    }

    pub fn rollback(&self) -> Rollback<'_> {
        Rollback::new(self.gateway(), &self.snapshots, &self.lock)
    }

    pub fn service_control(&self) -> ServiceControl<'_> {
        ServiceControl::new(self.gateway())
    }
}
