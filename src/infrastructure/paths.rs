use std::path::PathBuf;

/// All resolved filesystem locations needed by dnspilot components.
/// Loaded once from settings, then passed to components via DI.
#[derive(Debug, Clone)]
pub struct PilotPaths {
    /// Rendered resolver include file.
    pub resolver_config: PathBuf,
    /// Structured upstream configuration (JSON).
    pub upstream_config: PathBuf,
    pub snapshot_dir: PathBuf,
    /// The only directory the gateway accepts file arguments from.
    pub staging_dir: PathBuf,
    pub lock_file: PathBuf,
    pub ca_bundle: PathBuf,
}

impl PilotPaths {
    /// Staged candidate for the resolver config.
    pub fn staged_resolver_config(&self) -> PathBuf {
        let name = self
            .resolver_config
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("resolver.conf");
        self.staging_dir.join(format!("{name}.staged"))
    }

    /// Rooted under a single directory, for tests and unprivileged runs.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            resolver_config: root.join("unbound").join("dnspilot-upstream.conf"),
            upstream_config: root.join("state").join("upstream.json"),
            snapshot_dir: root.join("state").join("snapshots"),
            staging_dir: root.join("state").join("staging"),
            lock_file: root.join("run").join("apply.lock"),
            ca_bundle: PathBuf::from(crate::domain::render::TLS_CERT_BUNDLE),
        }
    }
}
