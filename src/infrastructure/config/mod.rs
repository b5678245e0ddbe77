use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::paths::PilotPaths;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/dnspilot/config.toml";
pub const CONFIG_PATH_ENV: &str = "DNSPILOT_CONFIG";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub resolver_config: PathBuf,
    pub upstream_config: PathBuf,
    pub snapshot_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub lock_file: PathBuf,
    pub ca_bundle: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            resolver_config: "/etc/unbound/unbound.conf.d/dnspilot-upstream.conf".into(),
            upstream_config: "/var/lib/dnspilot/upstream.json".into(),
            snapshot_dir: "/var/lib/dnspilot/snapshots".into(),
            staging_dir: "/var/lib/dnspilot/staging".into(),
            lock_file: "/run/dnspilot/apply.lock".into(),
            ca_bundle: crate::domain::render::TLS_CERT_BUNDLE.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    pub retention: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self { retention: 10 }
    }
}

/// Binaries behind the gateway's program slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramSettings {
    pub unbound_checkconf: PathBuf,
    pub unbound_control: PathBuf,
    pub systemctl: PathBuf,
}

impl Default for ProgramSettings {
    fn default() -> Self {
        Self {
            unbound_checkconf: "unbound-checkconf".into(),
            unbound_control: "unbound-control".into(),
            systemctl: "systemctl".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfTestSettings {
    /// Where the resolver answers queries.
    pub resolver_addr: String,
    /// Name looked up by the resolver probe. Empty disables the probe.
    pub probe_domain: String,
    /// Sampling window for the SERVFAIL delta; 0 uses cumulative counters.
    pub sample_window_ms: u64,
    pub servfail_warn_percent: f64,
    pub servfail_fail_percent: f64,
    pub min_queries: u64,
}

impl Default for SelfTestSettings {
    fn default() -> Self {
        Self {
            resolver_addr: "127.0.0.1:53".into(),
            probe_domain: "example.com".into(),
            sample_window_ms: 0,
            servfail_warn_percent: 5.0,
            servfail_fail_percent: 20.0,
            min_queries: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub snapshots: SnapshotSettings,
    pub programs: ProgramSettings,
    pub self_test: SelfTestSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.snapshots.retention == 0 {
            return Err(SettingsError::Invalid(
                "snapshots.retention must be at least 1".into(),
            ));
        }
        if self.self_test.servfail_warn_percent > self.self_test.servfail_fail_percent {
            return Err(SettingsError::Invalid(
                "self_test.servfail_warn_percent must not exceed servfail_fail_percent".into(),
            ));
        }
        let bundle = self.paths.ca_bundle.to_string_lossy();
        if !self.paths.ca_bundle.is_absolute()
            || bundle.chars().any(|c| c.is_control() || c == '"')
        {
            return Err(SettingsError::Invalid(format!(
                "paths.ca_bundle must be an absolute path without quotes or control characters: {bundle:?}"
            )));
        }
        if self.self_test.resolver_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(SettingsError::Invalid(format!(
                "self_test.resolver_addr is not a socket address: {}",
                self.self_test.resolver_addr
            )));
        }
        Ok(())
    }

    /// Apply `DNSPILOT_*` overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DNSPILOT_RESOLVER_CONFIG") {
            self.paths.resolver_config = v.into();
        }
        if let Some(v) = lookup("DNSPILOT_UPSTREAM_CONFIG") {
            self.paths.upstream_config = v.into();
        }
        if let Some(v) = lookup("DNSPILOT_SNAPSHOT_DIR") {
            self.paths.snapshot_dir = v.into();
        }
        if let Some(v) = lookup("DNSPILOT_STAGING_DIR") {
            self.paths.staging_dir = v.into();
        }
        if let Some(v) = lookup("DNSPILOT_SNAPSHOT_RETENTION") {
            self.snapshots.retention = v.parse().map_err(|_| SettingsError::InvalidEnv {
                name: "DNSPILOT_SNAPSHOT_RETENTION",
                value: v.clone(),
            })?;
        }
        Ok(())
    }

    pub fn paths(&self) -> PilotPaths {
        PilotPaths {
            resolver_config: self.paths.resolver_config.clone(),
            upstream_config: self.paths.upstream_config.clone(),
            snapshot_dir: self.paths.snapshot_dir.clone(),
            staging_dir: self.paths.staging_dir.clone(),
            lock_file: self.paths.lock_file.clone(),
            ca_bundle: self.paths.ca_bundle.clone(),
        }
    }
}

/// Loads settings: defaults, then the TOML file, then the environment.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `explicit` (from `--config`) wins over `DNSPILOT_CONFIG`, which wins
    /// over the default location.
    pub fn locate(explicit: Option<PathBuf>) -> Self {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file means defaults.
    pub fn load_file(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| SettingsError::ReadError {
            path: self.path.clone(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn load(&self) -> Result<Settings, SettingsError> {
        let mut settings = self.load_file()?;
        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }
}
