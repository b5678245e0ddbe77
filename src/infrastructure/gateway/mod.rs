//! Command execution gateway: the only code path that starts processes.
//!
//! Callers pick a [`Command`] variant; the variant's typed parameters were
//! validated when it was built, and the argument vector comes from a fixed
//! [`CommandSpec`] template. No shell is ever involved.

mod catalogue;
mod process;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{DomainName, ServiceName, StagedPath};

pub use catalogue::{CATALOGUE, find_spec};
pub use process::{ProcessGateway, RunError, RunOutput, run_with_timeout};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Failed to execute {command}: {reason}")]
    ExecutionFailed {
        command: &'static str,
        reason: String,
    },

    #[error("{command} exited with code {}: {}", result.exit_code, result.stderr_or_stdout())]
    NonZeroExit {
        command: &'static str,
        result: ExecutionResult,
    },
}

impl GatewayError {
    /// Output of the failed process, when it ran at all.
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            Self::NonZeroExit { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Program slots. The binary behind each slot is resolved from settings at
/// startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    UnboundCheckconf,
    UnboundControl,
    Systemctl,
}

/// Named holes in an argument template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Path,
    Service,
    Zone,
}

impl Placeholder {
    /// Key in the caller's parameter map.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Path => "PATH",
            Self::Service => "SERVICE",
            Self::Zone => "ZONE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Lit(&'static str),
    Param(Placeholder),
}

/// Immutable catalogue entry.
#[derive(Debug)]
pub struct CommandSpec {
    pub id: &'static str,
    pub program: Program,
    pub args: &'static [Arg],
    pub timeout: Duration,
    /// Exit status is itself the answer (status probes).
    pub allow_non_zero_exit: bool,
}

impl CommandSpec {
    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Param(p) => Some(*p),
            Arg::Lit(_) => None,
        })
    }
}

/// Every command the gateway can run, with validated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CheckConfig,
    CheckConfigFile(StagedPath),
    Reload,
    ResolverStatus,
    Stats,
    FlushZone(DomainName),
    FlushInfra,
    ServiceStatus(ServiceName),
    RestartService(ServiceName),
}

impl Command {
    pub fn id(&self) -> &'static str {
        self.spec().id
    }

    pub fn spec(&self) -> &'static CommandSpec {
        let index = match self {
            Self::CheckConfig => 0,
            Self::CheckConfigFile(_) => 1,
            Self::Reload => 2,
            Self::ResolverStatus => 3,
            Self::Stats => 4,
            Self::FlushZone(_) => 5,
            Self::FlushInfra => 6,
            Self::ServiceStatus(_) => 7,
            Self::RestartService(_) => 8,
        };
        &CATALOGUE[index]
    }

    fn param(&self, placeholder: Placeholder) -> Option<String> {
        match (self, placeholder) {
            (Self::CheckConfigFile(path), Placeholder::Path) => {
                Some(path.as_path().display().to_string())
            }
            (Self::FlushZone(zone), Placeholder::Zone) => Some(zone.as_str().to_string()),
            (Self::ServiceStatus(svc) | Self::RestartService(svc), Placeholder::Service) => {
                Some(svc.as_str().to_string())
            }
            _ => None,
        }
    }

    /// Argument vector after the program name.
    pub fn argv(&self) -> Vec<String> {
        self.spec()
            .args
            .iter()
            .map(|arg| match arg {
                Arg::Lit(s) => (*s).to_string(),
                Arg::Param(p) => self.param(*p).unwrap_or_default(),
            })
            .collect()
    }

    /// Build a command from a symbolic id and a flat parameter map.
    ///
    /// Every placeholder in the template must be present and pass its
    /// validator; unexpected keys are rejected too.
    pub fn from_request(
        id: &str,
        params: &HashMap<String, String>,
        staging_dir: &Path,
    ) -> Result<Self, GatewayError> {
        let spec = find_spec(id).ok_or_else(|| GatewayError::UnknownCommand(id.to_string()))?;

        let expected: Vec<&str> = spec.placeholders().map(|p| p.key()).collect();
        if let Some(extra) = params.keys().find(|k| !expected.contains(&k.as_str())) {
            return Err(invalid(extra, format!("not accepted by {id}")));
        }

        let get = |p: Placeholder| {
            params
                .get(p.key())
                .map(String::as_str)
                .ok_or_else(|| invalid(p.key(), "missing"))
        };
        let service = |p: Placeholder| -> Result<ServiceName, GatewayError> {
            get(p)?.parse().map_err(|e| invalid(p.key(), e))
        };

        let command = match id {
            "check_config" => Self::CheckConfig,
            "check_config_file" => Self::CheckConfigFile(
                StagedPath::new(get(Placeholder::Path)?, staging_dir)
                    .map_err(|e| invalid(Placeholder::Path.key(), e))?,
            ),
            "reload" => Self::Reload,
            "resolver_status" => Self::ResolverStatus,
            "stats" => Self::Stats,
            "flush_zone" => Self::FlushZone(
                DomainName::new(get(Placeholder::Zone)?)
                    .map_err(|e| invalid(Placeholder::Zone.key(), e))?,
            ),
            "flush_infra" => Self::FlushInfra,
            "service_status" => Self::ServiceStatus(service(Placeholder::Service)?),
            "restart_service" => Self::RestartService(service(Placeholder::Service)?),
            other => return Err(GatewayError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

fn invalid(name: &str, reason: impl fmt::Display) -> GatewayError {
    GatewayError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Output of one process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// -1 when the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Most useful diagnostic text: stderr, falling back to stdout.
    pub fn stderr_or_stdout(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn execute(&self, command: &Command) -> Result<ExecutionResult, GatewayError>;
}
