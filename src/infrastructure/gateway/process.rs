use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as ProcessCommand;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{Command, ExecutionResult, Gateway, GatewayError, Program};
use crate::infrastructure::config::ProgramSettings;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("spawn failed: {0}")]
    Spawn(io::Error),

    #[error("wait failed: {0}")]
    Wait(io::Error),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Raw process output before exit-status policy is applied.
#[derive(Debug)]
pub struct RunOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Run `cmd` with stdin closed and both output streams captured. A child that
/// outlives `limit` is killed and reaped before returning.
pub async fn run_with_timeout(cmd: &mut ProcessCommand, limit: Duration) -> Result<RunOutput, RunError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(RunError::Spawn)?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout(limit, child.wait()).await {
        Ok(result) => result.map_err(RunError::Wait)?,
        Err(_) => {
            let _ = child.kill().await;
            let _ = child.wait().await;
            stdout.abort();
            stderr.abort();
            return Err(RunError::TimedOut(limit));
        }
    };

    Ok(RunOutput {
        status,
        stdout: stdout.await.unwrap_or_default(),
        stderr: stderr.await.unwrap_or_default(),
    })
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

/// Runs catalogue commands as real processes.
#[derive(Debug, Clone)]
pub struct ProcessGateway {
    programs: ProgramSettings,
    staging_dir: PathBuf,
}

impl ProcessGateway {
    pub fn new(programs: ProgramSettings, staging_dir: PathBuf) -> Self {
        Self {
            programs,
            staging_dir,
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    fn program_path(&self, program: Program) -> &Path {
        match program {
            Program::UnboundCheckconf => &self.programs.unbound_checkconf,
            Program::UnboundControl => &self.programs.unbound_control,
            Program::Systemctl => &self.programs.systemctl,
        }
    }

    /// Execute a command given by symbolic id. Parameters are validated
    /// before anything is spawned.
    pub async fn execute_request(
        &self,
        id: &str,
        params: &HashMap<String, String>,
    ) -> Result<ExecutionResult, GatewayError> {
        let command = Command::from_request(id, params, &self.staging_dir)?;
        self.execute(&command).await
    }
}

#[async_trait]
impl Gateway for ProcessGateway {
    async fn execute(&self, command: &Command) -> Result<ExecutionResult, GatewayError> {
        let spec = command.spec();
        let program = self.program_path(spec.program);
        let argv = command.argv();

        tracing::debug!(command = spec.id, program = %program.display(), ?argv, "Executing");

        let mut process = ProcessCommand::new(program);
        process.args(&argv);

        let started = Instant::now();
        let output = run_with_timeout(&mut process, spec.timeout)
            .await
            .map_err(|e| {
                tracing::warn!(command = spec.id, error = %e, "Command did not complete");
                GatewayError::ExecutionFailed {
                    command: spec.id,
                    reason: e.to_string(),
                }
            })?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = ExecutionResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms,
        };

        tracing::debug!(
            command = spec.id,
            exit_code = result.exit_code,
            duration_ms,
            "Command finished"
        );

        if !result.success() && !spec.allow_non_zero_exit {
            return Err(GatewayError::NonZeroExit {
                command: spec.id,
                result,
            });
        }
        Ok(result)
    }
}
