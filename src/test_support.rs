//! Test-only helpers: a scripted gateway and a scratch filesystem layout.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::infrastructure::config::Settings;
use crate::infrastructure::gateway::{Command, ExecutionResult, Gateway, GatewayError};
use crate::infrastructure::paths::PilotPaths;

/// Canned outcome for one gateway call.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Exit(i32, String),
    Fail(String),
}

impl Reply {
    fn into_result(self, command: &Command) -> Result<ExecutionResult, GatewayError> {
        let spec = command.spec();
        let (exit_code, stdout, stderr) = match self {
            Reply::Ok(stdout) => (0, stdout, String::new()),
            Reply::Exit(code, stderr) => (code, String::new(), stderr),
            Reply::Fail(reason) => {
                return Err(GatewayError::ExecutionFailed {
                    command: spec.id,
                    reason,
                });
            }
        };
        let result = ExecutionResult {
            exit_code,
            stdout,
            stderr,
            duration_ms: 1,
        };
        if exit_code != 0 && !spec.allow_non_zero_exit {
            return Err(GatewayError::NonZeroExit {
                command: spec.id,
                result,
            });
        }
        Ok(result)
    }
}

/// Records every command and answers from per-id queues. Unscripted calls
/// succeed with empty output.
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<Command>>,
    replies: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
    holds: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `reply` for the next call of command `id`.
    pub fn reply(&self, id: &'static str, reply: Reply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push_back(reply);
        self
    }

    /// Calls of `id` block until the returned handle is notified.
    pub fn hold(&self, id: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.holds.lock().unwrap().insert(id, notify.clone());
        notify
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_ids(&self) -> Vec<&'static str> {
        self.calls().iter().map(Command::id).collect()
    }

    pub fn count(&self, id: &str) -> usize {
        self.call_ids().iter().filter(|c| **c == id).count()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn execute(&self, command: &Command) -> Result<ExecutionResult, GatewayError> {
        self.calls.lock().unwrap().push(command.clone());

        let hold = self.holds.lock().unwrap().get(command.id()).cloned();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(command.id())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::Ok(String::new()));
        reply.into_result(command)
    }
}

/// A tempdir with paths and settings rooted inside it.
pub struct Sandbox {
    pub dir: tempfile::TempDir,
    pub paths: PilotPaths,
    pub settings: Settings,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = PilotPaths::under(dir.path());
        let mut settings = Settings::default();
        settings.paths.resolver_config = paths.resolver_config.clone();
        settings.paths.upstream_config = paths.upstream_config.clone();
        settings.paths.snapshot_dir = paths.snapshot_dir.clone();
        settings.paths.staging_dir = paths.staging_dir.clone();
        settings.paths.lock_file = paths.lock_file.clone();
        settings.self_test.probe_domain = String::new();
        Self {
            dir,
            paths,
            settings,
        }
    }
}

/// `unbound-control stats_noreset` output with the given counters.
pub fn stats_text(queries: u64, servfail: u64) -> String {
    format!(
        "thread0.num.queries={queries}\n\
         total.num.queries={queries}\n\
         total.num.cachehits={}\n\
         num.answer.rcode.NOERROR={}\n\
         num.answer.rcode.SERVFAIL={servfail}\n",
        queries / 2,
        queries.saturating_sub(servfail)
    )
}
