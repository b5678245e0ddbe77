//! Diagnostic engine. Runs the fixed step sequence and never short-circuits:
//! a failing step is recorded and the next one still runs.

pub mod probes;

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::domain::self_test::{
    CONFIG_VALIDATION, HEALTH_OBSERVATION, RESOLVER_FUNCTIONALITY, UPSTREAM_CONNECTIVITY,
};
use crate::domain::{
    Provider, ResolverStats, SelfTestResult, ServfailRate, ServiceName, TestStep, UpstreamConfig,
    UpstreamMode,
};
use crate::infrastructure::config::SelfTestSettings;
use crate::infrastructure::gateway::{Command, Gateway, GatewayError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfTestMode {
    /// All four steps.
    Full,
    /// Config validation and resolver liveness only. Used mid-apply.
    Quick,
}

pub struct SelfTestEngine {
    gateway: Arc<dyn Gateway>,
    settings: SelfTestSettings,
    ca_bundle: PathBuf,
}

impl SelfTestEngine {
    pub fn new(gateway: Arc<dyn Gateway>, settings: SelfTestSettings, ca_bundle: PathBuf) -> Self {
        Self {
            gateway,
            settings,
            ca_bundle,
        }
    }

    pub async fn run(&self, config: &UpstreamConfig, mode: SelfTestMode) -> SelfTestResult {
        let started = Instant::now();
        let mut steps = Vec::with_capacity(4);

        steps.push(timed(self.config_validation()).await);
        if mode == SelfTestMode::Full {
            steps.push(timed(self.upstream_connectivity(config)).await);
        }
        steps.push(timed(self.resolver_functionality()).await);
        if mode == SelfTestMode::Full {
            steps.push(timed(self.health_observation()).await);
        }

        let result = SelfTestResult::from_steps(steps, started.elapsed().as_millis() as u64);
        tracing::info!(
            ?mode,
            status = ?result.summary.status,
            duration_ms = result.total_duration_ms,
            "Self-test finished"
        );
        result
    }

    async fn config_validation(&self) -> TestStep {
        match self.gateway.execute(&Command::CheckConfig).await {
            Ok(_) => TestStep::pass(CONFIG_VALIDATION, "unbound-checkconf reported no errors"),
            Err(e) => TestStep::fail(
                CONFIG_VALIDATION,
                "unbound-checkconf rejected the configuration",
                e.to_string(),
            ),
        }
    }

    async fn upstream_connectivity(&self, config: &UpstreamConfig) -> TestStep {
        match config.mode {
            UpstreamMode::Recursive => TestStep::skipped(
                UPSTREAM_CONNECTIVITY,
                "recursive mode: no upstream to probe",
            ),
            UpstreamMode::Dot => self.probe_dot(config.enabled_dot_providers()).await,
            UpstreamMode::Doh => {
                let port = config.doh_proxy.local_port.value();
                let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
                match probes::tcp_connect(addr, probes::TCP_TIMEOUT).await {
                    Ok(elapsed) => TestStep::pass(
                        UPSTREAM_CONNECTIVITY,
                        format!(
                            "{} proxy accepting connections on {addr} ({} ms)",
                            config.doh_proxy.kind,
                            elapsed.as_millis()
                        ),
                    ),
                    Err(e) => TestStep::fail(
                        UPSTREAM_CONNECTIVITY,
                        format!("{} proxy unreachable on {addr}", config.doh_proxy.kind),
                        e.to_string(),
                    ),
                }
            }
        }
    }

    async fn probe_dot(&self, providers: Vec<&Provider>) -> TestStep {
        if providers.is_empty() {
            return TestStep::skipped(UPSTREAM_CONNECTIVITY, "no DoT provider is enabled");
        }

        let tls = match probes::client_config(&self.ca_bundle) {
            Ok(tls) => tls,
            Err(e) => {
                return TestStep::fail(
                    UPSTREAM_CONNECTIVITY,
                    "cannot verify upstream certificates",
                    e.to_string(),
                );
            }
        };

        let mut handshakes = JoinSet::new();
        for provider in providers {
            let addr = SocketAddr::new(provider.address, provider.port.value());
            let server_name = provider.server_name();
            let label = format!("{} ({addr})", provider.display_name());
            let tls = tls.clone();
            handshakes.spawn(async move {
                let outcome =
                    probes::tls_handshake(addr, &server_name, tls, probes::TLS_TIMEOUT).await;
                (label, outcome)
            });
        }

        let mut reachable = 0usize;
        let mut failures = Vec::new();
        while let Some(joined) = handshakes.join_next().await {
            match joined {
                Ok((label, Ok(elapsed))) => {
                    tracing::debug!(provider = %label, elapsed_ms = elapsed.as_millis() as u64, "TLS probe ok");
                    reachable += 1;
                }
                Ok((label, Err(e))) => failures.push(format!("{label}: {e}")),
                Err(e) => failures.push(format!("probe task failed: {e}")),
            }
        }
        failures.sort();

        if failures.is_empty() {
            TestStep::pass(
                UPSTREAM_CONNECTIVITY,
                format!("TLS handshake succeeded with {reachable} provider(s)"),
            )
        } else {
            TestStep::fail(
                UPSTREAM_CONNECTIVITY,
                format!(
                    "{} of {} provider(s) failed the TLS handshake",
                    failures.len(),
                    failures.len() + reachable
                ),
                failures.join("; "),
            )
        }
    }

    async fn resolver_functionality(&self) -> TestStep {
        let status = self
            .gateway
            .execute(&Command::ServiceStatus(ServiceName::Unbound))
            .await;
        match status {
            Ok(result) if result.stdout.trim() == "active" => {}
            Ok(result) => {
                let state = result.stdout.trim();
                let state = if state.is_empty() { "unknown" } else { state };
                return TestStep::fail(
                    RESOLVER_FUNCTIONALITY,
                    format!("unbound service is {state}"),
                    format!("systemctl is-active exited with {}", result.exit_code),
                );
            }
            Err(e) => {
                return TestStep::fail(
                    RESOLVER_FUNCTIONALITY,
                    "could not query unbound service state",
                    e.to_string(),
                );
            }
        }

        let stats = match self.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                return TestStep::fail(
                    RESOLVER_FUNCTIONALITY,
                    "unbound is active but its control interface is not answering",
                    e.to_string(),
                );
            }
        };
        let served = format!("unbound active, {} queries served", stats.total_queries());

        let domain = self.settings.probe_domain.trim();
        if domain.is_empty() {
            return TestStep::pass(RESOLVER_FUNCTIONALITY, served);
        }
        let resolver: SocketAddr = match self.settings.resolver_addr.parse() {
            Ok(addr) => addr,
            Err(_) => {
                return TestStep::warn(
                    RESOLVER_FUNCTIONALITY,
                    format!("{served}; resolver address {:?} is invalid", self.settings.resolver_addr),
                );
            }
        };

        match probes::dns_query(resolver, domain, probes::DNS_TIMEOUT).await {
            Ok(answers) => TestStep::pass(
                RESOLVER_FUNCTIONALITY,
                format!("{served}; {domain} resolved via {resolver} ({answers} answer(s))"),
            ),
            Err(e) => TestStep::warn(
                RESOLVER_FUNCTIONALITY,
                format!("{served}; lookup of {domain} via {resolver} failed: {e}"),
            ),
        }
    }

    async fn health_observation(&self) -> TestStep {
        let first = match self.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                return TestStep::fail(
                    HEALTH_OBSERVATION,
                    "could not read resolver statistics",
                    e.to_string(),
                );
            }
        };

        let window = Duration::from_millis(self.settings.sample_window_ms);
        let (rate, scope) = if window.is_zero() {
            (ServfailRate::cumulative(&first), "since start".to_string())
        } else {
            tokio::time::sleep(window).await;
            match self.stats().await {
                Ok(second) => (
                    ServfailRate::delta(&first, &second),
                    format!("over {}", humantime::format_duration(window)),
                ),
                Err(e) => {
                    return TestStep::fail(
                        HEALTH_OBSERVATION,
                        "could not read resolver statistics",
                        e.to_string(),
                    );
                }
            }
        };

        if rate.queries < self.settings.min_queries {
            return TestStep::skipped(
                HEALTH_OBSERVATION,
                format!(
                    "{} queries {scope}, fewer than {} needed for a SERVFAIL rate",
                    rate.queries, self.settings.min_queries
                ),
            );
        }

        let percent = rate.percent();
        let details = format!(
            "SERVFAIL {percent:.1}% ({} of {} queries {scope})",
            rate.servfail, rate.queries
        );
        if percent > self.settings.servfail_fail_percent {
            TestStep::fail(
                HEALTH_OBSERVATION,
                details,
                format!(
                    "SERVFAIL rate above {}%",
                    self.settings.servfail_fail_percent
                ),
            )
        } else if percent > self.settings.servfail_warn_percent {
            TestStep::warn(HEALTH_OBSERVATION, details)
        } else {
            TestStep::pass(HEALTH_OBSERVATION, details)
        }
    }

    async fn stats(&self) -> Result<ResolverStats, GatewayError> {
        let result = self.gateway.execute(&Command::Stats).await?;
        Ok(ResolverStats::parse(&result.stdout))
    }
}

async fn timed<F>(step: F) -> TestStep
where
    F: Future<Output = TestStep>,
{
    let started = Instant::now();
    let step = step.await;
    step.with_duration_ms(started.elapsed().as_millis() as u64)
}
