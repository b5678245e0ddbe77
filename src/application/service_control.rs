use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::{DomainName, ResolverStats, ServiceName};
use crate::infrastructure::audit::AuditEvent;
use crate::infrastructure::gateway::{Command, ExecutionResult, Gateway};

/// `systemctl is-active` answer for one managed service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceState {
    pub service: ServiceName,
    pub state: String,
}

impl ServiceState {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

/// What to drop from the resolver cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushTarget {
    Zone(DomainName),
    /// The infrastructure cache (upstream RTT and lameness data).
    Infra,
}

/// Use case: resolver and companion service operations outside an apply.
pub struct ServiceControl<'a> {
    gateway: &'a dyn Gateway,
}

impl<'a> ServiceControl<'a> {
    pub fn new(gateway: &'a dyn Gateway) -> Self {
        Self { gateway }
    }

    pub async fn restart(&self, service: ServiceName) -> Result<ExecutionResult> {
        let outcome = self
            .gateway
            .execute(&Command::RestartService(service))
            .await;
        AuditEvent::service(
            "restart",
            service.as_str(),
            outcome.as_ref().err().map(|e| e.to_string()),
        )
        .emit();
        outcome.with_context(|| format!("Failed to restart {service}"))
    }

    pub async fn flush(&self, target: FlushTarget) -> Result<ExecutionResult> {
        let (action, name, command) = match target {
            FlushTarget::Zone(zone) => (
                "flush_zone",
                zone.as_str().to_string(),
                Command::FlushZone(zone),
            ),
            FlushTarget::Infra => ("flush_infra", "all".to_string(), Command::FlushInfra),
        };
        let outcome = self.gateway.execute(&command).await;
        AuditEvent::service(action, name.as_str(), outcome.as_ref().err().map(|e| e.to_string()))
            .emit();
        outcome.with_context(|| format!("Failed to flush {name}"))
    }

    pub async fn stats(&self) -> Result<ResolverStats> {
        let result = self
            .gateway
            .execute(&Command::Stats)
            .await
            .context("Failed to read resolver statistics")?;
        Ok(ResolverStats::parse(&result.stdout))
    }

    /// State of every managed service. Services that cannot be queried are
    /// reported as `unknown`.
    pub async fn service_states(&self) -> Vec<ServiceState> {
        let mut states = Vec::with_capacity(ServiceName::ALL.len());
        for service in ServiceName::ALL {
            let state = match self.gateway.execute(&Command::ServiceStatus(service)).await {
                Ok(result) => match result.stdout.trim() {
                    "" => "unknown".to_string(),
                    s => s.to_string(),
                },
                Err(e) => {
                    tracing::debug!(%service, error = %e, "Service status unavailable");
                    "unknown".to_string()
                }
            };
            states.push(ServiceState { service, state });
        }
        states
    }

    /// `unbound-control status` output. Non-zero exit means the resolver is
    /// not running, which is still an answer.
    pub async fn resolver_status(&self) -> Result<ExecutionResult> {
        self.gateway
            .execute(&Command::ResolverStatus)
            .await
            .context("Failed to query resolver status")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeGateway, Reply, stats_text};

    #[tokio::test]
    async fn test_restart_runs_catalogue_command() {
        let gateway = FakeGateway::new();
        let control = ServiceControl::new(gateway.as_ref());

        control.restart(ServiceName::Cloudflared).await.unwrap();

        assert_eq!(
            gateway.calls(),
            vec![Command::RestartService(ServiceName::Cloudflared)]
        );
    }

    #[tokio::test]
    async fn test_restart_failure_carries_stderr() {
        let gateway = FakeGateway::new();
        gateway.reply(
            "restart_service",
            Reply::Exit(5, "Unit unbound.service not found.".into()),
        );
        let control = ServiceControl::new(gateway.as_ref());

        let err = control.restart(ServiceName::Unbound).await.unwrap_err();

        assert!(format!("{err:#}").contains("Unit unbound.service not found."));
    }

    #[tokio::test]
    async fn test_flush_targets() {
        let gateway = FakeGateway::new();
        let control = ServiceControl::new(gateway.as_ref());
        let zone = DomainName::new("example.org").unwrap();

        control.flush(FlushTarget::Zone(zone.clone())).await.unwrap();
        control.flush(FlushTarget::Infra).await.unwrap();

        assert_eq!(
            gateway.calls(),
            vec![Command::FlushZone(zone), Command::FlushInfra]
        );
    }

    #[tokio::test]
    async fn test_stats_are_parsed() {
        let gateway = FakeGateway::new();
        gateway.reply("stats", Reply::Ok(stats_text(1500, 30)));
        let control = ServiceControl::new(gateway.as_ref());

        let stats = control.stats().await.unwrap();

        assert_eq!(stats.total_queries(), 1500);
        assert_eq!(stats.servfail_answers(), 30);
    }

    #[tokio::test]
    async fn test_service_states() {
        let gateway = FakeGateway::new();
        gateway
            .reply("service_status", Reply::Ok("active\n".into()))
            .reply("service_status", Reply::Exit(3, String::new()))
            .reply("service_status", Reply::Ok("inactive\n".into()));
        let control = ServiceControl::new(gateway.as_ref());

        let states = control.service_states().await;

        assert_eq!(states.len(), 3);
        assert!(states[0].is_active());
        assert_eq!(states[1].state, "unknown");
        assert_eq!(states[2].state, "inactive");
    }
}
