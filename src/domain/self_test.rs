use serde::Serialize;

pub const CONFIG_VALIDATION: &str = "config_validation";
pub const UPSTREAM_CONNECTIVITY: &str = "upstream_connectivity";
pub const RESOLVER_FUNCTIONALITY: &str = "resolver_functionality";
pub const HEALTH_OBSERVATION: &str = "health_observation";

/// Step names in execution order.
pub const STEP_ORDER: [&str; 4] = [
    CONFIG_VALIDATION,
    UPSTREAM_CONNECTIVITY,
    RESOLVER_FUNCTIONALITY,
    HEALTH_OBSERVATION,
];

/// Ordered so that `max()` picks the worst status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    pub name: &'static str,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub details: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestStep {
    pub fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self::new(name, StepStatus::Pass, details, None)
    }

    pub fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::pass(name, details)
        }
    }

    pub fn warn(name: &'static str, details: impl Into<String>) -> Self {
        Self::new(name, StepStatus::Warn, details, None)
    }

    pub fn fail(name: &'static str, details: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(name, StepStatus::Fail, details, Some(error.into()))
    }

    fn new(
        name: &'static str,
        status: StepStatus,
        details: impl Into<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            name,
            status,
            duration_ms: 0,
            details: details.into(),
            skipped: false,
            error,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfTestSummary {
    pub status: StepStatus,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfTestResult {
    pub steps: Vec<TestStep>,
    pub summary: SelfTestSummary,
    pub total_duration_ms: u64,
}

impl SelfTestResult {
    pub fn from_steps(steps: Vec<TestStep>, total_duration_ms: u64) -> Self {
        let status = steps
            .iter()
            .map(|s| s.status)
            .max()
            .unwrap_or(StepStatus::Pass);
        let recommendations = steps
            .iter()
            .filter(|s| s.status != StepStatus::Pass)
            .map(recommendation)
            .collect();

        Self {
            steps,
            summary: SelfTestSummary {
                status,
                recommendations,
            },
            total_duration_ms,
        }
    }

    pub fn passed(&self) -> bool {
        self.summary.status != StepStatus::Fail
    }

    /// First failing step, if any.
    pub fn first_failure(&self) -> Option<&TestStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Fail)
    }
}

fn recommendation(step: &TestStep) -> String {
    let advice = match step.name {
        CONFIG_VALIDATION => "Run unbound-checkconf and fix the reported directive",
        UPSTREAM_CONNECTIVITY => {
            "Check outbound connectivity to the upstream providers (port 853 for DoT) or that the DoH proxy is running"
        }
        RESOLVER_FUNCTIONALITY => "Check `systemctl status unbound` and the resolver logs",
        HEALTH_OBSERVATION => "Inspect upstream reachability; a high SERVFAIL rate usually means forwarders are failing",
        _ => "Inspect the step details",
    };
    format!("{}: {} ({})", step.name, advice, step.details)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_is_worst_status() {
        let result = SelfTestResult::from_steps(
            vec![
                TestStep::pass(CONFIG_VALIDATION, "ok"),
                TestStep::warn(UPSTREAM_CONNECTIVITY, "slow"),
                TestStep::pass(RESOLVER_FUNCTIONALITY, "ok"),
            ],
            10,
        );
        assert_eq!(result.summary.status, StepStatus::Warn);
        assert!(result.passed());
        assert_eq!(result.summary.recommendations.len(), 1);

        let result = SelfTestResult::from_steps(
            vec![
                TestStep::warn(CONFIG_VALIDATION, "x"),
                TestStep::fail(HEALTH_OBSERVATION, "servfail 40%", "too many failures"),
            ],
            10,
        );
        assert_eq!(result.summary.status, StepStatus::Fail);
        assert!(!result.passed());
        assert_eq!(result.first_failure().unwrap().name, HEALTH_OBSERVATION);
    }

    #[test]
    fn test_all_pass_has_no_recommendations() {
        let result = SelfTestResult::from_steps(
            vec![
                TestStep::pass(CONFIG_VALIDATION, "ok"),
                TestStep::skipped(UPSTREAM_CONNECTIVITY, "recursive mode"),
            ],
            3,
        );
        assert_eq!(result.summary.status, StepStatus::Pass);
        assert!(result.summary.recommendations.is_empty());
        assert!(result.steps[1].skipped);
    }

    #[test]
    fn test_step_json_shape() {
        let step = TestStep::fail(CONFIG_VALIDATION, "exit 1", "syntax error").with_duration_ms(7);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["status"], "fail");
        assert_eq!(json["durationMs"], 7);
        assert_eq!(json["error"], "syntax error");
        assert!(json.get("skipped").is_none());
    }
}
