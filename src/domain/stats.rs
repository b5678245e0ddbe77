use std::collections::BTreeMap;

use serde::Serialize;

const TOTAL_QUERIES: &str = "total.num.queries";
const SERVFAIL_ANSWERS: &str = "num.answer.rcode.SERVFAIL";

/// Parsed `unbound-control stats_noreset` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolverStats {
    values: BTreeMap<String, f64>,
}

impl ResolverStats {
    /// Parse `key=value` lines. Lines that do not parse are ignored.
    pub fn parse(text: &str) -> Self {
        let values = text
            .lines()
            .filter_map(|line| {
                let (key, value) = line.trim().split_once('=')?;
                let value = value.trim().parse::<f64>().ok()?;
                Some((key.trim().to_string(), value))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn total_queries(&self) -> u64 {
        self.get(TOTAL_QUERIES).unwrap_or(0.0) as u64
    }

    pub fn servfail_answers(&self) -> u64 {
        self.get(SERVFAIL_ANSWERS).unwrap_or(0.0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// SERVFAIL share over an observation window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServfailRate {
    pub queries: u64,
    pub servfail: u64,
}

impl ServfailRate {
    pub fn cumulative(stats: &ResolverStats) -> Self {
        Self {
            queries: stats.total_queries(),
            servfail: stats.servfail_answers(),
        }
    }

    /// Rate between two samples. Counter resets (a reload) clamp to zero.
    pub fn delta(before: &ResolverStats, after: &ResolverStats) -> Self {
        Self {
            queries: after.total_queries().saturating_sub(before.total_queries()),
            servfail: after
                .servfail_answers()
                .saturating_sub(before.servfail_answers()),
        }
    }

    pub fn percent(&self) -> f64 {
        if self.queries == 0 {
            return 0.0;
        }
        self.servfail as f64 * 100.0 / self.queries as f64
    }
}
