//! Rules for the system-adaptive protection check slot: admission gated on
//! a system-wide indicator rather than a single resource's own traffic.

use crate::{base::SentinelRule, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Which system indicator a `Rule` watches. Distinct from `flow::AdaptiveMetric`:
/// that enum picks which metric feeds a per-resource threshold calculator, this
/// one picks which global indicator can block admission outright.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum MetricType {
    /// System load1, as reported by `system_metric::current_load`.
    Load,
    /// Average response time of all inbound requests.
    AvgRT,
    /// Concurrency of all inbound requests.
    Concurrency,
    /// QPS of all inbound requests.
    InboundQPS,
    /// CPU usage percentage of the whole system, `[0.0, 1.0]`.
    CpuUsage,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::Load
    }
}

/// `Load`/`CpuUsage` rules can additionally require a BBR-style concurrency
/// check before blocking, so a load spike that isn't yet translating into
/// queueing doesn't trip the rule.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum AdaptiveStrategy {
    NoAdaptive,
    BBR,
}

impl Default for AdaptiveStrategy {
    fn default() -> AdaptiveStrategy {
        AdaptiveStrategy::NoAdaptive
    }
}

/// `Rule` describes one system-wide protection threshold. Unlike `flow::Rule`,
/// there is no `resource` field: system rules gate the whole process's inbound
/// traffic via the global inbound node, not a single resource.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// `id` represents the unique ID of the rule (optional).
    pub id: Option<String>,
    pub metric_type: MetricType,
    pub threshold: f64,
    pub strategy: AdaptiveStrategy,
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.metric_type.hash(state);
        self.strategy.hash(state);
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.metric_type == other.metric_type
            && self.threshold == other.threshold
            && self.strategy == other.strategy
    }
}

impl Eq for Rule {}

impl SentinelRule for Rule {
    fn resource_name(&self) -> String {
        format!("{:?}", self.metric_type)
    }

    fn is_valid(&self) -> Result<()> {
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.metric_type == MetricType::CpuUsage && self.threshold > 1.0 {
            return Err(Error::msg("invalid CPU usage, valid range is [0.0, 1.0]"));
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
