//! Flow-control rule definition.

use crate::{base::SentinelRule, logging, system_metric, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub type Id = String;

/// Which statistic a flow rule's threshold is measured against. Inferring
/// this from `calculate_strategy` and `control_strategy` alone would leave
/// a warm-up/concurrency combination ambiguous, so it is tracked as its own
/// explicit field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatItem {
    Qps,
    Concurrency,
}

impl Default for StatItem {
    fn default() -> StatItem {
        StatItem::Qps
    }
}

/// Flow control strategy based on the relation of invocations.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationStrategy {
    /// Current means flow control by current resource directly.
    Current,
    /// Associated means flow control by the associated resource rather than current resource.
    Associated,
}

impl Default for RelationStrategy {
    fn default() -> RelationStrategy {
        RelationStrategy::Current
    }
}

/// Which calculator derives the effective threshold from the rule's static
/// configuration and (for `Adaptive`) live system metrics.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum CalculateStrategy {
    Direct,
    WarmUp,
    /// Scales the threshold between `risk_threshold` and `safe_threshold`
    /// as `adaptive_metric` moves between `high_water_mark` and
    /// `low_water_mark`. Covers both memory and CPU usage as the
    /// driving metric.
    Adaptive,
    #[serde(skip)]
    Custom(u8),
}

impl Default for CalculateStrategy {
    fn default() -> CalculateStrategy {
        CalculateStrategy::Direct
    }
}

/// Which live system metric `CalculateStrategy::Adaptive` watches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdaptiveMetric {
    Cpu,
    Memory,
}

impl Default for AdaptiveMetric {
    fn default() -> AdaptiveMetric {
        AdaptiveMetric::Memory
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum ControlStrategy {
    Reject,
    /// Throttling indicates that pending requests will be throttled,
    /// wait in queue (until free capacity is available)
    Throttling,
    #[serde(skip)]
    Custom(u8),
}

impl Default for ControlStrategy {
    fn default() -> ControlStrategy {
        ControlStrategy::Reject
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Rule describes the strategy of flow control: a threshold over a
/// statistic (`stat_item`), shaped by a calculator (`calculate_strategy`)
/// and enforced by a controller (`control_strategy`).
pub struct Rule {
    /// `id` represents the unique ID of the rule (optional).
    pub id: Id,
    /// `resource` represents the resource name.
    pub resource: String,
    pub ref_resource: String,
    pub stat_item: StatItem,
    pub calculate_strategy: CalculateStrategy,
    pub control_strategy: ControlStrategy,
    pub relation_strategy: RelationStrategy,
    /// `threshold` means the threshold during stat_interval_ms (or, for
    /// `StatItem::Concurrency`, the max number of concurrent in-flight
    /// calls — stat_interval_ms is ignored in that case).
    pub threshold: f64,
    pub warm_up_period_sec: u32,
    pub warm_up_cold_factor: u32,
    /// `max_queueing_time_ms` only takes effect when `control_strategy` is Throttling.
    /// When `max_queueing_time_ms` is 0, it means Throttling only controls interval of requests,
    /// and requests exceeding the threshold will be rejected directly.
    pub max_queueing_time_ms: u32,
    /// stat_interval_ms indicates the statistic interval and it's the optional setting for flow Rule.
    /// If user doesn't set stat_interval_ms, that means using default metric statistic of resource.
    /// If the stat_interval_ms user specifies can not reuse the global statistic of resource,
    /// sentinel will generate independent statistic structure for this self.
    pub stat_interval_ms: u32,

    /// Adaptive flow control parameters, used when `calculate_strategy` is
    /// `Adaptive`. Which metric is watched is `adaptive_metric`.
    /// Invariant: `risk_threshold <= safe_threshold` and
    /// `low_water_mark < high_water_mark`.
    /// - metric <= low_water_mark: effective threshold == safe_threshold
    /// - metric >= high_water_mark: effective threshold == risk_threshold
    /// - in between: linearly interpolated
    pub adaptive_metric: AdaptiveMetric,
    pub safe_threshold: f64,
    pub risk_threshold: f64,
    pub low_water_mark: u64,
    pub high_water_mark: u64,
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
        self.ref_resource.hash(state);
    }
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            ref_resource: String::default(),
            stat_item: StatItem::default(),
            calculate_strategy: CalculateStrategy::default(),
            control_strategy: ControlStrategy::default(),
            relation_strategy: RelationStrategy::default(),
            threshold: 0.0,
            warm_up_period_sec: 0,
            warm_up_cold_factor: 0,
            max_queueing_time_ms: 0,
            stat_interval_ms: 0,
            adaptive_metric: AdaptiveMetric::default(),
            safe_threshold: 0.0,
            risk_threshold: 0.0,
            low_water_mark: 0,
            high_water_mark: 0,
        }
    }
}

impl Rule {
    pub fn is_stat_reusable(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.relation_strategy == other.relation_strategy
            && self.ref_resource == other.ref_resource
            && self.stat_interval_ms == other.stat_interval_ms
            && self.need_statistic()
            && other.need_statistic()
    }

    /// A rule needs a rolling statistic window only when its controller
    /// reads one: `Reject` on QPS compares against the window directly,
    /// and `WarmUp` needs the pass count to drive its token bucket.
    /// Concurrency-based rules and pure `Throttling` on QPS don't.
    pub fn need_statistic(&self) -> bool {
        self.stat_item == StatItem::Qps
            && (self.calculate_strategy == CalculateStrategy::WarmUp
                || self.control_strategy == ControlStrategy::Reject)
    }
}

impl SentinelRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.relation_strategy == RelationStrategy::Associated && self.ref_resource.is_empty() {
            return Err(Error::msg("ref_resource must be non empty when relation_strategy is RelationStrategy::Associated"));
        }
        if self.calculate_strategy == CalculateStrategy::WarmUp {
            if self.warm_up_period_sec == 0 {
                return Err(Error::msg("warm_up_period_sec must be great than 0"));
            }
            if self.warm_up_cold_factor == 1 {
                return Err(Error::msg("warm_up_cold_factor must be great than 1"));
            }
        }
        if self.stat_interval_ms > 10 * 60 * 1000 {
            logging::info!(
                "stat_interval_ms is great than 10 minutes, less than 10 minutes is recommended."
            )
        }
        if self.calculate_strategy == CalculateStrategy::Adaptive {
            if self.low_water_mark == 0 || self.high_water_mark == 0 {
                return Err(Error::msg("water mark setting to 0"));
            }
            if self.low_water_mark >= self.high_water_mark {
                return Err(Error::msg("low_water_mark >= high_water_mark"));
            }
            if self.risk_threshold > self.safe_threshold {
                return Err(Error::msg("risk_threshold > safe_threshold"));
            }
            if self.adaptive_metric == AdaptiveMetric::Memory
                && self.high_water_mark > system_metric::get_total_memory_size()
            {
                return Err(Error::msg(
                    "high_water_mark should not be greater than current system's total memory size",
                ));
            }
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.ref_resource == other.ref_resource
            && self.stat_item == other.stat_item
            && self.calculate_strategy == other.calculate_strategy
            && self.control_strategy == other.control_strategy
            && self.relation_strategy == other.relation_strategy
            && self.threshold == other.threshold
            && self.warm_up_period_sec == other.warm_up_period_sec
            && self.warm_up_cold_factor == other.warm_up_cold_factor
            && self.max_queueing_time_ms == other.max_queueing_time_ms
            && self.stat_interval_ms == other.stat_interval_ms
            && self.adaptive_metric == other.adaptive_metric
            && self.safe_threshold == other.safe_threshold
            && self.risk_threshold == other.risk_threshold
            && self.low_water_mark == other.low_water_mark
            && self.high_water_mark == other.high_water_mark
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
