//! Statistic interfaces shared by every slot that reads or writes counters.

use super::constant::{DEFAULT_INTERVAL_MS, DEFAULT_INTERVAL_MS_TOTAL};
use super::MetricItemRetriever;
use crate::{Error, Result};
use enum_map::Enum;
use std::fmt::Debug;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

/// A closure-like time predicate used to filter which second-level buckets
/// `MetricItemRetriever::metrics_on_condition` returns.
pub type TimePredicate = dyn Fn(u64) -> bool;

/// The discrete kinds of event a bucket counts. `Rt` sums response-time
/// nanoseconds rather than occurrences; everything else is a plain tally.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Enum)]
pub enum MetricEvent {
    Pass,
    Block,
    Complete,
    Error,
    /// Response time, in milliseconds; summed, then divided by `Complete`
    /// to produce the average in `ReadStat::avg_rt`.
    Rt,
}

/// Read-only access to a resource's rolling statistic window.
#[cfg_attr(test, automock)]
pub trait ReadStat: Send + Sync + std::fmt::Debug {
    fn qps(&self, event: MetricEvent) -> f64;
    fn qps_previous(&self, event: MetricEvent) -> f64;
    fn sum(&self, event: MetricEvent) -> u64;
    fn min_rt(&self) -> f64;
    fn avg_rt(&self) -> f64;
}

/// Write access to the counters backing a resource's statistic window.
#[cfg_attr(test, automock)]
pub trait WriteStat: Send + Sync + std::fmt::Debug {
    fn add_count(&self, event: MetricEvent, count: u64);
    fn update_concurrency(&self, concurrency: u32);
}

/// Tracks in-flight call count for a resource, independent of the windowed
/// counters (concurrency is a point-in-time gauge, not a rolling sum).
#[cfg_attr(test, automock)]
pub trait ConcurrencyStat: Send + Sync {
    fn current_concurrency(&self) -> u32;
    fn increase_concurrency(&self);
    fn decrease_concurrency(&self);
}

/// The full per-resource statistic facade the registry hands to slots and
/// traffic-shaping controllers.
pub trait StatNode: ReadStat + WriteStat + ConcurrencyStat + MetricItemRetriever + Debug {
    /// Builds an independent read-only view over the same underlying leap
    /// array, at a (possibly coarser) sample_count/interval_ms. Used when a
    /// rule's own statistic window can be served by reusing the resource's
    /// default bucket array instead of allocating a second one.
    fn generate_read_stat(&self, sample_count: u32, interval_ms: u32) -> Result<Arc<dyn ReadStat>>;
}

/// A `StatNode` that counts nothing and reports zero everywhere; used as the
/// fallback `generate_stat_for` result when `rule.need_statistic()` is false.
#[derive(Debug, Default)]
pub struct NopStatNode;

impl MetricItemRetriever for NopStatNode {
    fn metrics_on_condition(&self, _predicate: &TimePredicate) -> Vec<super::MetricItem> {
        vec![]
    }
}

impl ReadStat for NopStatNode {
    fn qps(&self, _event: MetricEvent) -> f64 {
        0.0
    }
    fn qps_previous(&self, _event: MetricEvent) -> f64 {
        0.0
    }
    fn sum(&self, _event: MetricEvent) -> u64 {
        0
    }
    fn min_rt(&self) -> f64 {
        0.0
    }
    fn avg_rt(&self) -> f64 {
        0.0
    }
}

impl WriteStat for NopStatNode {
    fn add_count(&self, _event: MetricEvent, _count: u64) {}
    fn update_concurrency(&self, _concurrency: u32) {}
}

impl ConcurrencyStat for NopStatNode {
    fn current_concurrency(&self) -> u32 {
        0
    }
    fn increase_concurrency(&self) {}
    fn decrease_concurrency(&self) {}
}

impl StatNode for NopStatNode {
    fn generate_read_stat(&self, _sample_count: u32, _interval_ms: u32) -> Result<Arc<dyn ReadStat>> {
        Ok(Arc::new(NopStatNode))
    }
}

/// A shared no-op `ReadStat`, handed out when a traffic-shaping controller's rule doesn't
/// need a statistic window (e.g. a concurrency-based rule).
pub fn nop_read_stat() -> Arc<dyn ReadStat> {
    Arc::new(NopStatNode)
}

/// A shared no-op `WriteStat`, paired with `nop_read_stat` for the same reason.
pub fn nop_write_stat() -> Arc<dyn WriteStat> {
    Arc::new(NopStatNode)
}

pub const GLOBAL_STATISTIC_NON_REUSABLE_ERROR: &str =
    "could not reuse the global statistic for the requested window";

/// Checks that a window of `sample_count` buckets spanning `interval_ms`
/// divides evenly and fits within sane bucket-length bounds.
pub fn check_validity_for_statistic(sample_count: u32, interval_ms: u32) -> Result<()> {
    if interval_ms == 0 {
        return Err(Error::msg("parameter IntervalInMs is invalid: 0"));
    }
    if sample_count == 0 {
        return Err(Error::msg("parameter SampleCount is invalid: 0"));
    }
    if interval_ms % sample_count != 0 {
        return Err(Error::msg(format!(
            "time span needs to be evenly divided: interval_ms({}), sample_count({})",
            interval_ms, sample_count
        )));
    }
    Ok(())
}

/// Checks that a per-resource statistic window (`sample_count`/`interval_ms`)
/// can be derived from the global leap array's window
/// (`global_sample_count`/`global_interval_ms`) by re-bucketing, i.e. the
/// global bucket length evenly divides the requested one and the requested
/// window doesn't exceed the global window.
pub fn check_validity_for_reuse_statistic(
    sample_count: u32,
    interval_ms: u32,
    global_sample_count: u32,
    global_interval_ms: u32,
) -> Result<()> {
    check_validity_for_statistic(sample_count, interval_ms)?;
    check_validity_for_statistic(global_sample_count, global_interval_ms)?;

    let bucket_length_ms = interval_ms / sample_count;
    let global_bucket_length_ms = global_interval_ms / global_sample_count;

    if interval_ms > global_interval_ms {
        return Err(Error::msg(format!(
            "interval_ms({}) is larger than global_interval_ms({})",
            interval_ms, global_interval_ms
        )));
    }
    if bucket_length_ms % global_bucket_length_ms != 0 {
        return Err(Error::msg(format!(
            "bucket_length_ms({}) is not an integral multiple of global_bucket_length_ms({})",
            bucket_length_ms, global_bucket_length_ms
        )));
    }
    Ok(())
}

#[allow(dead_code)]
fn default_global_window() -> (u32, u32) {
    (
        DEFAULT_INTERVAL_MS_TOTAL / DEFAULT_INTERVAL_MS,
        DEFAULT_INTERVAL_MS_TOTAL,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validity_rejects_zero() {
        assert!(check_validity_for_statistic(0, 1000).is_err());
        assert!(check_validity_for_statistic(2, 0).is_err());
    }

    #[test]
    fn validity_rejects_uneven_division() {
        assert!(check_validity_for_statistic(3, 1000).is_err());
    }

    #[test]
    fn validity_accepts_even_division() {
        assert!(check_validity_for_statistic(2, 1000).is_ok());
    }

    #[test]
    fn reuse_rejects_wider_window() {
        assert!(check_validity_for_reuse_statistic(2, 20000, 20, 10000).is_err());
    }

    #[test]
    fn reuse_rejects_non_multiple_bucket_length() {
        // global bucket length 500ms; requested bucket length 300ms.
        assert!(check_validity_for_reuse_statistic(10, 3000, 20, 10000).is_err());
    }

    #[test]
    fn reuse_accepts_coarser_matching_window() {
        assert!(check_validity_for_reuse_statistic(2, 1000, 20, 10000).is_ok());
    }

    #[test]
    fn nop_stat_node_reports_zero() {
        let nop = NopStatNode;
        assert_eq!(nop.qps(MetricEvent::Pass), 0.0);
        assert_eq!(nop.current_concurrency(), 0);
        nop.add_count(MetricEvent::Pass, 5);
        assert_eq!(nop.qps(MetricEvent::Pass), 0.0);
    }
}
