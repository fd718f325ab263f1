use super::{BucketLeapArray, BucketWrap, MetricBucket};
use crate::base::{
    check_validity_for_reuse_statistic, MetricEvent, MetricItem, ReadStat, TimePredicate,
    DEFAULT_STATISTIC_MAX_RT,
};
use crate::utils::curr_time_millis;
use crate::Result;
use std::cmp;
use std::collections::HashMap;
use std::sync::Arc;

/// A read-only view over a `BucketLeapArray`, resampled to its own
/// `sample_count`/`interval_ms`. Several rule checks can each hold their own
/// `SlidingWindowMetric` over the same underlying array: the array owns the
/// buckets and is shared per resource, while each view just picks a
/// (possibly coarser) window over it and never mutates anything.
#[derive(Debug)]
pub struct SlidingWindowMetric {
    bucket_len_ms: u32,
    sample_count: u32,
    interval_ms: u32,
    inner: Arc<BucketLeapArray>,
}

impl SlidingWindowMetric {
    pub fn new(sample_count: u32, interval_ms: u32, inner: Arc<BucketLeapArray>) -> Result<Self> {
        check_validity_for_reuse_statistic(
            sample_count,
            interval_ms,
            inner.sample_count(),
            inner.interval_ms(),
        )?;
        Ok(SlidingWindowMetric {
            bucket_len_ms: interval_ms / sample_count,
            sample_count,
            interval_ms,
            inner,
        })
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.bucket_len_ms
    }

    pub fn interval_s(&self) -> f64 {
        self.interval_ms as f64 / 1000.0
    }

    /// The `[start, end]` bucket-start range this view's window covers for
    /// `t_ms`, in terms of the underlying array's own bucket boundaries
    /// (the actual time span is `[start, end + bucket_len_ms)`). See
    /// `LeapArray::calculate_start_stamp` and
    /// `LeapArray::get_valid_values_conditional`.
    pub(crate) fn window_bounds(&self, t_ms: u64) -> (u64, u64) {
        let end = self.inner.calculate_start_stamp(t_ms);
        let start = end - self.interval_ms as u64 + self.inner.bucket_len_ms() as u64;
        (start, end)
    }

    pub(crate) fn buckets_in_window(&self, now: u64) -> Vec<Arc<BucketWrap<MetricBucket>>> {
        let (start, end) = self.window_bounds(now);
        self.inner
            .get_valid_values_conditional(now, &move |curr: u64| start <= curr && curr <= end)
    }

    pub fn sum_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.buckets_in_window(now)
            .iter()
            .map(|b| b.value().get(event))
            .sum()
    }

    pub fn qps_with_time(&self, now: u64, event: MetricEvent) -> f64 {
        self.sum_with_time(now, event) as f64 / self.interval_s()
    }

    pub fn max_of_single_bucket(&self, event: MetricEvent) -> u64 {
        self.buckets_in_window(curr_time_millis())
            .iter()
            .map(|b| b.value().get(event))
            .max()
            .unwrap_or(0)
    }

    pub fn max_concurrency(&self) -> u32 {
        self.buckets_in_window(curr_time_millis())
            .iter()
            .map(|b| b.value().max_concurrency())
            .max()
            .unwrap_or(0)
    }

    /// Aggregates the window into one `MetricItem` per wall-clock second,
    /// for buckets whose start time satisfies `condition`.
    pub fn second_metrics_on_condition(&self, condition: &TimePredicate) -> Vec<MetricItem> {
        let buckets = self
            .inner
            .get_valid_values_conditional(curr_time_millis(), condition);

        let mut by_second = HashMap::<u64, Vec<Arc<BucketWrap<MetricBucket>>>>::new();
        for b in buckets {
            let start_stamp = b.start_stamp();
            let second_start = start_stamp - start_stamp % 1000;
            by_second.entry(second_start).or_insert_with(Vec::new).push(b);
        }

        by_second
            .into_iter()
            .filter(|(_, bs)| !bs.is_empty())
            .map(|(timestamp, bs)| self.aggregate_metric_item(timestamp, bs))
            .collect()
    }

    pub(crate) fn aggregate_metric_item(
        &self,
        timestamp: u64,
        buckets: Vec<Arc<BucketWrap<MetricBucket>>>,
    ) -> MetricItem {
        let mut item = MetricItem {
            timestamp,
            ..MetricItem::default()
        };
        let mut total_rt = 0;
        for bucket in &buckets {
            let b = bucket.value();
            item.pass_qps += b.get(MetricEvent::Pass);
            item.block_qps += b.get(MetricEvent::Block);
            item.error_qps += b.get(MetricEvent::Error);
            item.complete_qps += b.get(MetricEvent::Complete);
            item.concurrency = cmp::max(b.max_concurrency(), item.concurrency);
            total_rt += b.get(MetricEvent::Rt);
        }
        item.avg_rt = if item.complete_qps > 0 {
            total_rt / item.complete_qps
        } else {
            total_rt
        };
        item
    }

    pub(crate) fn metric_item_from_single_bucket(
        &self,
        bucket: Arc<BucketWrap<MetricBucket>>,
    ) -> MetricItem {
        let timestamp = bucket.start_stamp();
        let bucket = bucket.value();
        let complete_qps = bucket.get(MetricEvent::Complete);
        let avg_rt = if complete_qps > 0 {
            bucket.get(MetricEvent::Rt) / complete_qps
        } else {
            bucket.get(MetricEvent::Rt)
        };
        MetricItem {
            timestamp,
            pass_qps: bucket.get(MetricEvent::Pass),
            block_qps: bucket.get(MetricEvent::Block),
            complete_qps,
            error_qps: bucket.get(MetricEvent::Error),
            avg_rt,
            ..MetricItem::default()
        }
    }
}

impl ReadStat for SlidingWindowMetric {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.qps_with_time(curr_time_millis(), event)
    }

    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.qps_with_time(curr_time_millis() - self.bucket_len_ms as u64, event)
    }

    fn sum(&self, event: MetricEvent) -> u64 {
        self.sum_with_time(curr_time_millis(), event)
    }

    fn avg_rt(&self) -> f64 {
        let completed = self.sum(MetricEvent::Complete);
        if completed == 0 {
            0f64
        } else {
            self.sum(MetricEvent::Rt) as f64 / completed as f64
        }
    }

    fn min_rt(&self) -> f64 {
        let res = self
            .buckets_in_window(curr_time_millis())
            .iter()
            .fold(DEFAULT_STATISTIC_MAX_RT, |acc, b| cmp::min(acc, b.value().min_rt()));
        res as f64
    }
}
