use crate::base::{MetricEvent, DEFAULT_STATISTIC_MAX_RT};
use enum_map::EnumMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A bucket's payload must be safely mutable through a shared reference,
/// since many concurrent entries can land in the same bucket between
/// rotations. `MetricBucket` satisfies this with per-event atomics; a type
/// that can't be made atomic this way would need its own internal lock.
pub trait MetricTrait: fmt::Debug + Default + Send + Sync {
    fn reset(&self);
}

/// Everything counted for one bucket's time span: per-event counters, the
/// smallest round-trip time observed, and the highest concurrency observed.
#[derive(Debug)]
pub struct MetricBucket {
    counter: EnumMap<MetricEvent, AtomicU64>,
    min_rt: AtomicU64,
    max_concurrency: AtomicU32,
}

impl Default for MetricBucket {
    fn default() -> Self {
        MetricBucket {
            counter: EnumMap::default(),
            min_rt: AtomicU64::new(DEFAULT_STATISTIC_MAX_RT),
            max_concurrency: AtomicU32::new(0),
        }
    }
}

impl MetricTrait for MetricBucket {
    fn reset(&self) {
        for (_, counter) in &self.counter {
            counter.store(0, Ordering::SeqCst);
        }
        self.min_rt.store(DEFAULT_STATISTIC_MAX_RT, Ordering::SeqCst);
        self.max_concurrency.store(0, Ordering::SeqCst);
    }
}

impl MetricBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` against `event`; round-trip times additionally
    /// update the bucket's running minimum.
    pub fn add(&self, event: MetricEvent, count: u64) {
        match event {
            MetricEvent::Rt => self.add_rt(count),
            _ => self.add_count(event, count),
        }
    }

    pub fn add_count(&self, event: MetricEvent, count: u64) {
        self.counter[event].fetch_add(count, Ordering::SeqCst);
    }

    pub fn add_rt(&self, round_trip: u64) {
        self.add_count(MetricEvent::Rt, round_trip);
        // Not a compare-and-swap loop: a rare lost race just means the
        // bucket's minimum is very slightly stale, which is acceptable here.
        if round_trip < self.min_rt.load(Ordering::SeqCst) {
            self.min_rt.store(round_trip, Ordering::SeqCst);
        }
    }

    pub fn get(&self, event: MetricEvent) -> u64 {
        self.counter[event].load(Ordering::SeqCst)
    }

    pub fn min_rt(&self) -> u64 {
        self.min_rt.load(Ordering::SeqCst)
    }

    pub fn update_concurrency(&self, concurrency: u32) {
        if concurrency > self.max_concurrency.load(Ordering::SeqCst) {
            self.max_concurrency.store(concurrency, Ordering::SeqCst);
        }
    }

    pub fn max_concurrency(&self) -> u32 {
        self.max_concurrency.load(Ordering::SeqCst)
    }
}
