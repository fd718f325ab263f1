use crate::{
    stat::{BucketWrap, LeapArray, MetricTrait},
    Result,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Per-bucket tally for the error-based breakers: `target` is the count of
/// requests matching whatever the breaker is watching for (errors, slow
/// requests), `total` is every completed request.
#[derive(Debug, Default)]
pub struct Counter {
    pub(crate) target: AtomicU64,
    pub(crate) total: AtomicU64,
}

impl MetricTrait for Counter {
    fn reset(&self) {
        self.target.store(0, Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
    }
}

pub type CounterLeapArray = LeapArray<Counter>;

impl CounterLeapArray {
    pub fn current_counter(&self) -> Result<Arc<BucketWrap<Counter>>> {
        // todo: redesign the structure, so that the wrapped value can be returned..
        // currently, it cannot be visited safely under an Arc
        self.current_bucket()
    }

    pub fn all_counter(&self) -> Vec<Arc<BucketWrap<Counter>>> {
        // todo: redesign the structure, so that the wrapped value can be returned..
        // currently, it cannot be visited safely under an Arc
        self.get_current_values()
    }

    /// Records one completed request (`hit` set if it counts toward the
    /// breaker's target, e.g. it errored or ran slow) and returns the
    /// `(target, total)` totals across the whole window afterward.
    pub fn record_and_totals(&self, hit: bool) -> Result<(u64, u64)> {
        let counter = self.current_counter()?;
        if hit {
            counter.value().target.fetch_add(1, Ordering::SeqCst);
        }
        counter.value().total.fetch_add(1, Ordering::SeqCst);

        let mut target_total = 0;
        let mut total = 0;
        for c in self.all_counter() {
            target_total += c.value().target.load(Ordering::SeqCst);
            total += c.value().total.load(Ordering::SeqCst);
        }
        Ok((target_total, total))
    }
}
