use super::*;
use crate::logging;
use std::sync::{atomic::AtomicU64, Arc, Mutex};

/// Trips open once the proportion of erroring requests in the window
/// reaches `error_ratio_threshold`, as opposed to `ErrorCountBreaker` which
/// looks at a raw count.
#[derive(Debug)]
pub struct ErrorRatioBreaker {
    breaker: BreakerBase,
    min_request_amount: u64,
    error_ratio_threshold: f64,
    stat: Arc<CounterLeapArray>,
}

impl ErrorRatioBreaker {
    pub fn new(rule: Arc<Rule>) -> Self {
        let stat = CounterLeapArray::new(
            rule.get_rule_stat_sliding_window_bucket_count(),
            rule.stat_interval_ms,
        )
        .unwrap();
        Self::new_with_stat(rule, Arc::new(stat))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<CounterLeapArray>) -> Self {
        let retry_timeout_ms = rule.retry_timeout_ms;
        let min_request_amount = rule.min_request_amount;
        let error_ratio_threshold = rule.threshold;
        Self {
            breaker: BreakerBase {
                rule,
                retry_timeout_ms,
                next_retry_timestamp_ms: AtomicU64::new(0),
                state: Arc::new(Mutex::new(State::default())),
            },
            min_request_amount,
            error_ratio_threshold,
            stat,
        }
    }
}

impl CircuitBreakerTrait for ErrorRatioBreaker {
    fn breaker(&self) -> &BreakerBase {
        &self.breaker
    }

    fn stat(&self) -> &Arc<CounterLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, _rt: u64, err: &Option<Error>) {
        let (error_count, total_count) = match self.stat.record_and_totals(err.is_some()) {
            Ok(totals) => totals,
            Err(_) => {
                logging::error!(
                    "Fail to get current counter in ErrorRatioBreaker#on_request_complete(). rule: {:?}",
                    self.breaker.rule
                );
                return;
            }
        };
        let error_ratio = error_count as f64 / total_count as f64;

        match self.current_state() {
            State::HalfOpen => {
                if err.is_none() {
                    self.breaker.from_half_open_to_closed();
                    self.reset_metric();
                } else {
                    self.breaker.from_half_open_to_open(Arc::new(1));
                }
            }
            State::Closed => {
                if total_count >= self.min_request_amount
                    && error_ratio >= self.error_ratio_threshold
                {
                    match self.current_state() {
                        State::Closed => {
                            self.breaker.from_closed_to_open(Arc::new(error_ratio));
                        }
                        State::HalfOpen => {
                            self.breaker.from_half_open_to_open(Arc::new(error_ratio));
                        }
                        State::Open => {}
                    }
                }
            }
            State::Open => {}
        }
    }
}
