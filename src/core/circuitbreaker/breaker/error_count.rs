use super::*;
use crate::logging;
use std::sync::{atomic::AtomicU64, Arc, Mutex};

/// Trips open once the number of erroring requests in the window reaches
/// `error_count_threshold`, as opposed to `ErrorRatioBreaker` which looks at
/// a proportion.
#[derive(Debug)]
pub struct ErrorCountBreaker {
    breaker: BreakerBase,
    min_request_amount: u64,
    error_count_threshold: u64,
    stat: Arc<CounterLeapArray>,
}

impl ErrorCountBreaker {
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
        let error_count_threshold = rule.threshold as u64;
        Self {
            breaker: BreakerBase {
                rule,
                retry_timeout_ms,
                next_retry_timestamp_ms: AtomicU64::new(0),
                state: Arc::new(Mutex::new(State::default())),
            },
            min_request_amount,
            error_count_threshold,
            stat,
        }
    }
}

impl CircuitBreakerTrait for ErrorCountBreaker {
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
                    "Fail to get current counter in ErrorCountBreaker#on_request_complete(). rule: {:?}",
                    self.breaker.rule
                );
                return;
            }
        };

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
                    && error_count >= self.error_count_threshold
                {
                    match self.current_state() {
                        State::Closed => {
                            self.breaker.from_closed_to_open(Arc::new(error_count));
                        }
                        State::HalfOpen => {
                            self.breaker.from_half_open_to_open(Arc::new(error_count));
                        }
                        State::Open => {}
                    }
                }
            }
            State::Open => {}
        }
    }
}
