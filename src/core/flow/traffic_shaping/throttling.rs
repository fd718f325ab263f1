//! The `Throttling` control strategy: rather than rejecting everything past
//! the threshold outright, it paces admitted requests evenly and makes a
//! request wait in a virtual queue when it arrives early, only blocking once
//! the wait would exceed `max_queueing_time_ms`.

use super::{Checker, Controller, Rule};
use crate::base::{BlockType, StatNode, TokenResult};
use crate::utils;
use std::convert::TryInto;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc, Weak,
};

const QUEUEING_BLOCK_MSG: &str = "flow throttling check blocked, threshold is <= 0.0";

#[derive(Debug)]
pub struct ThrottlingChecker {
    owner: Weak<Controller>,
    max_queueing_time_ns: i64,
    stat_interval_ns: i64,
    last_passed_time: AtomicI64,
}

impl ThrottlingChecker {
    pub fn new(owner: Weak<Controller>, rule: Arc<Rule>) -> Self {
        let stat_interval_ns = if rule.stat_interval_ms == 0 {
            utils::milli2nano(1000)
        } else {
            utils::milli2nano(rule.stat_interval_ms)
        };
        ThrottlingChecker {
            owner,
            max_queueing_time_ns: utils::milli2nano(rule.max_queueing_time_ms)
                .try_into()
                .unwrap(),
            stat_interval_ns: stat_interval_ns.try_into().unwrap(),
            last_passed_time: AtomicI64::new(0),
        }
    }

    /// Blocks with the bound rule attached as cause when the controller is
    /// still alive, or with a bare message when it has already been torn
    /// down (the owner is only a `Weak` reference to let a controller be
    /// dropped without pinning every in-flight checker to it).
    fn block(&self, queue_duration: i64) -> TokenResult {
        match self.owner.upgrade() {
            Some(owner) => TokenResult::new_blocked_with_cause(
                BlockType::Flow,
                QUEUEING_BLOCK_MSG.into(),
                owner.rule().clone(),
                Arc::new(queue_duration),
            ),
            None => TokenResult::new_blocked_with_msg(BlockType::Flow, QUEUEING_BLOCK_MSG.into()),
        }
    }
}

impl Checker for ThrottlingChecker {
    fn get_owner(&self) -> &Weak<Controller> {
        &self.owner
    }

    fn set_owner(&mut self, owner: Weak<Controller>) {
        self.owner = owner;
    }

    fn do_check(
        &self,
        _stat_node: Option<Arc<dyn StatNode>>,
        batch_count: u32,
        threshold: f64,
    ) -> TokenResult {
        if batch_count == 0 {
            return TokenResult::new_pass();
        }
        if threshold <= 0.0 {
            return self.block(threshold as i64);
        }
        let batch_count = batch_count as f64;
        if batch_count > threshold {
            return TokenResult::new_blocked(BlockType::Flow);
        }

        // Nanosecond precision keeps the queueing math from rounding whole
        // requests away when the interval between slots is sub-millisecond.
        let curr_nano: i64 = utils::curr_time_nanos().try_into().unwrap();
        let interval_ns = (batch_count.ceil() / threshold * (self.stat_interval_ns as f64)) as i64;

        let last_passed = self.last_passed_time.load(Ordering::SeqCst);
        let expected_time = last_passed + interval_ns;
        if expected_time <= curr_nano
            && self
                .last_passed_time
                .compare_exchange(last_passed, curr_nano, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
        {
            // Nothing has run in at least `interval_ns`, so this slot is free.
            return TokenResult::new_pass();
        }

        let queue_duration = self.last_passed_time.load(Ordering::SeqCst) + interval_ns - curr_nano;
        if queue_duration > self.max_queueing_time_ns {
            return self.block(queue_duration);
        }

        // Reserve this request's slot; if the reservation pushed the queue
        // past the timeout, give it back and block instead.
        let reserved_time = self.last_passed_time.fetch_add(interval_ns, Ordering::SeqCst) + interval_ns;
        let queue_duration = reserved_time - curr_nano;
        if queue_duration > self.max_queueing_time_ns {
            self.last_passed_time.fetch_sub(interval_ns, Ordering::SeqCst);
            return self.block(queue_duration);
        }

        TokenResult::new_should_wait(queue_duration.max(0).try_into().unwrap())
    }
}
