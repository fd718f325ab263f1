//! `AdaptiveCalculator` shapes the allowed threshold from a live system metric (CPU or memory
//! usage) instead of a fixed value, so the resource tightens up automatically as the process
//! gets close to exhausting a shared resource. Generalizes the original memory-only adaptive
//! calculator to also watch CPU usage, selected by `Rule::adaptive_metric`.
//!
//! The threshold changes with the watched metric linearly:
//! - metric <= `low_water_mark`: threshold is `safe_threshold`
//! - metric >= `high_water_mark`: threshold is `risk_threshold`
//! - in between: `((metric - low_water_mark) / (high_water_mark - low_water_mark)) *
//!   (risk_threshold - safe_threshold) + safe_threshold`

use super::Rule;
use super::{Calculator, Controller};
use crate::flow::rule::AdaptiveMetric;
use crate::system_metric;
use std::sync::{Arc, Weak};

#[derive(Debug)]
pub struct AdaptiveCalculator {
    owner: Weak<Controller>,
    metric: AdaptiveMetric,
    low_water_mark: f64,
    high_water_mark: f64,
    safe_threshold: f64,
    risk_threshold: f64,
}

impl AdaptiveCalculator {
    pub fn new(owner: Weak<Controller>, rule: Arc<Rule>) -> Self {
        AdaptiveCalculator {
            owner,
            metric: rule.adaptive_metric,
            low_water_mark: rule.low_water_mark as f64,
            high_water_mark: rule.high_water_mark as f64,
            safe_threshold: rule.safe_threshold,
            risk_threshold: rule.risk_threshold,
        }
    }

    fn current_metric(&self) -> f64 {
        match self.metric {
            AdaptiveMetric::Memory => system_metric::current_memory_usage() as f64,
            AdaptiveMetric::Cpu => system_metric::current_cpu_usage() as f64,
        }
    }
}

impl Calculator for AdaptiveCalculator {
    fn get_owner(&self) -> &Weak<Controller> {
        &self.owner
    }

    fn set_owner(&mut self, owner: Weak<Controller>) {
        self.owner = owner;
    }

    fn calculate_allowed_threshold(&self, _batch_count: u32, _flag: i32) -> f64 {
        let metric = self.current_metric();
        if metric > self.high_water_mark {
            self.risk_threshold
        } else if metric < self.low_water_mark {
            self.safe_threshold
        } else {
            (self.risk_threshold - self.safe_threshold)
                / (self.high_water_mark - self.low_water_mark)
                * (metric - self.low_water_mark)
                + self.safe_threshold
        }
    }
}
