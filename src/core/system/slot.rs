use super::*;
use crate::{
    base::{
        BaseSlot, BlockType, ConcurrencyStat, ContextPtr, EntryContext, MetricEvent, ReadStat,
        RuleCheckSlot, Snapshot, TokenResult, TrafficType,
    },
    stat, system_metric,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 1000;

/// Gates inbound traffic on a process-wide indicator (QPS, concurrency,
/// average RT, load or CPU) rather than a single resource's own traffic.
/// Outbound traffic is never subject to this check.
pub struct SystemFlowSlot {}

lazy_static! {
    pub static ref DEFAULT_SYSTEM_FLOW_SLOT: Arc<SystemFlowSlot> = Arc::new(SystemFlowSlot {});
}

pub fn default_slot() -> Arc<SystemFlowSlot> {
    DEFAULT_SYSTEM_FLOW_SLOT.clone()
}

impl BaseSlot for SystemFlowSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for SystemFlowSlot {
    fn check(&self, ctx_ptr: &ContextPtr) -> TokenResult {
        let mut ctx = ctx_ptr.write().unwrap();
        if *ctx.resource().traffic_type() == TrafficType::Outbound {
            return ctx.result().clone();
        }
        for rule in get_rules() {
            let (passed, msg, snapshot) = evaluate_rule(&rule);
            if passed {
                continue;
            }
            ctx.set_result(TokenResult::new_blocked_with_cause(
                BlockType::SystemFlow,
                msg,
                rule.clone(),
                snapshot.unwrap(),
            ));
            return ctx.result().clone();
        }
        ctx.result().clone()
    }
}

/// Checks one system rule against its live metric, returning whether it
/// passed, the block message if it didn't, and the metric value observed
/// (always present except for a pass with nothing worth recording).
fn evaluate_rule(rule: &Arc<Rule>) -> (bool, String, Option<Arc<Snapshot>>) {
    let threshold = rule.threshold;
    match rule.metric_type {
        MetricType::InboundQPS => {
            let qps = stat::inbound_node().qps(MetricEvent::Pass);
            if qps < threshold {
                (true, String::new(), None)
            } else {
                (
                    false,
                    "system qps check blocked".into(),
                    Some(Arc::new(qps) as Arc<Snapshot>),
                )
            }
        }
        MetricType::Concurrency => {
            let n = stat::inbound_node().current_concurrency() as f64;
            if n < threshold {
                (true, String::new(), None)
            } else {
                (
                    false,
                    "system concurrency check blocked".into(),
                    Some(Arc::new(n) as Arc<Snapshot>),
                )
            }
        }
        MetricType::AvgRT => {
            let rt = stat::inbound_node().avg_rt();
            if rt < threshold {
                (true, String::new(), None)
            } else {
                (
                    false,
                    "system avg rt check blocked".into(),
                    Some(Arc::new(rt) as Arc<Snapshot>),
                )
            }
        }
        MetricType::Load => {
            let l = system_metric::current_load();
            let blocked = l > threshold && (rule.strategy != AdaptiveStrategy::BBR || !bbr_allows_more());
            let msg = if blocked {
                "system load check blocked".into()
            } else {
                String::new()
            };
            (!blocked, msg, Some(Arc::new(l) as Arc<Snapshot>))
        }
        MetricType::CpuUsage => {
            let c = system_metric::current_cpu_usage() as f64;
            let blocked = c > threshold && (rule.strategy != AdaptiveStrategy::BBR || !bbr_allows_more());
            let msg = if blocked {
                "system cpu usage check blocked".into()
            } else {
                String::new()
            };
            (!blocked, msg, Some(Arc::new(c) as Arc<Snapshot>))
        }
    }
}

/// BBR override: even past threshold, admit more if inbound concurrency
/// hasn't yet outpaced what the current completion rate and min RT could
/// sustain.
fn bbr_allows_more() -> bool {
    let global_inbound = &stat::inbound_node();
    let concurrency = global_inbound.current_concurrency() as f64;
    let min_rt = global_inbound.min_rt();
    let max_complete = global_inbound.max_avg(MetricEvent::Complete);
    !(concurrency > 1.0 && concurrency > max_complete * min_rt / 1000.0)
}
