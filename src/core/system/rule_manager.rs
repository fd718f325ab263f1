use super::*;
use crate::{base::SentinelRule, logging, utils};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

pub type RuleMap = HashMap<MetricType, HashSet<Arc<Rule>>>;

lazy_static! {
    static ref ACTIVE_RULES: RwLock<RuleMap> = RwLock::new(RuleMap::new());
    static ref LOADED_RULES: Mutex<Vec<Arc<Rule>>> = Mutex::new(Vec::new());
}

/// Every system-adaptive rule currently loaded, across all metric types.
///
/// Acquires a read lock on `ACTIVE_RULES`; release any write lock you hold
/// on it before calling.
pub fn get_rules() -> Vec<Arc<Rule>> {
    ACTIVE_RULES
        .read()
        .unwrap()
        .values()
        .flatten()
        .map(Arc::clone)
        .collect()
}

/// Adds a rule without disturbing any other rule already loaded. A no-op if
/// an identical rule is already present.
pub fn append_rule(rule: Arc<Rule>) -> bool {
    let already_present = ACTIVE_RULES
        .read()
        .unwrap()
        .get(&rule.metric_type)
        .unwrap_or(&HashSet::new())
        .contains(&rule);
    if already_present {
        return false;
    }

    match rule.is_valid() {
        Ok(_) => {
            ACTIVE_RULES
                .write()
                .unwrap()
                .entry(rule.metric_type)
                .or_default()
                .insert(Arc::clone(&rule));
            LOADED_RULES.lock().unwrap().push(rule);
        }
        Err(err) => logging::warn!(
            "[System append_rule] Ignoring invalid rule {:?}, reason: {:?}",
            rule,
            err
        ),
    };
    true
}

/// Replaces every loaded system-adaptive rule with `rules`. A no-op if the
/// given set is identical to what's already loaded.
///
/// Acquires locks on `LOADED_RULES` and `ACTIVE_RULES`; release any locks
/// you hold on them before calling.
pub fn load_rules(rules: Vec<Arc<Rule>>) {
    let mut loaded = LOADED_RULES.lock().unwrap();
    if *loaded == rules {
        logging::info!("[System] load_rules called with the currently active rule set, skipping.");
        return;
    }

    let grouped = rules_by_metric(rules.clone());
    let start = utils::curr_time_nanos();
    *ACTIVE_RULES.write().unwrap() = grouped;

    logging::debug!(
        "[System load_rules] Time statistic(ns) for updating system rules, time cost {:?}",
        utils::curr_time_nanos() - start
    );
    logging::info!("[System] system rules loaded, rules {:?}", *ACTIVE_RULES.read().unwrap());
    *loaded = rules;
}

/// Drops every loaded system-adaptive rule.
///
/// Acquires locks on `LOADED_RULES` and `ACTIVE_RULES`; release any locks
/// you hold on them before calling.
pub fn clear_rules() {
    LOADED_RULES.lock().unwrap().clear();
    ACTIVE_RULES.write().unwrap().clear();
}

fn rules_by_metric(rules: Vec<Arc<Rule>>) -> RuleMap {
    let mut grouped = RuleMap::new();
    for rule in rules {
        if let Err(err) = rule.is_valid() {
            logging::warn!(
                "[System rules_by_metric] Ignoring invalid system rule, rule: {:?}, error: {:?}",
                rule,
                err
            );
            continue;
        }
        grouped.entry(rule.metric_type).or_default().insert(rule);
    }
    grouped
}

#[cfg(test)]
mod test {
    // Some of these tests cannot run in parallel, since there's no guarantee
    // the global rule tables aren't touched by another test before assertion.
    use super::*;

    #[test]
    fn empty_rules() {
        let rules = get_rules();
        assert_eq!(0, rules.len());
    }

    #[test]
    #[ignore]
    fn get_updated_rules() {
        let mut map = RuleMap::new();
        map.insert(MetricType::InboundQPS, HashSet::new());
        map.get_mut(&MetricType::InboundQPS)
            .unwrap()
            .insert(Arc::new(Rule {
                metric_type: MetricType::InboundQPS,
                threshold: 1.0,
                ..Default::default()
            }));
        map.insert(MetricType::Concurrency, HashSet::new());
        map.get_mut(&MetricType::Concurrency)
            .unwrap()
            .insert(Arc::new(Rule {
                metric_type: MetricType::Concurrency,
                threshold: 1.0,
                ..Default::default()
            }));

        let mut active = ACTIVE_RULES.write().unwrap();
        *active = map.clone();
        drop(active);
        let rules = get_rules();
        assert_eq!(2, rules.len());

        let rule = Arc::new(Rule {
            metric_type: MetricType::InboundQPS,
            threshold: 2.0,
            ..Default::default()
        });
        map.get_mut(&MetricType::InboundQPS).unwrap().insert(rule);
        let mut active = ACTIVE_RULES.write().unwrap();
        *active = map;
        drop(active);
        let rules = get_rules();
        assert_eq!(3, rules.len());

        clear_rules();
    }

    #[test]
    #[ignore]
    fn valid_system_rule() {
        let rules = vec![
            Arc::new(Rule {
                metric_type: MetricType::InboundQPS,
                threshold: 1.0,
                ..Default::default()
            }),
            Arc::new(Rule {
                metric_type: MetricType::Concurrency,
                threshold: 2.0,
                ..Default::default()
            }),
        ];
        load_rules(rules);
        assert_eq!(2, ACTIVE_RULES.read().unwrap().len());
        clear_rules();
        assert_eq!(0, ACTIVE_RULES.read().unwrap().len());
        assert_eq!(0, LOADED_RULES.lock().unwrap().len());
    }

    #[test]
    fn invalid_build_map() {
        let rules = vec![Arc::new(Rule {
            metric_type: MetricType::InboundQPS,
            threshold: -1.0,
            ..Default::default()
        })];
        let map = rules_by_metric(rules);
        assert_eq!(0, map.len());
    }

    #[test]
    fn valid_build_map() {
        let rules = vec![
            Arc::new(Rule {
                metric_type: MetricType::InboundQPS,
                threshold: 1.0,
                ..Default::default()
            }),
            Arc::new(Rule {
                metric_type: MetricType::Concurrency,
                threshold: 2.0,
                ..Default::default()
            }),
        ];
        let map = rules_by_metric(rules);
        assert_eq!(2, map.len());
    }

    #[test]
    fn mix_build_map() {
        let rules = vec![
            Arc::new(Rule {
                metric_type: MetricType::InboundQPS,
                threshold: 1.0,
                ..Default::default()
            }),
            Arc::new(Rule {
                metric_type: MetricType::InboundQPS,
                threshold: 2.0,
                ..Default::default()
            }),
        ];
        let map = rules_by_metric(rules);
        assert_eq!(1, map.len());
    }
}
