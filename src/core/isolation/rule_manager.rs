use super::*;
use crate::{base::SentinelRule, logging, utils};
use crate::{Error, Result};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

pub type RuleMap = HashMap<String, HashSet<Arc<Rule>>>;

lazy_static! {
    static ref ACTIVE_RULES: RwLock<RuleMap> = RwLock::new(RuleMap::new());
    static ref LOADED_RULES: Mutex<RuleMap> = Mutex::new(RuleMap::new());
}

/// Every isolation rule currently loaded, across all resources.
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

/// The isolation rules bound to a single resource.
///
/// Acquires a read lock on `ACTIVE_RULES`; release any write lock you hold
/// on it before calling.
pub fn get_rules_of_resource(res: &String) -> Vec<Arc<Rule>> {
    let empty = HashSet::new();
    ACTIVE_RULES
        .read()
        .unwrap()
        .get(res)
        .unwrap_or(&empty)
        .iter()
        .map(Arc::clone)
        .collect()
}

/// Adds a rule without touching any other rule already bound to its
/// resource. A no-op if an identical rule is already loaded.
pub fn append_rule(rule: Arc<Rule>) -> bool {
    let already_present = ACTIVE_RULES
        .read()
        .unwrap()
        .get(&rule.resource)
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
                .entry(rule.resource.clone())
                .or_default()
                .insert(Arc::clone(&rule));
            LOADED_RULES
                .lock()
                .unwrap()
                .entry(rule.resource.clone())
                .or_default()
                .insert(rule);
        }
        Err(err) => logging::warn!(
            "[Isolation append_rule] Ignoring invalid rule {:?}, reason: {:?}",
            rule,
            err
        ),
    };
    true
}

fn sift_valid(rules: &HashSet<Arc<Rule>>, log_tag: &str) -> HashSet<Arc<Rule>> {
    let mut valid = HashSet::with_capacity(rules.len());
    for rule in rules {
        match rule.is_valid() {
            Ok(_) => {
                valid.insert(Arc::clone(rule));
            }
            Err(err) => logging::warn!(
                "[Isolation {}] Ignoring invalid isolation rule {:?}, reason: {:?}",
                log_tag,
                rule,
                err
            ),
        }
    }
    valid
}

/// Replaces every loaded isolation rule with `rules`. A no-op if the given
/// set is identical to what's already loaded.
///
/// Acquires locks on `LOADED_RULES` and `ACTIVE_RULES`; release any locks
/// you hold on them before calling.
pub fn load_rules(rules: Vec<Arc<Rule>>) {
    let mut by_resource = RuleMap::new();
    for rule in rules {
        by_resource.entry(rule.resource.clone()).or_default().insert(rule);
    }

    let mut loaded = LOADED_RULES.lock().unwrap();
    if *loaded == by_resource {
        logging::info!("[Isolation] load_rules called with the currently active rule set, skipping.");
        return;
    }

    let mut active = RuleMap::with_capacity(by_resource.len());
    for (res, rules) in &by_resource {
        let valid = sift_valid(rules, "load_rules");
        if !valid.is_empty() {
            active.insert(res.clone(), valid);
        }
    }

    let start = utils::curr_time_nanos();
    *ACTIVE_RULES.write().unwrap() = active;
    *loaded = by_resource;

    logging::debug!(
        "[Isolation load_rules] Time statistic(ns) for updating isolation rules, time cost {:?}",
        utils::curr_time_nanos() - start
    );
    logging::info!("[Isolation] isolation rules loaded, rules {:?}", *ACTIVE_RULES.read().unwrap());
}

/// Replaces the isolation rules bound to one resource, leaving every other
/// resource's rules untouched.
///
/// Acquires locks on `LOADED_RULES` and `ACTIVE_RULES`; release any locks
/// you hold on them before calling.
pub fn load_rules_of_resource(res: &String, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let rules: HashSet<_> = rules.into_iter().collect();

    if rules.is_empty() {
        clear_rules_of_resource(res);
        logging::info!("[Isolation] cleared resource-level rules, resource {}", res);
        return Ok(true);
    }

    if LOADED_RULES.lock().unwrap().get(res).unwrap_or(&HashSet::new()) == &rules {
        logging::info!(
            "[Isolation] load_rules_of_resource called with the currently active rules for {}, skipping.",
            res
        );
        return Ok(false);
    }

    let valid = sift_valid(&rules, "load_rules_of_resource");
    let valid_desc = format!("{:?}", &valid);
    let start = utils::curr_time_nanos();
    if valid.is_empty() {
        ACTIVE_RULES.write().unwrap().remove(res);
    } else {
        ACTIVE_RULES.write().unwrap().insert(res.clone(), valid);
    }
    LOADED_RULES.lock().unwrap().insert(res.clone(), rules);

    logging::debug!(
        "[Isolation load_rules_of_resource] Time statistic(ns) for updating isolation rules, time cost {:?}",
        utils::curr_time_nanos() - start
    );
    logging::info!(
        "[Isolation] isolation rules loaded for resource {}: {}",
        res,
        valid_desc
    );
    Ok(true)
}

/// Drops every loaded isolation rule, across all resources.
///
/// Acquires locks on `LOADED_RULES` and `ACTIVE_RULES`; release any locks
/// you hold on them before calling.
pub fn clear_rules() {
    LOADED_RULES.lock().unwrap().clear();
    ACTIVE_RULES.write().unwrap().clear();
}

/// Drops the isolation rules bound to a single resource.
///
/// Acquires locks on `LOADED_RULES` and `ACTIVE_RULES`; release any locks
/// you hold on them before calling.
pub fn clear_rules_of_resource(res: &String) {
    LOADED_RULES.lock().unwrap().remove(res);
    ACTIVE_RULES.write().unwrap().remove(res);
}
