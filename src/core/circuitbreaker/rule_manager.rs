use super::*;
use crate::{base::rule::SentinelRule, logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// Builds a breaker instance for a rule, optionally reusing an existing
/// statistic structure from a previous incarnation of the same rule.
pub type BreakerGenFn =
    dyn Send + Sync + Fn(Arc<Rule>, Option<Arc<CounterLeapArray>>) -> Arc<dyn CircuitBreakerTrait>;

pub type RuleMap = HashMap<String, HashSet<Arc<Rule>>>;

lazy_static! {
    static ref BREAKER_GENERATORS: RwLock<HashMap<BreakerStrategy, Box<BreakerGenFn>>> = {
        let mut m: HashMap<BreakerStrategy, Box<BreakerGenFn>> = HashMap::new();
        m.insert(BreakerStrategy::SlowRequestRatio, Box::new(new_breaker_for));
        m.insert(BreakerStrategy::ErrorCount, Box::new(new_breaker_for));
        m.insert(BreakerStrategy::ErrorRatio, Box::new(new_breaker_for));
        RwLock::new(m)
    };
    static ref STATE_CHANGE_LISTENERS: Mutex<Vec<Arc<dyn StateChangeListener>>> =
        Mutex::new(Vec::new());
    static ref RESOURCE_BREAKERS: RwLock<HashMap<String, Vec<Arc<dyn CircuitBreakerTrait>>>> =
        RwLock::new(HashMap::new());
    static ref LOADED_RULES: Mutex<RuleMap> = Mutex::new(HashMap::new());
    static ref VALID_RULES: RwLock<RuleMap> = RwLock::new(HashMap::new());
}

pub fn state_change_listeners() -> &'static Mutex<Vec<Arc<dyn StateChangeListener>>> {
    &STATE_CHANGE_LISTENERS
}

/// The default generator for the three built-in strategies: constructs the
/// matching breaker type, falling back to a fresh statistic structure (with
/// a warning) if asked to reuse one that turns out not to be a
/// `CounterLeapArray`.
fn new_breaker_for(
    rule: Arc<Rule>,
    stat: Option<Arc<CounterLeapArray>>,
) -> Arc<dyn CircuitBreakerTrait> {
    match (rule.strategy, stat) {
        (BreakerStrategy::SlowRequestRatio, Some(stat)) => {
            Arc::new(SlowRtBreaker::new_with_stat(rule, stat))
        }
        (BreakerStrategy::SlowRequestRatio, None) => Arc::new(SlowRtBreaker::new(rule)),
        (BreakerStrategy::ErrorCount, Some(stat)) => {
            Arc::new(ErrorCountBreaker::new_with_stat(rule, stat))
        }
        (BreakerStrategy::ErrorCount, None) => Arc::new(ErrorCountBreaker::new(rule)),
        (BreakerStrategy::ErrorRatio, Some(stat)) => {
            Arc::new(ErrorRatioBreaker::new_with_stat(rule, stat))
        }
        (BreakerStrategy::ErrorRatio, None) => Arc::new(ErrorRatioBreaker::new(rule)),
        (BreakerStrategy::Custom(_), _) => unreachable!(
            "a custom strategy must be registered via set_circuit_breaker_generator, not dispatched here"
        ),
    }
}

/// Returns the circuit breaking rules currently bound to a resource.
///
/// Acquires a read lock on `VALID_RULES`; release any write lock you hold
/// on it before calling.
pub fn get_rules_of_resource(res: &String) -> Vec<Arc<Rule>> {
    let valid_rules = VALID_RULES.read().unwrap();
    let empty = HashSet::new();
    valid_rules
        .get(res)
        .unwrap_or(&empty)
        .iter()
        .map(Arc::clone)
        .collect()
}

/// Returns every circuit breaking rule currently loaded, across all resources.
///
/// Acquires a read lock on `VALID_RULES`; release any write lock you hold
/// on it before calling.
pub fn get_rules() -> Vec<Arc<Rule>> {
    VALID_RULES
        .read()
        .unwrap()
        .values()
        .flatten()
        .map(Arc::clone)
        .collect()
}

/// Drops every loaded rule and breaker, across all resources.
///
/// Acquires locks on `VALID_RULES`, `LOADED_RULES` and `RESOURCE_BREAKERS`;
/// release any locks you hold on them before calling.
pub fn clear_rules() {
    LOADED_RULES.lock().unwrap().clear();
    VALID_RULES.write().unwrap().clear();
    RESOURCE_BREAKERS.write().unwrap().clear();
}

/// Adds a single rule without disturbing the other rules already bound to
/// its resource. A no-op if an identical rule is already loaded.
pub fn append_rule(rule: Arc<Rule>) -> bool {
    if LOADED_RULES
        .lock()
        .unwrap()
        .get(&rule.resource)
        .unwrap_or(&HashSet::new())
        .contains(&rule)
    {
        return false;
    }
    match rule.is_valid() {
        Ok(_) => {
            LOADED_RULES
                .lock()
                .unwrap()
                .entry(rule.resource.clone())
                .or_default()
                .insert(Arc::clone(&rule));
            VALID_RULES
                .write()
                .unwrap()
                .entry(rule.resource.clone())
                .or_default()
                .insert(Arc::clone(&rule));
        }
        Err(err) => logging::warn!(
            "[CircuitBreaker append_rule] Ignoring invalid circuit breaking rule {:?}, reason: {:?}",
            rule,
            err
        ),
    }
    let mut empty = Vec::new();
    let new_breakers = rebuild_breakers_for(
        &rule.resource,
        VALID_RULES.read().unwrap().get(&rule.resource).unwrap(),
        RESOURCE_BREAKERS
            .write()
            .unwrap()
            .get_mut(&rule.resource)
            .unwrap_or(&mut empty),
    );
    if !new_breakers.is_empty() {
        RESOURCE_BREAKERS
            .write()
            .unwrap()
            .entry(rule.resource.clone())
            .or_default()
            .push(Arc::clone(&new_breakers[0]));
    }
    true
}

/// Replaces every loaded circuit breaking rule with `rules`.
///
/// Returns whether anything actually changed. Acquires locks on
/// `LOADED_RULES`, `VALID_RULES` and `RESOURCE_BREAKERS`; release any locks
/// you hold on them before calling.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        rule_map.entry(rule.resource.clone()).or_default().insert(rule);
    }

    let mut loaded = LOADED_RULES.lock().unwrap();
    if *loaded == rule_map {
        logging::info!(
            "[CircuitBreaker] Loaded rules are identical to the current set, skipping reload."
        );
        return false;
    }

    let mut valid_rules_map = HashMap::with_capacity(rule_map.len());
    for (res, rules) in &rule_map {
        let mut valid_rules = HashSet::new();
        for rule in rules {
            match rule.is_valid() {
                Ok(_) => {
                    valid_rules.insert(Arc::clone(rule));
                }
                Err(err) => logging::warn!(
                    "[CircuitBreaker load_rules] Ignoring invalid circuit breaking rule {:?}, reason: {:?}",
                    rule,
                    err
                ),
            }
        }
        if !valid_rules.is_empty() {
            valid_rules_map.insert(res.clone(), valid_rules);
        }
    }

    let start = utils::curr_time_nanos();
    let mut breakers = RESOURCE_BREAKERS.write().unwrap();
    let mut new_breakers = HashMap::with_capacity(valid_rules_map.len());

    for (res, rules) in valid_rules_map.iter() {
        let mut empty = Vec::new();
        let res_breakers =
            rebuild_breakers_for(res, rules, breakers.get_mut(res).unwrap_or(&mut empty));
        if !res_breakers.is_empty() {
            new_breakers.insert(res.clone(), res_breakers);
        }
    }

    if valid_rules_map.is_empty() {
        logging::info!("[CircuitBreaker] Circuit breaking rules were cleared")
    } else {
        logging::info!(
            "[CircuitBreaker] Circuit breaking rules were loaded: {:?}",
            valid_rules_map.values()
        )
    }

    *VALID_RULES.write().unwrap() = valid_rules_map;
    *breakers = new_breakers;
    *loaded = rule_map;
    drop(loaded);
    drop(breakers);
    logging::debug!(
        "[CircuitBreaker load_rules] Time statistic(ns) for updating circuit breaking rules, time cost {}",
        utils::curr_time_nanos() - start
    );

    true
}

/// Replaces the circuit breaking rules bound to a single resource, leaving
/// every other resource's rules untouched.
///
/// Returns whether anything actually changed. Acquires locks on
/// `LOADED_RULES`, `VALID_RULES` and `RESOURCE_BREAKERS`; release any locks
/// you hold on them before calling.
pub fn load_rules_of_resource(res: &String, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let rules: HashSet<_> = rules.into_iter().collect();
    let mut loaded = LOADED_RULES.lock().unwrap();
    let mut breakers = RESOURCE_BREAKERS.write().unwrap();

    if rules.is_empty() {
        loaded.remove(res);
        breakers.remove(res);
        VALID_RULES.write().unwrap().remove(res);
        logging::info!("[CircuitBreaker] cleared resource-level rules, resource {}", res);
        return Ok(true);
    }
    if loaded.get(res).unwrap_or(&HashSet::new()) == &rules {
        logging::info!(
            "[CircuitBreaker] resource-level rules are identical to the current set, skipping reload."
        );
        return Ok(false);
    }

    let mut valid_rules = HashSet::with_capacity(res.len());
    for rule in &rules {
        match rule.is_valid() {
            Ok(_) => {
                valid_rules.insert(Arc::clone(rule));
            }
            Err(err) => logging::warn!(
                "[CircuitBreaker load_rules_of_resource] Ignoring invalid circuit breaking rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }

    let start = utils::curr_time_nanos();
    let mut empty = Vec::new();
    let old_breakers = breakers.get_mut(res).unwrap_or(&mut empty);
    let valid_rules_desc = format!("{:?}", &valid_rules);
    let new_breakers = rebuild_breakers_for(res, &valid_rules, old_breakers);

    if new_breakers.is_empty() {
        breakers.remove(res);
        VALID_RULES.write().unwrap().remove(res);
    } else {
        breakers.insert(res.clone(), new_breakers);
        VALID_RULES.write().unwrap().insert(res.clone(), valid_rules);
    }

    loaded.insert(res.clone(), rules);
    logging::debug!(
        "[CircuitBreaker load_rules_of_resource] Time statistic(ns) for updating circuit breaking rules, time cost {}",
        utils::curr_time_nanos() - start
    );
    logging::info!(
        "[CircuitBreaker] loaded resource-level rules, resource: {}, rules: {}",
        res,
        valid_rules_desc
    );

    Ok(true)
}

/// Returns the live breakers guarding a resource.
///
/// Acquires a read lock on `RESOURCE_BREAKERS`; release any write lock you
/// hold on it before calling.
pub fn get_breakers_of_resource(resource: &String) -> Vec<Arc<dyn CircuitBreakerTrait>> {
    let breakers = RESOURCE_BREAKERS.read().unwrap();
    let empty = Vec::new();
    breakers
        .get(resource)
        .unwrap_or(&empty)
        .iter()
        .map(Arc::clone)
        .collect()
}

/// Registers listeners to be notified on every breaker state transition,
/// across every resource.
pub fn register_state_change_listeners(mut listeners: Vec<Arc<dyn StateChangeListener>>) {
    if listeners.is_empty() {
        return;
    }
    STATE_CHANGE_LISTENERS.lock().unwrap().append(&mut listeners);
}

/// Drops every registered state-change listener.
pub fn clear_state_change_listeners() {
    STATE_CHANGE_LISTENERS.lock().unwrap().clear();
}

/// Overrides the breaker constructor used for a given strategy. Only the
/// `Custom` strategy may be overridden; the three built-in strategies are
/// always served by `new_breaker_for`.
pub fn set_circuit_breaker_generator(
    strategy: BreakerStrategy,
    generator: Box<BreakerGenFn>,
) -> Result<()> {
    match strategy {
        BreakerStrategy::Custom(_) => {
            BREAKER_GENERATORS.write().unwrap().insert(strategy, generator);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default circuit breakers are not allowed to be modified.",
        )),
    }
}

pub fn remove_circuit_breaker_generator(strategy: &BreakerStrategy) -> Result<()> {
    match strategy {
        BreakerStrategy::Custom(_) => {
            BREAKER_GENERATORS.write().unwrap().remove(strategy);
            Ok(())
        }
        _ => Err(Error::msg(
            "Default circuit breakers are not allowed to be modified.",
        )),
    }
}

/// Drops every rule and breaker bound to a single resource.
pub fn clear_rules_of_resource(res: &String) {
    VALID_RULES.write().unwrap().remove(res);
    LOADED_RULES.lock().unwrap().remove(res);
    RESOURCE_BREAKERS.write().unwrap().remove(res);
}

/// Finds, among a resource's existing breakers, one equal to `rule` (so it
/// can be kept as-is) and, failing that, one whose statistic window `rule`
/// could still reuse (so a fresh breaker doesn't have to start from empty
/// buckets). Returns `(usize::MAX, usize::MAX)` for either slot not found.
fn find_reusable_breaker(
    rule: &Arc<Rule>,
    existing: &[Arc<dyn CircuitBreakerTrait>],
) -> (usize, usize) {
    let mut exact_match = usize::MAX;
    let mut stat_reusable = usize::MAX;

    for (idx, breaker) in existing.iter().enumerate() {
        let bound = breaker.bound_rule();
        if bound == rule {
            exact_match = idx;
            break;
        }
        if stat_reusable == usize::MAX && bound.is_stat_reusable(rule) {
            stat_reusable = idx;
        }
    }
    (exact_match, stat_reusable)
}

/// Builds the breaker set for a resource from its rules, reusing breakers
/// (or at least their statistic structures) from `existing` wherever
/// possible. `existing` is drained of anything it donates.
fn rebuild_breakers_for(
    res: &String,
    rules: &HashSet<Arc<Rule>>,
    existing: &mut Vec<Arc<dyn CircuitBreakerTrait>>,
) -> Vec<Arc<dyn CircuitBreakerTrait>> {
    let mut built = Vec::with_capacity(rules.len());
    for rule in rules {
        if res != &rule.resource {
            logging::error!(
                "[CircuitBreaker rebuild_breakers_for] unmatched resource name, expected {}, got {}, rule: {:?}",
                res, rule.resource, rule
            );
            continue;
        }

        let (exact_match, stat_reusable) = find_reusable_breaker(rule, existing);

        if exact_match != usize::MAX {
            built.push(Arc::clone(&existing[exact_match]));
            existing.remove(exact_match);
            continue;
        }

        let generators = BREAKER_GENERATORS.read().unwrap();
        let generator = match generators.get(&rule.strategy) {
            Some(g) => g,
            None => {
                logging::error!(
                    "[CircuitBreaker rebuild_breakers_for] unsupported circuit breaking strategy, ignoring rule {:?}",
                    rule
                );
                continue;
            }
        };

        let breaker = if stat_reusable != usize::MAX {
            generator(rule.clone(), Some(Arc::clone(existing[stat_reusable].stat())))
        } else {
            generator(rule.clone(), None)
        };

        if stat_reusable != usize::MAX {
            existing.remove(stat_reusable);
        }
        built.push(breaker);
    }
    built
}
