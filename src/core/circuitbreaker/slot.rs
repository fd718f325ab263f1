use super::*;
use crate::base::{BaseSlot, BlockType, ContextPtr, EntryContext, RuleCheckSlot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 5000;

/// The `RuleCheckSlot` that runs every circuit breaker bound to a resource.
pub struct CircuitBreakerSlot {}

lazy_static! {
    pub static ref DEFAULT_CIRCUIT_BREAKER_SLOT: Arc<CircuitBreakerSlot> =
        Arc::new(CircuitBreakerSlot {});
}

pub fn default_slot() -> Arc<CircuitBreakerSlot> {
    DEFAULT_CIRCUIT_BREAKER_SLOT.clone()
}

impl BaseSlot for CircuitBreakerSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for CircuitBreakerSlot {
    fn check(&self, ctx_ptr: &ContextPtr) -> TokenResult {
        let mut ctx = ctx_ptr.write().unwrap();
        let res_name = ctx.resource().name().clone();
        if res_name.is_empty() {
            return ctx.result().clone();
        }
        if first_tripped_rule(&ctx, &res_name).is_some() {
            ctx.set_result(TokenResult::new_blocked_with_msg(
                BlockType::CircuitBreaking,
                "circuit breaker check blocked".into(),
            ));
        }
        ctx.result().clone()
    }
}

/// Runs every breaker bound to `res_name` and returns the rule behind the
/// first one that denies the request, or `None` if they all let it through.
fn first_tripped_rule(ctx: &EntryContext, res_name: &String) -> Option<Arc<Rule>> {
    get_breakers_of_resource(res_name)
        .into_iter()
        .find(|breaker| !breaker.try_pass(ctx))
        .map(|breaker| Arc::clone(breaker.bound_rule()))
}
