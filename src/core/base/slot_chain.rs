//! The pipeline every entry flows through: preparation, rule checks, then
//! statistics. A slot that panics is caught and turned into a block rather
//! than unwinding through the caller's call stack, and the catch is counted
//! so operators can see it happening.

use super::{BlockError, BlockType, ContextPtr, TokenResult, SLOT_INIT};
use crate::logging;
use crate::utils::AsAny;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counts slots that panicked and were caught by the chain, rather than
/// aborting the caller's request. Exposed so embedders can alert on it.
static INTERNAL_SLOT_PANIC_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn internal_slot_panic_count() -> u64 {
    INTERNAL_SLOT_PANIC_COUNT.load(Ordering::Relaxed)
}

/// `PartialOrd` is not object safe, so slots are kept sorted by this
/// integer instead: `SlotChain` sorts all three buckets (prepare slots,
/// rule-check slots, stat slots) in ascending order on insertion.
pub trait BaseSlot: Any + AsAny + Sync + Send {
    fn order(&self) -> u32 {
        0
    }
}

/// Runs before any rule check: initializes statistic structures, resource
/// nodes, and the like. All `StatPrepareSlot`s run in order.
pub trait StatPrepareSlot: BaseSlot {
    fn prepare(&self, ctx: ContextPtr) {
        let _ = ctx;
    }
}

/// A rule-based checking strategy. Every traffic-shaping rule kind plugs in
/// through this interface.
pub trait RuleCheckSlot: BaseSlot {
    fn check(&self, ctx: &ContextPtr) -> TokenResult {
        ctx.read().unwrap().result().clone()
    }
}

/// Counts custom business metrics: QPS, RT, concurrency, and so on.
pub trait StatSlot: BaseSlot {
    /// Invoked when every `StatPrepareSlot` and `RuleCheckSlot` passed.
    fn on_entry_pass(&self, ctx: ContextPtr) {
        let _ = ctx;
    }
    /// Invoked when a `RuleCheckSlot` blocked the entry.
    fn on_entry_blocked(&self, ctx: ContextPtr, block_error: Option<BlockError>) {
        let _ = (ctx, block_error);
    }
    /// Invoked when the chain exits for an entry that passed. Never called
    /// for a blocked entry.
    fn on_completed(&self, ctx: ContextPtr) {
        let _ = ctx;
    }
}

fn catch_slot_panic<F: FnOnce() -> R, R>(label: &str, f: F) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => Some(r),
        Err(payload) => {
            INTERNAL_SLOT_PANIC_COUNT.fetch_add(1, Ordering::Relaxed);
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic payload>".into());
            logging::error!("[SlotChain] slot panicked, slot {}, message {}", label, msg);
            None
        }
    }
}

/// Holds every installed slot, sorted within each bucket by `order()`.
pub struct SlotChain {
    stat_pres: Vec<Arc<dyn StatPrepareSlot>>,
    rule_checks: Vec<Arc<dyn RuleCheckSlot>>,
    stats: Vec<Arc<dyn StatSlot>>,
}

impl Default for SlotChain {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotChain {
    pub fn new() -> Self {
        Self {
            stat_pres: Vec::with_capacity(SLOT_INIT),
            rule_checks: Vec::with_capacity(SLOT_INIT),
            stats: Vec::with_capacity(SLOT_INIT),
        }
    }

    /// Called when the caller's request finished; runs `on_completed` on
    /// every stat slot unless the entry was blocked.
    pub fn exit(&self, ctx: ContextPtr) {
        {
            let c = ctx.read().unwrap();
            if c.entry().is_none() {
                logging::error!("SentinelEntry is nil in SlotChain.exit()");
                return;
            }
            if c.is_blocked() {
                return;
            }
        }
        for s in &self.stats {
            catch_slot_panic("stat_slot.on_completed", || s.on_completed(ctx.clone()));
        }
    }

    /// Adds a `StatPrepareSlot`, keeping the list sorted by `order()`. Not
    /// thread-safe: callers build the chain before sharing it.
    pub fn add_stat_prepare_slot(&mut self, s: Arc<dyn StatPrepareSlot>) {
        self.stat_pres.push(s);
        self.stat_pres.sort_unstable_by_key(|a| a.order());
    }

    pub fn add_rule_check_slot(&mut self, s: Arc<dyn RuleCheckSlot>) {
        self.rule_checks.push(s);
        self.rule_checks.sort_unstable_by_key(|a| a.order());
    }

    pub fn add_stat_slot(&mut self, s: Arc<dyn StatSlot>) {
        self.stats.push(s);
        self.stats.sort_unstable_by_key(|a| a.order());
    }

    /// Runs an entry through prepare, check, then stat slots in order.
    /// Returns the checking result. A slot that panics is caught, logged,
    /// counted, and treated as if it had blocked the entry with
    /// `BlockType::Other(0)` rather than unwinding into the caller.
    pub fn entry(&self, ctx: ContextPtr) -> TokenResult {
        for s in &self.stat_pres {
            catch_slot_panic("stat_prepare_slot.prepare", || s.prepare(ctx.clone()));
        }

        ctx.write().unwrap().reset_result_to_pass();
        for s in &self.rule_checks {
            let res = catch_slot_panic("rule_check_slot.check", || s.check(&ctx))
                .unwrap_or_else(|| TokenResult::new_blocked(BlockType::Other(0)));
            if res.is_blocked() {
                ctx.write().unwrap().set_result(res);
                break;
            }
        }

        let result = ctx.read().unwrap().result().clone();
        for s in &self.stats {
            if result.is_pass() {
                catch_slot_panic("stat_slot.on_entry_pass", || s.on_entry_pass(ctx.clone()));
            } else {
                let block_err = result.block_err();
                catch_slot_panic("stat_slot.on_entry_blocked", || {
                    s.on_entry_blocked(ctx.clone(), block_err)
                });
            }
        }
        result
    }
}

#[cfg(test)]
pub(crate) use test::aggregation::{MockRuleCheckSlot, MockStatPrepareSlot, MockStatSlot};

#[cfg(test)]
mod test {
    use super::super::{
        EntryContext, MockStatNode, ResourceType, ResourceWrapper, SentinelEntry, TrafficType,
    };
    use super::*;
    use std::sync::RwLock;

    mod single {
        use super::*;
        struct StatPrepareSlotMock {
            pub(self) name: String,
            pub(self) order: u32,
        }
        impl BaseSlot for StatPrepareSlotMock {
            fn order(&self) -> u32 {
                self.order
            }
        }
        impl StatPrepareSlot for StatPrepareSlotMock {}
        #[test]
        fn add_stat_prepare_slot() {
            let mut sc = SlotChain::new();
            for base in &[2, 1, 3, 0, 4] {
                for i in 0..10 {
                    let order = base * 10 + i;
                    sc.add_stat_prepare_slot(Arc::new(StatPrepareSlotMock {
                        name: format!("mock{}", order),
                        order,
                    }))
                }
            }
            assert_eq!(sc.stat_pres.len(), 50);
            for (i, s) in sc.stat_pres.into_iter().enumerate() {
                assert_eq!(
                    s.clone()
                        .as_any_arc()
                        .downcast::<StatPrepareSlotMock>()
                        .unwrap()
                        .name,
                    format!("mock{}", i)
                );
            }
        }

        struct RuleCheckSlotMock {
            name: String,
            order: u32,
        }
        impl BaseSlot for RuleCheckSlotMock {
            fn order(&self) -> u32 {
                self.order
            }
        }
        impl RuleCheckSlot for RuleCheckSlotMock {}
        #[test]
        fn add_rule_check_slot() {
            let mut sc = SlotChain::new();
            for base in &[2, 1, 3, 0, 4] {
                for i in 0..10 {
                    let order = base * 10 + i;
                    sc.add_rule_check_slot(Arc::new(RuleCheckSlotMock {
                        name: format!("mock{}", order),
                        order,
                    }))
                }
            }
            assert_eq!(sc.rule_checks.len(), 50);
            for (i, s) in sc.rule_checks.into_iter().enumerate() {
                assert_eq!(
                    s.clone()
                        .as_any_arc()
                        .downcast::<RuleCheckSlotMock>()
                        .unwrap()
                        .name,
                    format!("mock{}", i)
                );
            }
        }

        struct StatSlotMock {
            name: String,
            order: u32,
        }
        impl BaseSlot for StatSlotMock {
            fn order(&self) -> u32 {
                self.order
            }
        }
        impl StatSlot for StatSlotMock {}
        #[test]
        fn add_stat_slot() {
            let mut sc = SlotChain::new();
            for base in &[2, 1, 3, 0, 4] {
                for i in 0..10 {
                    let order = base * 10 + i;
                    sc.add_stat_slot(Arc::new(StatSlotMock {
                        name: format!("mock{}", order),
                        order,
                    }))
                }
            }
            assert_eq!(sc.stats.len(), 50);
            for (i, s) in sc.stats.into_iter().enumerate() {
                assert_eq!(
                    s.clone()
                        .as_any_arc()
                        .downcast::<StatSlotMock>()
                        .unwrap()
                        .name,
                    format!("mock{}", i)
                );
            }
        }
    }

    pub(crate) mod aggregation {
        use super::*;
        use mockall::*;

        mock! {
            pub(crate) StatPrepareSlot {}
            impl BaseSlot for StatPrepareSlot {}
            impl StatPrepareSlot for StatPrepareSlot { fn prepare(&self, ctx: ContextPtr); }
        }

        mock! {
            pub(crate) RuleCheckSlot {}
            impl BaseSlot for RuleCheckSlot {}
            impl RuleCheckSlot for RuleCheckSlot { fn check(&self, ctx: &ContextPtr) -> TokenResult; }
        }

        mock! {
            pub(crate) StatSlot {}
            impl BaseSlot for StatSlot {}
            impl StatSlot for StatSlot {
                fn on_entry_pass(&self, ctx: ContextPtr);
                fn on_entry_blocked(&self, ctx: ContextPtr, block_error: Option<BlockError>);
                fn on_completed(&self, ctx: ContextPtr);
            }
        }

        fn build_ctx() -> ContextPtr {
            let mut ctx = EntryContext::new();
            let rw = ResourceWrapper::new("abc".into(), ResourceType::Common, TrafficType::Inbound);
            ctx.set_resource(rw);
            ctx.set_stat_node(Arc::new(MockStatNode::new()));
            Arc::new(RwLock::new(ctx))
        }

        #[test]
        fn pass_and_exit() {
            let mut ps = Arc::new(MockStatPrepareSlot::new());
            let mut rcs1 = Arc::new(MockRuleCheckSlot::new());
            let mut rcs2 = Arc::new(MockRuleCheckSlot::new());
            let mut ssm = Arc::new(MockStatSlot::new());
            let mut seq = Sequence::new();
            Arc::get_mut(&mut ps)
                .unwrap()
                .expect_prepare()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut rcs1)
                .unwrap()
                .expect_check()
                .once()
                .in_sequence(&mut seq)
                .returning(|_ctx| TokenResult::new_pass());
            Arc::get_mut(&mut rcs2)
                .unwrap()
                .expect_check()
                .once()
                .in_sequence(&mut seq)
                .returning(|_ctx| TokenResult::new_pass());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_pass()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_blocked()
                .never()
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_completed()
                .once()
                .in_sequence(&mut seq)
                .return_const(());

            let mut sc = SlotChain::new();
            sc.add_stat_prepare_slot(ps);
            sc.add_rule_check_slot(rcs1);
            sc.add_rule_check_slot(rcs2);
            sc.add_stat_slot(ssm);
            let sc = Arc::new(sc);

            let ctx = build_ctx();
            let entry = Arc::new(RwLock::new(SentinelEntry::new(ctx.clone(), sc.clone())));
            ctx.write().unwrap().set_entry(Arc::downgrade(&entry));

            let r = sc.entry(ctx.clone());
            assert!(r.is_pass(), "should pass but blocked");
            sc.exit(ctx);
        }

        #[test]
        fn block() {
            let mut ps = Arc::new(MockStatPrepareSlot::new());
            let mut rcs1 = Arc::new(MockRuleCheckSlot::new());
            let mut rcs2 = Arc::new(MockRuleCheckSlot::new());
            let mut ssm = Arc::new(MockStatSlot::new());

            let mut seq = Sequence::new();
            Arc::get_mut(&mut ps)
                .unwrap()
                .expect_prepare()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut rcs1)
                .unwrap()
                .expect_check()
                .once()
                .in_sequence(&mut seq)
                .returning(|_ctx| TokenResult::new_pass());
            Arc::get_mut(&mut rcs2)
                .unwrap()
                .expect_check()
                .once()
                .in_sequence(&mut seq)
                .returning(|_ctx| TokenResult::new_blocked(BlockType::Flow));
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_pass()
                .never()
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_entry_blocked()
                .once()
                .in_sequence(&mut seq)
                .return_const(());
            Arc::get_mut(&mut ssm)
                .unwrap()
                .expect_on_completed()
                .never()
                .return_const(());

            let mut sc = SlotChain::new();
            sc.add_stat_prepare_slot(ps);
            sc.add_rule_check_slot(rcs1);
            sc.add_rule_check_slot(rcs2);
            sc.add_stat_slot(ssm);
            let sc = Arc::new(sc);

            let ctx = build_ctx();
            let entry = Arc::new(RwLock::new(SentinelEntry::new(ctx.clone(), sc.clone())));
            ctx.write().unwrap().set_entry(Arc::downgrade(&entry));

            let r = sc.entry(ctx.clone());
            assert!(r.is_blocked(), "should blocked but pass");
            assert_eq!(
                BlockType::Flow,
                r.block_err().unwrap().block_type(),
                "should blocked by BlockType Flow"
            );
            sc.exit(ctx);
        }

        struct StatPrepareSlotPanicMock {}

        impl BaseSlot for StatPrepareSlotPanicMock {}

        impl StatPrepareSlot for StatPrepareSlotPanicMock {
            fn prepare(&self, _ctx: ContextPtr) {
                panic!("sentinel internal panic for test");
            }
        }

        #[test]
        fn panicking_slot_is_caught_and_counted() {
            let before = internal_slot_panic_count();
            let ps = Arc::new(StatPrepareSlotPanicMock {});
            let mut rcs1 = Arc::new(MockRuleCheckSlot::new());
            Arc::get_mut(&mut rcs1)
                .unwrap()
                .expect_check()
                .once()
                .returning(|_ctx| TokenResult::new_pass());

            let mut sc = SlotChain::new();
            sc.add_stat_prepare_slot(ps);
            sc.add_rule_check_slot(rcs1);
            let sc = Arc::new(sc);

            let ctx = build_ctx();
            let entry = Arc::new(RwLock::new(SentinelEntry::new(ctx.clone(), sc.clone())));
            ctx.write().unwrap().set_entry(Arc::downgrade(&entry));

            let r = sc.entry(ctx);
            assert!(r.is_pass(), "a panicking prepare slot should not block downstream checks");
            assert_eq!(internal_slot_panic_count(), before + 1);
        }
    }
}
