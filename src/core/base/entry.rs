//! A live guard over one pass through the slot chain: created by
//! `EntryBuilder::build`, carries the shared context, and runs exit
//! handlers plus `SlotChain::exit` when the caller is done with the
//! resource.

use super::{ContextPtr, SlotChain};
use crate::logging;
use crate::{Error, Result};
use std::sync::{Arc, RwLock, Weak};
use std::vec::Vec;

type ExitHandler = Box<dyn Send + Sync + Fn(&SentinelEntry, ContextPtr) -> Result<()>>;

pub type EntryWeakPtr = Weak<RwLock<SentinelEntry>>;

/// A clonable, thread-safe handle to a `SentinelEntry` living behind an
/// `Arc<RwLock<_>>`. Every caller of this crate may hand an entry across
/// threads, so only this multi-threaded form is kept.
pub struct EntryStrongPtr(Arc<RwLock<SentinelEntry>>);

pub struct SentinelEntry {
    ctx: ContextPtr,
    exit_handlers: Vec<ExitHandler>,
    /// Each entry traverses a slot chain; the chain is shared by every
    /// concurrent entry for the resource, hence `Arc`.
    sc: Arc<SlotChain>,
}

impl SentinelEntry {
    pub fn new(ctx: ContextPtr, sc: Arc<SlotChain>) -> Self {
        SentinelEntry {
            ctx,
            exit_handlers: Vec::new(),
            sc,
        }
    }

    pub fn when_exit(&mut self, exit_handler: ExitHandler) {
        self.exit_handlers.push(exit_handler);
    }

    pub fn context(&self) -> &ContextPtr {
        &self.ctx
    }

    pub fn set_err(&self, err: Error) {
        self.ctx.write().unwrap().set_err(err);
    }

    pub fn exit(&self) {
        for handler in &self.exit_handlers {
            handler(self, self.ctx.clone())
                .map_err(|err: Error| {
                    logging::error!("ERROR: {}", err);
                })
                .unwrap();
        }
        self.sc.exit(self.ctx.clone());
    }
}

impl EntryStrongPtr {
    pub fn new(entry: Arc<RwLock<SentinelEntry>>) -> EntryStrongPtr {
        EntryStrongPtr(entry)
    }

    pub fn context(&self) -> ContextPtr {
        self.0.read().unwrap().context().clone()
    }

    pub fn set_err(&self, err: Error) {
        self.0.read().unwrap().set_err(err);
    }

    pub fn exit(&self) {
        self.0.read().unwrap().exit();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};

    static EXIT_FLAG: AtomicU8 = AtomicU8::new(0);

    fn exit_handler_mock(_entry: &SentinelEntry, _ctx: ContextPtr) -> Result<()> {
        EXIT_FLAG.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[test]
    fn exit() {
        let sc = Arc::new(SlotChain::new());
        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::default());
        let ctx = Arc::new(RwLock::new(ctx));
        let mut entry = SentinelEntry::new(ctx.clone(), sc);

        entry.when_exit(Box::new(exit_handler_mock));
        let entry = Arc::new(RwLock::new(entry));
        ctx.write().unwrap().set_entry(Arc::downgrade(&entry));
        entry.read().unwrap().exit();
        assert_eq!(EXIT_FLAG.load(Ordering::SeqCst), 1);
    }
}
