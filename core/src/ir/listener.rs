//! Edit notifications for basic blocks.
//!
//! Tooling (profilers, debuggers, pass verifiers) subscribes to a block's bus and is
//! told about every insertion, removal and replacement after it has been applied.
//! A misbehaving listener can never veto or corrupt an edit: errors and panics are
//! logged and swallowed.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use tracing::warn;

use super::{Instr, Label};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Add,
    Remove,
    Update,
}

/// One applied edit. `prev` is the instruction just before `index` (`None` at index 0).
#[derive(Debug, Clone, Copy)]
pub struct InstrEvent<'a> {
    pub block: Label,
    pub old: Option<&'a Instr>,
    pub new: Option<&'a Instr>,
    pub prev: Option<&'a Instr>,
    pub index: usize,
    pub kind: EditKind,
}

pub trait InstrListener: Send + Sync {
    fn on_edit(&self, event: &InstrEvent<'_>) -> anyhow::Result<()>;
}

impl<F> InstrListener for F
where
    F: Fn(&InstrEvent<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn on_edit(&self, event: &InstrEvent<'_>) -> anyhow::Result<()> {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone, Default)]
pub struct ListenerBus {
    listeners: Vec<(ListenerId, Arc<dyn InstrListener>)>,
    next_id: u64,
}

impl ListenerBus {
    pub fn add(&mut self, listener: Arc<dyn InstrListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver `event` to every listener in registration order.
    pub fn notify(&self, event: &InstrEvent<'_>) {
        for (id, listener) in &self.listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_edit(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(target: "irk::ir", listener = id.0, block = %event.block, "listener failed: {:#}", err);
                }
                Err(payload) => {
                    let msg = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "<non-string panic>".to_string());
                    warn!(target: "irk::ir", listener = id.0, block = %event.block, "listener panicked: {}", msg);
                }
            }
        }
    }
}

impl fmt::Debug for ListenerBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBus").field("listeners", &self.listeners.len()).finish()
    }
}
