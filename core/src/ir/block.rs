use std::{fmt, sync::Arc};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::listener::{EditKind, InstrEvent, InstrListener, ListenerBus, ListenerId};
use super::{Instr, Label};

/// Straight-line run of instructions. Execution enters at index 0 and leaves through a
/// terminator or by falling through to the next block in layout order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    label: Label,
    #[serde(default)]
    instrs: Vec<Instr>,
    /// Raised errors inside this block transfer control here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rescue: Option<Label>,
    #[serde(skip)]
    listeners: ListenerBus,
}

impl BasicBlock {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            instrs: Vec::new(),
            rescue: None,
            listeners: ListenerBus::default(),
        }
    }

    pub fn with_rescue(mut self, rescue: Option<Label>) -> Self {
        self.rescue = rescue;
        self
    }

    #[inline]
    pub fn label(&self) -> Label {
        self.label
    }

    #[inline]
    pub fn rescue(&self) -> Option<Label> {
        self.rescue
    }

    pub fn set_rescue(&mut self, rescue: Option<Label>) {
        self.rescue = rescue;
    }

    #[inline]
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn add_listener(&mut self, listener: Arc<dyn InstrListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listeners(&self) -> &ListenerBus {
        &self.listeners
    }

    fn notify(&self, kind: EditKind, index: usize, old: Option<&Instr>) {
        if self.listeners.is_empty() {
            return;
        }
        let new = match kind {
            EditKind::Remove => None,
            EditKind::Add | EditKind::Update => self.instrs.get(index),
        };
        let prev = index.checked_sub(1).and_then(|i| self.instrs.get(i));
        self.listeners.notify(&InstrEvent {
            block: self.label,
            old,
            new,
            prev,
            index,
            kind,
        });
    }

    pub fn push(&mut self, instr: Instr) {
        self.instrs.push(instr);
        self.notify(EditKind::Add, self.instrs.len() - 1, None);
    }

    pub fn insert(&mut self, index: usize, instr: Instr) -> Result<()> {
        if index > self.instrs.len() {
            bail!("insert at {} past end of block {} (len {})", index, self.label, self.instrs.len());
        }
        self.instrs.insert(index, instr);
        self.notify(EditKind::Add, index, None);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Instr> {
        if index >= self.instrs.len() {
            bail!("remove at {} out of bounds in block {} (len {})", index, self.label, self.instrs.len());
        }
        let old = self.instrs.remove(index);
        self.notify(EditKind::Remove, index, Some(&old));
        Ok(old)
    }

    pub fn replace(&mut self, index: usize, instr: Instr) -> Result<Instr> {
        let Some(slot) = self.instrs.get_mut(index) else {
            bail!("replace at {} out of bounds in block {} (len {})", index, self.label, self.instrs.len());
        };
        let old = std::mem::replace(slot, instr);
        self.notify(EditKind::Update, index, Some(&old));
        Ok(old)
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rescue {
            Some(rescue) => writeln!(f, "{}: (rescue {})", self.label, rescue)?,
            None => writeln!(f, "{}:", self.label)?,
        }
        for (idx, instr) in self.instrs.iter().enumerate() {
            writeln!(f, "  {:>3}  {}", idx, instr)?;
        }
        Ok(())
    }
}
