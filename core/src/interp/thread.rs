use crate::scope::ScopeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadKind {
    Main,
    Spawned,
}

/// Per-interpreter-thread state the jump protocol consults: which thread this is and
/// which scope activations are currently executing on it.
#[derive(Debug, Clone)]
pub struct ThreadContext {
    kind: ThreadKind,
    active: Vec<ScopeId>,
}

impl ThreadContext {
    pub fn main() -> Self {
        Self {
            kind: ThreadKind::Main,
            active: Vec::new(),
        }
    }

    pub fn spawned() -> Self {
        Self {
            kind: ThreadKind::Spawned,
            active: Vec::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> ThreadKind {
        self.kind
    }

    #[inline]
    pub fn is_main(&self) -> bool {
        self.kind == ThreadKind::Main
    }

    pub fn push(&mut self, scope: ScopeId) {
        self.active.push(scope);
    }

    pub fn pop(&mut self) -> Option<ScopeId> {
        self.active.pop()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.active.len()
    }

    /// Whether `scope` belongs to a frame that has not returned yet. Searches from the
    /// top since targets are usually close.
    pub fn is_active(&self, scope: ScopeId) -> bool {
        self.active.iter().rev().any(|id| *id == scope)
    }

    pub fn active(&self) -> &[ScopeId] {
        &self.active
    }
}
