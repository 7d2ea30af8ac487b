use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;

use super::StaticScope;
use crate::val::Val;

/// Number of slots with dedicated `get_N` / `set_N` accessors.
pub const SPECIALIZED_SLOTS: usize = 10;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one scope activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    fn fresh() -> Self {
        ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Slot access that the compiler should never have emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    IndexOutOfBounds { scope: String, index: usize, size: usize },
    MissingParent { scope: String, depth: usize },
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::IndexOutOfBounds { scope, index, size } => {
                write!(f, "scope '{}' only supports {} variables (index {})", scope, size, index)
            }
            ScopeError::MissingParent { scope, depth } => {
                write!(f, "scope '{}' has no parent at depth {}", scope, depth)
            }
        }
    }
}

impl std::error::Error for ScopeError {}

/// Runtime instance of a [`StaticScope`]: one activation's local variable slots.
pub struct DynamicScope {
    id: ScopeId,
    static_scope: Arc<StaticScope>,
    parent: Option<Arc<DynamicScope>>,
    lambda: bool,
    /// Set while a frame executes in this activation, on whichever thread runs it.
    live: AtomicBool,
    // `None` marks a slot that was never assigned
    slots: Mutex<Box<[Option<Val>]>>,
}

impl DynamicScope {
    pub fn new(static_scope: Arc<StaticScope>, parent: Option<Arc<DynamicScope>>) -> Arc<Self> {
        Self::build(static_scope, parent, false)
    }

    /// Activation created for a lambda invocation.
    pub fn new_lambda(static_scope: Arc<StaticScope>, parent: Option<Arc<DynamicScope>>) -> Arc<Self> {
        Self::build(static_scope, parent, true)
    }

    fn build(static_scope: Arc<StaticScope>, parent: Option<Arc<DynamicScope>>, lambda: bool) -> Arc<Self> {
        let size = static_scope.variable_count();
        Arc::new(Self {
            id: ScopeId::fresh(),
            static_scope,
            parent,
            lambda,
            live: AtomicBool::new(false),
            slots: Mutex::new(vec![None; size].into_boxed_slice()),
        })
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    #[inline]
    pub fn static_scope(&self) -> &Arc<StaticScope> {
        &self.static_scope
    }

    #[inline]
    pub fn parent(&self) -> Option<&Arc<DynamicScope>> {
        self.parent.as_ref()
    }

    #[inline]
    pub fn is_lambda(&self) -> bool {
        self.lambda
    }

    /// Whether a frame is currently executing in this activation. Unlike
    /// `ThreadContext::is_active` this sees frames on every thread.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Mark the activation live until the returned guard drops.
    pub fn enter(self: &Arc<Self>) -> LiveGuard {
        self.live.store(true, Ordering::Release);
        LiveGuard(Arc::clone(self))
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.slots.lock().len()
    }

    /// Number of parent links above this scope.
    pub fn depth_to_root(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent.as_deref();
        while let Some(scope) = cursor {
            depth += 1;
            cursor = scope.parent.as_deref();
        }
        depth
    }

    fn ancestor(&self, depth: usize) -> Result<&DynamicScope, ScopeError> {
        let mut current = self;
        for _ in 0..depth {
            current = current.parent.as_deref().ok_or_else(|| ScopeError::MissingParent {
                scope: self.static_scope.name().to_string(),
                depth,
            })?;
        }
        Ok(current)
    }

    fn out_of_bounds(&self, index: usize, size: usize) -> ScopeError {
        ScopeError::IndexOutOfBounds {
            scope: self.static_scope.name().to_string(),
            index,
            size,
        }
    }

    /// Read slot `index` of the scope `depth` links up. Unassigned slots read as `nil`.
    pub fn get(&self, index: usize, depth: usize) -> Result<Val, ScopeError> {
        self.ancestor(depth)?.get_depth_zero(index)
    }

    pub fn set(&self, index: usize, depth: usize, value: Val) -> Result<(), ScopeError> {
        self.ancestor(depth)?.set_depth_zero(index, value)
    }

    #[inline]
    pub fn get_depth_zero(&self, index: usize) -> Result<Val, ScopeError> {
        let slots = self.slots.lock();
        match slots.get(index) {
            Some(slot) => Ok(slot.clone().unwrap_or_default()),
            None => Err(self.out_of_bounds(index, slots.len())),
        }
    }

    #[inline]
    pub fn set_depth_zero(&self, index: usize, value: Val) -> Result<(), ScopeError> {
        let mut slots = self.slots.lock();
        let size = slots.len();
        match slots.get_mut(index) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(self.out_of_bounds(index, size)),
        }
    }

    pub fn is_assigned(&self, index: usize, depth: usize) -> Result<bool, ScopeError> {
        let scope = self.ancestor(depth)?;
        let slots = scope.slots.lock();
        match slots.get(index) {
            Some(slot) => Ok(slot.is_some()),
            None => Err(scope.out_of_bounds(index, slots.len())),
        }
    }

    /// Snapshot of this scope's own slots.
    pub fn values(&self) -> Vec<Option<Val>> {
        self.slots.lock().to_vec()
    }

    /// Nearest scope (self included) a non-local `return` lands in.
    pub fn find_return_target(self: &Arc<Self>) -> Option<Arc<DynamicScope>> {
        let mut cursor = Some(self);
        while let Some(scope) = cursor {
            if scope.static_scope.is_return_target() {
                return Some(Arc::clone(scope));
            }
            cursor = scope.parent.as_ref();
        }
        None
    }

    /// Nearest lambda activation (self included) reachable through closure scopes only.
    /// Closures serving as method bodies do not count.
    pub fn find_containing_lambda(self: &Arc<Self>) -> Option<Arc<DynamicScope>> {
        let mut cursor = Some(self);
        while let Some(scope) = cursor {
            if !scope.static_scope.is_closure() {
                break;
            }
            if scope.lambda && !scope.static_scope.is_argument_scope() {
                return Some(Arc::clone(scope));
            }
            cursor = scope.parent.as_ref();
        }
        None
    }
}

/// Clears a scope's live flag when its frame finishes, including on unwind.
#[must_use = "the scope stops being live as soon as the guard drops"]
pub struct LiveGuard(Arc<DynamicScope>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.store(false, Ordering::Release);
    }
}

macro_rules! specialized_slot_accessors {
    ($(($get:ident, $set:ident, $idx:expr)),* $(,)?) => {
        impl DynamicScope {
            $(
                #[inline]
                pub fn $get(&self) -> Result<Val, ScopeError> {
                    self.get_depth_zero($idx)
                }

                #[inline]
                pub fn $set(&self, value: Val) -> Result<(), ScopeError> {
                    self.set_depth_zero($idx, value)
                }
            )*
        }
    };
}

specialized_slot_accessors!(
    (get_0, set_0, 0),
    (get_1, set_1, 1),
    (get_2, set_2, 2),
    (get_3, set_3, 3),
    (get_4, set_4, 4),
    (get_5, set_5, 5),
    (get_6, set_6, 6),
    (get_7, set_7, 7),
    (get_8, set_8, 8),
    (get_9, set_9, 9),
);

impl fmt::Debug for DynamicScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicScope")
            .field("id", &self.id)
            .field("scope", &self.static_scope.name())
            .field("lambda", &self.lambda)
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .finish()
    }
}

impl fmt::Display for DynamicScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current = Some(self);
        let mut indent = 0;
        while let Some(scope) = current {
            let pad = "  ".repeat(indent);
            writeln!(
                f,
                "{}{:?} {} ({})",
                pad,
                scope.static_scope.kind(),
                scope.static_scope.name(),
                scope.id
            )?;
            for (idx, slot) in scope.values().iter().enumerate() {
                let name = scope.static_scope.variable_name(idx).unwrap_or("?");
                match slot {
                    Some(value) => writeln!(f, "{}  {} = {}", pad, name, value)?,
                    None => writeln!(f, "{}  {} = <unset>", pad, name)?,
                }
            }
            current = scope.parent.as_deref();
            indent += 1;
        }
        Ok(())
    }
}
