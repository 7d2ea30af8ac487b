//! Static scope descriptors and their runtime activations.

mod dynamic;
mod static_scope;

pub use dynamic::{DynamicScope, LiveGuard, SPECIALIZED_SLOTS, ScopeError, ScopeId};
pub use static_scope::{ScopeKind, StaticScope};
