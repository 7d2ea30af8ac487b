use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::ir::{IrProgram, ScopeRef};
use crate::scope::DynamicScope;

/// Invocation flavour of a closure value. Lambdas check arity and stop `return`/`break`
/// at their own boundary; procs do neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Proc,
    Lambda,
}

impl BlockKind {
    #[inline]
    pub fn is_lambda(self) -> bool {
        matches!(self, BlockKind::Lambda)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Proc => write!(f, "proc"),
            BlockKind::Lambda => write!(f, "lambda"),
        }
    }
}

/// Identity of the code a closure runs: the owning program plus the body scope.
/// Two closures created from the same block literal share a call target even though
/// they capture different dynamic scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallTarget {
    pub program: u64,
    pub body: ScopeRef,
}

pub struct Closure {
    body: ScopeRef,
    scope: Arc<DynamicScope>,
    kind: BlockKind,
    outer_block: Option<Arc<Closure>>,
    program: Arc<IrProgram>,
}

impl Closure {
    pub fn new(
        program: Arc<IrProgram>,
        body: ScopeRef,
        scope: Arc<DynamicScope>,
        kind: BlockKind,
        outer_block: Option<Arc<Closure>>,
    ) -> Self {
        Self {
            body,
            scope,
            kind,
            outer_block,
            program,
        }
    }

    #[inline]
    pub fn body(&self) -> ScopeRef {
        self.body
    }

    /// The dynamic scope captured at creation; becomes the parent of every activation.
    #[inline]
    pub fn scope(&self) -> &Arc<DynamicScope> {
        &self.scope
    }

    #[inline]
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Block that `yield` inside this closure's body targets.
    #[inline]
    pub fn outer_block(&self) -> Option<&Arc<Closure>> {
        self.outer_block.as_ref()
    }

    #[inline]
    pub fn program(&self) -> &Arc<IrProgram> {
        &self.program
    }

    #[inline]
    pub fn call_target(&self) -> CallTarget {
        CallTarget {
            program: self.program.id(),
            body: self.body,
        }
    }
}

// Non-recursive Debug: the captured scope may reach back to this closure.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("body", &self.body)
            .field("kind", &self.kind)
            .field("scope", &self.scope.id())
            .finish()
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .program
            .scope(self.body)
            .map(|scope| scope.name())
            .unwrap_or("<unknown>");
        match self.kind {
            BlockKind::Proc => write!(f, "#<Proc:{}>", name),
            BlockKind::Lambda => write!(f, "#<Proc:{} (lambda)>", name),
        }
    }
}
