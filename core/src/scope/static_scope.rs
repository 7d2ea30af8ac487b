use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ir::ScopeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Script,
    Method,
    Closure,
    /// Eval bodies run like closures nested in the scope that called eval.
    Eval,
}

impl ScopeKind {
    #[inline]
    pub fn is_closure(self) -> bool {
        matches!(self, ScopeKind::Closure | ScopeKind::Eval)
    }
}

/// Compile-time description of one lexical scope.
///
/// The variable table grows while IR is being built; every activation created afterwards
/// gets exactly `variable_count()` slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticScope {
    name: Arc<str>,
    kind: ScopeKind,
    #[serde(default)]
    variables: Vec<Arc<str>>,
    /// Set on closures that serve as method bodies (`define_method` style). Such a
    /// closure is a `return` target and is never treated as a plain lambda.
    #[serde(default)]
    argument_scope: bool,
    #[serde(default)]
    accepts_keywords: bool,
    #[serde(default)]
    parent: Option<ScopeRef>,
}

impl StaticScope {
    pub fn new<N: Into<Arc<str>>>(name: N, kind: ScopeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            variables: Vec::new(),
            argument_scope: false,
            accepts_keywords: false,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: ScopeRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_argument_scope(mut self, argument_scope: bool) -> Self {
        self.argument_scope = argument_scope;
        self
    }

    pub fn with_keywords(mut self, accepts_keywords: bool) -> Self {
        self.accepts_keywords = accepts_keywords;
        self
    }

    /// Declare `name` and return its slot index; redeclaring returns the existing slot.
    pub fn add_variable<N: Into<Arc<str>>>(&mut self, name: N) -> u16 {
        let name = name.into();
        if let Some(idx) = self.find_variable(&name) {
            return idx;
        }
        self.variables.push(name);
        (self.variables.len() - 1) as u16
    }

    pub fn find_variable(&self, name: &str) -> Option<u16> {
        self.variables.iter().position(|v| &**v == name).map(|idx| idx as u16)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    #[inline]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn variable_name(&self, index: usize) -> Option<&str> {
        self.variables.get(index).map(|v| &**v)
    }

    #[inline]
    pub fn is_closure(&self) -> bool {
        self.kind.is_closure()
    }

    #[inline]
    pub fn is_argument_scope(&self) -> bool {
        self.argument_scope
    }

    #[inline]
    pub fn accepts_keywords(&self) -> bool {
        self.accepts_keywords
    }

    #[inline]
    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent
    }

    /// Scopes a non-local `return` can land in.
    #[inline]
    pub fn is_return_target(&self) -> bool {
        match self.kind {
            ScopeKind::Method => true,
            ScopeKind::Closure => self.argument_scope,
            ScopeKind::Script | ScopeKind::Eval => false,
        }
    }
}
