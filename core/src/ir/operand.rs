use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::val::Val;

/// Index of an [`IrScope`](super::IrScope) inside its program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeRef(pub u32);

/// Index of a yield / closure-call dispatch site inside its program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(pub u32);

impl ScopeRef {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl SiteId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site{}", self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Where an instruction reads or writes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    /// Slot `index` of the dynamic scope `depth` parent links up.
    Local { depth: u16, index: u16 },
    /// Frame-private temporary.
    Temp(u32),
}

impl Variable {
    pub const fn local(index: u16) -> Self {
        Variable::Local { depth: 0, index }
    }

    pub const fn outer(depth: u16, index: u16) -> Self {
        Variable::Local { depth, index }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Local { depth: 0, index } => write!(f, "%v{}", index),
            Variable::Local { depth, index } => write!(f, "%v{}^{}", index, depth),
            Variable::Temp(n) => write!(f, "%t{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Symbol(Arc<str>),
}

impl Literal {
    pub fn to_val(&self) -> Val {
        match self {
            Literal::Nil => Val::Nil,
            Literal::Bool(b) => Val::Bool(*b),
            Literal::Int(i) => Val::Int(*i),
            Literal::Float(x) => Val::Float(*x),
            Literal::Str(s) => Val::Str(Arc::clone(s)),
            Literal::Symbol(s) => Val::Symbol(Arc::clone(s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    Var(Variable),
    Lit(Literal),
}

impl Operand {
    pub const NIL: Operand = Operand::Lit(Literal::Nil);

    pub fn int(value: i64) -> Self {
        Operand::Lit(Literal::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Operand::Lit(Literal::Bool(value))
    }

    pub fn str<S: Into<Arc<str>>>(value: S) -> Self {
        Operand::Lit(Literal::Str(value.into()))
    }

    pub fn symbol<S: Into<Arc<str>>>(value: S) -> Self {
        Operand::Lit(Literal::Symbol(value.into()))
    }

    pub fn as_variable(&self) -> Option<Variable> {
        match self {
            Operand::Var(var) => Some(*var),
            Operand::Lit(_) => None,
        }
    }
}

impl From<Literal> for Operand {
    fn from(lit: Literal) -> Self {
        Operand::Lit(lit)
    }
}

impl From<Variable> for Operand {
    fn from(var: Variable) -> Self {
        Operand::Var(var)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(var) => write!(f, "{}", var),
            Operand::Lit(lit) => write!(f, "{}", lit.to_val()),
        }
    }
}
