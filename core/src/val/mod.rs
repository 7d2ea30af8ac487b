//! Runtime values manipulated by the interpreter.
//!
//! Every heap-backed variant is `Arc`-shared so values are cheap to clone and can cross
//! thread boundaries together with the closures that capture them.

use std::{fmt, sync::Arc};

use crate::error::RaisedError;
use crate::util::fast_map::{FastHashMap, symbol_map_from_pairs};

mod closure;

pub use closure::{BlockKind, CallTarget, Closure};

#[derive(Debug, Clone, Default)]
pub enum Val {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// String type, wrapped in Arc<str> for efficient cloning
    Str(Arc<str>),
    Symbol(Arc<str>),
    /// Lists are immutable once built; rest-arg slicing always allocates a fresh one
    List(Arc<[Val]>),
    /// Symbol-keyed map; a trailing map argument doubles as the keyword hash
    Map(Arc<FastHashMap<Arc<str>, Val>>),
    Closure(Arc<Closure>),
    Exception(Arc<RaisedError>),
    /// Internal "argument not supplied" marker consumed by default-value instructions.
    /// No literal produces it.
    Undefined,
}

impl Val {
    pub fn str<S: Into<Arc<str>>>(s: S) -> Self {
        Val::Str(s.into())
    }

    pub fn symbol<S: Into<Arc<str>>>(s: S) -> Self {
        Val::Symbol(s.into())
    }

    pub fn list<I: IntoIterator<Item = Val>>(items: I) -> Self {
        Val::List(items.into_iter().collect::<Vec<_>>().into())
    }

    pub fn map<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Val)>,
        S: Into<Arc<str>>,
    {
        Val::Map(Arc::new(symbol_map_from_pairs(pairs)))
    }

    pub fn empty_map() -> Self {
        Val::Map(Arc::new(FastHashMap::default()))
    }

    /// Ruby-style truthiness: only `nil` and `false` are falsy. The undefined marker is
    /// treated like `nil`.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Val::Nil | Val::Bool(false) | Val::Undefined)
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Val::Undefined)
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Val::Nil)
    }

    pub fn as_closure(&self) -> Option<&Arc<Closure>> {
        match self {
            Val::Closure(closure) => Some(closure),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Val]> {
        match self {
            Val::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FastHashMap<Arc<str>, Val>> {
        match self {
            Val::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Nil => "NilClass",
            Val::Bool(true) => "TrueClass",
            Val::Bool(false) => "FalseClass",
            Val::Int(_) => "Integer",
            Val::Float(_) => "Float",
            Val::Str(_) => "String",
            Val::Symbol(_) => "Symbol",
            Val::List(_) => "Array",
            Val::Map(_) => "Hash",
            Val::Closure(_) => "Proc",
            Val::Exception(_) => "Exception",
            Val::Undefined => "Undefined",
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Nil, Val::Nil) | (Val::Undefined, Val::Undefined) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a == b,
            (Val::Int(a), Val::Float(b)) | (Val::Float(b), Val::Int(a)) => (*a as f64) == *b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::Symbol(a), Val::Symbol(b)) => a == b,
            (Val::List(a), Val::List(b)) => a == b,
            (Val::Map(a), Val::Map(b)) => a == b,
            (Val::Closure(a), Val::Closure(b)) => Arc::ptr_eq(a, b),
            (Val::Exception(a), Val::Exception(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Val {
    fn from(value: i64) -> Self {
        Val::Int(value)
    }
}

impl From<bool> for Val {
    fn from(value: bool) -> Self {
        Val::Bool(value)
    }
}

impl From<f64> for Val {
    fn from(value: f64) -> Self {
        Val::Float(value)
    }
}

impl From<&str> for Val {
    fn from(value: &str) -> Self {
        Val::Str(value.into())
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Nil => write!(f, "nil"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Int(i) => write!(f, "{}", i),
            Val::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Val::Str(s) => write!(f, "{:?}", s),
            Val::Symbol(s) => write!(f, ":{}", s),
            Val::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Val::Map(map) => {
                // Sorted so dumps are stable regardless of hash order
                let mut keys: Vec<&Arc<str>> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, map[*key])?;
                }
                write!(f, "}}")
            }
            Val::Closure(closure) => write!(f, "{}", closure),
            Val::Exception(err) => write!(f, "#<{}: {}>", err.kind, err.message),
            Val::Undefined => write!(f, "<undefined>"),
        }
    }
}
