//! Error taxonomy of the interpreter core.
//!
//! Three families travel through [`Unwind`]:
//! - [`RaisedError`]: user-level, catchable conditions (arity, jump misuse, type errors);
//! - [`ControlSignal`]: in-flight `break` / `return` / `redo`, never rescuable;
//! - fatal errors (`anyhow::Error`, typically wrapping [`crate::scope::ScopeError`] or
//!   malformed IR) that indicate a compiler bug and are never rescued either.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interp::ControlSignal;
use crate::scope::ScopeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ArgumentError,
    LocalJumpError,
    ThreadError,
    TypeError,
    NoMethodError,
    ZeroDivisionError,
    SystemStackError,
    RuntimeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::LocalJumpError => "LocalJumpError",
            ErrorKind::ThreadError => "ThreadError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::NoMethodError => "NoMethodError",
            ErrorKind::ZeroDivisionError => "ZeroDivisionError",
            ErrorKind::SystemStackError => "SystemStackError",
            ErrorKind::RuntimeError => "RuntimeError",
        };
        f.write_str(name)
    }
}

/// Argument count outside the accepted range. `max == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArityMismatch {
    pub actual: usize,
    pub min: usize,
    pub max: Option<usize>,
}

impl fmt::Display for ArityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            None => write!(f, "given {}, expected {}+", self.actual, self.min),
            Some(max) if max == self.min => write!(f, "given {}, expected {}", self.actual, self.min),
            Some(max) => write!(f, "given {}, expected {}..{}", self.actual, self.min, max),
        }
    }
}

/// Which jump a `LocalJumpError` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpReason {
    Break,
    Return,
    Redo,
    NoReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaisedError {
    pub kind: ErrorKind,
    pub message: String,
    pub arity: Option<ArityMismatch>,
    pub reason: Option<JumpReason>,
}

impl RaisedError {
    pub fn new<M: Into<String>>(kind: ErrorKind, message: M) -> Self {
        Self {
            kind,
            message: message.into(),
            arity: None,
            reason: None,
        }
    }

    pub fn arity(mismatch: ArityMismatch) -> Self {
        Self {
            kind: ErrorKind::ArgumentError,
            message: format!("wrong number of arguments ({})", mismatch),
            arity: Some(mismatch),
            reason: None,
        }
    }

    pub fn local_jump<M: Into<String>>(reason: JumpReason, message: M) -> Self {
        Self {
            kind: ErrorKind::LocalJumpError,
            message: message.into(),
            arity: None,
            reason: Some(reason),
        }
    }

    pub fn thread<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorKind::ThreadError, message)
    }

    pub fn type_error<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn no_method(name: &str) -> Self {
        Self::new(ErrorKind::NoMethodError, format!("undefined method '{}'", name))
    }
}

impl fmt::Display for RaisedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RaisedError {}

/// Everything that can interrupt straight-line execution of a frame.
#[derive(Debug)]
pub enum Unwind {
    Raise(RaisedError),
    Jump(ControlSignal),
    Fatal(anyhow::Error),
}

pub type ExecResult<T> = Result<T, Unwind>;

impl Unwind {
    /// Convert for the public `anyhow` API. Jumps never reach here in a healthy
    /// interpreter because the outermost frame turns them into `LocalJumpError`.
    pub fn into_anyhow(self) -> anyhow::Error {
        match self {
            Unwind::Raise(err) => anyhow::Error::new(err),
            Unwind::Jump(signal) => anyhow::anyhow!("unhandled control transfer: {:?}", signal),
            Unwind::Fatal(err) => err,
        }
    }

    pub fn as_raised(&self) -> Option<&RaisedError> {
        match self {
            Unwind::Raise(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RaisedError> for Unwind {
    fn from(err: RaisedError) -> Self {
        Unwind::Raise(err)
    }
}

impl From<ScopeError> for Unwind {
    fn from(err: ScopeError) -> Self {
        Unwind::Fatal(anyhow::Error::new(err))
    }
}

impl From<anyhow::Error> for Unwind {
    fn from(err: anyhow::Error) -> Self {
        Unwind::Fatal(err)
    }
}
