//! Non-local control transfer: `break`, non-local `return` and `redo`.
//!
//! A jump is created by one of the `initiate_*` functions in the frame that executes the
//! instruction, travels outward as `Err(Unwind::Jump(signal))`, and is offered to every
//! frame it passes. Call sites (call / yield / closure call / eval) offer breaks to
//! [`handle_propagated_break`]; lambda and method frames offer signals to
//! [`handle_lambda_exit`] / [`handle_return_jump`] when they exit. Exactly one frame
//! consumes a signal, or it is converted into a `LocalJumpError` / `ThreadError`.

use std::sync::Arc;

use tracing::debug;

use super::ThreadContext;
use crate::error::{ExecResult, JumpReason, RaisedError, Unwind};
use crate::scope::{DynamicScope, ScopeId, ScopeKind};
use crate::val::{BlockKind, Val};

#[derive(Debug, Clone)]
pub struct BreakJump {
    /// Activation that executed the `break`.
    pub origin: ScopeId,
    /// Frame that must consume the break; `None` for lambda-caught breaks.
    pub target: Option<ScopeId>,
    pub value: Val,
    pub caught_by_lambda: bool,
    /// Raised inside an eval body; re-initiated from the frame that ran the eval.
    pub in_eval: bool,
}

#[derive(Debug, Clone)]
pub struct ReturnJump {
    pub origin: ScopeId,
    pub target: ScopeId,
    pub value: Val,
}

#[derive(Debug, Clone)]
pub enum ControlSignal {
    Break(BreakJump),
    Return(ReturnJump),
    Redo { origin: ScopeId },
}

impl ControlSignal {
    pub fn reason(&self) -> JumpReason {
        match self {
            ControlSignal::Break(_) => JumpReason::Break,
            ControlSignal::Return(_) => JumpReason::Return,
            ControlSignal::Redo { .. } => JumpReason::Redo,
        }
    }

    /// The error reported when nothing consumed this signal.
    pub fn into_unhandled_error(self) -> RaisedError {
        match self {
            ControlSignal::Break(_) => RaisedError::local_jump(JumpReason::Break, "break from proc-closure"),
            ControlSignal::Return(_) => RaisedError::local_jump(JumpReason::Return, "unexpected return"),
            ControlSignal::Redo { .. } => RaisedError::local_jump(JumpReason::Redo, "unexpected redo"),
        }
    }
}

#[derive(Debug)]
pub enum JumpOutcome {
    Consumed(Val),
    Propagate(ControlSignal),
    Error(RaisedError),
}

impl JumpOutcome {
    pub fn into_result(self) -> ExecResult<Val> {
        match self {
            JumpOutcome::Consumed(value) => Ok(value),
            JumpOutcome::Propagate(signal) => Err(Unwind::Jump(signal)),
            JumpOutcome::Error(err) => Err(Unwind::Raise(err)),
        }
    }
}

/// Result of starting a `return` from the current frame.
#[derive(Debug)]
pub enum ReturnStart {
    /// Ordinary return from a method or script body.
    Local(Val),
    Jump(ControlSignal),
}

/// What the protocol needs to know about one executing frame.
#[derive(Debug, Clone, Copy)]
pub struct JumpFrame<'a> {
    pub scope: &'a Arc<DynamicScope>,
    /// `Some` for closure frames.
    pub block_kind: Option<BlockKind>,
}

impl<'a> JumpFrame<'a> {
    pub fn new(scope: &'a Arc<DynamicScope>, block_kind: Option<BlockKind>) -> Self {
        Self { scope, block_kind }
    }

    #[inline]
    fn id(&self) -> ScopeId {
        self.scope.id()
    }

    #[inline]
    fn is_lambda(&self) -> bool {
        self.block_kind.is_some_and(BlockKind::is_lambda)
    }

    /// Lambdas that are not `define_method`-style method bodies.
    #[inline]
    fn is_plain_lambda(&self) -> bool {
        self.is_lambda() && !self.scope.static_scope().is_argument_scope()
    }
}

pub fn initiate_break(frame: JumpFrame<'_>, thread: &ThreadContext, value: Val) -> Result<ControlSignal, RaisedError> {
    if frame.is_lambda() {
        return Ok(ControlSignal::Break(BreakJump {
            origin: frame.id(),
            target: None,
            value,
            caught_by_lambda: true,
            in_eval: false,
        }));
    }

    let static_scope = frame.scope.static_scope();
    if !static_scope.is_closure() {
        return Err(RaisedError::local_jump(JumpReason::Break, "break from proc-closure"));
    }

    let parent = match frame.scope.parent() {
        Some(parent) if thread.is_active(parent.id()) => parent,
        // The defining frame already returned: the block escaped.
        _ => return Err(RaisedError::local_jump(JumpReason::Break, "break from proc-closure")),
    };

    Ok(ControlSignal::Break(BreakJump {
        origin: frame.id(),
        target: Some(parent.id()),
        value,
        caught_by_lambda: false,
        in_eval: static_scope.kind() == ScopeKind::Eval,
    }))
}

/// Offer a break that came out of a call made by `frame`.
pub fn handle_propagated_break(frame: JumpFrame<'_>, thread: &ThreadContext, mut jump: BreakJump) -> JumpOutcome {
    if jump.in_eval {
        jump.in_eval = false;
        return match initiate_break(frame, thread, jump.value) {
            Ok(signal) => JumpOutcome::Propagate(signal),
            Err(err) => JumpOutcome::Error(err),
        };
    }

    if jump.caught_by_lambda || jump.target == Some(frame.id()) {
        debug!(target: "irk::jump", origin = %jump.origin, at = %frame.id(), "break consumed");
        return JumpOutcome::Consumed(jump.value);
    }

    if frame.is_plain_lambda() {
        return JumpOutcome::Error(RaisedError::local_jump(JumpReason::Break, "break from proc-closure"));
    }

    JumpOutcome::Propagate(ControlSignal::Break(jump))
}

/// Offer a signal to a lambda frame that is exiting.
pub fn handle_lambda_exit(frame: JumpFrame<'_>, signal: ControlSignal) -> JumpOutcome {
    match signal {
        ControlSignal::Break(jump) if jump.caught_by_lambda && jump.origin == frame.id() => {
            debug!(target: "irk::jump", at = %frame.id(), "break consumed by lambda");
            JumpOutcome::Consumed(jump.value)
        }
        ControlSignal::Return(jump) => handle_return_jump(frame, jump),
        other => JumpOutcome::Propagate(other),
    }
}

pub fn initiate_non_local_return(
    frame: JumpFrame<'_>,
    thread: &ThreadContext,
    value: Val,
) -> Result<ReturnStart, RaisedError> {
    if frame.is_lambda() {
        return Ok(ReturnStart::Jump(ControlSignal::Return(ReturnJump {
            origin: frame.id(),
            target: frame.id(),
            value,
        })));
    }
    if !frame.scope.static_scope().is_closure() {
        return Ok(ReturnStart::Local(value));
    }

    let target = frame
        .scope
        .find_containing_lambda()
        .or_else(|| frame.scope.find_return_target());
    let Some(target) = target else {
        return Err(if thread.is_main() {
            RaisedError::local_jump(JumpReason::Return, "unexpected return")
        } else {
            RaisedError::thread("return can't jump across threads")
        });
    };
    if !thread.is_active(target.id()) {
        // still running, but on another thread's stack
        if target.is_live() {
            return Err(RaisedError::thread("return can't jump across threads"));
        }
        return Err(RaisedError::local_jump(JumpReason::Return, "unexpected return"));
    }

    Ok(ReturnStart::Jump(ControlSignal::Return(ReturnJump {
        origin: frame.id(),
        target: target.id(),
        value,
    })))
}

/// Offer a return to a lambda or method frame that is exiting.
pub fn handle_return_jump(frame: JumpFrame<'_>, jump: ReturnJump) -> JumpOutcome {
    if frame.is_plain_lambda() || jump.target == frame.id() {
        debug!(target: "irk::jump", origin = %jump.origin, at = %frame.id(), "return consumed");
        return JumpOutcome::Consumed(jump.value);
    }
    JumpOutcome::Propagate(ControlSignal::Return(jump))
}

pub fn initiate_redo(frame: JumpFrame<'_>) -> Result<ControlSignal, RaisedError> {
    if frame.block_kind.is_none() {
        return Err(RaisedError::local_jump(JumpReason::Redo, "redo outside of a block"));
    }
    Ok(ControlSignal::Redo { origin: frame.id() })
}
