use std::sync::Arc;

use anyhow::anyhow;

use super::args::CallArgs;
use super::jump::JumpFrame;
use crate::error::{ExecResult, RaisedError};
use crate::ir::{Operand, Variable};
use crate::scope::DynamicScope;
use crate::val::{BlockKind, Closure, Val};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Script,
    Method,
    Block(BlockKind),
    Eval,
}

/// Execution state of one activation.
pub(crate) struct Frame {
    pub(crate) scope: Arc<DynamicScope>,
    pub(crate) kind: FrameKind,
    temps: Vec<Val>,
    pub(crate) args: CallArgs,
    /// Block passed to this invocation, bound by `ReceiveClosure`.
    pub(crate) block_arg: Option<Arc<Closure>>,
    /// Block `yield` targets.
    pub(crate) yield_block: Option<Arc<Closure>>,
    /// Error that transferred control into the current rescue block.
    pub(crate) exception: Option<Arc<RaisedError>>,
}

impl Frame {
    pub(crate) fn new(
        scope: Arc<DynamicScope>,
        kind: FrameKind,
        temps: u32,
        args: CallArgs,
        block_arg: Option<Arc<Closure>>,
        yield_block: Option<Arc<Closure>>,
    ) -> Self {
        Self {
            scope,
            kind,
            temps: vec![Val::Nil; temps as usize],
            args,
            block_arg,
            yield_block,
            exception: None,
        }
    }

    #[inline]
    pub(crate) fn block_kind(&self) -> Option<BlockKind> {
        match self.kind {
            FrameKind::Block(kind) => Some(kind),
            _ => None,
        }
    }

    /// Procs bind missing arguments to `nil` and skip arity checks.
    #[inline]
    pub(crate) fn is_proc(&self) -> bool {
        self.kind == FrameKind::Block(BlockKind::Proc)
    }

    #[inline]
    pub(crate) fn jump_frame(&self) -> JumpFrame<'_> {
        JumpFrame::new(&self.scope, self.block_kind())
    }

    pub(crate) fn read_var(&self, var: Variable) -> ExecResult<Val> {
        match var {
            Variable::Local { depth: 0, index } => Ok(self.scope.get_depth_zero(usize::from(index))?),
            Variable::Local { depth, index } => Ok(self.scope.get(usize::from(index), usize::from(depth))?),
            Variable::Temp(n) => self
                .temps
                .get(n as usize)
                .cloned()
                .ok_or_else(|| anyhow!("temp {} out of range ({} temps)", var, self.temps.len()).into()),
        }
    }

    #[inline]
    pub(crate) fn read(&self, operand: &Operand) -> ExecResult<Val> {
        match operand {
            Operand::Var(var) => self.read_var(*var),
            Operand::Lit(lit) => Ok(lit.to_val()),
        }
    }

    pub(crate) fn read_all(&self, operands: &[Operand]) -> ExecResult<Vec<Val>> {
        operands.iter().map(|op| self.read(op)).collect()
    }

    pub(crate) fn write(&mut self, var: Variable, value: Val) -> ExecResult<()> {
        match var {
            Variable::Local { depth: 0, index } => Ok(self.scope.set_depth_zero(usize::from(index), value)?),
            Variable::Local { depth, index } => Ok(self.scope.set(usize::from(index), usize::from(depth), value)?),
            Variable::Temp(n) => {
                let len = self.temps.len();
                let slot = self
                    .temps
                    .get_mut(n as usize)
                    .ok_or_else(|| anyhow!("temp {} out of range ({} temps)", var, len))?;
                *slot = value;
                Ok(())
            }
        }
    }
}
