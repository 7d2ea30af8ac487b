//! Graph-editing passes. Every edit goes through the block API so attached listeners
//! observe it.

use anyhow::Result;
use tracing::debug;

use super::{BasicBlock, Instr, IrProgram, IrScope};

/// Delete every `nop`. Returns the number removed.
pub fn strip_nops(block: &mut BasicBlock) -> Result<usize> {
    let mut removed = 0;
    for idx in (0..block.len()).rev() {
        if matches!(block.instrs()[idx], Instr::Nop) {
            block.remove(idx)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Delete instructions that follow the first terminator of the block.
pub fn remove_unreachable_after_terminator(block: &mut BasicBlock) -> Result<usize> {
    let Some(first) = block.instrs().iter().position(Instr::is_terminator) else {
        return Ok(0);
    };
    let mut removed = 0;
    while block.len() > first + 1 {
        block.remove(block.len() - 1)?;
        removed += 1;
    }
    Ok(removed)
}

pub fn run_on_scope(scope: &mut IrScope) -> Result<usize> {
    let mut removed = 0;
    for block in scope.blocks_mut() {
        removed += remove_unreachable_after_terminator(block)?;
        removed += strip_nops(block)?;
    }
    Ok(removed)
}

/// Run every pass over every scope, then re-validate the program.
pub fn run_all(program: &mut IrProgram) -> Result<usize> {
    let mut removed = 0;
    for scope in program.scopes_mut() {
        let n = run_on_scope(scope)?;
        if n > 0 {
            debug!(target: "irk::ir", scope = scope.name(), removed = n, "simplified scope");
        }
        removed += n;
    }
    program.validate()?;
    Ok(removed)
}
