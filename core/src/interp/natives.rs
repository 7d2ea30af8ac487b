use std::sync::Arc;
use std::thread;

use anyhow::anyhow;
use tracing::debug;

use super::{Interpreter, settle_outermost};
use crate::error::{ExecResult, JumpReason, RaisedError};
use crate::util::fast_map::{FastHashMap, symbol_map_from_pairs};
use crate::val::{Closure, Val};

/// Host function callable by name from IR `call` instructions.
pub type NativeFunction = fn(&mut Interpreter, &[Val], Option<Arc<Closure>>) -> ExecResult<Val>;

pub(super) fn defaults() -> FastHashMap<Arc<str>, NativeFunction> {
    symbol_map_from_pairs([
        ("each", each as NativeFunction),
        ("times", times),
        ("puts", puts),
        ("thread", spawn_thread),
    ])
}

fn require_block(block: Option<Arc<Closure>>) -> Result<Arc<Closure>, RaisedError> {
    block.ok_or_else(|| RaisedError::local_jump(JumpReason::NoReason, "no block given (yield)"))
}

/// `each(list, &block)`: yields every element, returns the list.
fn each(interp: &mut Interpreter, args: &[Val], block: Option<Arc<Closure>>) -> ExecResult<Val> {
    let list = args.first().cloned().unwrap_or(Val::Nil);
    let Some(items) = list.as_list() else {
        return Err(RaisedError::type_error(format!("each expects an Array, got {}", list.type_name())).into());
    };
    let block = require_block(block)?;
    for item in items {
        interp.call_block(&block, vec![item.clone()])?;
    }
    Ok(list)
}

/// `times(n, &block)`: yields `0..n`, returns `n`.
fn times(interp: &mut Interpreter, args: &[Val], block: Option<Arc<Closure>>) -> ExecResult<Val> {
    let count = match args.first() {
        Some(Val::Int(n)) => *n,
        Some(other) => {
            return Err(RaisedError::type_error(format!("times expects an Integer, got {}", other.type_name())).into());
        }
        None => return Err(RaisedError::type_error("times expects an Integer").into()),
    };
    let block = require_block(block)?;
    for i in 0..count {
        interp.call_block(&block, vec![Val::Int(i)])?;
    }
    Ok(Val::Int(count))
}

fn puts(interp: &mut Interpreter, args: &[Val], _block: Option<Arc<Closure>>) -> ExecResult<Val> {
    if args.is_empty() {
        interp.write_line(String::new());
    }
    for arg in args {
        let line = match arg {
            Val::Str(text) => text.to_string(),
            other => other.to_string(),
        };
        interp.write_line(line);
    }
    Ok(Val::Nil)
}

/// `thread(&block)`: runs the block on a new OS thread and joins it. Errors raised by
/// the block are re-raised in the caller.
fn spawn_thread(interp: &mut Interpreter, _args: &[Val], block: Option<Arc<Closure>>) -> ExecResult<Val> {
    let block = block.ok_or_else(|| RaisedError::thread("must be called with a block"))?;
    let mut child = interp.spawn_child();
    let handle = thread::Builder::new()
        .name("irk-thread".to_string())
        .stack_size(interp.config().stack_size())
        .spawn(move || {
            let result = settle_outermost(child.call_block(&block, Vec::new()));
            (result, child.take_output())
        })
        .map_err(|e| anyhow!("failed to spawn interpreter thread: {}", e))?;
    let (result, output) = handle.join().map_err(|_| anyhow!("interpreter thread panicked"))?;
    debug!(target: "irk::interp", ok = result.is_ok(), "thread joined");
    for line in output {
        interp.write_line(line);
    }
    result
}
