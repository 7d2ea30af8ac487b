use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, trace};

use super::frame::{Frame, FrameKind};
use super::jump::{self, ControlSignal, ReturnStart};
use super::{CallArgs, Interpreter, ops};
use crate::error::{ErrorKind, ExecResult, JumpReason, RaisedError, Unwind};
use crate::ir::{Instr, Label, ScopeRef};
use crate::scope::DynamicScope;
use crate::util::fast_map::fast_hash_map_with_capacity;
use crate::val::{Closure, Val};

enum Flow {
    Next,
    Jump(Label),
    Return(Val),
}

impl Interpreter {
    /// Run `body` in `frame` until it returns, falls off its last block or unwinds.
    pub(super) fn execute(&mut self, body: ScopeRef, frame: &mut Frame) -> ExecResult<Val> {
        let program = Arc::clone(&self.program);
        let ir = program.scope(body).ok_or_else(|| anyhow!("scope {} missing", body))?;
        let blocks = ir.blocks();
        let locate = |label: Label| ir.block_index(label).ok_or_else(|| anyhow!("{}: no block {}", ir.name(), label));

        let (mut block, mut ip) = (0usize, 0usize);
        loop {
            let Some(bb) = blocks.get(block) else {
                return Ok(Val::Nil);
            };
            let Some(instr) = bb.instrs().get(ip) else {
                block += 1;
                ip = 0;
                continue;
            };
            if self.config.trace_instructions {
                trace!(target: "irk::interp", scope = ir.name(), block = %bb.label(), ip, "{}", instr);
            }

            match self.step(frame, instr) {
                Ok(Flow::Next) => ip += 1,
                Ok(Flow::Jump(label)) => {
                    block = locate(label)?;
                    ip = 0;
                }
                Ok(Flow::Return(value)) => return Ok(value),
                Err(Unwind::Jump(ControlSignal::Redo { origin })) if origin == frame.scope.id() => {
                    (block, ip) = ir.body_start();
                }
                Err(Unwind::Raise(err)) => {
                    let Some(rescue) = bb.rescue() else {
                        return Err(Unwind::Raise(err));
                    };
                    debug!(target: "irk::interp", scope = ir.name(), %rescue, error = %err, "rescued");
                    frame.exception = Some(Arc::new(err));
                    block = locate(rescue)?;
                    ip = 0;
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn step(&mut self, frame: &mut Frame, instr: &Instr) -> ExecResult<Flow> {
        match instr {
            Instr::CheckArity {
                required,
                optional,
                rest,
            } => {
                if !frame.is_proc() {
                    frame.args.check_arity(*required, *optional, *rest)?;
                }
            }
            Instr::ReceivePreReqdArg { result, index } => {
                let value = frame.args.receive_pre_required(*index, frame.is_proc())?;
                frame.write(*result, value)?;
            }
            Instr::ReceiveOptArg {
                result,
                index,
                post_required,
            } => {
                let value = frame.args.receive_optional(*index, *post_required);
                frame.write(*result, value)?;
            }
            Instr::ReceiveRestArg {
                result,
                arg_index,
                required,
                optional,
            } => {
                let value = frame.args.receive_rest(*arg_index, *required, *optional);
                frame.write(*result, value)?;
            }
            Instr::ReceivePostReqdArg {
                result,
                index,
                pre_required,
                optional,
                rest,
                post_required,
            } => {
                let value = frame
                    .args
                    .receive_post_required(*index, *pre_required, *optional, *rest, *post_required);
                frame.write(*result, value)?;
            }
            Instr::ReceiveKeywordArg {
                result,
                name,
                expected_used,
            } => {
                let value = frame.args.receive_keyword(name, *expected_used)?;
                frame.write(*result, value)?;
            }
            Instr::ReceiveKeywordRestArg { result, expected_used } => {
                let value = frame.args.receive_keyword_rest(*expected_used)?;
                frame.write(*result, value)?;
            }
            Instr::ReceiveClosure { result } => {
                let value = frame.block_arg.clone().map_or(Val::Nil, Val::Closure);
                frame.write(*result, value)?;
            }
            Instr::ReceiveException { result } => {
                let value = frame.exception.clone().map_or(Val::Nil, Val::Exception);
                frame.write(*result, value)?;
            }
            Instr::Copy { result, value } => {
                let value = frame.read(value)?;
                frame.write(*result, value)?;
            }
            Instr::CopyIfUndefined { result, default } => {
                if frame.read_var(*result)?.is_undefined() {
                    let value = frame.read(default)?;
                    frame.write(*result, value)?;
                }
            }
            Instr::BinOp { result, op, lhs, rhs } => {
                let value = ops::binop(*op, &frame.read(lhs)?, &frame.read(rhs)?)?;
                frame.write(*result, value)?;
            }
            Instr::BuildList { result, items } => {
                let value = Val::list(frame.read_all(items)?);
                frame.write(*result, value)?;
            }
            Instr::BuildMap { result, entries } => {
                let mut map = fast_hash_map_with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(Arc::clone(key), frame.read(value)?);
                }
                frame.write(*result, Val::Map(Arc::new(map)))?;
            }
            Instr::BuildClosure { result, body, kind } => {
                let closure = Closure::new(
                    Arc::clone(&self.program),
                    *body,
                    Arc::clone(&frame.scope),
                    *kind,
                    frame.yield_block.clone(),
                );
                frame.write(*result, Val::Closure(Arc::new(closure)))?;
            }
            Instr::Call {
                result,
                method,
                args,
                block,
            } => {
                let values = frame.read_all(args)?;
                let block = match block {
                    Some(operand) => match frame.read(operand)? {
                        Val::Closure(closure) => Some(closure),
                        Val::Nil => None,
                        other => {
                            return Err(RaisedError::type_error(format!(
                                "wrong argument type {} (expected Proc)",
                                other.type_name()
                            ))
                            .into());
                        }
                    },
                    None => None,
                };
                let outcome = self.call_method(method, values, block);
                let value = self.settle_call(frame, outcome)?;
                if let Some(result) = result {
                    frame.write(*result, value)?;
                }
            }
            Instr::Yield { result, args, site } => {
                let Some(block) = frame.yield_block.clone() else {
                    return Err(RaisedError::local_jump(JumpReason::NoReason, "no block given (yield)").into());
                };
                let values = frame.read_all(args)?;
                let outcome = self.invoke_closure(&block, values, None, Some(*site));
                let value = self.settle_call(frame, outcome)?;
                frame.write(*result, value)?;
            }
            Instr::CallClosure {
                result,
                closure,
                args,
                site,
            } => {
                let target = frame.read(closure)?;
                let Some(target) = target.as_closure().cloned() else {
                    return Err(RaisedError::new(
                        ErrorKind::NoMethodError,
                        format!("undefined method 'call' for {}", target.type_name()),
                    )
                    .into());
                };
                let values = frame.read_all(args)?;
                let outcome = self.invoke_closure(&target, values, None, Some(*site));
                let value = self.settle_call(frame, outcome)?;
                frame.write(*result, value)?;
            }
            Instr::Eval { result, body } => {
                let program = Arc::clone(&self.program);
                let ir = program.scope(*body).ok_or_else(|| anyhow!("eval body {} missing", body))?;
                let scope = DynamicScope::new(Arc::clone(ir.static_scope()), Some(Arc::clone(&frame.scope)));
                let child = Frame::new(
                    scope,
                    FrameKind::Eval,
                    ir.temps(),
                    CallArgs::default(),
                    frame.block_arg.clone(),
                    frame.yield_block.clone(),
                );
                let outcome = self.run_frame(*body, child);
                let value = self.settle_call(frame, outcome)?;
                frame.write(*result, value)?;
            }
            Instr::Raise { kind, message } => {
                let message = match frame.read(message)? {
                    Val::Str(text) => text.to_string(),
                    other => other.to_string(),
                };
                return Err(RaisedError::new(*kind, message).into());
            }
            Instr::Jump { target } => return Ok(Flow::Jump(*target)),
            Instr::BranchIfFalse { cond, target } => {
                if !frame.read(cond)?.is_truthy() {
                    return Ok(Flow::Jump(*target));
                }
            }
            Instr::Return { value } => return Ok(Flow::Return(frame.read(value)?)),
            Instr::NonLocalReturn { value } => {
                let value = frame.read(value)?;
                return match jump::initiate_non_local_return(frame.jump_frame(), &self.thread, value)? {
                    ReturnStart::Local(value) => Ok(Flow::Return(value)),
                    ReturnStart::Jump(signal) => Err(Unwind::Jump(signal)),
                };
            }
            Instr::Break { value } => {
                let value = frame.read(value)?;
                let signal = jump::initiate_break(frame.jump_frame(), &self.thread, value)?;
                return Err(Unwind::Jump(signal));
            }
            Instr::Redo => return Err(Unwind::Jump(jump::initiate_redo(frame.jump_frame())?)),
            Instr::Nop => {}
        }
        Ok(Flow::Next)
    }

    /// Offer a break coming out of a call made by `frame` to that frame.
    fn settle_call(&self, frame: &Frame, outcome: ExecResult<Val>) -> ExecResult<Val> {
        match outcome {
            Err(Unwind::Jump(ControlSignal::Break(jump))) => {
                jump::handle_propagated_break(frame.jump_frame(), &self.thread, jump).into_result()
            }
            other => other,
        }
    }
}
