//! IR interpreter.
//!
//! Executes an [`IrProgram`] frame by frame. Method calls, closure invocations and eval
//! bodies each get a fresh [`DynamicScope`]; non-local exits travel back out as
//! `Err(Unwind::Jump(..))` and are settled by the functions in [`jump`].

mod args;
mod config;
mod dispatch;
mod exec;
mod frame;
pub mod jump;
mod natives;
mod ops;
mod thread;

use std::sync::Arc;

use anyhow::{Result, anyhow};

pub use args::CallArgs;
pub use config::{DEFAULT_MAX_DEPTH, DEFAULT_MEGAMORPHIC_THRESHOLD, InterpConfig, env_toggle_enabled};
pub use dispatch::{DispatchSite, DispatchState};
pub use jump::{BreakJump, ControlSignal, JumpFrame, JumpOutcome, ReturnJump};
pub use natives::NativeFunction;
pub use thread::{ThreadContext, ThreadKind};

use crate::error::{ErrorKind, ExecResult, RaisedError, Unwind};
use crate::ir::{IrProgram, ScopeRef, SiteId};
use crate::scope::DynamicScope;
use crate::util::fast_map::FastHashMap;
use crate::val::{Closure, Val};
use frame::{Frame, FrameKind};

pub struct Interpreter {
    program: Arc<IrProgram>,
    config: InterpConfig,
    thread: ThreadContext,
    /// One entry per dispatch site of `program`, indexed by `SiteId`.
    sites: Vec<DispatchSite>,
    natives: FastHashMap<Arc<str>, NativeFunction>,
    /// Captured `puts` output; `None` writes to stdout.
    output: Option<Vec<String>>,
}

fn fresh_sites(program: &IrProgram, config: &InterpConfig) -> Vec<DispatchSite> {
    (0..program.site_count())
        .map(|_| {
            if config.inline_cache {
                DispatchSite::new()
            } else {
                DispatchSite::general()
            }
        })
        .collect()
}

impl Interpreter {
    pub fn new(program: Arc<IrProgram>) -> Self {
        Self::with_config(program, InterpConfig::default())
    }

    pub fn with_config(program: Arc<IrProgram>, config: InterpConfig) -> Self {
        let sites = fresh_sites(&program, &config);
        Self {
            program,
            config,
            thread: ThreadContext::main(),
            sites,
            natives: natives::defaults(),
            output: None,
        }
    }

    /// Collect `puts` output in memory instead of printing it.
    pub fn capture_output(mut self) -> Self {
        self.output = Some(Vec::new());
        self
    }

    /// Drain captured output lines. Empty when output is not captured.
    pub fn take_output(&mut self) -> Vec<String> {
        self.output.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn register_native<N: Into<Arc<str>>>(&mut self, name: N, function: NativeFunction) {
        self.natives.insert(name.into(), function);
    }

    pub fn program(&self) -> &Arc<IrProgram> {
        &self.program
    }

    pub fn config(&self) -> &InterpConfig {
        &self.config
    }

    pub fn thread(&self) -> &ThreadContext {
        &self.thread
    }

    pub fn site_state(&self, site: SiteId) -> Option<&DispatchState> {
        self.sites.get(site.index()).map(DispatchSite::state)
    }

    /// Run the program's entry scope as a script.
    pub fn run(&mut self) -> Result<Val> {
        self.on_interpreter_stack(Self::run_entry)
    }

    /// Call a program method or native by name from outside the interpreter.
    pub fn call(&mut self, name: &str, args: Vec<Val>) -> Result<Val> {
        self.on_interpreter_stack(|interp| {
            let result = interp.call_method(name, args, None);
            settle_outermost(result).map_err(Unwind::into_anyhow)
        })
    }

    /// Run `f` on a scoped thread whose stack fits `max_depth` frames, so deep recursion
    /// ends in `SystemStackError` rather than a native stack overflow.
    fn on_interpreter_stack<T, F>(&mut self, f: F) -> Result<T>
    where
        T: Send,
        F: FnOnce(&mut Self) -> Result<T> + Send,
    {
        let stack_size = self.config.stack_size();
        std::thread::scope(|s| {
            let handle = std::thread::Builder::new()
                .name("irk-main".to_string())
                .stack_size(stack_size)
                .spawn_scoped(s, move || f(self))
                .map_err(|e| anyhow!("failed to start interpreter thread: {}", e))?;
            handle.join().map_err(|_| anyhow!("interpreter thread panicked"))?
        })
    }

    fn run_entry(&mut self) -> Result<Val> {
        let program = Arc::clone(&self.program);
        let entry = program.entry();
        let ir = program
            .scope(entry)
            .ok_or_else(|| anyhow!("entry scope {} missing", entry))?;
        let scope = DynamicScope::new(Arc::clone(ir.static_scope()), None);
        let frame = Frame::new(scope, FrameKind::Script, ir.temps(), CallArgs::default(), None, None);
        let result = self.run_frame(entry, frame);
        settle_outermost(result).map_err(Unwind::into_anyhow)
    }

    /// Invoke `block` without a dispatch site. Natives use this to call their block.
    pub fn call_block(&mut self, block: &Arc<Closure>, args: Vec<Val>) -> ExecResult<Val> {
        self.invoke_closure(block, args, None, None)
    }

    pub(crate) fn write_line(&mut self, line: String) {
        match self.output.as_mut() {
            Some(lines) => lines.push(line),
            None => println!("{}", line),
        }
    }

    /// Interpreter for a new OS thread: same program, natives and settings, fresh
    /// thread context and dispatch sites.
    pub(crate) fn spawn_child(&self) -> Self {
        Self {
            program: Arc::clone(&self.program),
            config: self.config.clone(),
            thread: ThreadContext::spawned(),
            sites: fresh_sites(&self.program, &self.config),
            natives: self.natives.clone(),
            output: self.output.as_ref().map(|_| Vec::new()),
        }
    }

    pub(crate) fn call_method(&mut self, name: &str, args: Vec<Val>, block: Option<Arc<Closure>>) -> ExecResult<Val> {
        if let Some(body) = self.program.method(name) {
            let program = Arc::clone(&self.program);
            let ir = program
                .scope(body)
                .ok_or_else(|| anyhow!("method '{}' points at missing scope {}", name, body))?;
            let static_scope = Arc::clone(ir.static_scope());
            let args = CallArgs::new(args, static_scope.accepts_keywords());
            let scope = DynamicScope::new(static_scope, None);
            let frame = Frame::new(Arc::clone(&scope), FrameKind::Method, ir.temps(), args, block.clone(), block);
            return match self.run_frame(body, frame) {
                Err(Unwind::Jump(ControlSignal::Return(jump))) => {
                    jump::handle_return_jump(JumpFrame::new(&scope, None), jump).into_result()
                }
                other => other,
            };
        }
        if let Some(native) = self.natives.get(name).copied() {
            return native(self, &args, block);
        }
        Err(RaisedError::no_method(name).into())
    }

    pub(crate) fn invoke_closure(
        &mut self,
        closure: &Arc<Closure>,
        args: Vec<Val>,
        block_arg: Option<Arc<Closure>>,
        site: Option<SiteId>,
    ) -> ExecResult<Val> {
        if !Arc::ptr_eq(closure.program(), &self.program) {
            return Err(RaisedError::type_error("closure belongs to another program").into());
        }
        let body = match site {
            Some(site) => {
                let threshold = self.config.megamorphic_threshold;
                self.sites
                    .get_mut(site.index())
                    .ok_or_else(|| anyhow!("dispatch site {} out of range", site))?
                    .resolve(site, closure, threshold)
            }
            None => closure.body(),
        };

        let program = Arc::clone(&self.program);
        let ir = program
            .scope(body)
            .ok_or_else(|| anyhow!("closure body {} missing", body))?;
        let kind = closure.kind();
        let static_scope = Arc::clone(ir.static_scope());
        let parent = Some(Arc::clone(closure.scope()));
        let mut args = CallArgs::new(args, static_scope.accepts_keywords());
        let scope = if kind.is_lambda() {
            DynamicScope::new_lambda(static_scope, parent)
        } else {
            if ir.signature().spreads_single_list() {
                args.spread_single_list();
            }
            DynamicScope::new(static_scope, parent)
        };

        let frame = Frame::new(
            Arc::clone(&scope),
            FrameKind::Block(kind),
            ir.temps(),
            args,
            block_arg,
            closure.outer_block().cloned(),
        );
        let result = self.run_frame(body, frame);
        if !kind.is_lambda() {
            return result;
        }
        match result {
            Err(Unwind::Jump(signal)) => jump::handle_lambda_exit(JumpFrame::new(&scope, Some(kind)), signal).into_result(),
            other => other,
        }
    }

    pub(crate) fn run_frame(&mut self, body: ScopeRef, mut frame: Frame) -> ExecResult<Val> {
        if self.thread.depth() >= self.config.max_depth {
            return Err(RaisedError::new(ErrorKind::SystemStackError, "stack level too deep").into());
        }
        let _live = frame.scope.enter();
        self.thread.push(frame.scope.id());
        let result = self.execute(body, &mut frame);
        self.thread.pop();
        result
    }
}

/// No frame is left to consume a jump: report it as the matching `LocalJumpError`.
pub(crate) fn settle_outermost(result: ExecResult<Val>) -> ExecResult<Val> {
    match result {
        Err(Unwind::Jump(signal)) => Err(Unwind::Raise(signal.into_unhandled_error())),
        other => other,
    }
}
