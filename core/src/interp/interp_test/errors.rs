use super::*;
use crate::error::ExecResult;
use crate::val::Closure;

/// `begin; <body>; rescue => e; e; end` as a method named `safe`.
fn rescuing_method(body: Vec<Instr>) -> ScopeBuilder {
    let mut m = ScopeBuilder::method("safe");
    let e = m.local("e");
    let rescue = m.label();
    m.protect(Some(rescue));
    for instr in body {
        m.emit(instr);
    }
    m.ret(Operand::symbol("no_error"));
    m.start_block(rescue).protect(None);
    m.emit(Instr::ReceiveException { result: e }).ret(op(e));
    m
}

fn interp_with(defs: Vec<(&str, ScopeBuilder)>) -> Interpreter {
    let mut pb = ProgramBuilder::new();
    for (name, scope) in defs {
        let scope_ref = pb.add(scope.finish());
        pb.method(name, scope_ref);
    }
    let mut main = ScopeBuilder::script();
    main.ret(Operand::NIL);
    let main_ref = pb.add(main.finish());
    Interpreter::new(Arc::new(pb.finish(main_ref).unwrap())).capture_output()
}

fn exception(value: Val) -> Arc<RaisedError> {
    match value {
        Val::Exception(err) => err,
        other => panic!("expected an exception value, got {}", other),
    }
}

#[test]
fn test_rescue_binds_the_raised_error() {
    let safe = rescuing_method(vec![Instr::Raise {
        kind: ErrorKind::RuntimeError,
        message: Operand::str("boom"),
    }]);
    let mut interp = interp_with(vec![("safe", safe)]);
    let err = exception(interp.call("safe", Vec::new()).unwrap());
    assert_eq!(err.kind, ErrorKind::RuntimeError);
    assert_eq!(err.message, "boom");
}

#[test]
fn test_rescue_catches_arity_errors_from_callees() {
    let mut two = ScopeBuilder::method("two");
    two.emit(Instr::CheckArity {
        required: 2,
        optional: 0,
        rest: false,
    })
    .ret(Operand::NIL);
    let safe = rescuing_method(vec![Instr::Call {
        result: None,
        method: "two".into(),
        args: vec![Operand::int(1)],
        block: None,
    }]);
    let mut interp = interp_with(vec![("two", two), ("safe", safe)]);
    let err = exception(interp.call("safe", Vec::new()).unwrap());
    assert_eq!(
        err.arity,
        Some(ArityMismatch {
            actual: 1,
            min: 2,
            max: Some(2),
        })
    );
}

#[test]
fn test_unprotected_code_is_not_rescued() {
    let safe = rescuing_method(Vec::new());
    let mut boom = ScopeBuilder::method("boom");
    boom.emit(Instr::Raise {
        kind: ErrorKind::TypeError,
        message: Operand::str("nope"),
    });
    let mut interp = interp_with(vec![("safe", safe), ("boom", boom)]);
    assert_eq!(interp.call("safe", Vec::new()).unwrap(), Val::symbol("no_error"));
    let err = expect_raised(interp.call("boom", Vec::new()));
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert_eq!(err.to_string(), "TypeError: nope");
}

#[test]
fn test_deep_recursion_raises_system_stack_error() {
    let mut rec = ScopeBuilder::method("rec");
    rec.emit(Instr::Call {
        result: None,
        method: "rec".into(),
        args: Vec::new(),
        block: None,
    })
    .ret(Operand::NIL);
    let mut pb = ProgramBuilder::new();
    let rec_ref = pb.add(rec.finish());
    pb.method("rec", rec_ref);
    let mut main = ScopeBuilder::script();
    main.ret(Operand::NIL);
    let main_ref = pb.add(main.finish());

    let config = InterpConfig::default().with_max_depth(32);
    let mut interp = Interpreter::with_config(Arc::new(pb.finish(main_ref).unwrap()), config);
    let err = expect_raised(interp.call("rec", Vec::new()));
    assert_eq!(err.kind, ErrorKind::SystemStackError);
    assert_eq!(interp.thread().depth(), 0);
}

/// `def rec = rec` plus a script running `thread { rec }`.
fn unbounded_recursion() -> IrProgram {
    let mut pb = ProgramBuilder::new();
    let main_ref = pb.reserve();
    let mut rec = ScopeBuilder::method("rec");
    rec.emit(Instr::Call {
        result: None,
        method: "rec".into(),
        args: Vec::new(),
        block: None,
    })
    .ret(Operand::NIL);
    let rec_ref = pb.add(rec.finish());
    pb.method("rec", rec_ref);

    let mut blk = ScopeBuilder::closure("blk", main_ref);
    blk.emit(Instr::Call {
        result: None,
        method: "rec".into(),
        args: Vec::new(),
        block: None,
    })
    .ret(Operand::NIL);
    let blk = pb.add(blk.finish());

    let mut main = ScopeBuilder::script();
    let closure = main.temp();
    main.emit(Instr::BuildClosure {
        result: closure,
        body: blk,
        kind: BlockKind::Proc,
    })
    .emit(Instr::Call {
        result: None,
        method: "thread".into(),
        args: Vec::new(),
        block: Some(op(closure)),
    })
    .ret(Operand::NIL);
    pb.define(main_ref, main.finish()).unwrap();
    pb.finish(main_ref).unwrap()
}

#[test]
fn test_default_depth_limit_trips_before_native_stack() {
    let program = Arc::new(unbounded_recursion());
    assert_eq!(InterpConfig::default().max_depth, crate::interp::DEFAULT_MAX_DEPTH);

    let mut interp = Interpreter::new(Arc::clone(&program));
    let err = expect_raised(interp.call("rec", Vec::new()));
    assert_eq!(err.kind, ErrorKind::SystemStackError);
    assert_eq!(err.message, "stack level too deep");

    // same limit inside a spawned interpreter thread
    let err = expect_raised(Interpreter::new(program).run());
    assert_eq!(err.kind, ErrorKind::SystemStackError);
}

#[test]
fn test_call_errors() {
    let mut yields = ScopeBuilder::method("yields");
    let out = yields.temp();
    yields.emit(Instr::Yield {
        result: out,
        args: Vec::new(),
        site: SiteId(0),
    });
    let mut pb = ProgramBuilder::new();
    let _ = pb.site();
    let yields_ref = pb.add(yields.finish());
    pb.method("yields", yields_ref);
    let mut main = ScopeBuilder::script();
    main.ret(Operand::NIL);
    let main_ref = pb.add(main.finish());
    let mut interp = Interpreter::new(Arc::new(pb.finish(main_ref).unwrap()));

    let err = expect_raised(interp.call("yields", Vec::new()));
    assert_eq!(err.kind, ErrorKind::LocalJumpError);
    assert_eq!(err.reason, Some(JumpReason::NoReason));

    let err = expect_raised(interp.call("missing", Vec::new()));
    assert_eq!(err.kind, ErrorKind::NoMethodError);
    assert_eq!(err.message, "undefined method 'missing'");

    let err = expect_raised(interp.call("each", vec![Val::Int(3)]));
    assert_eq!(err.kind, ErrorKind::TypeError);
}

#[test]
fn test_puts_output_is_captured() {
    let mut pb = ProgramBuilder::new();
    let mut main = ScopeBuilder::script();
    main.emit(Instr::Call {
        result: None,
        method: "puts".into(),
        args: vec![Operand::str("hello"), Operand::int(3), Operand::symbol("sym")],
        block: None,
    })
    .ret(Operand::NIL);
    let main_ref = pb.add(main.finish());
    let mut interp = Interpreter::new(Arc::new(pb.finish(main_ref).unwrap())).capture_output();
    interp.run().unwrap();
    assert_eq!(interp.take_output(), vec!["hello", "3", ":sym"]);
    assert!(interp.take_output().is_empty());
}

fn twice_native(interp: &mut Interpreter, args: &[Val], block: Option<Arc<Closure>>) -> ExecResult<Val> {
    let block = block.ok_or_else(|| RaisedError::local_jump(JumpReason::NoReason, "no block given"))?;
    let first = interp.call_block(&block, args.to_vec())?;
    interp.call_block(&block, vec![first])
}

#[test]
fn test_registered_native_can_call_blocks() {
    // twice_native(5) { |x| x * 2 }
    let mut pb = ProgramBuilder::new();
    let main_ref = pb.reserve();
    let mut blk = ScopeBuilder::closure("blk", main_ref).signature(Signature::fixed(1));
    let x = blk.local("x");
    let doubled = blk.temp();
    blk.emit(Instr::ReceivePreReqdArg { result: x, index: 0 })
        .emit(Instr::BinOp {
            result: doubled,
            op: BinOp::Mul,
            lhs: op(x),
            rhs: Operand::int(2),
        })
        .ret(op(doubled));
    let blk = pb.add(blk.finish());
    let mut main = ScopeBuilder::script();
    let (closure, out) = (main.temp(), main.temp());
    main.emit(Instr::BuildClosure {
        result: closure,
        body: blk,
        kind: BlockKind::Proc,
    })
    .emit(Instr::Call {
        result: Some(out),
        method: "twice_native".into(),
        args: vec![Operand::int(5)],
        block: Some(op(closure)),
    })
    .ret(op(out));
    pb.define(main_ref, main.finish()).unwrap();

    let mut interp = Interpreter::new(Arc::new(pb.finish(main_ref).unwrap()));
    interp.register_native("twice_native", twice_native);
    assert_eq!(interp.run().unwrap(), Val::Int(20));
}

#[test]
fn test_block_operand_must_be_a_closure() {
    let mut pb = ProgramBuilder::new();
    let mut main = ScopeBuilder::script();
    main.emit(Instr::Call {
        result: None,
        method: "times".into(),
        args: vec![Operand::int(1)],
        block: Some(Operand::int(3)),
    });
    let main_ref = pb.add(main.finish());
    let err = expect_raised(run_program(pb.finish(main_ref).unwrap()));
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert_eq!(err.message, "wrong argument type Integer (expected Proc)");
}
