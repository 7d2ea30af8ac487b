use super::*;

/// main: `x = 41; thread { <body> }`
fn thread_program<F: FnOnce(&mut ScopeBuilder)>(body: F) -> IrProgram {
    let mut pb = ProgramBuilder::new();
    let main_ref = pb.reserve();
    let mut blk = ScopeBuilder::closure("blk", main_ref);
    body(&mut blk);
    let blk = pb.add(blk.finish());
    let mut main = ScopeBuilder::script();
    let x = main.local("x");
    let (closure, out) = (main.temp(), main.temp());
    main.emit(Instr::Copy {
        result: x,
        value: Operand::int(41),
    })
    .emit(Instr::BuildClosure {
        result: closure,
        body: blk,
        kind: BlockKind::Proc,
    })
    .emit(Instr::Call {
        result: Some(out),
        method: "thread".into(),
        args: Vec::new(),
        block: Some(op(closure)),
    })
    .ret(op(out));
    pb.define(main_ref, main.finish()).unwrap();
    pb.finish(main_ref).unwrap()
}

#[test]
fn test_thread_block_sees_captured_variables() {
    let program = thread_program(|blk| {
        let sum = blk.temp();
        blk.emit(Instr::BinOp {
            result: sum,
            op: BinOp::Add,
            lhs: op(Variable::outer(1, 0)),
            rhs: Operand::int(1),
        })
        .ret(op(sum));
    });
    assert_eq!(run_program(program).unwrap(), Val::Int(42));
}

#[test]
fn test_return_cannot_cross_threads() {
    let err = expect_raised(run_program(thread_program(|blk| {
        blk.emit(Instr::NonLocalReturn { value: Operand::int(1) });
    })));
    assert_eq!(err.kind, ErrorKind::ThreadError);
    assert_eq!(err.message, "return can't jump across threads");
}

#[test]
fn test_break_out_of_a_thread_block_is_an_error() {
    let err = expect_raised(run_program(thread_program(|blk| {
        blk.emit(Instr::Break { value: Operand::int(1) });
    })));
    assert_eq!(err.kind, ErrorKind::LocalJumpError);
    assert_eq!(err.reason, Some(JumpReason::Break));
}

#[test]
fn test_thread_output_joins_the_parent_capture() {
    let program = thread_program(|blk| {
        blk.emit(Instr::Call {
            result: None,
            method: "puts".into(),
            args: vec![Operand::str("from thread")],
            block: None,
        });
    });
    let mut interp = Interpreter::new(Arc::new(program)).capture_output();
    assert_eq!(interp.run().unwrap(), Val::Nil);
    assert_eq!(interp.take_output(), vec!["from thread"]);
    assert!(interp.thread().is_main());
}

/// `def mk = proc { return 1 }`, then `thread { mk.call }`: the proc's method is gone.
#[test]
fn test_return_to_finished_method_from_thread_is_local_jump_error() {
    let mut pb = ProgramBuilder::new();
    let main_ref = pb.reserve();
    let mk_ref = pb.reserve();
    let site = pb.site();

    let ret_body = single_instr_block(&mut pb, mk_ref, Instr::NonLocalReturn { value: Operand::int(1) });
    let mut mk = ScopeBuilder::method("mk");
    let made = mk.temp();
    mk.emit(Instr::BuildClosure {
        result: made,
        body: ret_body,
        kind: BlockKind::Proc,
    })
    .ret(op(made));
    pb.define(mk_ref, mk.finish()).unwrap();
    pb.method("mk", mk_ref);

    let mut blk = ScopeBuilder::closure("blk", main_ref);
    let (made, out) = (blk.temp(), blk.temp());
    blk.emit(Instr::Call {
        result: Some(made),
        method: "mk".into(),
        args: Vec::new(),
        block: None,
    })
    .emit(Instr::CallClosure {
        result: out,
        closure: op(made),
        args: Vec::new(),
        site,
    })
    .ret(op(out));
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
        method: "thread".into(),
        args: Vec::new(),
        block: Some(op(closure)),
    })
    .ret(op(out));
    pb.define(main_ref, main.finish()).unwrap();

    let err = expect_raised(run_program(pb.finish(main_ref).unwrap()));
    assert_eq!(err.kind, ErrorKind::LocalJumpError);
    assert_eq!(err.reason, Some(JumpReason::Return));
}

/// `def m; p = proc { return 1 }; thread { p.call }; end`: `m` is still running, but
/// on the parent thread.
#[test]
fn test_return_to_method_running_on_parent_thread_is_thread_error() {
    let mut pb = ProgramBuilder::new();
    let m_ref = pb.reserve();
    let site = pb.site();

    let ret_body = single_instr_block(&mut pb, m_ref, Instr::NonLocalReturn { value: Operand::int(1) });
    let mut tblk = ScopeBuilder::closure("tblk", m_ref);
    let out = tblk.temp();
    tblk.emit(Instr::CallClosure {
        result: out,
        closure: op(Variable::outer(1, 0)),
        args: Vec::new(),
        site,
    })
    .ret(op(out));
    let tblk = pb.add(tblk.finish());

    let mut m = ScopeBuilder::method("m");
    let p = m.local("p");
    let (closure, out) = (m.temp(), m.temp());
    m.emit(Instr::BuildClosure {
        result: p,
        body: ret_body,
        kind: BlockKind::Proc,
    })
    .emit(Instr::BuildClosure {
        result: closure,
        body: tblk,
        kind: BlockKind::Proc,
    })
    .emit(Instr::Call {
        result: Some(out),
        method: "thread".into(),
        args: Vec::new(),
        block: Some(op(closure)),
    })
    .ret(op(out));
    pb.define(m_ref, m.finish()).unwrap();
    pb.method("m", m_ref);

    let mut main = ScopeBuilder::script();
    main.ret(Operand::NIL);
    let main_ref = pb.add(main.finish());

    let mut interp = Interpreter::new(Arc::new(pb.finish(main_ref).unwrap()));
    let err = expect_raised(interp.call("m", Vec::new()));
    assert_eq!(err.kind, ErrorKind::ThreadError);
    assert_eq!(err.message, "return can't jump across threads");
}
