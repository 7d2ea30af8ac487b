use super::*;

fn ints(values: &[i64]) -> Vec<Val> {
    values.iter().copied().map(Val::Int).collect()
}

/// Program with the given methods and an empty script entry.
fn methods(defs: Vec<(&str, ScopeBuilder)>) -> Interpreter {
    let mut pb = ProgramBuilder::new();
    for (name, scope) in defs {
        let scope_ref = pb.add(scope.finish());
        pb.method(name, scope_ref);
    }
    let mut main = ScopeBuilder::script();
    main.ret(Operand::NIL);
    let main_ref = pb.add(main.finish());
    Interpreter::new(Arc::new(pb.finish(main_ref).unwrap()))
}

/// `def opt(a, b = 5, c) = [a, b, c]`
fn opt_method() -> ScopeBuilder {
    let mut m = ScopeBuilder::method("opt").signature(Signature {
        required: 1,
        optional: 1,
        rest: false,
        post: 1,
    });
    let (a, b, c) = (m.local("a"), m.local("b"), m.local("c"));
    let out = m.temp();
    m.emit(Instr::CheckArity {
        required: 2,
        optional: 1,
        rest: false,
    })
    .emit(Instr::ReceivePreReqdArg { result: a, index: 0 })
    .emit(Instr::ReceiveOptArg {
        result: b,
        index: 1,
        post_required: 1,
    })
    .emit(Instr::ReceivePostReqdArg {
        result: c,
        index: 0,
        pre_required: 1,
        optional: 1,
        rest: false,
        post_required: 1,
    })
    .emit(Instr::CopyIfUndefined {
        result: b,
        default: Operand::int(5),
    })
    .emit(Instr::BuildList {
        result: out,
        items: vec![op(a), op(b), op(c)],
    })
    .ret(op(out));
    m
}

/// `def splat(a, *rest, z) = [a, rest, z]`
fn splat_method() -> ScopeBuilder {
    let mut m = ScopeBuilder::method("splat");
    let (a, rest, z) = (m.local("a"), m.local("rest"), m.local("z"));
    let out = m.temp();
    m.emit(Instr::CheckArity {
        required: 2,
        optional: 0,
        rest: true,
    })
    .emit(Instr::ReceivePreReqdArg { result: a, index: 0 })
    .emit(Instr::ReceiveRestArg {
        result: rest,
        arg_index: 1,
        required: 2,
        optional: 0,
    })
    .emit(Instr::ReceivePostReqdArg {
        result: z,
        index: 0,
        pre_required: 1,
        optional: 0,
        rest: true,
        post_required: 1,
    })
    .emit(Instr::BuildList {
        result: out,
        items: vec![op(a), op(rest), op(z)],
    })
    .ret(op(out));
    m
}

/// `def kw(a, k: 10, **opts) = [a, k, opts]`
fn keyword_method() -> ScopeBuilder {
    let mut m = ScopeBuilder::method("kw").keywords().signature(Signature::fixed(1));
    let (a, k, opts) = (m.local("a"), m.local("k"), m.local("opts"));
    let out = m.temp();
    m.emit(Instr::CheckArity {
        required: 1,
        optional: 0,
        rest: false,
    })
    .emit(Instr::ReceivePreReqdArg { result: a, index: 0 })
    .emit(Instr::ReceiveKeywordArg {
        result: k,
        name: "k".into(),
        expected_used: 1,
    })
    .emit(Instr::CopyIfUndefined {
        result: k,
        default: Operand::int(10),
    })
    .emit(Instr::ReceiveKeywordRestArg {
        result: opts,
        expected_used: 1,
    })
    .emit(Instr::BuildList {
        result: out,
        items: vec![op(a), op(k), op(opts)],
    })
    .ret(op(out));
    m
}

#[test]
fn test_optional_and_post_required_binding() {
    let mut interp = methods(vec![("opt", opt_method())]);
    assert_eq!(interp.call("opt", ints(&[1, 2])).unwrap(), Val::list(ints(&[1, 5, 2])));
    assert_eq!(interp.call("opt", ints(&[1, 2, 3])).unwrap(), Val::list(ints(&[1, 2, 3])));

    let err = expect_raised(interp.call("opt", ints(&[1])));
    assert_eq!(err.kind, ErrorKind::ArgumentError);
    assert_eq!(
        err.arity,
        Some(ArityMismatch {
            actual: 1,
            min: 2,
            max: Some(3),
        })
    );
    assert_eq!(err.message, "wrong number of arguments (given 1, expected 2..3)");
}

#[test]
fn test_rest_binding_between_required_params() {
    let mut interp = methods(vec![("splat", splat_method())]);
    assert_eq!(
        interp.call("splat", ints(&[1, 2, 3, 4])).unwrap(),
        Val::list([Val::Int(1), Val::list(ints(&[2, 3])), Val::Int(4)])
    );
    assert_eq!(
        interp.call("splat", ints(&[1, 2])).unwrap(),
        Val::list([Val::Int(1), Val::list([]), Val::Int(2)])
    );
    let err = expect_raised(interp.call("splat", ints(&[1])));
    assert_eq!(err.arity.map(|a| (a.actual, a.min, a.max)), Some((1, 2, None)));
}

#[test]
fn test_keyword_binding_with_defaults_and_rest() {
    let mut interp = methods(vec![("kw", keyword_method())]);
    let caller_map = Val::map([("k", Val::Int(2)), ("z", Val::Int(3))]);
    assert_eq!(
        interp.call("kw", vec![Val::Int(1), caller_map.clone()]).unwrap(),
        Val::list([Val::Int(1), Val::Int(2), Val::map([("z", Val::Int(3))])])
    );
    assert_eq!(caller_map.as_map().map(|m| m.len()), Some(2));

    assert_eq!(
        interp.call("kw", ints(&[1])).unwrap(),
        Val::list([Val::Int(1), Val::Int(10), Val::empty_map()])
    );

    // the keyword hash is not positional, so two plain values are one too many
    let err = expect_raised(interp.call("kw", ints(&[1, 2])));
    assert_eq!(err.arity.map(|a| a.actual), Some(2));
}

#[test]
fn test_procs_are_lenient_and_spread_a_single_list() {
    // total = 0; seen = :unset
    // each(items) { |a, b| total = total + a; seen = b }
    fn run_with(items: Vec<Operand>) -> Val {
        let mut pb = ProgramBuilder::new();
        let main_ref = pb.reserve();
        let mut main = ScopeBuilder::script();
        let total = main.local("total");
        let seen = main.local("seen");
        let (outer_total, outer_seen) = (Variable::outer(1, 0), Variable::outer(1, 1));

        let mut blk = ScopeBuilder::closure("blk", main_ref).signature(Signature::fixed(2));
        let (a, b) = (blk.local("a"), blk.local("b"));
        blk.emit(Instr::CheckArity {
            required: 2,
            optional: 0,
            rest: false,
        })
        .emit(Instr::ReceivePreReqdArg { result: a, index: 0 })
        .emit(Instr::ReceivePreReqdArg { result: b, index: 1 })
        .emit(Instr::BinOp {
            result: outer_total,
            op: BinOp::Add,
            lhs: op(outer_total),
            rhs: op(a),
        })
        .emit(Instr::Copy {
            result: outer_seen,
            value: op(b),
        })
        .ret(Operand::NIL);
        let blk = pb.add(blk.finish());

        let (list, closure, out) = (main.temp(), main.temp(), main.temp());
        main.emit(Instr::Copy {
            result: total,
            value: Operand::int(0),
        })
        .emit(Instr::Copy {
            result: seen,
            value: Operand::symbol("unset"),
        })
        .emit(Instr::BuildList { result: list, items })
        .emit(Instr::BuildClosure {
            result: closure,
            body: blk,
            kind: BlockKind::Proc,
        })
        .emit(Instr::Call {
            result: None,
            method: "each".into(),
            args: vec![op(list)],
            block: Some(op(closure)),
        })
        .emit(Instr::BuildList {
            result: out,
            items: vec![op(total), op(seen)],
        })
        .ret(op(out));
        pb.define(main_ref, main.finish()).unwrap();
        run_program(pb.finish(main_ref).unwrap()).unwrap()
    }

    // single values: `b` is missing and binds nil, arity is not checked
    assert_eq!(
        run_with(vec![Operand::int(1), Operand::int(2)]),
        Val::list([Val::Int(3), Val::Nil])
    );
}

#[test]
fn test_proc_spreads_list_elements() {
    // each([[1, 2], [3, 4]]) { |a, b| sum = sum + a + b }
    let mut pb = ProgramBuilder::new();
    let main_ref = pb.reserve();
    let mut main = ScopeBuilder::script();
    let sum = main.local("sum");
    let outer_sum = Variable::outer(1, 0);

    let mut blk = ScopeBuilder::closure("blk", main_ref).signature(Signature::fixed(2));
    let (a, b) = (blk.local("a"), blk.local("b"));
    let ab = blk.temp();
    blk.emit(Instr::ReceivePreReqdArg { result: a, index: 0 })
        .emit(Instr::ReceivePreReqdArg { result: b, index: 1 })
        .emit(Instr::BinOp {
            result: ab,
            op: BinOp::Add,
            lhs: op(a),
            rhs: op(b),
        })
        .emit(Instr::BinOp {
            result: outer_sum,
            op: BinOp::Add,
            lhs: op(outer_sum),
            rhs: op(ab),
        })
        .ret(Operand::NIL);
    let blk = pb.add(blk.finish());

    let (first, second, list, closure) = (main.temp(), main.temp(), main.temp(), main.temp());
    main.emit(Instr::Copy {
        result: sum,
        value: Operand::int(0),
    })
    .emit(Instr::BuildList {
        result: first,
        items: vec![Operand::int(1), Operand::int(2)],
    })
    .emit(Instr::BuildList {
        result: second,
        items: vec![Operand::int(3), Operand::int(4)],
    })
    .emit(Instr::BuildList {
        result: list,
        items: vec![op(first), op(second)],
    })
    .emit(Instr::BuildClosure {
        result: closure,
        body: blk,
        kind: BlockKind::Proc,
    })
    .emit(Instr::Call {
        result: None,
        method: "each".into(),
        args: vec![op(list)],
        block: Some(op(closure)),
    })
    .ret(op(sum));
    pb.define(main_ref, main.finish()).unwrap();

    assert_eq!(run_program(pb.finish(main_ref).unwrap()).unwrap(), Val::Int(10));
}

#[test]
fn test_lambdas_check_arity() {
    // lambda { |x| x }.call(1, 2)
    let mut pb = ProgramBuilder::new();
    let main_ref = pb.reserve();
    let mut lam = ScopeBuilder::closure("lam", main_ref).signature(Signature::fixed(1));
    let x = lam.local("x");
    lam.emit(Instr::CheckArity {
        required: 1,
        optional: 0,
        rest: false,
    })
    .emit(Instr::ReceivePreReqdArg { result: x, index: 0 })
    .ret(op(x));
    let lam = pb.add(lam.finish());
    let site = pb.site();

    let mut main = ScopeBuilder::script();
    let (closure, out) = (main.temp(), main.temp());
    main.emit(Instr::BuildClosure {
        result: closure,
        body: lam,
        kind: BlockKind::Lambda,
    })
    .emit(Instr::CallClosure {
        result: out,
        closure: op(closure),
        args: vec![Operand::int(1), Operand::int(2)],
        site,
    })
    .ret(op(out));
    pb.define(main_ref, main.finish()).unwrap();

    let err = expect_raised(run_program(pb.finish(main_ref).unwrap()));
    assert_eq!(
        err.arity,
        Some(ArityMismatch {
            actual: 2,
            min: 1,
            max: Some(1),
        })
    );
}
