use super::*;

/// `def apply(f) = f.call(10)` through one call site, then main applies each of the
/// given lambdas `rounds` times and returns every result in order.
fn apply_program(bodies: &[(BinOp, i64)], rounds: usize) -> (IrProgram, SiteId) {
    let mut pb = ProgramBuilder::new();
    let main_ref = pb.reserve();
    let site = pb.site();

    let lambdas: Vec<ScopeRef> = bodies
        .iter()
        .map(|(binop, rhs)| {
            let mut lam = ScopeBuilder::closure("f", main_ref).signature(Signature::fixed(1));
            let x = lam.local("x");
            let out = lam.temp();
            lam.emit(Instr::ReceivePreReqdArg { result: x, index: 0 })
                .emit(Instr::BinOp {
                    result: out,
                    op: *binop,
                    lhs: op(x),
                    rhs: Operand::int(*rhs),
                })
                .ret(op(out));
            pb.add(lam.finish())
        })
        .collect();

    let mut apply = ScopeBuilder::method("apply");
    let f = apply.local("f");
    let out = apply.temp();
    apply
        .emit(Instr::ReceivePreReqdArg { result: f, index: 0 })
        .emit(Instr::CallClosure {
            result: out,
            closure: op(f),
            args: vec![Operand::int(10)],
            site,
        })
        .ret(op(out));
    let apply_ref = pb.add(apply.finish());
    pb.method("apply", apply_ref);

    let mut main = ScopeBuilder::script();
    let mut results = Vec::new();
    for _ in 0..rounds {
        for body in &lambdas {
            let (closure, value) = (main.temp(), main.temp());
            main.emit(Instr::BuildClosure {
                result: closure,
                body: *body,
                kind: BlockKind::Lambda,
            })
            .emit(Instr::Call {
                result: Some(value),
                method: "apply".into(),
                args: vec![op(closure)],
                block: None,
            });
            results.push(op(value));
        }
    }
    let all = main.temp();
    main.emit(Instr::BuildList { result: all, items: results }).ret(op(all));
    pb.define(main_ref, main.finish()).unwrap();
    (pb.finish(main_ref).unwrap(), site)
}

#[test]
fn test_monomorphic_site_stays_cached() {
    let (program, site) = apply_program(&[(BinOp::Add, 1)], 4);
    let mut interp = Interpreter::new(Arc::new(program));
    assert_eq!(interp.run().unwrap(), Val::list(vec![Val::Int(11); 4]));
    match interp.site_state(site) {
        Some(DispatchState::Cached { hits, .. }) => assert_eq!(*hits, 3),
        other => panic!("expected a cached site, got {:?}", other),
    }
}

#[test]
fn test_cached_and_general_tiers_agree() {
    let bodies = [(BinOp::Add, 1), (BinOp::Mul, 2), (BinOp::Sub, 3)];
    let (program, site) = apply_program(&bodies, 3);
    let program = Arc::new(program);

    let cached_config = InterpConfig::default().with_megamorphic_threshold(4);
    let mut cached = Interpreter::with_config(Arc::clone(&program), cached_config);
    let mut general = Interpreter::with_config(Arc::clone(&program), InterpConfig::default().with_inline_cache(false));

    let expected = Val::list([11, 20, 7, 11, 20, 7, 11, 20, 7].map(Val::Int));
    assert_eq!(cached.run().unwrap(), expected);
    assert_eq!(general.run().unwrap(), expected);

    // 9 calls, 8 target changes: the fourth change makes the site megamorphic
    assert_eq!(cached.site_state(site), Some(&DispatchState::General));
    assert_eq!(general.site_state(site), Some(&DispatchState::General));
}

#[test]
fn test_polymorphic_site_below_threshold_stays_cached() {
    let bodies = [(BinOp::Add, 1), (BinOp::Mul, 2)];
    let (program, site) = apply_program(&bodies, 1);
    let mut interp = Interpreter::new(Arc::new(program));
    assert_eq!(interp.run().unwrap(), Val::list([Val::Int(11), Val::Int(20)]));
    assert!(matches!(
        interp.site_state(site),
        Some(DispatchState::Cached { hits: 0, .. })
    ));
}
