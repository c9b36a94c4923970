//! End-to-end tests for the infer-resets pass. Circuits are built through
//! the IR builder; the crate has no frontend.

use firth_ir::{
    Annotation, Builder, Circuit, Direction, ModuleIdx, OpIdx, OpKind, Type,
    ValueDef, ValueIdx, FULL_ASYNC_RESET_ANNO, IGNORE_FULL_ASYNC_RESET_ANNO,
};
use firth_opt::passes::InferResets;
use firth_opt::traversal::Pass;
use firth_utils::{FirthResult, GPosIdx};

fn run(circ: &mut Circuit) -> FirthResult<()> {
    let mut pass = InferResets::default();
    pass.run(circ)
}

fn in_port(circ: &mut Circuit, m: ModuleIdx, name: &str, ty: Type) -> ValueIdx {
    circ.add_port(m, name, Direction::Input, ty, GPosIdx::UNKNOWN)
}

/// Attach an annotation to the op defining `value`.
fn annotate_def(circ: &mut Circuit, value: ValueIdx, class: &str) {
    let ValueDef::OpResult { op, .. } = circ.values[value].def else {
        panic!("expected an op result");
    };
    circ.ops[op].annotations.add(Annotation::new(class));
}

fn instance_results(circ: &Circuit, inst: OpIdx) -> Vec<ValueIdx> {
    match &circ.ops[inst].kind {
        OpKind::Instance { results, .. } => results.clone(),
        _ => panic!("expected an instance"),
    }
}

/// The single reset register in a module's body, as
/// `(op, reset, reset_value)`.
fn find_reg_reset(circ: &Circuit, m: ModuleIdx) -> (OpIdx, ValueIdx, ValueIdx) {
    circ.modules[m]
        .body
        .iter()
        .find_map(|&op| match circ.ops[op].kind {
            OpKind::RegReset {
                reset, reset_value, ..
            } => Some((op, reset, reset_value)),
            _ => None,
        })
        .expect("module has a reset register")
}

fn has_abstract_reset(ty: &Type) -> bool {
    match ty {
        Type::Reset => true,
        Type::Bundle(fields) => {
            fields.iter().any(|f| has_abstract_reset(&f.ty))
        }
        Type::Vector(elem, _) => has_abstract_reset(elem),
        _ => false,
    }
}

/// After phase I, no value of abstract reset type may remain anywhere.
fn assert_no_abstract_reset(circ: &Circuit) {
    for (_, value) in circ.values.iter() {
        assert!(
            !has_abstract_reset(&value.ty),
            "value of abstract reset type survived the pass: `{}'",
            value.ty
        );
    }
    for module in circ.modules.values() {
        for port in &module.ports {
            assert!(!has_abstract_reset(&port.ty));
        }
    }
}

/// An abstract reset port driven by a `uint<1>` source and propagated into
/// a submodule resolves to sync everywhere, without any new ports.
#[test]
fn uniform_sync() {
    let mut circ = Circuit::new("top");

    let a = circ.add_module("a", GPosIdx::UNKNOWN);
    let a_clk = in_port(&mut circ, a, "clk", Type::Clock);
    let a_rst = in_port(&mut circ, a, "rst", Type::Reset);
    let mut b = Builder::at_end(&mut circ, a);
    let zero = b.add_constant(Type::Uint(8), 0);
    b.add_reg_reset("q", Type::Uint(8), a_clk, a_rst, zero);

    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let clk = in_port(&mut circ, top, "clk", Type::Clock);
    let rst_in = in_port(&mut circ, top, "rst_in", Type::Uint(1));
    let mut b = Builder::at_end(&mut circ, top);
    let r = b.add_wire("r", Type::Reset);
    b.add_connect(r, rst_in);
    let inst = b.add_instance("a", a);
    let results = instance_results(b.circ, inst);
    b.add_connect(results[0], clk);
    b.add_connect(results[1], r);

    run(&mut circ).unwrap();
    assert_no_abstract_reset(&circ);

    assert_eq!(*circ.ty(r), Type::Uint(1));
    assert_eq!(circ.modules[a].ports[1].ty, Type::Uint(1));
    assert_eq!(*circ.ty(a_rst), Type::Uint(1));
    assert_eq!(*circ.ty(results[1]), Type::Uint(1));
    // The register keeps its sync reset; no async ports appear.
    let (_, reset, _) = find_reg_reset(&circ, a);
    assert_eq!(reset, a_rst);
    assert_eq!(circ.modules[a].ports.len(), 2);
    assert_eq!(circ.modules[top].ports.len(), 2);
}

/// The same topology with an `asyncreset` source resolves to async.
#[test]
fn uniform_async() {
    let mut circ = Circuit::new("top");

    let a = circ.add_module("a", GPosIdx::UNKNOWN);
    let a_clk = in_port(&mut circ, a, "clk", Type::Clock);
    let a_rst = in_port(&mut circ, a, "rst", Type::Reset);
    let mut b = Builder::at_end(&mut circ, a);
    let zero = b.add_constant(Type::Uint(8), 0);
    b.add_reg_reset("q", Type::Uint(8), a_clk, a_rst, zero);

    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let clk = in_port(&mut circ, top, "clk", Type::Clock);
    let rst_in = in_port(&mut circ, top, "rst_in", Type::AsyncReset);
    let mut b = Builder::at_end(&mut circ, top);
    let r = b.add_wire("r", Type::Reset);
    b.add_connect(r, rst_in);
    let inst = b.add_instance("a", a);
    let results = instance_results(b.circ, inst);
    b.add_connect(results[0], clk);
    b.add_connect(results[1], r);

    run(&mut circ).unwrap();
    assert_no_abstract_reset(&circ);

    assert_eq!(*circ.ty(r), Type::AsyncReset);
    assert_eq!(*circ.ty(a_rst), Type::AsyncReset);
    assert_eq!(circ.modules[a].ports[1].ty, Type::AsyncReset);
    let (_, reset, _) = find_reg_reset(&circ, a);
    assert_eq!(reset, a_rst);
}

/// Two leaves of one bundle resolve independently when they sit in
/// different nets.
#[test]
fn bundle_of_resets() {
    let reset_bundle = || {
        Type::bundle(vec![
            firth_ir::BundleField {
                name: "r1".into(),
                flip: false,
                ty: Type::Reset,
            },
            firth_ir::BundleField {
                name: "r2".into(),
                flip: false,
                ty: Type::Reset,
            },
        ])
    };

    let mut circ = Circuit::new("top");
    let child = circ.add_module("child", GPosIdx::UNKNOWN);
    let child_io = in_port(&mut circ, child, "io", reset_bundle());

    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let a_in = in_port(&mut circ, top, "a_in", Type::AsyncReset);
    let s_in = in_port(&mut circ, top, "s_in", Type::Uint(1));
    let mut b = Builder::at_end(&mut circ, top);
    let w = b.add_wire("w", reset_bundle());
    let r1 = b.add_subfield(w, 0);
    b.add_connect(r1, a_in);
    let r2 = b.add_subfield(w, 1);
    b.add_connect(r2, s_in);
    let inst = b.add_instance("c", child);
    let results = instance_results(b.circ, inst);
    b.add_connect(results[0], w);

    run(&mut circ).unwrap();
    assert_no_abstract_reset(&circ);

    let expect = Type::bundle(vec![
        firth_ir::BundleField {
            name: "r1".into(),
            flip: false,
            ty: Type::AsyncReset,
        },
        firth_ir::BundleField {
            name: "r2".into(),
            flip: false,
            ty: Type::Uint(1),
        },
    ]);
    assert_eq!(*circ.ty(w), expect);
    assert_eq!(*circ.ty(child_io), expect);
    assert_eq!(circ.modules[child].ports[0].ty, expect);
}

/// Driving only element 0 of a reset vector makes every element async:
/// the elements collapse into one net because the vector has a single
/// element type.
#[test]
fn vector_of_resets() {
    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let a_in = in_port(&mut circ, top, "a_in", Type::AsyncReset);
    let mut b = Builder::at_end(&mut circ, top);
    let v = b.add_wire("v", Type::vector(Type::Reset, 4));
    let elem = b.add_subindex(v, 0);
    b.add_connect(elem, a_in);

    run(&mut circ).unwrap();
    assert_no_abstract_reset(&circ);

    assert_eq!(*circ.ty(v), Type::vector(Type::AsyncReset, 4));
}

/// A module below an annotated wire inherits the reset domain: it gets a
/// new input port named after the wire, its reset-less register is
/// rewritten, and the parent wires the new instance result to the wire.
#[test]
fn full_async_reset_inheritance() {
    let mut circ = Circuit::new("top");

    let a = circ.add_module("a", GPosIdx::UNKNOWN);
    let a_clk = in_port(&mut circ, a, "clk", Type::Clock);
    let mut b = Builder::at_end(&mut circ, a);
    b.add_reg("q", Type::Uint(8), a_clk);

    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let clk = in_port(&mut circ, top, "clk", Type::Clock);
    let mut b = Builder::at_end(&mut circ, top);
    let w = b.add_wire("w", Type::AsyncReset);
    let inst = b.add_instance("a", a);
    let results = instance_results(b.circ, inst);
    b.add_connect(results[0], clk);
    annotate_def(&mut circ, w, FULL_ASYNC_RESET_ANNO);

    run(&mut circ).unwrap();

    // The submodule grew a port named after the wire.
    assert_eq!(circ.modules[a].ports.len(), 2);
    let new_port = &circ.modules[a].ports[0];
    assert_eq!(new_port.name, "w");
    assert_eq!(new_port.ty, Type::AsyncReset);
    assert_eq!(new_port.direction, Direction::Input);

    // The register now resets to zero through that port.
    let (_, reset, reset_value) = find_reg_reset(&circ, a);
    assert_eq!(reset, new_port.value);
    assert_eq!(*circ.ty(reset_value), Type::Uint(8));
    assert!(matches!(
        circ.values[reset_value].def,
        ValueDef::OpResult { .. }
    ));

    // The instance mirrors the port: a new result at index 0, the old
    // ones shifted, and a connect from the result to the wire.
    let results = instance_results(&circ, inst);
    assert_eq!(results.len(), 2);
    assert_eq!(*circ.ty(results[0]), Type::AsyncReset);
    assert_eq!(
        circ.values[results[1]].def,
        ValueDef::OpResult { op: inst, index: 1 }
    );
    let connected = circ.modules[top].body.iter().any(|&op| {
        matches!(
            circ.ops[op].kind,
            OpKind::Connect { dest, src } if dest == results[0] && src == w
        )
    });
    assert!(connected, "the new instance reset is wired to the wire");
}

/// A register that already had a sync reset keeps its behavior: the old
/// reset folds into a mux on the driver, and the register moves into the
/// async domain with a zero reset value.
#[test]
fn sync_reset_folds_into_mux() {
    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let clk = in_port(&mut circ, top, "clk", Type::Clock);
    let rst = in_port(&mut circ, top, "rst", Type::AsyncReset);
    let srst = in_port(&mut circ, top, "srst", Type::Uint(1));
    let d = in_port(&mut circ, top, "d", Type::Uint(8));
    circ.modules[top].ports[1]
        .annotations
        .add(Annotation::new(FULL_ASYNC_RESET_ANNO));

    let mut b = Builder::at_end(&mut circ, top);
    let init = b.add_constant(Type::Uint(8), 42);
    let q = b.add_reg_reset("q", Type::Uint(8), clk, srst, init);
    b.add_connect(q, d);

    run(&mut circ).unwrap();

    // The register is now in the async domain with a zero value.
    let (_, reset, reset_value) = find_reg_reset(&circ, top);
    assert_eq!(reset, rst);
    assert_ne!(reset_value, init);
    let ValueDef::OpResult { op: zero_op, .. } =
        circ.values[reset_value].def
    else {
        panic!("zero value is an op result");
    };
    assert!(matches!(
        circ.ops[zero_op].kind,
        OpKind::Constant { value: 0, .. }
    ));

    // The driver is wrapped in `mux(srst, old reset value, d)`.
    let mux_src = circ.modules[top]
        .body
        .iter()
        .find_map(|&op| match circ.ops[op].kind {
            OpKind::Connect { dest, src } if dest == q => Some(src),
            _ => None,
        })
        .expect("the register still has a driver");
    let ValueDef::OpResult { op: mux_op, .. } = circ.values[mux_src].def
    else {
        panic!("driver is an op result");
    };
    match circ.ops[mux_op].kind {
        OpKind::Mux {
            sel, high, low, ..
        } => {
            assert_eq!(sel, srst);
            assert_eq!(high, init);
            assert_eq!(low, d);
        }
        _ => panic!("driver is not a mux"),
    }
}

/// An existing port with the right name and type is reused instead of
/// inserting a new one.
#[test]
fn port_insertion_is_minimal() {
    let mut circ = Circuit::new("top");

    let a = circ.add_module("a", GPosIdx::UNKNOWN);
    let a_clk = in_port(&mut circ, a, "clk", Type::Clock);
    let a_rst = in_port(&mut circ, a, "rst", Type::AsyncReset);
    let mut b = Builder::at_end(&mut circ, a);
    b.add_reg("q", Type::Uint(4), a_clk);

    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let clk = in_port(&mut circ, top, "clk", Type::Clock);
    let rst = in_port(&mut circ, top, "rst", Type::AsyncReset);
    circ.modules[top].ports[1]
        .annotations
        .add(Annotation::new(FULL_ASYNC_RESET_ANNO));
    let mut b = Builder::at_end(&mut circ, top);
    let inst = b.add_instance("a", a);
    let results = instance_results(b.circ, inst);
    b.add_connect(results[0], clk);

    run(&mut circ).unwrap();

    // No new port; the existing one carries the domain.
    assert_eq!(circ.modules[a].ports.len(), 2);
    let (_, reset, _) = find_reg_reset(&circ, a);
    assert_eq!(reset, a_rst);
    let connected = circ.modules[top].body.iter().any(|&op| {
        matches!(
            circ.ops[op].kind,
            OpKind::Connect { dest, src }
                if dest == results[1] && src == rst
        )
    });
    assert!(connected, "the reused instance reset is wired up");
}

/// A name collision with an incompatible port picks a `_N`-suffixed name.
#[test]
fn new_port_names_are_uniquified() {
    let mut circ = Circuit::new("top");

    let a = circ.add_module("a", GPosIdx::UNKNOWN);
    let a_clk = in_port(&mut circ, a, "clk", Type::Clock);
    in_port(&mut circ, a, "rst", Type::Uint(1));
    let mut b = Builder::at_end(&mut circ, a);
    b.add_reg("q", Type::Uint(4), a_clk);

    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let clk = in_port(&mut circ, top, "clk", Type::Clock);
    in_port(&mut circ, top, "rst", Type::AsyncReset);
    circ.modules[top].ports[1]
        .annotations
        .add(Annotation::new(FULL_ASYNC_RESET_ANNO));
    let mut b = Builder::at_end(&mut circ, top);
    let inst = b.add_instance("a", a);
    let results = instance_results(b.circ, inst);
    b.add_connect(results[0], clk);

    run(&mut circ).unwrap();

    assert_eq!(circ.modules[a].ports.len(), 3);
    assert_eq!(circ.modules[a].ports[0].name, "rst_0");
    assert_eq!(circ.modules[a].ports[0].ty, Type::AsyncReset);
    // The old incompatible port is untouched.
    assert_eq!(circ.modules[a].ports[2].name, "rst");
    assert_eq!(circ.modules[a].ports[2].ty, Type::Uint(1));
}

/// A module instantiated under two different reset domains is an error
/// listing both instance paths.
#[test]
fn conflicting_domains_are_reported() {
    let mut circ = Circuit::new("top");

    let b_mod = circ.add_module("b", GPosIdx::UNKNOWN);
    in_port(&mut circ, b_mod, "clk", Type::Clock);

    let c_mod = circ.add_module("c", GPosIdx::UNKNOWN);
    circ.modules[c_mod]
        .annotations
        .add(Annotation::new(IGNORE_FULL_ASYNC_RESET_ANNO));
    let mut b = Builder::at_end(&mut circ, c_mod);
    b.add_instance("b_inner", b_mod);

    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let mut b = Builder::at_end(&mut circ, top);
    let w = b.add_wire("w", Type::AsyncReset);
    b.add_instance("b_outer", b_mod);
    b.add_instance("c", c_mod);
    annotate_def(&mut circ, w, FULL_ASYNC_RESET_ANNO);

    let err = run(&mut circ).unwrap_err();
    assert!(
        err.message().contains("instantiated in different reset domains"),
        "unexpected error: {}",
        err.message()
    );
    assert!(err.num_notes() >= 2, "one note per conflicting path");
}

/// A net that is never concretely driven cannot be inferred.
#[test]
fn undriven_net_is_an_error() {
    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let mut b = Builder::at_end(&mut circ, top);
    let r1 = b.add_wire("r1", Type::Reset);
    let r2 = b.add_wire("r2", Type::Reset);
    b.add_connect(r1, r2);

    let err = run(&mut circ).unwrap_err();
    assert!(err
        .message()
        .contains("never driven with concrete type"));
}

/// A net with both async and sync drivers is a contradiction.
#[test]
fn mixed_net_is_an_error() {
    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let a_in = in_port(&mut circ, top, "a_in", Type::AsyncReset);
    let s_in = in_port(&mut circ, top, "s_in", Type::Uint(1));
    let mut b = Builder::at_end(&mut circ, top);
    let r = b.add_wire("r", Type::Reset);
    b.add_connect(r, a_in);
    b.add_connect(r, s_in);

    let err = run(&mut circ).unwrap_err();
    assert!(err
        .message()
        .contains("simultaneously connected to async and sync resets"));
    assert!(err.num_notes() >= 1, "the minority drives are annotated");
}

/// A non-reset value pulled into a reset net is reported at the drive.
#[test]
fn non_reset_type_in_net_is_an_error() {
    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let c = in_port(&mut circ, top, "c", Type::Uint(4));
    let mut b = Builder::at_end(&mut circ, top);
    let r = b.add_wire("r", Type::Reset);
    b.add_connect(r, c);

    let err = run(&mut circ).unwrap_err();
    assert!(err.message().contains("non-reset type"));
}

/// `FullAsyncResetAnnotation` may not target the module itself.
#[test]
fn misplaced_designation_is_an_error() {
    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    circ.modules[top]
        .annotations
        .add(Annotation::new(FULL_ASYNC_RESET_ANNO));

    let err = run(&mut circ).unwrap_err();
    assert!(err.message().contains("cannot target module"));
}

/// `IgnoreFullAsyncResetAnnotation` may not target a port.
#[test]
fn misplaced_ignore_is_an_error() {
    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    in_port(&mut circ, top, "rst", Type::AsyncReset);
    circ.modules[top].ports[0]
        .annotations
        .add(Annotation::new(IGNORE_FULL_ASYNC_RESET_ANNO));

    let err = run(&mut circ).unwrap_err();
    assert!(err.message().contains("cannot target port"));
}

/// Two designations in one module are ambiguous.
#[test]
fn conflicting_annotations_are_an_error() {
    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    in_port(&mut circ, top, "rst", Type::AsyncReset);
    circ.modules[top].ports[0]
        .annotations
        .add(Annotation::new(FULL_ASYNC_RESET_ANNO));
    let mut b = Builder::at_end(&mut circ, top);
    let w = b.add_wire("w", Type::AsyncReset);
    annotate_def(&mut circ, w, FULL_ASYNC_RESET_ANNO);

    let err = run(&mut circ).unwrap_err();
    assert!(err.message().contains("multiple reset annotations"));
    assert_eq!(err.num_notes(), 2);
}

/// A register that already has an async reset is left alone, but must
/// still satisfy the register contract: its reset value must have the
/// register's own type.
#[test]
fn broken_async_register_fails_verification() {
    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let clk = in_port(&mut circ, top, "clk", Type::Clock);
    let rst = in_port(&mut circ, top, "rst", Type::AsyncReset);
    circ.modules[top].ports[1]
        .annotations
        .add(Annotation::new(FULL_ASYNC_RESET_ANNO));
    let mut b = Builder::at_end(&mut circ, top);
    // The reset value is narrower than the register.
    let bad = b.add_constant(Type::Uint(4), 0);
    b.add_reg_reset("q", Type::Uint(8), clk, rst, bad);

    let err = run(&mut circ).unwrap_err();
    assert!(
        err.message().contains("reset value of type"),
        "unexpected error: {}",
        err.message()
    );
}

/// Aggregate register types get a recursively constructed zero value.
#[test]
fn aggregate_registers_reset_to_constructed_zero() {
    let bundle = Type::bundle(vec![
        firth_ir::BundleField {
            name: "value".into(),
            flip: false,
            ty: Type::Uint(16),
        },
        firth_ir::BundleField {
            name: "valid".into(),
            flip: false,
            ty: Type::Uint(1),
        },
    ]);

    let mut circ = Circuit::new("top");
    let top = circ.add_module("top", GPosIdx::UNKNOWN);
    let clk = in_port(&mut circ, top, "clk", Type::Clock);
    in_port(&mut circ, top, "rst", Type::AsyncReset);
    circ.modules[top].ports[1]
        .annotations
        .add(Annotation::new(FULL_ASYNC_RESET_ANNO));
    let mut b = Builder::at_end(&mut circ, top);
    b.add_reg("state", bundle.clone(), clk);

    run(&mut circ).unwrap();

    let (_, _, reset_value) = find_reg_reset(&circ, top);
    assert_eq!(*circ.ty(reset_value), bundle);
    // The zero value is a wire whose fields are driven by constants.
    let ValueDef::OpResult { op, .. } = circ.values[reset_value].def else {
        panic!("zero value is an op result");
    };
    assert!(matches!(circ.ops[op].kind, OpKind::Wire { .. }));
    let field_drives = circ.modules[top]
        .body
        .iter()
        .filter(|&&op| match circ.ops[op].kind {
            OpKind::Connect { dest, .. } => {
                match circ.values[dest].def {
                    ValueDef::OpResult { op: def, .. } => matches!(
                        circ.ops[def].kind,
                        OpKind::Subfield { input, .. }
                            if input == reset_value
                    ),
                    _ => false,
                }
            }
            _ => false,
        })
        .count();
    assert_eq!(field_drives, 2);
}
