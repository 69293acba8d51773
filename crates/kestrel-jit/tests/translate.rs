//! End-to-end translation tests over hand-assembled bytecode

use kestrel_bytecode::{
    CompilationInput, Constant, ConstantPool, ExceptionHandler, MethodDescriptor, MethodRef,
    ValueType,
};
use kestrel_jit::{
    CallKind, CompiledMethod, HirOp, SafepointKind, SafepointState, Terminator, TranslateError,
    translate,
};
use proptest::prelude::*;

fn compile(method: MethodDescriptor) -> Result<CompiledMethod, TranslateError> {
    let pool = ConstantPool::new();
    compile_with_pool(method, &pool)
}

fn compile_with_pool(
    method: MethodDescriptor,
    pool: &ConstantPool,
) -> Result<CompiledMethod, TranslateError> {
    translate(&CompilationInput {
        method: &method,
        pool,
    })
}

#[test]
fn test_straight_line_add() {
    // iconst_2, iconst_3, iadd, ireturn
    let m = MethodDescriptor::builder("add")
        .code([0x05, 0x06, 0x60, 0xAC])
        .max_stack(2)
        .returns(ValueType::Int)
        .build();
    let out = compile(m).unwrap();
    let first = out.cfg.block_at(0).unwrap();
    match out.graph.block(first).terminator() {
        Terminator::Return(Some(v)) => {
            // Both operands are constants; the add folds.
            assert_eq!(out.graph.value(*v).op, HirOp::ConstInt(5));
        }
        other => panic!("unexpected terminator: {other:?}"),
    }
    // Method entry poll only.
    assert_eq!(out.safepoints.len(), 1);
    assert!(out.safepoints.all_committed());
}

#[test]
fn test_parameters_flow_into_locals() {
    // iload_0, iload_1, iadd, ireturn
    let m = MethodDescriptor::builder("add2")
        .code([0x1A, 0x1B, 0x60, 0xAC])
        .max_stack(2)
        .param(ValueType::Int)
        .param(ValueType::Int)
        .returns(ValueType::Int)
        .build();
    let out = compile(m).unwrap();
    let first = out.cfg.block_at(0).unwrap();
    match out.graph.block(first).terminator() {
        Terminator::Return(Some(v)) => match &out.graph.value(*v).op {
            HirOp::Binary { lhs, rhs, .. } => {
                assert_eq!(out.graph.value(*lhs).op, HirOp::Param(0));
                assert_eq!(out.graph.value(*rhs).op, HirOp::Param(1));
            }
            other => panic!("unexpected op: {other:?}"),
        },
        other => panic!("unexpected terminator: {other:?}"),
    }
}

#[test]
fn test_shift_count_folds_masked() {
    // iconst_1, bipush 33, ishl, ireturn -- 1 << 33 == 1 << 1
    let m = MethodDescriptor::builder("shl33")
        .code([0x04, 0x10, 0x21, 0x78, 0xAC])
        .max_stack(2)
        .returns(ValueType::Int)
        .build();
    let out = compile(m).unwrap();
    let first = out.cfg.block_at(0).unwrap();
    match out.graph.block(first).terminator() {
        Terminator::Return(Some(v)) => {
            assert_eq!(out.graph.value(*v).op, HirOp::ConstInt(2));
        }
        other => panic!("unexpected terminator: {other:?}"),
    }
}

#[test]
fn test_constant_zero_divisor_keeps_trap() {
    // iconst_1, iconst_0, idiv, ireturn
    let m = MethodDescriptor::builder("div0")
        .code([0x04, 0x03, 0x6C, 0xAC])
        .max_stack(2)
        .returns(ValueType::Int)
        .build();
    let out = compile(m).unwrap();
    let first = out.cfg.block_at(0).unwrap();
    let has_zero_check = out
        .graph
        .block(first)
        .insts
        .iter()
        .any(|&v| matches!(out.graph.value(v).op, HirOp::ZeroCheck(_)));
    assert!(has_zero_check, "division by constant zero must keep its trap");
}

#[test]
fn test_loop_header_has_exactly_one_committed_poll() {
    // 0: iload_0; 1: ifle -> 10; 4: iinc 0 -1; 7: goto -> 0; 10: return
    let m = MethodDescriptor::builder("countdown")
        .code([
            0x1A, 0x9E, 0x00, 0x09, 0x84, 0x00, 0xFF, 0xA7, 0xFF, 0xF9, 0xB1,
        ])
        .max_stack(1)
        .param(ValueType::Int)
        .build();
    let out = compile(m).unwrap();
    let headers: Vec<_> = out
        .safepoints
        .iter()
        .filter(|e| e.kind == SafepointKind::LoopHeader)
        .collect();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].state, SafepointState::Committed);
    assert_eq!(headers[0].bci, 0);
    assert!(out.safepoints.all_committed());

    // The poll op sits in the header block.
    let header = out.cfg.block_at(0).unwrap();
    let polls = out
        .graph
        .block(header)
        .insts
        .iter()
        .filter(|&&v| matches!(out.graph.value(v).op, HirOp::SafepointPoll(_)))
        .count();
    assert_eq!(polls, 1);
}

#[test]
fn test_empty_infinite_loop_polls() {
    // 0: goto -> 0
    let m = MethodDescriptor::builder("spin")
        .code([0xA7, 0x00, 0x00])
        .build();
    let out = compile(m).unwrap();
    let header = out.cfg.block_at(0).unwrap();
    assert!(out.cfg.block(header).is_loop_header);
    let headers: Vec<_> = out
        .safepoints
        .iter()
        .filter(|e| e.kind == SafepointKind::LoopHeader)
        .collect();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].state, SafepointState::Committed);
}

#[test]
fn test_merge_with_different_stack_types_rejected() {
    // 0: iload_0; 1: ifeq -> 8; 4: iconst_0; 5: goto -> 9;
    // 8: fconst_0; 9: return
    let m = MethodDescriptor::builder("badmerge")
        .code([0x1A, 0x99, 0x00, 0x07, 0x03, 0xA7, 0x00, 0x04, 0x0B, 0xB1])
        .max_stack(2)
        .param(ValueType::Int)
        .build();
    let err = compile(m).unwrap_err();
    assert!(matches!(err, TranslateError::Verification { .. }));
}

#[test]
fn test_merge_with_different_depths_rejected() {
    // 0: iload_0; 1: ifeq -> 8; 4: iconst_0; 5: goto -> 9;
    // 8: lconst_0 (two slots); 9: return
    let m = MethodDescriptor::builder("baddepth")
        .code([0x1A, 0x99, 0x00, 0x07, 0x03, 0xA7, 0x00, 0x04, 0x09, 0xB1])
        .max_stack(2)
        .param(ValueType::Int)
        .build();
    let err = compile(m).unwrap_err();
    assert!(matches!(err, TranslateError::Verification { .. }));
}

#[test]
fn test_matching_merge_builds_phi() {
    // 0: iload_0; 1: ifeq -> 8; 4: iconst_1; 5: goto -> 9;
    // 8: iconst_2; 9: ireturn
    let m = MethodDescriptor::builder("select")
        .code([0x1A, 0x99, 0x00, 0x07, 0x04, 0xA7, 0x00, 0x04, 0x05, 0xAC])
        .max_stack(2)
        .param(ValueType::Int)
        .returns(ValueType::Int)
        .build();
    let out = compile(m).unwrap();
    let join = out.cfg.block_at(9).unwrap();
    // One phi for local 0, one for the merged stack slot.
    assert_eq!(out.graph.block(join).phis.len(), 2);
    match out.graph.block(join).terminator() {
        Terminator::Return(Some(v)) => match &out.graph.value(*v).op {
            HirOp::Phi(inputs) => assert_eq!(inputs.len(), 2),
            other => panic!("unexpected op: {other:?}"),
        },
        other => panic!("unexpected terminator: {other:?}"),
    }
}

#[test]
fn test_unsupported_construct_bails_out() {
    // jsr -> 3; return at the target
    let m = MethodDescriptor::builder("subroutine")
        .code([0xA8, 0x00, 0x03, 0xB1])
        .build();
    let err = compile(m).unwrap_err();
    assert!(matches!(err, TranslateError::Unsupported("jsr")));
}

#[test]
fn test_handler_entry_gets_caught_exception() {
    // 0: iconst_0; 1: istore_1; 2: goto -> 6; 5: athrow (handler);
    // 6: return  -- handler covers [0, 2)
    let m = MethodDescriptor::builder("guarded")
        .code([0x03, 0x3C, 0xA7, 0x00, 0x04, 0xBF, 0xB1])
        .max_stack(1)
        .max_locals(2)
        .param(ValueType::Int)
        .handler(ExceptionHandler {
            start: 0,
            end: 2,
            handler: 5,
            catch_type: None,
        })
        .build();
    let out = compile(m).unwrap();
    let handler = out.cfg.block_at(5).unwrap();
    let caught = out
        .graph
        .block(handler)
        .insts
        .iter()
        .any(|&v| matches!(out.graph.value(v).op, HirOp::CaughtException));
    assert!(caught, "handler entry must materialize the in-flight exception");
    // athrow consumes it.
    assert!(matches!(
        out.graph.block(handler).terminator(),
        Terminator::Throw(_)
    ));
}

#[test]
fn test_handler_at_method_entry_rejected() {
    // 0: iconst_0; 1: istore_0; 2: return -- handler covers [1, 2) and
    // lands back at offset 0, where the entry frame is already seeded.
    let m = MethodDescriptor::builder("selfguard")
        .code([0x03, 0x3B, 0xB1])
        .max_stack(1)
        .max_locals(1)
        .handler(ExceptionHandler {
            start: 1,
            end: 2,
            handler: 0,
            catch_type: None,
        })
        .build();
    let err = compile(m).unwrap_err();
    assert!(matches!(err, TranslateError::Verification { .. }));
}

#[test]
fn test_nine_argument_call_spills() {
    let mut pool = ConstantPool::new();
    let class = pool.push_class("Host");
    let name = pool.intern_utf8("sum9");
    let target = pool.push(Constant::Method(MethodRef {
        class,
        name,
        params: vec![ValueType::Int; 9],
        ret: Some(ValueType::Int),
        is_native: false,
    }));
    // Nine iconst_1 pushes, invokestatic, ireturn.
    let mut code = vec![0x04; 9];
    code.extend_from_slice(&[0xB8, 0x00, target.index() as u8]);
    code.push(0xAC);
    let m = MethodDescriptor::builder("caller")
        .code(code)
        .max_stack(9)
        .returns(ValueType::Int)
        .build();
    let out = compile_with_pool(m, &pool).unwrap();
    assert_eq!(out.call_sites.len(), 1);
    let site = out.call_sites.iter().next().unwrap();
    assert_eq!(site.kind, CallKind::Static);
    assert!(site.patchable);
    assert_eq!(site.layout.args.len(), 9);
    assert_eq!(site.layout.stack_slots(), 3);
}

#[test]
fn test_native_target_records_native_call_site() {
    let mut pool = ConstantPool::new();
    let class = pool.push_class("Host");
    let name = pool.intern_utf8("currentTimeMillis");
    let target = pool.push(Constant::Method(MethodRef {
        class,
        name,
        params: vec![ValueType::Int],
        ret: Some(ValueType::Int),
        is_native: true,
    }));
    // iconst_1, invokestatic, ireturn
    let m = MethodDescriptor::builder("clock")
        .code([0x04, 0xB8, 0x00, target.index() as u8, 0xAC])
        .max_stack(1)
        .returns(ValueType::Int)
        .build();
    let out = compile_with_pool(m, &pool).unwrap();
    let site = out.call_sites.iter().next().unwrap();
    assert_eq!(site.kind, CallKind::Native);
    assert!(!site.patchable);
    assert_eq!(site.layout.args.len(), 1);
}

#[test]
fn test_sparse_switch_becomes_decision_tree() {
    // lookupswitch with keys 0 and 10_000: far too sparse for a table.
    let mut code = vec![0x1A, 0xAB, 0x00, 0x00]; // iload_0; lookupswitch; pad
    code.extend_from_slice(&27i32.to_be_bytes()); // default -> 28
    code.extend_from_slice(&2i32.to_be_bytes());
    code.extend_from_slice(&0i32.to_be_bytes());
    code.extend_from_slice(&27i32.to_be_bytes()); // key 0 -> 28
    code.extend_from_slice(&10_000i32.to_be_bytes());
    code.extend_from_slice(&27i32.to_be_bytes()); // key 10000 -> 28
    code.push(0xB1); // 28: return
    let m = MethodDescriptor::builder("sparse")
        .code(code)
        .max_stack(1)
        .param(ValueType::Int)
        .build();
    let out = compile(m).unwrap();
    let first = out.cfg.block_at(0).unwrap();
    assert!(matches!(
        out.graph.block(first).terminator(),
        Terminator::Switch { .. }
    ));
}

#[test]
fn test_dense_switch_becomes_jump_table() {
    // lookupswitch with keys 0..=3: dense, becomes a table.
    let mut code = vec![0x1A, 0xAB, 0x00, 0x00];
    code.extend_from_slice(&43i32.to_be_bytes()); // default -> 44
    code.extend_from_slice(&4i32.to_be_bytes());
    for key in 0..4i32 {
        code.extend_from_slice(&key.to_be_bytes());
        code.extend_from_slice(&43i32.to_be_bytes()); // all keys -> 44
    }
    code.push(0xB1); // 44: return
    let m = MethodDescriptor::builder("dense")
        .code(code)
        .max_stack(1)
        .param(ValueType::Int)
        .build();
    let out = compile(m).unwrap();
    let first = out.cfg.block_at(0).unwrap();
    match out.graph.block(first).terminator() {
        Terminator::JumpTable { low, targets, .. } => {
            assert_eq!(*low, 0);
            assert_eq!(targets.len(), 4);
        }
        other => panic!("unexpected terminator: {other:?}"),
    }
}

#[test]
fn test_malformed_input_is_not_a_panic() {
    // Truncated sipush.
    let m = MethodDescriptor::builder("truncated")
        .code([0x11, 0x01])
        .build();
    let err = compile(m).unwrap_err();
    assert!(matches!(err, TranslateError::Malformed(_)));
}

proptest! {
    /// Two branches that push the same type always merge; two branches
    /// that push different categories or types never do.
    #[test]
    fn prop_merge_requires_matching_shapes(a in 0usize..4, b in 0usize..4) {
        // (push opcode, type name) per arm
        let pushes: [u8; 4] = [
            0x03, // iconst_0    -> int
            0x0B, // fconst_0    -> float
            0x01, // aconst_null -> reference
            0x09, // lconst_0    -> long
        ];
        let code = [
            0x1A, // iload_0
            0x99, 0x00, 0x07, // ifeq -> 8
            pushes[a],
            0xA7, 0x00, 0x04, // goto -> 9
            pushes[b],
            0xB1, // return
        ];
        let m = MethodDescriptor::builder("merge")
            .code(code)
            .max_stack(2)
            .param(ValueType::Int)
            .build();
        let result = compile(m);
        if a == b {
            prop_assert!(result.is_ok());
        } else {
            let rejected = matches!(result, Err(TranslateError::Verification { .. }));
            prop_assert!(rejected);
        }
    }
}
