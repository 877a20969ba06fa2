use pretty_assertions::assert_eq;
use smallvec::smallvec;

use super::*;
use crate::{Interner, TypePool};

#[test]
fn literals_carry_their_type() {
    let mut arena = AstArena::new();
    let id = arena.int_literal(TypeId::I32, 42, Span::DUMMY);
    let node = arena.node(id);
    assert_eq!(node.ty, TypeId::I32);
    assert_eq!(node.kind, NodeKind::IntLiteral { bits: 42 });

    let id = arena.bool_literal(true, Span::DUMMY);
    assert_eq!(arena.node(id).ty, TypeId::BOOL);
}

#[test]
fn handles_are_dense() {
    let mut arena = AstArena::new();
    let a = arena.bool_literal(false, Span::DUMMY);
    let b = arena.bool_literal(true, Span::DUMMY);
    assert_eq!(a.raw(), 0);
    assert_eq!(b.raw(), 1);
    assert_eq!(arena.len(), 2);
}

#[test]
fn comma_list_keeps_item_order() {
    let mut arena = AstArena::new();
    let mut pool = TypePool::new();
    let tuple = pool.tuple(&[TypeId::I32, TypeId::BOOL]);

    let a = arena.int_literal(TypeId::I32, 1, Span::DUMMY);
    let b = arena.bool_literal(true, Span::DUMMY);
    let list = arena.comma_list(tuple, smallvec![a, b], Span::DUMMY);

    match &arena.node(list).kind {
        NodeKind::CommaList { items } => assert_eq!(items.as_slice(), &[a, b]),
        other => panic!("expected comma list, got {other:?}"),
    }
}

#[test]
fn substitution_round_trip() {
    let mut arena = AstArena::new();
    let placeholder = arena.run_directive(TypeId::I64, Span::new(10, 5));
    assert_eq!(arena.substitution_for(placeholder), None);

    let replacement = arena.int_literal(TypeId::I64, 7, Span::new(10, 5));
    arena.substitute(placeholder, replacement);
    assert_eq!(arena.substitution_for(placeholder), Some(replacement));
}

#[test]
fn implicit_cast_wraps_operand() {
    let mut arena = AstArena::new();
    let mut pool = TypePool::new();
    let interner = Interner::new();
    let name = interner.intern("Handle");
    let opaque = pool.opaque(name, TypeId::U64);

    let inner = arena.int_literal(TypeId::U64, 99, Span::DUMMY);
    let cast = arena.implicit_cast(opaque, CastKind::OpaqueConversion, inner, Span::DUMMY);

    match arena.node(cast).kind {
        NodeKind::ImplicitCast { cast, operand } => {
            assert_eq!(cast, CastKind::OpaqueConversion);
            assert_eq!(operand, inner);
        }
        ref other => panic!("expected cast, got {other:?}"),
    }
}
