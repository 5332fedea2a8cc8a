//! Link protocol and dead-code elimination through the public graph API.

use jitir::core::ops::{BinaryOp, BinaryOpcode, CallOtherDefOp, CopyOp, LoadOp, MiniDfState};
use jitir::core::{
    GraphError, Location, OpId, Space, TypeBehavior, UseDefGraph, UseropDefinition, ValueId,
};
use std::sync::Arc;

fn use_counts(graph: &UseDefGraph) -> Vec<(ValueId, usize)> {
    graph
        .values()
        .iter()
        .map(|(id, value)| (id, value.use_count()))
        .collect()
}

fn load(graph: &mut UseDefGraph, offset: ValueId) -> (OpId, ValueId) {
    let out = graph.new_output(8);
    let id = graph
        .add_linked(LoadOp::new(out, Space::Ram, offset))
        .unwrap();
    (id, out)
}

fn pair_userop(pure: bool) -> Arc<UseropDefinition> {
    let def = UseropDefinition::new(
        "fmin",
        vec![TypeBehavior::Float, TypeBehavior::Float],
        TypeBehavior::Float,
    );
    Arc::new(if pure { def.pure() } else { def })
}

#[test]
fn test_link_unlink_round_trip() {
    let mut graph = UseDefGraph::new();
    let rax = graph.new_location(Location::new(Space::Register, 0x0, 8));
    let c = graph.new_const(0x10, 8);
    let sum = graph.new_output(8);
    let copy = graph.new_output(8);

    let add = graph.add_op(BinaryOp::new(BinaryOpcode::IntAdd, sum, rax, rax));
    let mov = graph.add_op(CopyOp::new(copy, c));
    let before = use_counts(&graph);

    graph.link(add).unwrap();
    graph.link(mov).unwrap();
    // Both positions of the add are recorded separately.
    assert_eq!(graph.uses(rax).unwrap().len(), 2);
    assert_eq!(graph.definer(sum).unwrap(), Some(add));
    graph.check_consistency().unwrap();

    graph.unlink(mov).unwrap();
    graph.unlink(add).unwrap();
    assert_eq!(use_counts(&graph), before);
    assert_eq!(graph.definer(sum).unwrap(), None);
    graph.check_consistency().unwrap();

    // Relinking after a round trip is allowed.
    graph.link(add).unwrap();
    graph.check_consistency().unwrap();
}

#[test]
fn test_consistency_after_mixed_sequence() {
    let mut graph = UseDefGraph::new();
    let base = graph.new_const(0x1000, 8);
    let mut ids = Vec::new();
    let mut offset = base;
    for _ in 0..4 {
        let (id, out) = load(&mut graph, offset);
        ids.push(id);
        offset = out;
    }
    graph.unlink(ids[3]).unwrap();
    graph.unlink(ids[1]).unwrap();
    graph.check_consistency().unwrap();
    graph.link(ids[1]).unwrap();
    graph.check_consistency().unwrap();
    assert_eq!(graph.uses(base).unwrap().len(), 1);
}

#[test]
fn test_unused_const_load_is_removable() {
    let mut graph = UseDefGraph::new();
    let c = graph.new_const(0x10, 8);
    let (id, _) = load(&mut graph, c);

    assert_eq!(graph.type_for(id, 0).unwrap(), TypeBehavior::Integer);
    assert!(graph.can_be_removed(id).unwrap());

    graph.unlink(id).unwrap();
    assert_eq!(graph.value(c).unwrap().use_count(), 0);
    assert!(!graph.value(c).unwrap().has_use(id, 0));
}

#[test]
fn test_load_has_one_operand() {
    let mut graph = UseDefGraph::new();
    let c = graph.new_const(0x10, 8);
    let (id, _) = load(&mut graph, c);
    let err = graph.type_for(id, 1).unwrap_err();
    assert!(matches!(
        err,
        GraphError::OperandOutOfRange { op, position: 1, .. } if op == id
    ));
    assert!(err.to_string().contains("LOAD"));
}

#[test]
fn test_used_output_blocks_removal() {
    let mut graph = UseDefGraph::new();
    let c = graph.new_const(0x10, 8);
    let (first, v) = load(&mut graph, c);
    let (second, _) = load(&mut graph, v);

    assert!(!graph.can_be_removed(first).unwrap());
    graph.remove(second).unwrap();
    assert!(graph.can_be_removed(first).unwrap());
    graph.remove(first).unwrap();
    assert!(graph.is_empty());
}

#[test]
fn test_load_chain_is_eliminated() {
    for n in [1usize, 2, 7, 32] {
        let mut graph = UseDefGraph::new();
        let mut offset = graph.new_const(0x10, 8);
        for _ in 0..n {
            offset = load(&mut graph, offset).1;
        }
        assert_eq!(graph.eliminate_dead_code().unwrap(), n);
        assert!(graph.is_empty());
        assert_eq!(graph.eliminate_dead_code().unwrap(), 0);
        graph.check_consistency().unwrap();
    }
}

#[test]
fn test_pure_call_with_consumer() {
    for pure in [true, false] {
        let mut graph = UseDefGraph::new();
        let a = graph.new_location(Location::new(Space::Register, 0x1200, 8));
        let b = graph.new_location(Location::new(Space::Register, 0x1220, 8));
        let out = graph.new_output(8);
        let call = graph
            .add_linked(CallOtherDefOp::new(
                out,
                pair_userop(pure),
                vec![a, b],
                vec![TypeBehavior::Float, TypeBehavior::Float],
                MiniDfState::default(),
            ))
            .unwrap();
        let copy_out = graph.new_output(8);
        let consumer = graph.add_linked(CopyOp::new(copy_out, out)).unwrap();

        assert!(!graph.can_be_removed(call).unwrap());
        graph.remove(consumer).unwrap();
        assert_eq!(graph.can_be_removed(call).unwrap(), pure);

        let result = graph.remove(call);
        if pure {
            result.unwrap();
            assert_eq!(graph.value(a).unwrap().use_count(), 0);
            assert_eq!(graph.value(b).unwrap().use_count(), 0);
        } else {
            assert_eq!(
                result.unwrap_err(),
                GraphError::NotRemovable {
                    op: call,
                    reason: "operation has side effects"
                }
            );
            assert_eq!(graph.uses(a).unwrap().len(), 1);
        }
        graph.check_consistency().unwrap();
    }
}

#[test]
fn test_call_type_table() {
    let mut graph = UseDefGraph::new();
    let a = graph.new_const(1, 8);
    let out = graph.new_output(8);
    let call = graph
        .add_linked(CallOtherDefOp::new(
            out,
            pair_userop(true),
            vec![a, a],
            vec![TypeBehavior::Float, TypeBehavior::Float],
            MiniDfState::default(),
        ))
        .unwrap();
    assert_eq!(graph.type_for(call, 1).unwrap(), TypeBehavior::Float);
    assert_eq!(graph.out_type(call).unwrap(), Some(TypeBehavior::Float));
    assert!(graph.type_for(call, 2).is_err());
}

#[test]
fn test_removed_ids_are_not_reused() {
    let mut graph = UseDefGraph::new();
    let c = graph.new_const(0x10, 8);
    let (old, _) = load(&mut graph, c);
    graph.remove(old).unwrap();
    let (new, _) = load(&mut graph, c);
    assert_ne!(old, new);
    assert_eq!(graph.link(old), Err(GraphError::UnknownOp { op: old }));
}
