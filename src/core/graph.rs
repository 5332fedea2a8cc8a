// This module implements UseDefGraph, the per-unit container of values and operations. It owns
// the ValueTable and an index-addressed table of operation slots, and is the only place the
// link protocol is driven from: link() and unlink() check that an operation is in the right
// state before delegating to the operation's own bookkeeping, detach() drops an unlinked
// operation together with the output value it owns, and remove() runs the whole
// can_be_removed / unlink / detach sequence. On top of that it provides worklist dead-code
// elimination (removing an operation requeues the definers of its inputs, so one call reaches
// the fixpoint), a consistency checker for the use-set invariant, a stable dependency-respecting
// schedule for code generation, and forward slices along def-use edges for analysis clients.
// Operation and value slots are never reused, so a stale id cannot alias a newer node.

//! The use-def graph of one translation unit.

use super::error::{GraphError, GraphResult};
use super::op::{Op, UseDefOp};
use super::types::TypeBehavior;
use super::value::{Location, OpId, Use, Value, ValueId, ValueKind, ValueTable};
use hashbrown::{HashMap, HashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

#[derive(Debug, Clone)]
struct OpSlot {
    op: Op,
    linked: bool,
}

/// All live operations and values of one translation unit.
///
/// Mutation is single-threaded; a graph may be moved to another thread but
/// is never shared while it is being changed.
#[derive(Debug, Default, Clone)]
pub struct UseDefGraph {
    values: ValueTable,
    ops: Vec<Option<OpSlot>>,
    live_ops: usize,
}

impl UseDefGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------------

    pub fn values(&self) -> &ValueTable {
        &self.values
    }

    pub fn value(&self, id: ValueId) -> GraphResult<&Value> {
        self.values.value(id)
    }

    pub fn new_const(&mut self, value: u64, size: u32) -> ValueId {
        self.values.push(Value::new(ValueKind::Const(value), size))
    }

    /// A free value holding the contents of `location` on entry.
    pub fn new_location(&mut self, location: Location) -> ValueId {
        self.values
            .push(Value::new(ValueKind::Location(location), location.size))
    }

    /// An output value, to be handed to the operation that defines it.
    pub fn new_output(&mut self, size: u32) -> ValueId {
        self.values.push(Value::new(ValueKind::Output, size))
    }

    pub fn uses(&self, value: ValueId) -> GraphResult<&[Use]> {
        Ok(self.values.value(value)?.uses())
    }

    pub fn definer(&self, value: ValueId) -> GraphResult<Option<OpId>> {
        Ok(self.values.value(value)?.definer())
    }

    // ---------------------------------------------------------------------
    // Operations and the link protocol
    // ---------------------------------------------------------------------

    /// Add an operation without linking it.
    pub fn add_op(&mut self, op: impl Into<Op>) -> OpId {
        let id = OpId(self.ops.len() as u32);
        self.ops.push(Some(OpSlot {
            op: op.into(),
            linked: false,
        }));
        self.live_ops += 1;
        id
    }

    /// Add an operation and link it.
    pub fn add_linked(&mut self, op: impl Into<Op>) -> GraphResult<OpId> {
        let id = self.add_op(op);
        self.link(id)?;
        Ok(id)
    }

    fn slot(&self, id: OpId) -> GraphResult<&OpSlot> {
        self.ops
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(GraphError::UnknownOp { op: id })
    }

    pub fn op(&self, id: OpId) -> GraphResult<&Op> {
        Ok(&self.slot(id)?.op)
    }

    pub fn contains_op(&self, id: OpId) -> bool {
        self.slot(id).is_ok()
    }

    pub fn is_linked(&self, id: OpId) -> bool {
        self.slot(id).map(|s| s.linked).unwrap_or(false)
    }

    /// Register the operation's uses and output definition.
    pub fn link(&mut self, id: OpId) -> GraphResult<()> {
        let slot = self
            .ops
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownOp { op: id })?;
        if slot.linked {
            return Err(GraphError::AlreadyLinked { op: id });
        }
        slot.op.link(id, &mut self.values)?;
        slot.linked = true;
        log::trace!("Linked {} ({})", id, slot.op.mnemonic());
        Ok(())
    }

    /// Remove everything [`UseDefGraph::link`] registered.
    pub fn unlink(&mut self, id: OpId) -> GraphResult<()> {
        let slot = self
            .ops
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownOp { op: id })?;
        if !slot.linked {
            return Err(GraphError::NotLinked { op: id });
        }
        slot.op.unlink(id, &mut self.values)?;
        slot.linked = false;
        log::trace!("Unlinked {} ({})", id, slot.op.mnemonic());
        Ok(())
    }

    /// Drop an unlinked operation and the output value it owns.
    pub fn detach(&mut self, id: OpId) -> GraphResult<Op> {
        let slot = self.slot(id)?;
        if slot.linked {
            return Err(GraphError::StillLinked { op: id });
        }
        if let Some(out) = slot.op.output() {
            if self.values.get(out).is_some_and(Value::is_used) {
                return Err(GraphError::NotRemovable {
                    op: id,
                    reason: "output still used",
                });
            }
        }
        let slot = self.ops[id.index()]
            .take()
            .ok_or(GraphError::UnknownOp { op: id })?;
        if let Some(out) = slot.op.output() {
            self.values.release(out);
        }
        self.live_ops -= 1;
        Ok(slot.op)
    }

    /// Whether the linked operation may be removed now.
    pub fn can_be_removed(&self, id: OpId) -> GraphResult<bool> {
        let slot = self.slot(id)?;
        if !slot.linked {
            return Err(GraphError::NotLinked { op: id });
        }
        Ok(slot.op.can_be_removed(&self.values))
    }

    /// Unlink and detach a removable operation.
    pub fn remove(&mut self, id: OpId) -> GraphResult<Op> {
        if !self.can_be_removed(id)? {
            let reason = if self.slot(id)?.op.has_side_effects() {
                "operation has side effects"
            } else {
                "output still used"
            };
            return Err(GraphError::NotRemovable { op: id, reason });
        }
        self.unlink(id)?;
        self.detach(id)
    }

    pub fn inputs(&self, id: OpId) -> GraphResult<&[ValueId]> {
        Ok(self.slot(id)?.op.inputs())
    }

    pub fn output(&self, id: OpId) -> GraphResult<Option<ValueId>> {
        Ok(self.slot(id)?.op.output())
    }

    /// Required behavior of operand `position`.
    ///
    /// An out-of-range position is a programming error.
    pub fn type_for(&self, id: OpId, position: usize) -> GraphResult<TypeBehavior> {
        let op = &self.slot(id)?.op;
        op.type_for(position).ok_or(GraphError::OperandOutOfRange {
            op: id,
            mnemonic: op.mnemonic(),
            position,
        })
    }

    pub fn out_type(&self, id: OpId) -> GraphResult<Option<TypeBehavior>> {
        Ok(self.slot(id)?.op.out_type())
    }

    /// Number of operations in the graph, linked or not.
    pub fn op_count(&self) -> usize {
        self.live_ops
    }

    pub fn is_empty(&self) -> bool {
        self.live_ops == 0
    }

    /// Operations in creation order.
    pub fn ops(&self) -> impl Iterator<Item = (OpId, &Op)> + '_ {
        self.ops
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|s| (OpId(idx as u32), &s.op)))
    }

    fn linked_ops(&self) -> impl Iterator<Item = (OpId, &Op)> + '_ {
        self.ops.iter().enumerate().filter_map(|(idx, slot)| match slot {
            Some(s) if s.linked => Some((OpId(idx as u32), &s.op)),
            _ => None,
        })
    }

    // ---------------------------------------------------------------------
    // Passes
    // ---------------------------------------------------------------------

    /// Remove every operation that can be removed, until none can.
    ///
    /// Free values left without uses by a removal are dropped too. Returns
    /// the number of operations removed.
    pub fn eliminate_dead_code(&mut self) -> GraphResult<usize> {
        let mut worklist: Vec<OpId> = self.linked_ops().map(|(id, _)| id).collect();
        let mut removed = 0;

        // Popping from the back visits consumers before their producers.
        while let Some(id) = worklist.pop() {
            if !self.is_linked(id) || !self.can_be_removed(id)? {
                continue;
            }
            let inputs = self.inputs(id)?.to_vec();
            let op = self.remove(id)?;
            removed += 1;
            log::debug!("DCE removed {} ({})", id, op.mnemonic());

            for input in inputs {
                let Some(value) = self.values.get(input) else {
                    continue;
                };
                let unused_free = !value.is_used() && value.kind() != ValueKind::Output;
                match value.definer() {
                    Some(def) => worklist.push(def),
                    None if unused_free => {
                        self.values.release(input);
                    }
                    None => {}
                }
            }
        }

        Ok(removed)
    }

    /// Verify that use records and linked operations agree.
    pub fn check_consistency(&self) -> GraphResult<()> {
        let mut expected: HashMap<ValueId, usize> = HashMap::new();

        for (id, op) in self.linked_ops() {
            for (position, &input) in op.inputs().iter().enumerate() {
                let value = self.values.value(input)?;
                if !value.has_use(id, position) {
                    return Err(GraphError::MissingUse {
                        value: input,
                        op: id,
                        position,
                    });
                }
                *expected.entry(input).or_insert(0) += 1;
            }
            if let Some(out) = op.output() {
                if self.values.value(out)?.definer() != Some(id) {
                    return Err(GraphError::DefinerMismatch { value: out, op: id });
                }
            }
        }

        for (vid, value) in self.values.iter() {
            let actual = expected.get(&vid).copied().unwrap_or(0);
            if value.use_count() != actual {
                return Err(GraphError::InconsistentUses {
                    value: vid,
                    recorded: value.use_count(),
                    actual,
                });
            }
            if let Some(def) = value.definer() {
                let slot = self.slot(def)?;
                if !slot.linked || slot.op.output() != Some(vid) {
                    return Err(GraphError::DefinerMismatch { value: vid, op: def });
                }
            }
        }

        Ok(())
    }

    /// Linked operations in an order where each comes after the definers of
    /// its inputs.
    ///
    /// Loads and side-effecting operations also keep their relative
    /// creation order. Ties go to the earliest created operation, so the
    /// schedule of an unchanged graph is always the same.
    pub fn schedule(&self) -> GraphResult<Vec<OpId>> {
        let mut pending: HashMap<OpId, usize> = HashMap::new();
        let mut dependents: HashMap<OpId, Vec<OpId>> = HashMap::new();
        let mut last_ordered: Option<OpId> = None;

        for (id, op) in self.linked_ops() {
            let mut deps: Vec<OpId> = Vec::new();
            for &input in op.inputs() {
                if let Some(def) = self.values.value(input)?.definer() {
                    deps.push(def);
                }
            }
            let ordered = op.has_side_effects() || matches!(op, Op::Load(_));
            if ordered {
                if let Some(prev) = last_ordered {
                    deps.push(prev);
                }
                last_ordered = Some(id);
            }
            deps.sort_unstable();
            deps.dedup();
            pending.insert(id, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(id);
            }
        }

        let mut ready: BinaryHeap<Reverse<OpId>> = pending
            .iter()
            .filter(|(_, &n)| n == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();
        let mut order = Vec::with_capacity(pending.len());

        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            if let Some(next) = dependents.get(&id) {
                for dep in next {
                    if let Some(n) = pending.get_mut(dep) {
                        *n -= 1;
                        if *n == 0 {
                            ready.push(Reverse(*dep));
                        }
                    }
                }
            }
        }

        if order.len() != pending.len() {
            let stuck = pending
                .iter()
                .filter(|(_, &n)| n > 0)
                .map(|(&id, _)| id)
                .min()
                .ok_or(GraphError::Cycle { op: OpId(0) })?;
            return Err(GraphError::Cycle { op: stuck });
        }

        Ok(order)
    }

    /// Every value reachable from `seeds` by following uses to the outputs
    /// of the using operations. The seeds are included.
    pub fn forward_slice(&self, seeds: impl IntoIterator<Item = ValueId>) -> HashSet<ValueId> {
        let mut seen: HashSet<ValueId> = HashSet::new();
        let mut stack: Vec<ValueId> = seeds
            .into_iter()
            .filter(|v| self.values.get(*v).is_some())
            .collect();

        while let Some(vid) = stack.pop() {
            if !seen.insert(vid) {
                continue;
            }
            let Some(value) = self.values.get(vid) else {
                continue;
            };
            for u in value.uses() {
                if let Ok(Some(out)) = self.output(u.op) {
                    if !seen.contains(&out) {
                        stack.push(out);
                    }
                }
            }
        }

        seen
    }

    /// One-line rendering of an operation, e.g. `v3 = LOAD ram, v1`.
    pub fn render_op(&self, id: OpId) -> GraphResult<String> {
        let op = &self.slot(id)?.op;
        let mut text = String::new();
        if let Some(out) = op.output() {
            text.push_str(&format!("{} = ", out));
        }
        text.push_str(op.mnemonic());

        let mut operands: Vec<String> = op.aux_operand().into_iter().collect();
        operands.extend(op.inputs().iter().map(ValueId::to_string));

        if !operands.is_empty() {
            text.push(' ');
            text.push_str(&operands.join(", "));
        }
        Ok(text)
    }

    /// One-line rendering of a value, e.g. `v0 = const 0x10:8`.
    pub fn render_value(&self, id: ValueId) -> GraphResult<String> {
        let value = self.values.value(id)?;
        let what = match value.kind() {
            ValueKind::Const(c) => format!("const {:#x}:{}", c, value.size()),
            ValueKind::Location(loc) => loc.to_string(),
            ValueKind::Output => match value.definer() {
                Some(def) => format!("out:{} of {}", value.size(), def),
                None => format!("out:{} undefined", value.size()),
            },
        };
        Ok(format!("{} = {} (uses: {})", id, what, value.use_count()))
    }
}

impl fmt::Display for UseDefGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Values:")?;
        for (id, _) in self.values.iter() {
            let line = self.render_value(id).map_err(|_| fmt::Error)?;
            writeln!(f, "  {}", line)?;
        }
        writeln!(f, "Ops:")?;
        for (id, _) in self.ops() {
            let line = self.render_op(id).map_err(|_| fmt::Error)?;
            let marker = if self.is_linked(id) { "" } else { " (unlinked)" };
            writeln!(f, "  {}: {}{}", id, line, marker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ops::{BinaryOp, BinaryOpcode, LoadOp, StoreOp};
    use crate::core::value::Space;

    fn load(graph: &mut UseDefGraph, offset: ValueId) -> (OpId, ValueId) {
        let out = graph.new_output(8);
        let id = graph.add_linked(LoadOp::new(out, Space::Ram, offset)).unwrap();
        (id, out)
    }

    #[test]
    fn test_double_link_is_rejected() {
        let mut graph = UseDefGraph::new();
        let c = graph.new_const(0x10, 8);
        let (id, _) = load(&mut graph, c);
        assert_eq!(graph.link(id), Err(GraphError::AlreadyLinked { op: id }));
        // The failed link must not have touched the bookkeeping.
        assert_eq!(graph.uses(c).unwrap().len(), 1);
        graph.check_consistency().unwrap();
    }

    #[test]
    fn test_unlink_requires_link() {
        let mut graph = UseDefGraph::new();
        let c = graph.new_const(0x10, 8);
        let out = graph.new_output(8);
        let id = graph.add_op(LoadOp::new(out, Space::Ram, c));
        assert_eq!(graph.unlink(id), Err(GraphError::NotLinked { op: id }));
        assert_eq!(graph.can_be_removed(id), Err(GraphError::NotLinked { op: id }));
    }

    #[test]
    fn test_detach_requires_unlink() {
        let mut graph = UseDefGraph::new();
        let c = graph.new_const(0x10, 8);
        let (id, out) = load(&mut graph, c);
        assert_eq!(graph.detach(id).unwrap_err(), GraphError::StillLinked { op: id });
        graph.unlink(id).unwrap();
        graph.detach(id).unwrap();
        assert!(graph.value(out).is_err());
        assert!(!graph.contains_op(id));
        assert_eq!(graph.op(id).unwrap_err(), GraphError::UnknownOp { op: id });
    }

    #[test]
    fn test_remove_refuses_used_output() {
        let mut graph = UseDefGraph::new();
        let c = graph.new_const(0x10, 8);
        let (first, v) = load(&mut graph, c);
        let (_second, _) = load(&mut graph, v);
        assert_eq!(
            graph.remove(first).unwrap_err(),
            GraphError::NotRemovable {
                op: first,
                reason: "output still used"
            }
        );
        graph.check_consistency().unwrap();
    }

    #[test]
    fn test_dce_keeps_side_effects() {
        let mut graph = UseDefGraph::new();
        let addr = graph.new_const(0x1000, 8);
        let (_, loaded) = load(&mut graph, addr);
        let one = graph.new_const(1, 8);
        let sum = graph.new_output(8);
        graph
            .add_linked(BinaryOp::new(BinaryOpcode::IntAdd, sum, loaded, one))
            .unwrap();
        let dead = graph.new_output(8);
        graph
            .add_linked(BinaryOp::new(BinaryOpcode::IntMult, dead, sum, one))
            .unwrap();
        graph.add_linked(StoreOp::new(Space::Ram, addr, sum)).unwrap();

        assert_eq!(graph.eliminate_dead_code().unwrap(), 1);
        assert_eq!(graph.op_count(), 3);
        assert_eq!(graph.eliminate_dead_code().unwrap(), 0);
        graph.check_consistency().unwrap();
    }

    #[test]
    fn test_consistency_detects_stray_use() {
        let mut graph = UseDefGraph::new();
        let c = graph.new_const(0x10, 8);
        load(&mut graph, c);
        graph.values.add_use(c, OpId(9), 0).unwrap();
        assert_eq!(
            graph.check_consistency(),
            Err(GraphError::InconsistentUses {
                value: c,
                recorded: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_schedule_orders_definers_first() {
        let mut graph = UseDefGraph::new();
        let c = graph.new_const(4, 8);
        // Build the consumer first so creation order disagrees with data flow.
        let v = graph.new_output(8);
        let out = graph.new_output(8);
        let consumer = graph.add_op(BinaryOp::new(BinaryOpcode::IntAdd, out, v, c));
        let producer = graph.add_op(BinaryOp::new(BinaryOpcode::IntSub, v, c, c));
        graph.link(producer).unwrap();
        graph.link(consumer).unwrap();

        assert_eq!(graph.schedule().unwrap(), vec![producer, consumer]);
    }

    #[test]
    fn test_forward_slice() {
        let mut graph = UseDefGraph::new();
        let src = graph.new_location(Location::new(Space::Register, 0, 8));
        let other = graph.new_const(2, 8);
        let a = graph.new_output(8);
        graph
            .add_linked(BinaryOp::new(BinaryOpcode::IntAdd, a, src, other))
            .unwrap();
        let b = graph.new_output(8);
        graph
            .add_linked(BinaryOp::new(BinaryOpcode::IntXor, b, other, other))
            .unwrap();

        let slice = graph.forward_slice([src]);
        assert!(slice.contains(&src));
        assert!(slice.contains(&a));
        assert!(!slice.contains(&b));
        assert!(!slice.contains(&other));
    }

    #[test]
    fn test_render() {
        let mut graph = UseDefGraph::new();
        let c = graph.new_const(0x10, 8);
        let (id, _) = load(&mut graph, c);
        assert_eq!(graph.render_op(id).unwrap(), "v1 = LOAD ram, v0");
        assert_eq!(graph.render_value(c).unwrap(), "v0 = const 0x10:8 (uses: 1)");
        let text = graph.to_string();
        assert!(text.contains("op0: v1 = LOAD ram, v0"));
    }
}
