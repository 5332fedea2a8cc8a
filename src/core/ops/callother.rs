//! The use-def nodes for `CALLOTHER`, with and without an output.

use crate::core::error::GraphResult;
use crate::core::op::{CallOtherOpIf, DefOp, UseDefOp};
use crate::core::types::TypeBehavior;
use crate::core::userop::UseropDefinition;
use crate::core::value::{Location, OpId, ValueId, ValueTable};
use std::sync::Arc;

/// Snapshot of which value each location held at a call site.
///
/// The entries are not uses: a value referenced only here may still be
/// removed by dead-code elimination, in which case the graph no longer
/// knows its id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiniDfState {
    entries: Vec<(Location, ValueId)>,
}

impl MiniDfState {
    pub fn new(entries: impl IntoIterator<Item = (Location, ValueId)>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_unstable_by_key(|(loc, _)| *loc);
        Self { entries }
    }

    /// The value `location` held at the call, if it was written in the unit.
    pub fn get(&self, location: &Location) -> Option<ValueId> {
        self.entries
            .binary_search_by_key(location, |(loc, _)| *loc)
            .ok()
            .map(|idx| self.entries[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Location, ValueId)> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Call a userop whose result, if any, is discarded.
#[derive(Debug, Clone)]
pub struct CallOtherOp {
    pub userop: Arc<UseropDefinition>,
    pub args: Vec<ValueId>,
    pub input_types: Vec<TypeBehavior>,
    pub df_state: MiniDfState,
}

impl CallOtherOp {
    pub fn new(
        userop: Arc<UseropDefinition>,
        args: Vec<ValueId>,
        input_types: Vec<TypeBehavior>,
        df_state: MiniDfState,
    ) -> Self {
        debug_assert_eq!(args.len(), input_types.len());
        Self {
            userop,
            args,
            input_types,
            df_state,
        }
    }
}

impl UseDefOp for CallOtherOp {
    fn mnemonic(&self) -> &'static str {
        "CALLOTHER"
    }

    fn inputs(&self) -> &[ValueId] {
        &self.args
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        self.input_types.get(position).copied()
    }

    fn has_side_effects(&self) -> bool {
        !self.userop.pure
    }

    fn link(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        self.link_args(me, values)
    }

    fn unlink(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        self.unlink_args(me, values)
    }

    fn can_be_removed(&self, _values: &ValueTable) -> bool {
        self.call_removable()
    }
}

impl CallOtherOpIf for CallOtherOp {
    fn userop(&self) -> &UseropDefinition {
        &self.userop
    }

    fn args(&self) -> &[ValueId] {
        &self.args
    }

    fn input_types(&self) -> &[TypeBehavior] {
        &self.input_types
    }

    fn df_state(&self) -> &MiniDfState {
        &self.df_state
    }
}

/// Call a userop and define its result.
#[derive(Debug, Clone)]
pub struct CallOtherDefOp {
    pub out: ValueId,
    /// Behavior of the output, taken from the signature.
    pub out_type: TypeBehavior,
    pub userop: Arc<UseropDefinition>,
    pub args: Vec<ValueId>,
    pub input_types: Vec<TypeBehavior>,
    pub df_state: MiniDfState,
}

impl CallOtherDefOp {
    pub fn new(
        out: ValueId,
        userop: Arc<UseropDefinition>,
        args: Vec<ValueId>,
        input_types: Vec<TypeBehavior>,
        df_state: MiniDfState,
    ) -> Self {
        debug_assert_eq!(args.len(), input_types.len());
        Self {
            out,
            out_type: userop.output,
            userop,
            args,
            input_types,
            df_state,
        }
    }
}

impl UseDefOp for CallOtherDefOp {
    fn mnemonic(&self) -> &'static str {
        "CALLOTHER"
    }

    fn inputs(&self) -> &[ValueId] {
        &self.args
    }

    fn output(&self) -> Option<ValueId> {
        Some(self.out)
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        self.input_types.get(position).copied()
    }

    fn out_type(&self) -> Option<TypeBehavior> {
        Some(self.out_type)
    }

    fn has_side_effects(&self) -> bool {
        !self.userop.pure
    }

    fn link(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        self.link_def(me, values)?;
        self.link_args(me, values)
    }

    fn unlink(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        self.unlink_def(me, values)?;
        self.unlink_args(me, values)
    }

    fn can_be_removed(&self, values: &ValueTable) -> bool {
        self.call_removable() && self.def_removable(values)
    }
}

impl DefOp for CallOtherDefOp {
    fn out(&self) -> ValueId {
        self.out
    }
}

impl CallOtherOpIf for CallOtherDefOp {
    fn userop(&self) -> &UseropDefinition {
        &self.userop
    }

    fn args(&self) -> &[ValueId] {
        &self.args
    }

    fn input_types(&self) -> &[TypeBehavior] {
        &self.input_types
    }

    fn df_state(&self) -> &MiniDfState {
        &self.df_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{Space, Value, ValueKind};

    fn call(pure: bool) -> (ValueTable, CallOtherDefOp) {
        let mut values = ValueTable::new();
        let a = values.push(Value::new(ValueKind::Const(1), 8));
        let b = values.push(Value::new(
            ValueKind::Location(Location::new(Space::Register, 0, 8)),
            8,
        ));
        let out = values.push(Value::new(ValueKind::Output, 8));
        let mut def = UseropDefinition::new(
            "mix",
            vec![TypeBehavior::Integer, TypeBehavior::Integer],
            TypeBehavior::Integer,
        );
        def.pure = pure;
        let op = CallOtherDefOp::new(
            out,
            Arc::new(def),
            vec![a, b],
            vec![TypeBehavior::Integer, TypeBehavior::Integer],
            MiniDfState::default(),
        );
        (values, op)
    }

    #[test]
    fn test_link_registers_both_capabilities() {
        let (mut values, op) = call(true);
        let me = OpId(7);
        op.link(me, &mut values).unwrap();
        assert_eq!(values.value(op.out).unwrap().definer(), Some(me));
        assert!(values.value(op.args[0]).unwrap().has_use(me, 0));
        assert!(values.value(op.args[1]).unwrap().has_use(me, 1));

        op.unlink(me, &mut values).unwrap();
        assert!(values.value(op.out).unwrap().is_free());
        assert!(!values.value(op.args[0]).unwrap().is_used());
        assert!(!values.value(op.args[1]).unwrap().is_used());
    }

    #[test]
    fn test_removal_needs_purity_and_no_uses() {
        let (mut values, op) = call(true);
        op.link(OpId(0), &mut values).unwrap();
        assert!(op.can_be_removed(&values));
        values.add_use(op.out, OpId(1), 0).unwrap();
        assert!(!op.can_be_removed(&values));

        let (mut values, op) = call(false);
        op.link(OpId(0), &mut values).unwrap();
        assert!(!op.can_be_removed(&values));
    }

    #[test]
    fn test_snapshot_lookup() {
        let rax = Location::new(Space::Register, 0, 8);
        let rcx = Location::new(Space::Register, 8, 8);
        let state = MiniDfState::new([(rcx, ValueId(4)), (rax, ValueId(2))]);
        assert_eq!(state.get(&rax), Some(ValueId(2)));
        assert_eq!(state.get(&rcx), Some(ValueId(4)));
        assert_eq!(state.get(&Location::new(Space::Register, 16, 8)), None);
        assert_eq!(state.iter().next().unwrap().0, rax);
    }
}
