// This module defines the operation side of the use-def graph. UseDefOp is the contract every
// operation kind implements: its ordered inputs, optional output, per-position type table,
// output type, and the link/unlink/can_be_removed protocol that keeps the values' use records
// in step with the operations actually holding them. Two capabilities are layered on top as
// traits with provided methods: DefOp for operations that define an output value and
// CallOtherOpIf for operations that call a userop with an argument list. An operation that is
// both (CallOtherDefOp) calls each capability's linking logic once; the capabilities touch
// disjoint bookkeeping so the order does not matter. Op is the closed set of kinds the graph
// stores, dispatching the contract to the concrete structs in the ops module.

//! Operation contract, capabilities and the [`Op`] node type.

use super::error::GraphResult;
use super::ops::{
    BinaryOp, BranchIndOp, BranchOp, CBranchOp, CallOtherDefOp, CallOtherOp, CopyOp, LoadOp,
    MiniDfState, StoreOp, UnaryOp, WritebackOp,
};
use super::types::TypeBehavior;
use super::userop::UseropDefinition;
use super::value::{OpId, ValueId, ValueTable};

/// Register a use of every input at its position.
pub fn link_inputs(inputs: &[ValueId], me: OpId, values: &mut ValueTable) -> GraphResult<()> {
    for (position, &input) in inputs.iter().enumerate() {
        values.add_use(input, me, position)?;
    }
    Ok(())
}

/// Inverse of [`link_inputs`].
pub fn unlink_inputs(inputs: &[ValueId], me: OpId, values: &mut ValueTable) -> GraphResult<()> {
    for (position, &input) in inputs.iter().enumerate() {
        values.remove_use(input, me, position)?;
    }
    Ok(())
}

/// The contract every operation kind implements.
pub trait UseDefOp {
    /// P-code style name, e.g. `LOAD`.
    fn mnemonic(&self) -> &'static str;

    /// Input values in operand order.
    fn inputs(&self) -> &[ValueId];

    /// The value this operation defines, if any.
    fn output(&self) -> Option<ValueId> {
        None
    }

    /// Required behavior of the input at `position`, or `None` if the
    /// operation has no such operand.
    fn type_for(&self, position: usize) -> Option<TypeBehavior>;

    /// Behavior of the output, if there is one.
    fn out_type(&self) -> Option<TypeBehavior> {
        None
    }

    /// Whether the operation does something observable besides defining
    /// its output.
    fn has_side_effects(&self) -> bool;

    /// Whether the operation passes its input through unchanged, so that
    /// types flow across it in both directions.
    fn is_type_transparent(&self) -> bool {
        false
    }

    /// Register this operation's uses and its definition of the output.
    ///
    /// Must be called exactly once, before the operation is queried.
    fn link(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        if let Some(out) = self.output() {
            values.define(out, me)?;
        }
        link_inputs(self.inputs(), me, values)
    }

    /// Undo everything [`UseDefOp::link`] registered.
    fn unlink(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        if let Some(out) = self.output() {
            values.undefine(out, me)?;
        }
        unlink_inputs(self.inputs(), me, values)
    }

    /// Whether the operation may be dropped from the graph.
    fn can_be_removed(&self, values: &ValueTable) -> bool {
        !self.has_side_effects()
            && self
                .output()
                .map_or(true, |out| values.get(out).map_or(true, |v| !v.is_used()))
    }
}

/// Capability of an operation that defines an output value.
pub trait DefOp: UseDefOp {
    fn out(&self) -> ValueId;

    fn link_def(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        values.define(self.out(), me)
    }

    fn unlink_def(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        values.undefine(self.out(), me)
    }

    /// A definition alone is removable once nothing uses its output.
    fn def_removable(&self, values: &ValueTable) -> bool {
        values.get(self.out()).map_or(true, |v| !v.is_used())
    }
}

/// Capability of an operation that calls a userop.
pub trait CallOtherOpIf: UseDefOp {
    fn userop(&self) -> &UseropDefinition;

    fn args(&self) -> &[ValueId];

    /// Expected behavior of each argument, resolved against the signature
    /// when the call was translated.
    fn input_types(&self) -> &[TypeBehavior];

    /// Data-flow state captured at the call site.
    fn df_state(&self) -> &MiniDfState;

    fn link_args(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        link_inputs(self.args(), me, values)
    }

    fn unlink_args(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        unlink_inputs(self.args(), me, values)
    }

    /// Calls are only removable when the userop is declared pure.
    fn call_removable(&self) -> bool {
        self.userop().pure
    }
}

/// A node of the use-def graph.
#[derive(Debug, Clone)]
pub enum Op {
    Copy(CopyOp),
    Load(LoadOp),
    Store(StoreOp),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Branch(BranchOp),
    CBranch(CBranchOp),
    BranchInd(BranchIndOp),
    Writeback(WritebackOp),
    CallOther(CallOtherOp),
    CallOtherDef(CallOtherDefOp),
}

macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Op::Copy($op) => $body,
            Op::Load($op) => $body,
            Op::Store($op) => $body,
            Op::Binary($op) => $body,
            Op::Unary($op) => $body,
            Op::Branch($op) => $body,
            Op::CBranch($op) => $body,
            Op::BranchInd($op) => $body,
            Op::Writeback($op) => $body,
            Op::CallOther($op) => $body,
            Op::CallOtherDef($op) => $body,
        }
    };
}

impl UseDefOp for Op {
    fn mnemonic(&self) -> &'static str {
        dispatch!(self, op => op.mnemonic())
    }

    fn inputs(&self) -> &[ValueId] {
        dispatch!(self, op => op.inputs())
    }

    fn output(&self) -> Option<ValueId> {
        dispatch!(self, op => op.output())
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        dispatch!(self, op => op.type_for(position))
    }

    fn out_type(&self) -> Option<TypeBehavior> {
        dispatch!(self, op => op.out_type())
    }

    fn has_side_effects(&self) -> bool {
        dispatch!(self, op => op.has_side_effects())
    }

    fn is_type_transparent(&self) -> bool {
        dispatch!(self, op => op.is_type_transparent())
    }

    fn link(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        dispatch!(self, op => op.link(me, values))
    }

    fn unlink(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        dispatch!(self, op => op.unlink(me, values))
    }

    fn can_be_removed(&self, values: &ValueTable) -> bool {
        dispatch!(self, op => op.can_be_removed(values))
    }
}

impl Op {
    /// The non-value operand printed before the inputs: a space, a branch
    /// target, a written-back location or a userop name.
    pub fn aux_operand(&self) -> Option<String> {
        match self {
            Op::Load(load) => Some(load.space.to_string()),
            Op::Store(store) => Some(store.space.to_string()),
            Op::Branch(branch) => Some(format!("{:#x}", branch.target)),
            Op::CBranch(branch) => Some(format!("{:#x}", branch.target)),
            Op::Writeback(wb) => Some(wb.location.to_string()),
            Op::CallOther(call) => Some(format!("@{}", call.userop.name)),
            Op::CallOtherDef(call) => Some(format!("@{}", call.userop.name)),
            Op::Copy(_) | Op::Binary(_) | Op::Unary(_) | Op::BranchInd(_) => None,
        }
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Op {
                fn from(op: $ty) -> Self {
                    Op::$variant(op)
                }
            }
        )*
    };
}

impl_from_variant!(
    Copy(CopyOp),
    Load(LoadOp),
    Store(StoreOp),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Branch(BranchOp),
    CBranch(CBranchOp),
    BranchInd(BranchIndOp),
    Writeback(WritebackOp),
    CallOther(CallOtherOp),
    CallOtherDef(CallOtherDefOp),
);
