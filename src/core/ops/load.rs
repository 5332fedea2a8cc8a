//! The use-def node for a `LOAD`.

use crate::core::error::GraphResult;
use crate::core::op::{DefOp, UseDefOp};
use crate::core::types::TypeBehavior;
use crate::core::value::{OpId, Space, ValueId, ValueTable};
use std::slice;

/// Read a value from `space` at the computed `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOp {
    pub out: ValueId,
    pub space: Space,
    pub offset: ValueId,
}

impl LoadOp {
    pub fn new(out: ValueId, space: Space, offset: ValueId) -> Self {
        Self { out, space, offset }
    }

    /// Offsets must be integral.
    pub fn offset_type(&self) -> TypeBehavior {
        TypeBehavior::Integer
    }
}

impl UseDefOp for LoadOp {
    fn mnemonic(&self) -> &'static str {
        "LOAD"
    }

    fn inputs(&self) -> &[ValueId] {
        slice::from_ref(&self.offset)
    }

    fn output(&self) -> Option<ValueId> {
        Some(self.out)
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        match position {
            0 => Some(self.offset_type()),
            _ => None,
        }
    }

    /// The loaded value's type is decided by whoever consumes it.
    fn out_type(&self) -> Option<TypeBehavior> {
        Some(TypeBehavior::Any)
    }

    fn has_side_effects(&self) -> bool {
        false
    }

    fn link(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        self.link_def(me, values)?;
        values.add_use(self.offset, me, 0)
    }

    fn unlink(&self, me: OpId, values: &mut ValueTable) -> GraphResult<()> {
        self.unlink_def(me, values)?;
        values.remove_use(self.offset, me, 0)
    }

    fn can_be_removed(&self, values: &ValueTable) -> bool {
        self.def_removable(values)
    }
}

impl DefOp for LoadOp {
    fn out(&self) -> ValueId {
        self.out
    }
}
