//! The use-def node for a `STORE`.

use crate::core::op::UseDefOp;
use crate::core::types::TypeBehavior;
use crate::core::value::{Space, ValueId};

/// Write `value` into `space` at `offset`. Never removable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOp {
    pub space: Space,
    /// `[offset, value]`
    pub operands: [ValueId; 2],
}

impl StoreOp {
    pub fn new(space: Space, offset: ValueId, value: ValueId) -> Self {
        Self {
            space,
            operands: [offset, value],
        }
    }

    pub fn offset(&self) -> ValueId {
        self.operands[0]
    }

    pub fn value(&self) -> ValueId {
        self.operands[1]
    }
}

impl UseDefOp for StoreOp {
    fn mnemonic(&self) -> &'static str {
        "STORE"
    }

    fn inputs(&self) -> &[ValueId] {
        &self.operands
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        match position {
            0 => Some(TypeBehavior::Integer),
            1 => Some(TypeBehavior::Any),
            _ => None,
        }
    }

    fn has_side_effects(&self) -> bool {
        true
    }
}
