//! Unit exits and write-backs. All of these are side effects and are never
//! removed by dead-code elimination.

use crate::core::op::UseDefOp;
use crate::core::types::TypeBehavior;
use crate::core::value::{Location, ValueId};
use std::slice;

/// `BRANCH`: leave the unit for a fixed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchOp {
    pub target: u64,
}

impl UseDefOp for BranchOp {
    fn mnemonic(&self) -> &'static str {
        "BRANCH"
    }

    fn inputs(&self) -> &[ValueId] {
        &[]
    }

    fn type_for(&self, _position: usize) -> Option<TypeBehavior> {
        None
    }

    fn has_side_effects(&self) -> bool {
        true
    }
}

/// `CBRANCH`: leave the unit for `target` when `cond` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CBranchOp {
    pub target: u64,
    pub cond: ValueId,
}

impl UseDefOp for CBranchOp {
    fn mnemonic(&self) -> &'static str {
        "CBRANCH"
    }

    fn inputs(&self) -> &[ValueId] {
        slice::from_ref(&self.cond)
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        (position == 0).then_some(TypeBehavior::Integer)
    }

    fn has_side_effects(&self) -> bool {
        true
    }
}

/// `BRANCHIND`: leave the unit for a computed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchIndOp {
    pub target: ValueId,
}

impl UseDefOp for BranchIndOp {
    fn mnemonic(&self) -> &'static str {
        "BRANCHIND"
    }

    fn inputs(&self) -> &[ValueId] {
        slice::from_ref(&self.target)
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        (position == 0).then_some(TypeBehavior::Integer)
    }

    fn has_side_effects(&self) -> bool {
        true
    }
}

/// Commit the current value of an observable location at a unit exit.
///
/// Synthesized by the translator; there is no p-code mnemonic for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritebackOp {
    pub location: Location,
    pub value: ValueId,
}

impl UseDefOp for WritebackOp {
    fn mnemonic(&self) -> &'static str {
        "WRITEBACK"
    }

    fn inputs(&self) -> &[ValueId] {
        slice::from_ref(&self.value)
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        (position == 0).then_some(TypeBehavior::Any)
    }

    fn has_side_effects(&self) -> bool {
        true
    }
}
