//! Concrete operation kinds.

pub mod arith;
pub mod callother;
pub mod control;
pub mod load;
pub mod store;

pub use arith::{BinaryOp, BinaryOpcode, CopyOp, UnaryOp, UnaryOpcode};
pub use callother::{CallOtherDefOp, CallOtherOp, MiniDfState};
pub use control::{BranchIndOp, BranchOp, CBranchOp, WritebackOp};
pub use load::LoadOp;
pub use store::StoreOp;
