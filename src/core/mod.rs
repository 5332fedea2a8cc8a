// This module is the hub of the use-def IR. It exports the building blocks every other part of
// the crate is written against: values and their use records (value), type behaviors (types),
// the operation contract with its capabilities (op) and the concrete operation kinds (ops), the
// userop registry (userop), the per-unit graph with its link protocol and passes (graph), type
// inference (type_inference), the lowering interface consumed by code generators (backend), the
// collaborator capabilities for register sources and taint clients (collab, taint), the
// arena-backed session (session) and the error taxonomy (error). Nothing in here knows about
// the textual instruction format; the translator and the pcode front end sit on top.

//! Core use-def IR.
//!
//! # Key Components
//!
//! ## Values (`value`)
//! - Constants, operation outputs and entry values of locations
//! - Back-references to every `(operation, position)` using a value
//!
//! ## Operations (`op`, `ops`)
//! - The `UseDefOp` contract: inputs, output, per-position type table
//! - `DefOp` and `CallOtherOpIf` capabilities with provided link logic
//!
//! ## Graph (`graph`)
//! - Link, unlink, detach and remove with state checks
//! - Dead-code elimination, consistency checking, scheduling
//!
//! ## Types (`types`, `type_inference`)
//! - INTEGER / FLOAT / ANY requirements resolved to sized types

pub mod backend;
pub mod collab;
pub mod error;
pub mod graph;
pub mod op;
pub mod ops;
pub mod session;
pub mod taint;
pub mod test_utils;
pub mod type_inference;
pub mod types;
pub mod userop;
pub mod value;

pub use backend::{Backend, LoweringPlan, TextBackend};
pub use collab::{analysis_client, RegisterMap, RegisterSource, TaintClient};
pub use error::{GraphError, GraphResult, ParseError, TranslateError, TranslateResult};
pub use graph::UseDefGraph;
pub use op::{CallOtherOpIf, DefOp, Op, UseDefOp};
pub use session::{SessionStats, TranslationSession};
pub use taint::tainted_values;
pub use type_inference::{TypeDiagnostic, TypeInference, TypeMap};
pub use types::{ResolvedType, TypeBehavior};
pub use userop::{UseropDefinition, UseropLibrary};
pub use value::{Location, OpId, Space, Use, Value, ValueId, ValueKind, ValueTable};
