// This module defines the error types for jitir using the thiserror crate. GraphError covers
// violations of the use-def discipline: linking an operation twice, unlinking one that is not
// linked, recording or removing a use that does not match the bookkeeping, redefining an output,
// querying an operand position the operation does not have, and removing an operation whose
// output is still used. These are programming errors that abort the translation of one unit.
// TranslateError covers everything that can go wrong while turning an instruction stream into a
// graph: parse failures, constructs the translator cannot model (which fall back to the
// un-optimized path), type mismatches rejected by policy, and wrapped GraphErrors. Each variant
// carries the operation, value, position or line it concerns.

//! Error types for graph construction and translation.

use super::types::TypeBehavior;
use super::value::{OpId, ValueId};
use thiserror::Error;

/// Violation of the use-def discipline.
///
/// Every variant is fatal for the unit being translated: the graph may be
/// inconsistent and must be discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("{op} is already linked")]
    AlreadyLinked { op: OpId },

    #[error("{op} is not linked")]
    NotLinked { op: OpId },

    #[error("{op} is still linked and cannot be detached")]
    StillLinked { op: OpId },

    #[error("{value} already records a use by {op} at position {position}")]
    DuplicateUse {
        value: ValueId,
        op: OpId,
        position: usize,
    },

    #[error("{value} has no recorded use by {op} at position {position}")]
    MissingUse {
        value: ValueId,
        op: OpId,
        position: usize,
    },

    #[error("{value} is already defined by {definer}, cannot be defined by {op}")]
    Redefined {
        value: ValueId,
        definer: OpId,
        op: OpId,
    },

    #[error("{value} is not defined by {op}")]
    DefinerMismatch { value: ValueId, op: OpId },

    #[error("{value} is not an operation output")]
    NotAnOutput { value: ValueId },

    #[error("{op} ({mnemonic}) has no operand at position {position}")]
    OperandOutOfRange {
        op: OpId,
        mnemonic: &'static str,
        position: usize,
    },

    #[error("Unknown operation {op}")]
    UnknownOp { op: OpId },

    #[error("Unknown value {value}")]
    UnknownValue { value: ValueId },

    #[error("{op} cannot be removed: {reason}")]
    NotRemovable { op: OpId, reason: &'static str },

    #[error("Inconsistent use count on {value}: {recorded} recorded, {actual} linked")]
    InconsistentUses {
        value: ValueId,
        recorded: usize,
        actual: usize,
    },

    #[error("Dependency cycle through {op}")]
    Cycle { op: OpId },
}

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Syntax error in the textual instruction stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Error raised while translating one unit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("line {line}: unsupported opcode {opcode}")]
    UnsupportedOpcode { line: usize, opcode: String },

    #[error("line {line}: unknown userop @{name}")]
    UnknownUserop { line: usize, name: String },

    #[error("line {line}: userop @{name} takes {expected} arguments, got {found}")]
    UseropArity {
        line: usize,
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: unknown register {name}")]
    UnknownRegister { line: usize, name: String },

    #[error("line {line}: {reason}")]
    Unsupported { line: usize, reason: String },

    #[error("{op} operand {position}: expected {expected}, found {found}")]
    TypeRejected {
        op: OpId,
        position: usize,
        expected: TypeBehavior,
        found: TypeBehavior,
    },

    #[error("Graph invariant violated: {0}")]
    Graph(#[from] GraphError),
}

impl TranslateError {
    /// Whether the unit can fall back to the un-optimized path.
    ///
    /// Graph invariant violations are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TranslateError::Graph(_))
    }
}

/// Result type alias for translation.
pub type TranslateResult<T> = Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_errors_are_fatal() {
        let err: TranslateError = GraphError::AlreadyLinked { op: OpId(3) }.into();
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "Graph invariant violated: op3 is already linked");
    }

    #[test]
    fn test_unsupported_constructs_are_recoverable() {
        let err = TranslateError::UnsupportedOpcode {
            line: 4,
            opcode: "PTRSUB".to_string(),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "line 4: unsupported opcode PTRSUB");

        let err: TranslateError = ParseError::new(2, "Expected ']'").into();
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "line 2: Expected ']'");
    }

    #[test]
    fn test_out_of_range_message_names_operation() {
        let err = GraphError::OperandOutOfRange {
            op: OpId(0),
            mnemonic: "LOAD",
            position: 1,
        };
        assert_eq!(err.to_string(), "op0 (LOAD) has no operand at position 1");
    }
}
