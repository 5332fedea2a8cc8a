//! Pure computations: `COPY`, binary and unary arithmetic, comparisons and
//! conversions.
//!
//! Each opcode carries a fixed signature: one behavior shared by all of its
//! inputs and one for its output.

use crate::core::op::{DefOp, UseDefOp};
use crate::core::types::TypeBehavior;
use crate::core::value::ValueId;
use std::slice;

macro_rules! opcode_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $mnemonic:literal, $input:ident -> $output:ident;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $($name::$variant => $mnemonic,)*
                }
            }

            pub fn from_mnemonic(s: &str) -> Option<Self> {
                match s {
                    $($mnemonic => Some($name::$variant),)*
                    _ => None,
                }
            }

            /// Behavior required of every input.
            pub fn input_type(self) -> TypeBehavior {
                match self {
                    $($name::$variant => TypeBehavior::$input,)*
                }
            }

            pub fn output_type(self) -> TypeBehavior {
                match self {
                    $($name::$variant => TypeBehavior::$output,)*
                }
            }
        }
    };
}

opcode_table! {
    /// Two-input operations.
    BinaryOpcode {
        IntAdd => "INT_ADD", Integer -> Integer;
        IntSub => "INT_SUB", Integer -> Integer;
        IntMult => "INT_MULT", Integer -> Integer;
        IntDiv => "INT_DIV", Integer -> Integer;
        IntSDiv => "INT_SDIV", Integer -> Integer;
        IntRem => "INT_REM", Integer -> Integer;
        IntSRem => "INT_SREM", Integer -> Integer;
        IntAnd => "INT_AND", Integer -> Integer;
        IntOr => "INT_OR", Integer -> Integer;
        IntXor => "INT_XOR", Integer -> Integer;
        IntLeft => "INT_LEFT", Integer -> Integer;
        IntRight => "INT_RIGHT", Integer -> Integer;
        IntSRight => "INT_SRIGHT", Integer -> Integer;
        BoolAnd => "BOOL_AND", Integer -> Integer;
        BoolOr => "BOOL_OR", Integer -> Integer;
        BoolXor => "BOOL_XOR", Integer -> Integer;
        IntEqual => "INT_EQUAL", Integer -> Integer;
        IntNotEqual => "INT_NOTEQUAL", Integer -> Integer;
        IntLess => "INT_LESS", Integer -> Integer;
        IntSLess => "INT_SLESS", Integer -> Integer;
        IntLessEqual => "INT_LESSEQUAL", Integer -> Integer;
        IntSLessEqual => "INT_SLESSEQUAL", Integer -> Integer;
        IntCarry => "INT_CARRY", Integer -> Integer;
        IntSCarry => "INT_SCARRY", Integer -> Integer;
        IntSBorrow => "INT_SBORROW", Integer -> Integer;
        FloatAdd => "FLOAT_ADD", Float -> Float;
        FloatSub => "FLOAT_SUB", Float -> Float;
        FloatMult => "FLOAT_MULT", Float -> Float;
        FloatDiv => "FLOAT_DIV", Float -> Float;
        FloatEqual => "FLOAT_EQUAL", Float -> Integer;
        FloatNotEqual => "FLOAT_NOTEQUAL", Float -> Integer;
        FloatLess => "FLOAT_LESS", Float -> Integer;
        FloatLessEqual => "FLOAT_LESSEQUAL", Float -> Integer;
    }
}

opcode_table! {
    /// One-input operations.
    UnaryOpcode {
        IntNegate => "INT_NEGATE", Integer -> Integer;
        Int2Comp => "INT_2COMP", Integer -> Integer;
        IntZext => "INT_ZEXT", Integer -> Integer;
        IntSext => "INT_SEXT", Integer -> Integer;
        BoolNegate => "BOOL_NEGATE", Integer -> Integer;
        PopCount => "POPCOUNT", Integer -> Integer;
        FloatNeg => "FLOAT_NEG", Float -> Float;
        FloatAbs => "FLOAT_ABS", Float -> Float;
        FloatSqrt => "FLOAT_SQRT", Float -> Float;
        FloatCeil => "FLOAT_CEIL", Float -> Float;
        FloatFloor => "FLOAT_FLOOR", Float -> Float;
        FloatRound => "FLOAT_ROUND", Float -> Float;
        Float2Float => "FLOAT2FLOAT", Float -> Float;
        FloatNan => "FLOAT_NAN", Float -> Integer;
        Trunc => "TRUNC", Float -> Integer;
        Int2Float => "INT2FLOAT", Integer -> Float;
    }
}

/// `COPY`: the output is the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOp {
    pub out: ValueId,
    pub input: ValueId,
}

impl CopyOp {
    pub fn new(out: ValueId, input: ValueId) -> Self {
        Self { out, input }
    }
}

impl UseDefOp for CopyOp {
    fn mnemonic(&self) -> &'static str {
        "COPY"
    }

    fn inputs(&self) -> &[ValueId] {
        slice::from_ref(&self.input)
    }

    fn output(&self) -> Option<ValueId> {
        Some(self.out)
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        (position == 0).then_some(TypeBehavior::Any)
    }

    fn out_type(&self) -> Option<TypeBehavior> {
        Some(TypeBehavior::Any)
    }

    fn has_side_effects(&self) -> bool {
        false
    }

    fn is_type_transparent(&self) -> bool {
        true
    }
}

impl DefOp for CopyOp {
    fn out(&self) -> ValueId {
        self.out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryOp {
    pub opcode: BinaryOpcode,
    pub out: ValueId,
    pub operands: [ValueId; 2],
}

impl BinaryOp {
    pub fn new(opcode: BinaryOpcode, out: ValueId, left: ValueId, right: ValueId) -> Self {
        Self {
            opcode,
            out,
            operands: [left, right],
        }
    }
}

impl UseDefOp for BinaryOp {
    fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic()
    }

    fn inputs(&self) -> &[ValueId] {
        &self.operands
    }

    fn output(&self) -> Option<ValueId> {
        Some(self.out)
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        (position < 2).then(|| self.opcode.input_type())
    }

    fn out_type(&self) -> Option<TypeBehavior> {
        Some(self.opcode.output_type())
    }

    fn has_side_effects(&self) -> bool {
        false
    }
}

impl DefOp for BinaryOp {
    fn out(&self) -> ValueId {
        self.out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryOp {
    pub opcode: UnaryOpcode,
    pub out: ValueId,
    pub input: ValueId,
}

impl UnaryOp {
    pub fn new(opcode: UnaryOpcode, out: ValueId, input: ValueId) -> Self {
        Self { opcode, out, input }
    }
}

impl UseDefOp for UnaryOp {
    fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic()
    }

    fn inputs(&self) -> &[ValueId] {
        slice::from_ref(&self.input)
    }

    fn output(&self) -> Option<ValueId> {
        Some(self.out)
    }

    fn type_for(&self, position: usize) -> Option<TypeBehavior> {
        (position == 0).then(|| self.opcode.input_type())
    }

    fn out_type(&self) -> Option<TypeBehavior> {
        Some(self.opcode.output_type())
    }

    fn has_side_effects(&self) -> bool {
        false
    }
}

impl DefOp for UnaryOp {
    fn out(&self) -> ValueId {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonics_round_trip() {
        for &op in BinaryOpcode::ALL {
            assert_eq!(BinaryOpcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        for &op in UnaryOpcode::ALL {
            assert_eq!(UnaryOpcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(BinaryOpcode::from_mnemonic("INT_NEGATE"), None);
    }

    #[test]
    fn test_float_compare_produces_integer() {
        let op = BinaryOp::new(BinaryOpcode::FloatLess, ValueId(2), ValueId(0), ValueId(1));
        assert_eq!(op.type_for(0), Some(TypeBehavior::Float));
        assert_eq!(op.type_for(1), Some(TypeBehavior::Float));
        assert_eq!(op.type_for(2), None);
        assert_eq!(op.out_type(), Some(TypeBehavior::Integer));
    }

    #[test]
    fn test_conversions() {
        let op = UnaryOp::new(UnaryOpcode::Int2Float, ValueId(1), ValueId(0));
        assert_eq!(op.type_for(0), Some(TypeBehavior::Integer));
        assert_eq!(op.out_type(), Some(TypeBehavior::Float));
        assert_eq!(UnaryOpcode::Trunc.output_type(), TypeBehavior::Integer);
    }

    #[test]
    fn test_copy_is_transparent() {
        let op = CopyOp::new(ValueId(1), ValueId(0));
        assert!(op.is_type_transparent());
        assert_eq!(op.type_for(0), Some(TypeBehavior::Any));
        assert_eq!(op.type_for(1), None);
    }
}
