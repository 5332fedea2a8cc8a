//! Type behaviors and resolved value types.
//!
//! Operations describe what they need from each operand with a
//! [`TypeBehavior`]. Type inference turns those requirements into one
//! [`ResolvedType`] per value, which is what a backend selects encodings from.

use std::fmt;

/// The numeric category an operation requires of an operand or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeBehavior {
    /// Integral, including booleans and addresses.
    Integer,
    /// IEEE floating point.
    Float,
    /// No constraint; decided by the surrounding uses.
    Any,
}

impl TypeBehavior {
    /// Whether this behavior pins a value to a category.
    pub fn is_concrete(self) -> bool {
        self != TypeBehavior::Any
    }

    /// The concrete type of a value of `size` bytes with this behavior.
    ///
    /// Floats exist only at 4 and 8 bytes; `Any` has no concrete type.
    pub fn resolve(self, size: u32) -> Option<ResolvedType> {
        match self {
            TypeBehavior::Integer => Some(ResolvedType::Int(size)),
            TypeBehavior::Float if matches!(size, 4 | 8) => Some(ResolvedType::Float(size)),
            TypeBehavior::Float | TypeBehavior::Any => None,
        }
    }
}

impl fmt::Display for TypeBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeBehavior::Integer => "INTEGER",
            TypeBehavior::Float => "FLOAT",
            TypeBehavior::Any => "ANY",
        };
        f.write_str(name)
    }
}

/// A value's final type, sized in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedType {
    Int(u32),
    Float(u32),
}

impl ResolvedType {
    pub fn size(self) -> u32 {
        match self {
            ResolvedType::Int(size) | ResolvedType::Float(size) => size,
        }
    }

    /// The behavior this type satisfies.
    pub fn behavior(self) -> TypeBehavior {
        match self {
            ResolvedType::Int(_) => TypeBehavior::Integer,
            ResolvedType::Float(_) => TypeBehavior::Float,
        }
    }

    /// Whether a use requiring `required` can read this type without coercion.
    pub fn satisfies(self, required: TypeBehavior) -> bool {
        required == TypeBehavior::Any || required == self.behavior()
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Int(size) => write!(f, "i{}", u64::from(*size) * 8),
            ResolvedType::Float(size) => write!(f, "f{}", u64::from(*size) * 8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_only_at_native_widths() {
        assert_eq!(TypeBehavior::Float.resolve(4), Some(ResolvedType::Float(4)));
        assert_eq!(TypeBehavior::Float.resolve(8), Some(ResolvedType::Float(8)));
        assert_eq!(TypeBehavior::Float.resolve(10), None);
        assert_eq!(TypeBehavior::Integer.resolve(3), Some(ResolvedType::Int(3)));
        assert_eq!(TypeBehavior::Any.resolve(8), None);
    }

    #[test]
    fn test_satisfies() {
        let ty = ResolvedType::Float(8);
        assert!(ty.satisfies(TypeBehavior::Any));
        assert!(ty.satisfies(TypeBehavior::Float));
        assert!(!ty.satisfies(TypeBehavior::Integer));
        assert_eq!(ty.to_string(), "f64");
        assert_eq!(ResolvedType::Int(1).to_string(), "i8");
        assert_eq!(ResolvedType::Int(u32::MAX).to_string(), "i34359738360");
    }
}
