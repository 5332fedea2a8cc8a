//! Userop signatures and the userop registry.
//!
//! A userop is an operation the instruction set leaves to the embedder
//! (`CALLOTHER`). The translator only needs its signature: the expected type
//! of each argument, the type of its result and whether a call may be removed
//! when its result is unused.
//!
//! Built-in definitions come from a static table of constructors resolved
//! once by [`UseropLibrary::builtin`]. Embedders add their own with
//! [`UseropLibrary::register`] before translation starts; after that the
//! library is shared read-only between translation threads.

use super::types::TypeBehavior;
use hashbrown::HashMap;
use std::sync::Arc;

/// Signature of one userop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseropDefinition {
    pub name: String,
    /// Expected behavior of each declared parameter.
    pub inputs: Vec<TypeBehavior>,
    /// Whether extra arguments beyond `inputs` are accepted.
    pub variadic: bool,
    pub output: TypeBehavior,
    /// Calls have no effect besides their result.
    pub pure: bool,
}

impl UseropDefinition {
    pub fn new(name: impl Into<String>, inputs: Vec<TypeBehavior>, output: TypeBehavior) -> Self {
        Self {
            name: name.into(),
            inputs,
            variadic: false,
            output,
            pure: false,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    /// Whether a call with `count` arguments matches this signature.
    pub fn accepts_arity(&self, count: usize) -> bool {
        if self.variadic {
            count >= self.inputs.len()
        } else {
            count == self.inputs.len()
        }
    }

    /// Expected behavior of the argument at `position`.
    pub fn input_type(&self, position: usize) -> Option<TypeBehavior> {
        match self.inputs.get(position) {
            Some(ty) => Some(*ty),
            None if self.variadic => Some(TypeBehavior::Any),
            None => None,
        }
    }
}

type UseropFactory = fn() -> UseropDefinition;

fn fsqrt() -> UseropDefinition {
    UseropDefinition::new("fsqrt", vec![TypeBehavior::Float], TypeBehavior::Float).pure()
}

fn bswap() -> UseropDefinition {
    UseropDefinition::new("bswap", vec![TypeBehavior::Integer], TypeBehavior::Integer).pure()
}

fn lzcount() -> UseropDefinition {
    UseropDefinition::new("lzcount", vec![TypeBehavior::Integer], TypeBehavior::Integer).pure()
}

fn rdtsc() -> UseropDefinition {
    UseropDefinition::new("rdtsc", vec![], TypeBehavior::Integer)
}

fn cpuid() -> UseropDefinition {
    UseropDefinition::new("cpuid", vec![TypeBehavior::Integer], TypeBehavior::Integer)
}

fn syscall() -> UseropDefinition {
    UseropDefinition::new("syscall", vec![TypeBehavior::Integer], TypeBehavior::Integer).variadic()
}

fn hlt() -> UseropDefinition {
    UseropDefinition::new("hlt", vec![], TypeBehavior::Any)
}

static BUILTIN_USEROPS: &[(&str, UseropFactory)] = &[
    ("fsqrt", fsqrt),
    ("bswap", bswap),
    ("lzcount", lzcount),
    ("rdtsc", rdtsc),
    ("cpuid", cpuid),
    ("syscall", syscall),
    ("hlt", hlt),
];

/// Name to signature map consulted by the translator.
#[derive(Debug, Default, Clone)]
pub struct UseropLibrary {
    defs: HashMap<String, Arc<UseropDefinition>>,
}

impl UseropLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// A library holding every built-in userop.
    pub fn builtin() -> Self {
        let mut lib = Self::new();
        for (id, factory) in BUILTIN_USEROPS {
            let def = factory();
            debug_assert_eq!(*id, def.name);
            lib.register(def);
        }
        lib
    }

    /// Add or replace a definition.
    pub fn register(&mut self, def: UseropDefinition) {
        log::debug!("Registered userop @{} (pure: {})", def.name, def.pure);
        self.defs.insert(def.name.clone(), Arc::new(def));
    }

    pub fn get(&self, name: &str) -> Option<Arc<UseropDefinition>> {
        self.defs.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.defs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let lib = UseropLibrary::builtin();
        assert_eq!(lib.len(), BUILTIN_USEROPS.len());
        assert!(lib.get("fsqrt").unwrap().pure);
        assert!(!lib.get("rdtsc").unwrap().pure);
        assert!(lib.get("missing").is_none());
        assert_eq!(lib.names()[0], "bswap");
    }

    #[test]
    fn test_variadic_arguments() {
        let def = syscall();
        assert!(!def.accepts_arity(0));
        assert!(def.accepts_arity(1));
        assert!(def.accepts_arity(4));
        assert_eq!(def.input_type(0), Some(TypeBehavior::Integer));
        assert_eq!(def.input_type(3), Some(TypeBehavior::Any));

        let def = fsqrt();
        assert!(!def.accepts_arity(2));
        assert_eq!(def.input_type(1), None);
    }

    #[test]
    fn test_register_replaces() {
        let mut lib = UseropLibrary::builtin();
        lib.register(UseropDefinition::new("rdtsc", vec![], TypeBehavior::Integer).pure());
        assert!(lib.get("rdtsc").unwrap().pure);
    }
}
