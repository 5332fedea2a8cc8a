//! jitir - use-def IR for a p-code JIT translator.
//!
//! jitir turns straight-line units of p-code (the register-transfer
//! language emitted by binary lifters) into a use-def graph, removes dead
//! operations, infers value types and produces a deterministic lowering
//! order for a code-generation backend.
//!
//! # Primary Usage
//!
//! ```ignore
//! use jitir::config::TranslatorConfig;
//! use jitir::core::{RegisterMap, UseropLibrary};
//! use jitir::driver::translate_units;
//! use jitir::pcode::Program;
//!
//! let program = Program::parse(source)?;
//! let result = translate_units(
//!     &program,
//!     &UseropLibrary::builtin(),
//!     &RegisterMap::x86_64(),
//!     &TranslatorConfig::default(),
//! )?;
//! print!("{}", result.render(false));
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Graph, operations, types, passes and session state
//! - [`pcode`] - Textual p-code parser and FileCheck-style test support
//! - [`translator`] - P-code records to graph operations
//! - [`driver`] - Per-unit pipeline with fallback handling
//! - [`config`] - Translator configuration

pub mod config;
pub mod core;
pub mod driver;
pub mod pcode;
pub mod translator;

pub use config::{MismatchPolicy, PrintOptions, TranslatorConfig};
pub use core::{
    // Graph
    Op, OpId, UseDefGraph, Value, ValueId, ValueKind,
    // Types
    ResolvedType, TypeBehavior, TypeInference,
    // Collaborators
    RegisterMap, RegisterSource, UseropDefinition, UseropLibrary,
    // Errors
    GraphError, ParseError, TranslateError,
    // Session
    SessionStats, TranslationSession,
};
pub use driver::{translate_units, Driver, RunResult, UnitOutcome, UnitReport};
pub use pcode::Program;
pub use translator::{TranslatedUnit, Translator};
