//! Textual p-code instruction streams.
//!
//! This module provides a small text format for writing translation units
//! by hand, used by the CLI and the filetests. The format is one record per
//! line, grouped into units:
//!
//! ```text
//! ; Comments start with semicolon
//! unit block_401000 {
//!   unique[0x100:8] = LOAD ram, register[0x20:8]
//!   RAX = INT_ADD RAX, const[0x1:8]
//!   unique[0x200:8] = CALLOTHER @fsqrt, XMM0_Qa
//!   STORE ram, RSP, unique[0x200:8]
//!   CBRANCH 0x401000, ZF
//! }
//! ```
//!
//! A varnode is either `space[offset:size]` or a bare name. Whether a bare
//! name is a register or an address space is up to the translator, as is
//! whether the opcode exists; the parser only checks the shape.

use std::fmt;

pub mod check;
pub mod parser;

pub use check::{CheckDirective, RunDirective, TestRunner, TestSpec};
pub use parser::{parse_program, MAX_VARNODE_SIZE};

/// A parsed source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub units: Vec<Unit>,
}

impl Program {
    pub fn parse(text: &str) -> Result<Self, crate::core::ParseError> {
        parse_program(text)
    }

    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// One `unit name { ... }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub line: usize,
    pub records: Vec<Record>,
}

/// One instruction record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub output: Option<Operand>,
    pub opcode: String,
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `space[offset:size]`
    Varnode { space: String, offset: u64, size: u32 },
    /// A register or address-space name.
    Name(String),
    /// A bare number, used for branch targets.
    Address(u64),
    /// `@name`
    Userop(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Varnode {
                space,
                offset,
                size,
            } => write!(f, "{}[{:#x}:{}]", space, offset, size),
            Operand::Name(name) => f.write_str(name),
            Operand::Address(addr) => write!(f, "{:#x}", addr),
            Operand::Userop(name) => write!(f, "@{}", name),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(out) = &self.output {
            write!(f, "{} = ", out)?;
        }
        f.write_str(&self.opcode)?;
        for (idx, operand) in self.operands.iter().enumerate() {
            let sep = if idx == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, operand)?;
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for unit in &self.units {
            writeln!(f, "unit {} {{", unit.name)?;
            for record in &unit.records {
                writeln!(f, "  {}", record)?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
