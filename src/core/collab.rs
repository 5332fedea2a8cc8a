// This module holds the capability traits for the two collaborators that live outside the
// translator. RegisterSource stands in for the debugger's register container: it maps register
// names to register-space locations and back. RegisterMap is the built-in source, a static
// x86-64 table with the general purpose registers, their 32-bit halves, RIP, the status flags
// and the low XMM registers with their scalar lanes. TaintClient stands in for the analysis
// plugin: it only answers whether a location is a taint source. Clients are looked up by name in
// a static table of constructors, the same way userops are.

//! Register-source and analysis-client capabilities.

use super::value::{Location, Space};
use hashbrown::HashMap;

/// Resolves register names to locations.
pub trait RegisterSource {
    fn register(&self, name: &str) -> Option<Location>;

    /// The name of the register occupying exactly `location`.
    fn register_name(&self, location: &Location) -> Option<&str>;
}

// (name, offset, size) in the register space.
static X86_64_REGISTERS: &[(&str, u64, u32)] = &[
    ("RAX", 0x0, 8),
    ("RCX", 0x8, 8),
    ("RDX", 0x10, 8),
    ("RBX", 0x18, 8),
    ("RSP", 0x20, 8),
    ("RBP", 0x28, 8),
    ("RSI", 0x30, 8),
    ("RDI", 0x38, 8),
    ("EAX", 0x0, 4),
    ("ECX", 0x8, 4),
    ("EDX", 0x10, 4),
    ("EBX", 0x18, 4),
    ("ESI", 0x30, 4),
    ("EDI", 0x38, 4),
    ("R8", 0x80, 8),
    ("R9", 0x88, 8),
    ("R10", 0x90, 8),
    ("R11", 0x98, 8),
    ("R12", 0xa0, 8),
    ("R13", 0xa8, 8),
    ("R14", 0xb0, 8),
    ("R15", 0xb8, 8),
    ("CF", 0x200, 1),
    ("PF", 0x202, 1),
    ("AF", 0x204, 1),
    ("ZF", 0x206, 1),
    ("SF", 0x207, 1),
    ("OF", 0x20b, 1),
    ("RIP", 0x288, 8),
    ("XMM0", 0x1200, 16),
    ("XMM0_Qa", 0x1200, 8),
    ("XMM0_Da", 0x1200, 4),
    ("XMM1", 0x1220, 16),
    ("XMM1_Qa", 0x1220, 8),
    ("XMM1_Da", 0x1220, 4),
    ("XMM2", 0x1240, 16),
    ("XMM2_Qa", 0x1240, 8),
    ("XMM2_Da", 0x1240, 4),
    ("XMM3", 0x1260, 16),
    ("XMM3_Qa", 0x1260, 8),
    ("XMM3_Da", 0x1260, 4),
];

/// A table-driven [`RegisterSource`].
#[derive(Debug, Clone, Default)]
pub struct RegisterMap {
    by_name: HashMap<String, Location>,
    by_location: HashMap<Location, String>,
}

impl RegisterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in x86-64 register subset.
    pub fn x86_64() -> Self {
        let mut map = Self::new();
        for &(name, offset, size) in X86_64_REGISTERS {
            map.insert(name, Location::new(Space::Register, offset, size));
        }
        map
    }

    pub fn insert(&mut self, name: &str, location: Location) {
        self.by_name.insert(name.to_string(), location);
        self.by_location
            .entry(location)
            .or_insert_with(|| name.to_string());
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl RegisterSource for RegisterMap {
    fn register(&self, name: &str) -> Option<Location> {
        self.by_name.get(name).copied()
    }

    fn register_name(&self, location: &Location) -> Option<&str> {
        self.by_location.get(location).map(String::as_str)
    }
}

/// Decides which locations introduce tainted data.
pub trait TaintClient: Send + Sync {
    fn name(&self) -> &str;

    fn is_source(&self, location: &Location) -> bool;
}

/// Taints every location overlapping one of a fixed set.
#[derive(Debug, Clone)]
pub struct LocationTaint {
    name: &'static str,
    sources: Vec<Location>,
}

impl LocationTaint {
    pub fn new(name: &'static str, sources: Vec<Location>) -> Self {
        Self { name, sources }
    }
}

impl TaintClient for LocationTaint {
    fn name(&self) -> &str {
        self.name
    }

    fn is_source(&self, location: &Location) -> bool {
        self.sources.iter().any(|s| s.overlaps(location))
    }
}

/// Taints every location in one space.
#[derive(Debug, Clone)]
pub struct SpaceTaint {
    name: &'static str,
    space: Space,
}

impl SpaceTaint {
    pub fn new(name: &'static str, space: Space) -> Self {
        Self { name, space }
    }
}

impl TaintClient for SpaceTaint {
    fn name(&self) -> &str {
        self.name
    }

    fn is_source(&self, location: &Location) -> bool {
        location.space == self.space
    }
}

type ClientFactory = fn() -> Box<dyn TaintClient>;

fn argument_registers() -> Box<dyn TaintClient> {
    let regs = RegisterMap::x86_64();
    let sources = ["RDI", "RSI", "RDX", "RCX", "R8", "R9"]
        .iter()
        .filter_map(|name| regs.register(name))
        .collect();
    Box::new(LocationTaint::new("args", sources))
}

fn all_registers() -> Box<dyn TaintClient> {
    Box::new(SpaceTaint::new("registers", Space::Register))
}

fn memory() -> Box<dyn TaintClient> {
    Box::new(SpaceTaint::new("memory", Space::Ram))
}

static ANALYSIS_CLIENTS: &[(&str, ClientFactory)] = &[
    ("args", argument_registers),
    ("registers", all_registers),
    ("memory", memory),
];

/// Look up a built-in analysis client by name.
pub fn analysis_client(name: &str) -> Option<Box<dyn TaintClient>> {
    ANALYSIS_CLIENTS
        .iter()
        .find(|(id, _)| *id == name)
        .map(|(_, factory)| factory())
}

/// Names accepted by [`analysis_client`].
pub fn analysis_client_names() -> impl Iterator<Item = &'static str> {
    ANALYSIS_CLIENTS.iter().map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_lookup() {
        let regs = RegisterMap::x86_64();
        let rax = regs.register("RAX").unwrap();
        assert_eq!(rax, Location::new(Space::Register, 0, 8));
        assert_eq!(regs.register_name(&rax), Some("RAX"));
        assert_eq!(
            regs.register_name(&Location::new(Space::Register, 0, 4)),
            Some("EAX")
        );
        assert!(regs.register("XMM9").is_none());
    }

    #[test]
    fn test_static_clients() {
        for name in analysis_client_names() {
            let client = analysis_client(name).unwrap();
            assert_eq!(client.name(), name);
        }
        assert!(analysis_client("plugin").is_none());

        let args = analysis_client("args").unwrap();
        let rdi = Location::new(Space::Register, 0x38, 8);
        let edi = Location::new(Space::Register, 0x38, 4);
        assert!(args.is_source(&rdi));
        assert!(args.is_source(&edi));
        assert!(!args.is_source(&Location::new(Space::Register, 0, 8)));
    }
}
