// This module provides arena-based session management for a translation run using the bumpalo
// crate. TranslationSession owns nothing but a reference to the arena and a set of RefCell
// counters, so it can be handed out by shared reference to every unit translated on the
// current thread. Unit and userop names are interned in the arena to keep per-unit records
// cheap, and SessionStats collects the numbers the CLI prints at the end of a run: units
// translated, fallen back or aborted, operations created and removed by dead-code elimination,
// write-backs synthesized, type diagnostics and an opcode histogram. Threads each get their own
// session; the driver merges their statistics afterwards.

//! Arena-based translation session management.

use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;

/// Per-thread state shared by every unit translated in one run.
pub struct TranslationSession<'arena> {
    arena: &'arena Bump,

    stats: RefCell<SessionStats>,

    interned_strings: RefCell<HashMap<String, &'arena str>>,

    current_unit: RefCell<Option<&'arena str>>,
}

impl<'arena> TranslationSession<'arena> {
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(HashMap::new()),
            current_unit: RefCell::new(None),
        }
    }

    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    pub fn begin_unit(&self, name: &str) -> &'arena str {
        let name = self.intern_str(name);
        *self.current_unit.borrow_mut() = Some(name);
        log::debug!("Translating unit {}", name);
        name
    }

    pub fn current_unit(&self) -> Option<&'arena str> {
        *self.current_unit.borrow()
    }

    pub fn end_unit(&self) {
        *self.current_unit.borrow_mut() = None;
    }

    pub fn record_op_created(&self, mnemonic: &str) {
        let mut stats = self.stats.borrow_mut();
        stats.ops_created += 1;
        *stats.opcode_counts.entry(mnemonic.to_string()).or_insert(0) += 1;
    }

    pub fn record_writeback(&self) {
        self.stats.borrow_mut().writebacks += 1;
    }

    pub fn record_dce(&self, removed: usize) {
        self.stats.borrow_mut().ops_removed += removed;
    }

    pub fn record_diagnostics(&self, count: usize) {
        self.stats.borrow_mut().type_diagnostics += count;
    }

    pub fn record_translated(&self) {
        self.stats.borrow_mut().units_translated += 1;
    }

    pub fn record_fallback(&self) {
        self.stats.borrow_mut().units_fallen_back += 1;
    }

    pub fn record_aborted(&self) {
        self.stats.borrow_mut().units_aborted += 1;
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Translation statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub units_translated: usize,
    pub units_fallen_back: usize,
    pub units_aborted: usize,

    pub ops_created: usize,

    /// Operations removed by dead-code elimination.
    pub ops_removed: usize,

    pub writebacks: usize,
    pub type_diagnostics: usize,

    /// Operations created per mnemonic.
    pub opcode_counts: HashMap<String, usize>,
}

impl SessionStats {
    /// Add another session's counters to these.
    pub fn merge(&mut self, other: &SessionStats) {
        self.units_translated += other.units_translated;
        self.units_fallen_back += other.units_fallen_back;
        self.units_aborted += other.units_aborted;
        self.ops_created += other.ops_created;
        self.ops_removed += other.ops_removed;
        self.writebacks += other.writebacks;
        self.type_diagnostics += other.type_diagnostics;
        for (opcode, count) in &other.opcode_counts {
            *self.opcode_counts.entry(opcode.clone()).or_insert(0) += count;
        }
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Translation Session Statistics:")?;
        writeln!(f, "  Units translated: {}", self.units_translated)?;
        writeln!(f, "  Units fallen back: {}", self.units_fallen_back)?;
        writeln!(f, "  Units aborted: {}", self.units_aborted)?;
        writeln!(f, "  Operations created: {}", self.ops_created)?;
        writeln!(f, "  Operations removed: {}", self.ops_removed)?;
        writeln!(f, "  Write-backs: {}", self.writebacks)?;
        writeln!(f, "  Type diagnostics: {}", self.type_diagnostics)?;

        if !self.opcode_counts.is_empty() {
            writeln!(f, "  Opcode breakdown:")?;
            let mut sorted: Vec<_> = self.opcode_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

            for (opcode, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", opcode, count)?;
            }
        }

        Ok(())
    }
}
