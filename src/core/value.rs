// This module implements the value side of the use-def graph. A Value is a constant, the output
// of an operation, or a space-relative location read before anything in the unit wrote it. Each
// value records the set of (operation, operand position) pairs that currently use it, and for
// outputs the operation that defines it. Those records are plain relations keyed by OpId: a value
// never owns or keeps alive the operations that use it, and every record is created by an
// operation's link() and removed by its unlink(). ValueTable is the index-addressed store the
// graph owns; it turns any mismatch in that bookkeeping (a duplicate use, removing a use that was
// never recorded, a second definer) into a GraphError instead of letting use counts drift.

//! Values, locations and use bookkeeping.

use super::error::{GraphError, GraphResult};
use std::fmt;

/// Identity of an operation within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u32);

impl OpId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// Identity of a value within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Address spaces known to the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Space {
    Const,
    /// Scratch storage private to one unit.
    Unique,
    Register,
    Ram,
}

impl Space {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "const" => Some(Space::Const),
            "unique" => Some(Space::Unique),
            "register" => Some(Space::Register),
            "ram" => Some(Space::Ram),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Space::Const => "const",
            Space::Unique => "unique",
            Space::Register => "register",
            Space::Ram => "ram",
        }
    }

    /// Whether writes to this space are visible after the unit ends.
    pub fn is_observable(self) -> bool {
        matches!(self, Space::Register | Space::Ram)
    }

    /// Whether LOAD and STORE may address this space.
    pub fn is_memory(self) -> bool {
        matches!(self, Space::Ram | Space::Register)
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A sized range within an address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub space: Space,
    pub offset: u64,
    pub size: u32,
}

impl Location {
    pub fn new(space: Space, offset: u64, size: u32) -> Self {
        Self {
            space,
            offset,
            size,
        }
    }

    /// Whether the two ranges share at least one byte.
    pub fn overlaps(&self, other: &Location) -> bool {
        self.space == other.space
            && self.offset < other.offset.saturating_add(other.size as u64)
            && other.offset < self.offset.saturating_add(self.size as u64)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:#x}:{}]", self.space, self.offset, self.size)
    }
}

/// What a value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Const(u64),
    /// The output of an operation; defined once that operation is linked.
    Output,
    /// The contents of a location on entry to the unit.
    Location(Location),
}

/// One operand slot referencing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Use {
    pub op: OpId,
    pub position: usize,
}

/// A node of the use-def graph representing one quantity.
#[derive(Debug, Clone)]
pub struct Value {
    kind: ValueKind,
    size: u32,
    definer: Option<OpId>,
    uses: Vec<Use>,
}

impl Value {
    pub fn new(kind: ValueKind, size: u32) -> Self {
        Self {
            kind,
            size,
            definer: None,
            uses: Vec::new(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The operation that defines this value, if it is a linked output.
    pub fn definer(&self) -> Option<OpId> {
        self.definer
    }

    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    pub fn use_count(&self) -> usize {
        self.uses.len()
    }

    pub fn is_used(&self) -> bool {
        !self.uses.is_empty()
    }

    /// Whether no operation defines this value.
    pub fn is_free(&self) -> bool {
        self.definer.is_none()
    }

    pub fn has_use(&self, op: OpId, position: usize) -> bool {
        self.uses.contains(&Use { op, position })
    }

    /// Record a use. Returns false if the same use is already recorded.
    pub fn add_use(&mut self, op: OpId, position: usize) -> bool {
        let u = Use { op, position };
        if self.uses.contains(&u) {
            return false;
        }
        self.uses.push(u);
        true
    }

    /// Forget a use. Returns false if it was not recorded.
    pub fn remove_use(&mut self, op: OpId, position: usize) -> bool {
        match self.uses.iter().position(|u| u.op == op && u.position == position) {
            Some(idx) => {
                // Keep insertion order so schedules and printouts stay stable.
                self.uses.remove(idx);
                true
            }
            None => false,
        }
    }
}

/// Index-addressed storage for all values of one graph.
///
/// Slots are emptied when their value is released and are never reused.
#[derive(Debug, Default, Clone)]
pub struct ValueTable {
    slots: Vec<Option<Value>>,
    live: usize,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) -> ValueId {
        let id = ValueId(self.slots.len() as u32);
        self.slots.push(Some(value));
        self.live += 1;
        id
    }

    pub fn get(&self, id: ValueId) -> Option<&Value> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn value(&self, id: ValueId) -> GraphResult<&Value> {
        self.get(id).ok_or(GraphError::UnknownValue { value: id })
    }

    fn value_mut(&mut self, id: ValueId) -> GraphResult<&mut Value> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownValue { value: id })
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ValueId, &Value)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|v| (ValueId(idx as u32), v)))
    }

    pub fn add_use(&mut self, id: ValueId, op: OpId, position: usize) -> GraphResult<()> {
        if !self.value_mut(id)?.add_use(op, position) {
            return Err(GraphError::DuplicateUse {
                value: id,
                op,
                position,
            });
        }
        log::trace!("{} += use({}, {})", id, op, position);
        Ok(())
    }

    pub fn remove_use(&mut self, id: ValueId, op: OpId, position: usize) -> GraphResult<()> {
        if !self.value_mut(id)?.remove_use(op, position) {
            return Err(GraphError::MissingUse {
                value: id,
                op,
                position,
            });
        }
        log::trace!("{} -= use({}, {})", id, op, position);
        Ok(())
    }

    /// Make `op` the sole definer of the output value `id`.
    pub fn define(&mut self, id: ValueId, op: OpId) -> GraphResult<()> {
        let value = self.value_mut(id)?;
        if value.kind != ValueKind::Output {
            return Err(GraphError::NotAnOutput { value: id });
        }
        if let Some(definer) = value.definer {
            return Err(GraphError::Redefined {
                value: id,
                definer,
                op,
            });
        }
        value.definer = Some(op);
        Ok(())
    }

    /// Clear the definer link set by [`ValueTable::define`].
    pub fn undefine(&mut self, id: ValueId, op: OpId) -> GraphResult<()> {
        let value = self.value_mut(id)?;
        if value.definer != Some(op) {
            return Err(GraphError::DefinerMismatch { value: id, op });
        }
        value.definer = None;
        Ok(())
    }

    /// Drop a value from the table.
    pub fn release(&mut self, id: ValueId) -> Option<Value> {
        let value = self.slots.get_mut(id.index()).and_then(Option::take);
        if value.is_some() {
            self.live -= 1;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_bookkeeping() {
        let mut table = ValueTable::new();
        let v = table.push(Value::new(ValueKind::Const(0x10), 8));

        table.add_use(v, OpId(0), 0).unwrap();
        table.add_use(v, OpId(1), 1).unwrap();
        assert_eq!(table.value(v).unwrap().use_count(), 2);

        assert_eq!(
            table.add_use(v, OpId(0), 0),
            Err(GraphError::DuplicateUse {
                value: v,
                op: OpId(0),
                position: 0
            })
        );

        table.remove_use(v, OpId(0), 0).unwrap();
        assert_eq!(
            table.remove_use(v, OpId(0), 0),
            Err(GraphError::MissingUse {
                value: v,
                op: OpId(0),
                position: 0
            })
        );
        assert_eq!(table.value(v).unwrap().uses(), &[Use { op: OpId(1), position: 1 }]);
    }

    #[test]
    fn test_same_op_two_positions() {
        let mut value = Value::new(ValueKind::Output, 4);
        assert!(value.add_use(OpId(2), 0));
        assert!(value.add_use(OpId(2), 1));
        assert!(!value.add_use(OpId(2), 1));
        assert!(value.remove_use(OpId(2), 0));
        assert!(value.has_use(OpId(2), 1));
        assert!(!value.has_use(OpId(2), 0));
    }

    #[test]
    fn test_single_definer() {
        let mut table = ValueTable::new();
        let out = table.push(Value::new(ValueKind::Output, 8));
        let c = table.push(Value::new(ValueKind::Const(1), 8));

        table.define(out, OpId(0)).unwrap();
        assert_eq!(table.value(out).unwrap().definer(), Some(OpId(0)));
        assert!(matches!(
            table.define(out, OpId(1)),
            Err(GraphError::Redefined { .. })
        ));
        assert_eq!(
            table.undefine(out, OpId(1)),
            Err(GraphError::DefinerMismatch {
                value: out,
                op: OpId(1)
            })
        );
        table.undefine(out, OpId(0)).unwrap();
        assert!(table.value(out).unwrap().is_free());

        assert_eq!(table.define(c, OpId(0)), Err(GraphError::NotAnOutput { value: c }));
    }

    #[test]
    fn test_release_never_reuses_slot() {
        let mut table = ValueTable::new();
        let a = table.push(Value::new(ValueKind::Output, 8));
        assert!(table.release(a).is_some());
        assert!(table.release(a).is_none());
        let b = table.push(Value::new(ValueKind::Output, 8));
        assert_ne!(a, b);
        assert!(table.get(a).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_location_overlap() {
        let rax = Location::new(Space::Register, 0, 8);
        let eax = Location::new(Space::Register, 0, 4);
        let rcx = Location::new(Space::Register, 8, 8);
        assert!(rax.overlaps(&eax));
        assert!(!rax.overlaps(&rcx));
        assert!(!rax.overlaps(&Location::new(Space::Unique, 0, 8)));
        assert_eq!(rax.to_string(), "register[0x0:8]");
    }
}
