// This module turns the records of one unit into a linked use-def graph. It walks the records in
// order, keeping a local data-flow state that maps each location to the value it currently
// holds: reading a location that has not been written yields a free entry value (created once
// and reused), writing a location replaces its entry. Every operation is linked as soon as it
// is created. Locations in the register and ram spaces that were written are also remembered as
// dirty; before each branch and at the end of the unit one write-back per dirty location is
// emitted, so the final contents of observable locations stay alive through dead-code
// elimination while scratch results in the unique space do not. A write that partially overlaps
// a dirty location flushes that location first so both writes land in order. Memory accesses
// are barriers too: LOAD and STORE first write back the dirty locations of the space they
// address, and a call to an impure userop writes back every dirty location. A STORE may change
// any byte of its space and an impure call any byte of ram, so afterwards varnodes in that space
// are read again with an explicit LOAD instead of reusing the value the unit last saw. Reads that
// partially overlap something written earlier in the unit have no single value to name and
// make the unit fall back, as do unknown opcodes, userops, registers and spaces.

//! Instruction records to use-def graph.

use crate::core::collab::RegisterSource;
use crate::core::ops::{
    BinaryOp, BinaryOpcode, BranchIndOp, BranchOp, CBranchOp, CallOtherDefOp, CallOtherOp,
    CopyOp, LoadOp, MiniDfState, StoreOp, UnaryOp, UnaryOpcode, WritebackOp,
};
use crate::core::{
    Location, Op, OpId, Space, TranslateError, TranslateResult, TranslationSession, TypeBehavior,
    UseDefGraph, UseDefOp, UseropLibrary, ValueId,
};
use crate::pcode::{Operand, Record, Unit};
use hashbrown::HashMap;

/// A unit translated into a graph, before any pass has run.
#[derive(Debug)]
pub struct TranslatedUnit {
    pub name: String,
    pub graph: UseDefGraph,
    pub writebacks: usize,
}

/// Translates units against a fixed userop library and register source.
pub struct Translator<'a, 'arena> {
    userops: &'a UseropLibrary,
    registers: &'a dyn RegisterSource,
    session: &'a TranslationSession<'arena>,
}

impl<'a, 'arena> Translator<'a, 'arena> {
    pub fn new(
        userops: &'a UseropLibrary,
        registers: &'a dyn RegisterSource,
        session: &'a TranslationSession<'arena>,
    ) -> Self {
        Self {
            userops,
            registers,
            session,
        }
    }

    pub fn translate(&self, unit: &Unit) -> TranslateResult<TranslatedUnit> {
        let mut builder = UnitBuilder::new(self);
        for record in &unit.records {
            log::trace!("{}: {}", record.line, record);
            builder.record(record)?;
        }
        builder.flush()?;

        log::debug!(
            "Unit {}: {} ops, {} write-backs",
            unit.name,
            builder.graph.op_count(),
            builder.writebacks
        );
        Ok(TranslatedUnit {
            name: unit.name.clone(),
            graph: builder.graph,
            writebacks: builder.writebacks,
        })
    }
}

struct UnitBuilder<'t, 'a, 'arena> {
    translator: &'t Translator<'a, 'arena>,
    graph: UseDefGraph,
    /// The value each known location currently holds.
    current: HashMap<Location, ValueId>,
    /// Every location written so far, for overlap checks.
    written: Vec<Location>,
    /// Observable locations written since the last write-back, in write order.
    dirty: Vec<Location>,
    consts: HashMap<(u64, u32), ValueId>,
    writebacks: usize,
    /// Spaces that may hold bytes the unit has not tracked.
    clobbered: Vec<Space>,
}

impl<'t, 'a, 'arena> UnitBuilder<'t, 'a, 'arena> {
    fn new(translator: &'t Translator<'a, 'arena>) -> Self {
        Self {
            translator,
            graph: UseDefGraph::new(),
            current: HashMap::new(),
            written: Vec::new(),
            dirty: Vec::new(),
            consts: HashMap::new(),
            writebacks: 0,
            clobbered: Vec::new(),
        }
    }

    fn emit(&mut self, op: impl Into<Op>) -> TranslateResult<OpId> {
        let op = op.into();
        self.translator.session.record_op_created(op.mnemonic());
        Ok(self.graph.add_linked(op)?)
    }

    // ---------------------------------------------------------------------
    // Operand resolution
    // ---------------------------------------------------------------------

    fn location(&self, line: usize, operand: &Operand) -> TranslateResult<Location> {
        match operand {
            Operand::Varnode {
                space,
                offset,
                size,
            } => {
                let space = Space::from_name(space).ok_or_else(|| TranslateError::Unsupported {
                    line,
                    reason: format!("unknown space '{}'", space),
                })?;
                Ok(Location::new(space, *offset, *size))
            }
            Operand::Name(name) => self.translator.registers.register(name).ok_or_else(|| {
                TranslateError::UnknownRegister {
                    line,
                    name: name.clone(),
                }
            }),
            other => Err(TranslateError::Unsupported {
                line,
                reason: format!("'{}' is not a varnode", other),
            }),
        }
    }

    fn read(&mut self, line: usize, operand: &Operand) -> TranslateResult<ValueId> {
        let loc = self.location(line, operand)?;
        if loc.space == Space::Const {
            return Ok(self.konst(loc.offset, loc.size));
        }
        if let Some(&value) = self.current.get(&loc) {
            return Ok(value);
        }
        if self.written.iter().any(|w| w.overlaps(&loc)) {
            return Err(TranslateError::Unsupported {
                line,
                reason: format!("read of {} partially overlaps an earlier write", loc),
            });
        }
        let value = if self.clobbered.contains(&loc.space) {
            let offset = self.konst(loc.offset, 8);
            let out = self.graph.new_output(loc.size);
            self.emit(LoadOp::new(out, loc.space, offset))?;
            out
        } else {
            self.graph.new_location(loc)
        };
        self.current.insert(loc, value);
        Ok(value)
    }

    fn konst(&mut self, value: u64, size: u32) -> ValueId {
        let graph = &mut self.graph;
        *self
            .consts
            .entry((value, size))
            .or_insert_with(|| graph.new_const(value, size))
    }

    /// The location an output operand writes. The value itself is recorded
    /// by [`UnitBuilder::commit`] once its definer is linked.
    fn output_location(&self, line: usize, operand: Option<&Operand>) -> TranslateResult<Location> {
        let operand = operand.ok_or_else(|| TranslateError::Unsupported {
            line,
            reason: "operation needs an output".to_string(),
        })?;
        let loc = self.location(line, operand)?;
        if loc.space == Space::Const {
            return Err(TranslateError::Unsupported {
                line,
                reason: "cannot write to the const space".to_string(),
            });
        }
        Ok(loc)
    }

    fn commit(&mut self, loc: Location, value: ValueId) -> TranslateResult<()> {
        let partial: Vec<Location> = self
            .dirty
            .iter()
            .filter(|d| **d != loc && d.overlaps(&loc))
            .copied()
            .collect();
        for d in partial {
            self.write_back(d)?;
        }

        self.current.retain(|k, _| !k.overlaps(&loc));
        self.current.insert(loc, value);
        if !self.written.contains(&loc) {
            self.written.push(loc);
        }
        if loc.space.is_observable() && !self.dirty.contains(&loc) {
            self.dirty.push(loc);
        }
        Ok(())
    }

    fn write_back(&mut self, loc: Location) -> TranslateResult<()> {
        self.dirty.retain(|d| *d != loc);
        let Some(&value) = self.current.get(&loc) else {
            return Ok(());
        };
        self.emit(WritebackOp {
            location: loc,
            value,
        })?;
        self.writebacks += 1;
        self.translator.session.record_writeback();
        Ok(())
    }

    /// Emit a write-back for every dirty location.
    fn flush(&mut self) -> TranslateResult<()> {
        while let Some(&loc) = self.dirty.first() {
            self.write_back(loc)?;
        }
        Ok(())
    }

    /// Emit a write-back for every dirty location in `space`, in write order.
    fn flush_space(&mut self, space: Space) -> TranslateResult<()> {
        let locs: Vec<Location> = self
            .dirty
            .iter()
            .filter(|d| d.space == space)
            .copied()
            .collect();
        for loc in locs {
            self.write_back(loc)?;
        }
        Ok(())
    }

    /// Forget every value the unit knows in `space`. Its dirty locations
    /// must already be written back.
    fn clobber(&mut self, space: Space) {
        debug_assert!(self.dirty.iter().all(|d| d.space != space));
        self.current.retain(|k, _| k.space != space);
        self.written.retain(|w| w.space != space);
        if !self.clobbered.contains(&space) {
            self.clobbered.push(space);
        }
    }

    fn memory_space(&self, line: usize, operand: &Operand) -> TranslateResult<Space> {
        let space = match operand {
            Operand::Name(name) => Space::from_name(name),
            _ => None,
        };
        space.filter(|s| s.is_memory()).ok_or_else(|| TranslateError::Unsupported {
            line,
            reason: format!("'{}' is not an addressable space", operand),
        })
    }

    fn branch_target(&self, line: usize, operand: &Operand) -> TranslateResult<u64> {
        match operand {
            Operand::Address(addr) => Ok(*addr),
            Operand::Varnode { space, offset, .. } if space == "ram" => Ok(*offset),
            other => Err(TranslateError::Unsupported {
                line,
                reason: format!("'{}' is not a branch target", other),
            }),
        }
    }

    fn expect_operands(&self, record: &Record, count: usize) -> TranslateResult<()> {
        if record.operands.len() != count {
            return Err(TranslateError::Unsupported {
                line: record.line,
                reason: format!(
                    "{} takes {} operands, got {}",
                    record.opcode,
                    count,
                    record.operands.len()
                ),
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Records
    // ---------------------------------------------------------------------

    fn record(&mut self, record: &Record) -> TranslateResult<()> {
        let line = record.line;
        let ops = &record.operands;

        if let Some(opcode) = BinaryOpcode::from_mnemonic(&record.opcode) {
            self.expect_operands(record, 2)?;
            let loc = self.output_location(line, record.output.as_ref())?;
            let left = self.read(line, &ops[0])?;
            let right = self.read(line, &ops[1])?;
            let out = self.graph.new_output(loc.size);
            self.emit(BinaryOp::new(opcode, out, left, right))?;
            return self.commit(loc, out);
        }

        if let Some(opcode) = UnaryOpcode::from_mnemonic(&record.opcode) {
            self.expect_operands(record, 1)?;
            let loc = self.output_location(line, record.output.as_ref())?;
            let input = self.read(line, &ops[0])?;
            let out = self.graph.new_output(loc.size);
            self.emit(UnaryOp::new(opcode, out, input))?;
            return self.commit(loc, out);
        }

        match record.opcode.as_str() {
            "COPY" => {
                self.expect_operands(record, 1)?;
                let loc = self.output_location(line, record.output.as_ref())?;
                let input = self.read(line, &ops[0])?;
                let out = self.graph.new_output(loc.size);
                self.emit(CopyOp::new(out, input))?;
                self.commit(loc, out)
            }
            "LOAD" => {
                self.expect_operands(record, 2)?;
                let loc = self.output_location(line, record.output.as_ref())?;
                let space = self.memory_space(line, &ops[0])?;
                let offset = self.read(line, &ops[1])?;
                self.flush_space(space)?;
                let out = self.graph.new_output(loc.size);
                self.emit(LoadOp::new(out, space, offset))?;
                self.commit(loc, out)
            }
            "STORE" => {
                self.expect_operands(record, 3)?;
                let space = self.memory_space(line, &ops[0])?;
                let offset = self.read(line, &ops[1])?;
                let value = self.read(line, &ops[2])?;
                self.flush_space(space)?;
                self.emit(StoreOp::new(space, offset, value))?;
                self.clobber(space);
                Ok(())
            }
            "BRANCH" => {
                self.expect_operands(record, 1)?;
                let target = self.branch_target(line, &ops[0])?;
                self.flush()?;
                self.emit(BranchOp { target })?;
                Ok(())
            }
            "CBRANCH" => {
                self.expect_operands(record, 2)?;
                let target = self.branch_target(line, &ops[0])?;
                let cond = self.read(line, &ops[1])?;
                self.flush()?;
                self.emit(CBranchOp { target, cond })?;
                Ok(())
            }
            "BRANCHIND" => {
                self.expect_operands(record, 1)?;
                let target = self.read(line, &ops[0])?;
                self.flush()?;
                self.emit(BranchIndOp { target })?;
                Ok(())
            }
            "CALLOTHER" => self.callother(record),
            _ => Err(TranslateError::UnsupportedOpcode {
                line,
                opcode: record.opcode.clone(),
            }),
        }
    }

    fn callother(&mut self, record: &Record) -> TranslateResult<()> {
        let line = record.line;
        let (name, args) = match record.operands.split_first() {
            Some((Operand::Userop(name), args)) => (name, args),
            _ => {
                return Err(TranslateError::Unsupported {
                    line,
                    reason: "CALLOTHER needs a userop name".to_string(),
                })
            }
        };
        let userop = self
            .translator
            .userops
            .get(name)
            .ok_or_else(|| TranslateError::UnknownUserop {
                line,
                name: name.clone(),
            })?;
        if !userop.accepts_arity(args.len()) {
            return Err(TranslateError::UseropArity {
                line,
                name: name.clone(),
                expected: userop.inputs.len(),
                found: args.len(),
            });
        }

        let out_loc = match &record.output {
            Some(out) => Some(self.output_location(line, Some(out))?),
            None => None,
        };
        let mut values = Vec::with_capacity(args.len());
        let mut input_types = Vec::with_capacity(args.len());
        for (position, arg) in args.iter().enumerate() {
            values.push(self.read(line, arg)?);
            input_types.push(userop.input_type(position).unwrap_or(TypeBehavior::Any));
        }
        let df_state = MiniDfState::new(self.current.iter().map(|(loc, v)| (*loc, *v)));
        let pure = userop.pure;
        if !pure {
            self.flush()?;
        }

        match out_loc {
            Some(loc) => {
                let out = self.graph.new_output(loc.size);
                self.emit(CallOtherDefOp::new(out, userop, values, input_types, df_state))?;
                if !pure {
                    self.clobber(Space::Ram);
                }
                self.commit(loc, out)
            }
            None => {
                self.emit(CallOtherOp::new(userop, values, input_types, df_state))?;
                if !pure {
                    self.clobber(Space::Ram);
                }
                Ok(())
            }
        }
    }
}
