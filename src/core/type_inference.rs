// This module implements the type inference pass that runs after dead-code elimination and
// before lowering. It assigns every live value a ResolvedType. A value whose definer declares a
// concrete output behavior takes that behavior; every other value is decided by a vote over its
// uses, where each operand position with a concrete requirement votes once. COPY is type
// transparent: a use by a COPY votes with whatever the copy's output resolved to, and a COPY
// output votes with its input, so categories flow through chains of copies in both directions.
// The votes are recomputed until nothing changes. Ties and values nobody constrains default to
// integers, and a float at a size with no IEEE encoding is demoted to an integer with a
// diagnostic. A final sweep compares every use against the resolved type of its value and
// reports disagreements as mismatches; the caller decides whether a mismatch is coerced or
// rejects the unit.

//! Resolution of operand type requirements into concrete value types.

use super::error::GraphResult;
use super::graph::UseDefGraph;
use super::op::UseDefOp;
use super::types::{ResolvedType, TypeBehavior};
use super::value::{OpId, Use, ValueId};
use hashbrown::HashMap;
use std::fmt;

/// Resolved type of every live value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMap {
    types: HashMap<ValueId, ResolvedType>,
}

impl TypeMap {
    pub fn get(&self, value: ValueId) -> Option<ResolvedType> {
        self.types.get(&value).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Entries ordered by value id.
    pub fn sorted(&self) -> Vec<(ValueId, ResolvedType)> {
        let mut entries: Vec<_> = self.types.iter().map(|(&v, &t)| (v, t)).collect();
        entries.sort_unstable_by_key(|(v, _)| *v);
        entries
    }
}

/// Something the pass could not reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDiagnostic {
    /// The use at `position` of `op` requires `expected` but its value
    /// resolved to `found`.
    Mismatch {
        op: OpId,
        position: usize,
        expected: TypeBehavior,
        found: ResolvedType,
    },
    /// A value voted FLOAT at a size floats do not exist at.
    FloatSize { value: ValueId, size: u32 },
}

impl fmt::Display for TypeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDiagnostic::Mismatch {
                op,
                position,
                expected,
                found,
            } => write!(
                f,
                "type mismatch: {} operand {} expects {}, found {}",
                op, position, expected, found
            ),
            TypeDiagnostic::FloatSize { value, size } => {
                write!(f, "{} has no float encoding at size {}, using integer", value, size)
            }
        }
    }
}

/// Result of running type inference over one graph.
#[derive(Debug, Clone, Default)]
pub struct TypeInference {
    pub types: TypeMap,
    pub diagnostics: Vec<TypeDiagnostic>,
    /// Uses whose value must be reinterpreted to the required category.
    pub coercions: Vec<Use>,
}

#[derive(Default)]
struct Votes {
    integer: usize,
    float: usize,
}

impl Votes {
    fn cast(&mut self, behavior: TypeBehavior) {
        match behavior {
            TypeBehavior::Integer => self.integer += 1,
            TypeBehavior::Float => self.float += 1,
            TypeBehavior::Any => {}
        }
    }

    fn winner(&self) -> Option<TypeBehavior> {
        use std::cmp::Ordering;
        match self.float.cmp(&self.integer) {
            Ordering::Greater => Some(TypeBehavior::Float),
            Ordering::Less => Some(TypeBehavior::Integer),
            Ordering::Equal if self.integer == 0 => None,
            Ordering::Equal => Some(TypeBehavior::Integer),
        }
    }
}

impl TypeInference {
    pub fn run(graph: &UseDefGraph) -> GraphResult<Self> {
        let mut fixed: HashMap<ValueId, TypeBehavior> = HashMap::new();
        let mut open: Vec<ValueId> = Vec::new();

        for (id, value) in graph.values().iter() {
            let declared = match value.definer() {
                Some(def) => graph.out_type(def)?.filter(|b| b.is_concrete()),
                None => None,
            };
            match declared {
                Some(behavior) => {
                    fixed.insert(id, behavior);
                }
                None => open.push(id),
            }
        }

        let mut voted: HashMap<ValueId, TypeBehavior> = HashMap::new();
        let max_rounds = open.len() + 1;
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;
            for &id in &open {
                let votes = Self::collect_votes(graph, id, &fixed, &voted)?;
                let winner = votes.winner();
                if voted.get(&id).copied() != winner {
                    match winner {
                        Some(b) => voted.insert(id, b),
                        None => voted.remove(&id),
                    };
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            if rounds >= max_rounds {
                log::warn!("Type votes did not settle after {} rounds", rounds);
                break;
            }
        }
        log::trace!("Type inference settled after {} rounds", rounds);

        let mut result = TypeInference::default();
        for (id, value) in graph.values().iter() {
            let behavior = fixed
                .get(&id)
                .or_else(|| voted.get(&id))
                .copied()
                .unwrap_or(TypeBehavior::Integer);
            let resolved = match behavior.resolve(value.size()) {
                Some(ty) => ty,
                None => {
                    if behavior == TypeBehavior::Float {
                        result.diagnostics.push(TypeDiagnostic::FloatSize {
                            value: id,
                            size: value.size(),
                        });
                    }
                    ResolvedType::Int(value.size())
                }
            };
            result.types.types.insert(id, resolved);
        }

        let mut mismatches = Vec::new();
        for (id, value) in graph.values().iter() {
            let Some(found) = result.types.get(id) else {
                continue;
            };
            for u in value.uses() {
                let expected = graph.type_for(u.op, u.position)?;
                if !found.satisfies(expected) {
                    mismatches.push((
                        *u,
                        TypeDiagnostic::Mismatch {
                            op: u.op,
                            position: u.position,
                            expected,
                            found,
                        },
                    ));
                }
            }
        }
        mismatches.sort_unstable_by_key(|(u, _)| *u);
        for (u, diag) in mismatches {
            log::debug!("{}", diag);
            result.coercions.push(u);
            result.diagnostics.push(diag);
        }

        Ok(result)
    }

    fn collect_votes(
        graph: &UseDefGraph,
        id: ValueId,
        fixed: &HashMap<ValueId, TypeBehavior>,
        voted: &HashMap<ValueId, TypeBehavior>,
    ) -> GraphResult<Votes> {
        let known = |v: ValueId| fixed.get(&v).or_else(|| voted.get(&v)).copied();
        let mut votes = Votes::default();
        let value = graph.value(id)?;

        for u in value.uses() {
            let op = graph.op(u.op)?;
            if op.is_type_transparent() {
                if let Some(b) = op.output().and_then(known) {
                    votes.cast(b);
                }
            } else {
                votes.cast(graph.type_for(u.op, u.position)?);
            }
        }

        if let Some(def) = value.definer() {
            let op = graph.op(def)?;
            if op.is_type_transparent() {
                for &input in op.inputs() {
                    if let Some(b) = known(input) {
                        votes.cast(b);
                    }
                }
            }
        }

        Ok(votes)
    }

    /// The first mismatch, if any, in operation order.
    pub fn first_mismatch(&self) -> Option<&TypeDiagnostic> {
        self.diagnostics
            .iter()
            .find(|d| matches!(d, TypeDiagnostic::Mismatch { .. }))
    }

    pub fn is_coerced(&self, op: OpId, position: usize) -> bool {
        self.coercions.contains(&Use { op, position })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ops::{BinaryOp, BinaryOpcode, CopyOp, LoadOp, UnaryOp, UnaryOpcode};
    use crate::core::value::{Location, Space};

    fn reg(graph: &mut UseDefGraph, offset: u64, size: u32) -> ValueId {
        graph.new_location(Location::new(Space::Register, offset, size))
    }

    #[test]
    fn test_definer_wins() {
        let mut graph = UseDefGraph::new();
        let a = reg(&mut graph, 0, 8);
        let b = reg(&mut graph, 8, 8);
        let sum = graph.new_output(8);
        graph
            .add_linked(BinaryOp::new(BinaryOpcode::IntAdd, sum, a, b))
            .unwrap();

        let inference = TypeInference::run(&graph).unwrap();
        assert_eq!(inference.types.get(sum), Some(ResolvedType::Int(8)));
        assert_eq!(inference.types.get(a), Some(ResolvedType::Int(8)));
        assert!(inference.diagnostics.is_empty());
    }

    #[test]
    fn test_free_value_used_as_float() {
        let mut graph = UseDefGraph::new();
        let a = reg(&mut graph, 0x1200, 8);
        let b = reg(&mut graph, 0x1220, 8);
        let sum = graph.new_output(8);
        graph
            .add_linked(BinaryOp::new(BinaryOpcode::FloatAdd, sum, a, b))
            .unwrap();

        let inference = TypeInference::run(&graph).unwrap();
        assert_eq!(inference.types.get(a), Some(ResolvedType::Float(8)));
        assert_eq!(inference.types.get(sum), Some(ResolvedType::Float(8)));
    }

    #[test]
    fn test_copy_propagates_backwards() {
        let mut graph = UseDefGraph::new();
        let src = reg(&mut graph, 0x1200, 4);
        let copied = graph.new_output(4);
        graph.add_linked(CopyOp::new(copied, src)).unwrap();
        let out = graph.new_output(4);
        graph
            .add_linked(UnaryOp::new(UnaryOpcode::FloatNeg, out, copied))
            .unwrap();

        let inference = TypeInference::run(&graph).unwrap();
        assert_eq!(inference.types.get(copied), Some(ResolvedType::Float(4)));
        assert_eq!(inference.types.get(src), Some(ResolvedType::Float(4)));
    }

    #[test]
    fn test_copy_propagates_forwards() {
        let mut graph = UseDefGraph::new();
        let a = reg(&mut graph, 0x1200, 8);
        let f = graph.new_output(8);
        graph
            .add_linked(UnaryOp::new(UnaryOpcode::FloatAbs, f, a))
            .unwrap();
        let copied = graph.new_output(8);
        graph.add_linked(CopyOp::new(copied, f)).unwrap();

        let inference = TypeInference::run(&graph).unwrap();
        assert_eq!(inference.types.get(copied), Some(ResolvedType::Float(8)));
    }

    #[test]
    fn test_mismatch_is_reported_and_coerced() {
        let mut graph = UseDefGraph::new();
        let a = reg(&mut graph, 0, 8);
        let one = graph.new_const(1, 8);
        let int = graph.new_output(8);
        graph
            .add_linked(BinaryOp::new(BinaryOpcode::IntAdd, int, a, one))
            .unwrap();
        let f = graph.new_output(8);
        let add = graph
            .add_linked(BinaryOp::new(BinaryOpcode::FloatAdd, f, int, int))
            .unwrap();

        let inference = TypeInference::run(&graph).unwrap();
        assert_eq!(
            inference.first_mismatch(),
            Some(&TypeDiagnostic::Mismatch {
                op: add,
                position: 0,
                expected: TypeBehavior::Float,
                found: ResolvedType::Int(8),
            })
        );
        assert!(inference.is_coerced(add, 0));
        assert!(inference.is_coerced(add, 1));
    }

    #[test]
    fn test_tie_and_unconstrained_default_to_integer() {
        let mut graph = UseDefGraph::new();
        let v = reg(&mut graph, 0, 8);
        let addr = graph.new_const(0x1000, 8);
        let loaded = graph.new_output(8);
        graph
            .add_linked(LoadOp::new(loaded, Space::Ram, addr))
            .unwrap();
        let f = graph.new_output(8);
        graph
            .add_linked(UnaryOp::new(UnaryOpcode::FloatAbs, f, v))
            .unwrap();
        let i = graph.new_output(8);
        graph
            .add_linked(UnaryOp::new(UnaryOpcode::IntNegate, i, v))
            .unwrap();

        let inference = TypeInference::run(&graph).unwrap();
        assert_eq!(inference.types.get(loaded), Some(ResolvedType::Int(8)));
        assert_eq!(inference.types.get(v), Some(ResolvedType::Int(8)));
    }

    #[test]
    fn test_odd_float_size_is_demoted() {
        let mut graph = UseDefGraph::new();
        let v = reg(&mut graph, 0, 2);
        let out = graph.new_output(2);
        graph
            .add_linked(UnaryOp::new(UnaryOpcode::FloatAbs, out, v))
            .unwrap();

        let inference = TypeInference::run(&graph).unwrap();
        assert_eq!(inference.types.get(v), Some(ResolvedType::Int(2)));
        assert!(inference
            .diagnostics
            .contains(&TypeDiagnostic::FloatSize { value: v, size: 2 }));
    }
}
