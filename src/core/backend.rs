// This module defines the narrow interface between the optimized graph and code generation.
// LoweringPlan bundles what a backend reads: a shared reference to the graph, the live
// operations in schedule order, and the type inference result with its coercion marks. A plan
// is built once after dead-code elimination and is never mutated. Backend is the trait native
// emitters implement; TextBackend is the implementation the CLI and the filetests use, printing
// each scheduled operation with the resolved type of every value it touches and marking
// coerced operands.

//! Code generation interface.

use super::error::GraphResult;
use super::graph::UseDefGraph;
use super::op::UseDefOp;
use super::type_inference::TypeInference;
use super::types::ResolvedType;
use super::value::{OpId, ValueId};

/// Everything a backend needs to lower one unit.
#[derive(Debug)]
pub struct LoweringPlan<'g> {
    pub graph: &'g UseDefGraph,
    pub order: Vec<OpId>,
    pub inference: TypeInference,
}

impl<'g> LoweringPlan<'g> {
    /// Schedule `graph` and pair it with the result of type inference.
    pub fn new(graph: &'g UseDefGraph, inference: TypeInference) -> GraphResult<Self> {
        let order = graph.schedule()?;
        Ok(Self {
            graph,
            order,
            inference,
        })
    }

    pub fn type_of(&self, value: ValueId) -> Option<ResolvedType> {
        self.inference.types.get(value)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// A consumer of lowering plans.
pub trait Backend {
    type Output;
    type Error: std::error::Error;

    fn lower(&mut self, plan: &LoweringPlan<'_>) -> Result<Self::Output, Self::Error>;
}

/// Renders a plan as one line per operation.
#[derive(Debug, Default)]
pub struct TextBackend {
    lowered: usize,
}

impl TextBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plans lowered so far.
    pub fn lowered(&self) -> usize {
        self.lowered
    }

    fn typed(plan: &LoweringPlan<'_>, value: ValueId) -> String {
        match plan.type_of(value) {
            Some(ty) => format!("{}:{}", value, ty),
            None => value.to_string(),
        }
    }
}

impl Backend for TextBackend {
    type Output = String;
    type Error = super::error::GraphError;

    fn lower(&mut self, plan: &LoweringPlan<'_>) -> GraphResult<String> {
        let mut text = String::new();
        for &id in &plan.order {
            let op = plan.graph.op(id)?;
            let mut line = String::new();
            if let Some(out) = op.output() {
                line.push_str(&format!("{} = ", Self::typed(plan, out)));
            }
            line.push_str(op.mnemonic());

            let mut operands: Vec<String> = op.aux_operand().into_iter().collect();
            for (position, &input) in op.inputs().iter().enumerate() {
                let rendered = Self::typed(plan, input);
                if plan.inference.is_coerced(id, position) {
                    let expected = plan.graph.type_for(id, position)?;
                    operands.push(format!("({} as {})", rendered, expected));
                } else {
                    operands.push(rendered);
                }
            }
            if !operands.is_empty() {
                line.push(' ');
                line.push_str(&operands.join(", "));
            }
            text.push_str(&format!("  {}: {}\n", id, line));
        }
        self.lowered += 1;
        Ok(text)
    }
}
