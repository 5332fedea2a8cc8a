//! Forward taint propagation over a use-def graph.

use super::collab::TaintClient;
use super::graph::UseDefGraph;
use super::value::{ValueId, ValueKind};

/// Values derived from a location `client` reports as a taint source,
/// in id order.
///
/// Only free location values are seeds; an output is tainted when some
/// input of its definer is.
pub fn tainted_values(graph: &UseDefGraph, client: &dyn TaintClient) -> Vec<ValueId> {
    let seeds: Vec<ValueId> = graph
        .values()
        .iter()
        .filter_map(|(id, value)| match value.kind() {
            ValueKind::Location(loc) if client.is_source(&loc) => Some(id),
            _ => None,
        })
        .collect();
    log::debug!("Taint client {} seeded {} values", client.name(), seeds.len());

    let mut tainted: Vec<ValueId> = graph.forward_slice(seeds).into_iter().collect();
    tainted.sort_unstable();
    tainted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collab::analysis_client;
    use crate::core::ops::{BinaryOp, BinaryOpcode, LoadOp};
    use crate::core::value::{Location, Space};

    #[test]
    fn test_argument_taint_flows_through_arithmetic() {
        let mut graph = UseDefGraph::new();
        let rdi = graph.new_location(Location::new(Space::Register, 0x38, 8));
        let rax = graph.new_location(Location::new(Space::Register, 0x0, 8));
        let sum = graph.new_output(8);
        graph
            .add_linked(BinaryOp::new(BinaryOpcode::IntAdd, sum, rdi, rax))
            .unwrap();
        let loaded = graph.new_output(8);
        graph
            .add_linked(LoadOp::new(loaded, Space::Ram, sum))
            .unwrap();
        let clean = graph.new_output(8);
        graph
            .add_linked(LoadOp::new(clean, Space::Ram, rax))
            .unwrap();

        let client = analysis_client("args").unwrap();
        assert_eq!(
            tainted_values(&graph, client.as_ref()),
            vec![rdi, sum, loaded]
        );
    }
}
