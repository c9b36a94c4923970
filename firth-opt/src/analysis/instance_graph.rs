//! The module instantiation graph of a circuit.

use firth_ir::{Circuit, ModuleIdx, OpIdx, OpKind};
use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
    Direction::Outgoing,
};
use std::collections::HashMap;

/// A `petgraph::DiGraph` where modules are the nodes and each edge is one
/// instantiation, carrying the instance operation.
type ModuleGraph = DiGraph<ModuleIdx, OpIdx>;

/// Records which modules instantiate which. Instances whose target module
/// is not defined in the circuit (external modules) do not appear.
pub struct InstanceGraph {
    graph: ModuleGraph,
    nodes: HashMap<ModuleIdx, NodeIndex>,
}

impl From<&Circuit> for InstanceGraph {
    fn from(circ: &Circuit) -> Self {
        let mut graph = ModuleGraph::new();
        let mut nodes = HashMap::new();
        for m in circ.modules.keys() {
            nodes.insert(m, graph.add_node(m));
        }
        for (m, module) in circ.modules.iter() {
            for &op in &module.body {
                if let OpKind::Instance { target, .. } = &circ.ops[op].kind {
                    if let Some(t) = circ.find_module(*target) {
                        graph.add_edge(nodes[&m], nodes[&t], op);
                    }
                }
            }
        }
        InstanceGraph { graph, nodes }
    }
}

impl InstanceGraph {
    /// The instantiations inside `module`, as `(instance op, target)`
    /// pairs in body order.
    pub fn instances(&self, module: ModuleIdx) -> Vec<(OpIdx, ModuleIdx)> {
        let mut out: Vec<_> = self
            .graph
            .edges_directed(self.nodes[&module], Outgoing)
            .map(|e| (*e.weight(), self.graph[e.target()]))
            .collect();
        // petgraph hands edges back in reverse insertion order; restore
        // body order.
        out.reverse();
        out
    }

    /// The number of times `module` is instantiated anywhere.
    pub fn num_uses(&self, module: ModuleIdx) -> usize {
        self.graph
            .edges_directed(
                self.nodes[&module],
                petgraph::Direction::Incoming,
            )
            .count()
    }
}
