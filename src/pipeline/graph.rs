// src/pipeline/graph.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{PipewatchError, Result};

/// Fail if any pipeline contains itself, directly or transitively.
///
/// `pipelines` maps each pipeline name to its member names. Members that are
/// not themselves pipelines (tasks, or unknown names) are leaves and cannot
/// close a cycle.
pub fn ensure_acyclic(pipelines: &BTreeMap<String, Vec<String>>) -> Result<()> {
    // Edge direction: pipeline -> member pipeline.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in pipelines.keys() {
        graph.add_node(name.as_str());
    }

    for (name, members) in pipelines.iter() {
        for member in members {
            if pipelines.contains_key(member) {
                graph.add_edge(name.as_str(), member.as_str(), ());
            }
        }
    }

    // A topological sort fails on any cycle, self-loops included.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PipewatchError::Composition(format!(
            "cycle detected among pipelines involving '{}'",
            cycle.node_id()
        ))),
    }
}
