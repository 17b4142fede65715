//! DAG validation and linearisation.
//!
//! Kahn's algorithm over the pipeline's step graph. Zero-in-degree nodes
//! seed the queue in declaration order, which makes the resulting order
//! deterministic for a given pipeline. Cyclic graphs and edges referencing
//! undeclared node ids are rejected before the orchestrator creates any
//! step record.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::orchestrator::error::{OrchestratorError, Result};
use crate::orchestrator::pipeline::StepGraph;

/// Compute a dependency-respecting execution order for the graph.
pub fn execution_order(graph: &StepGraph) -> Result<Vec<String>> {
    let mut known: HashSet<&str> = HashSet::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        if !known.insert(node.id.as_str()) {
            return Err(OrchestratorError::PipelineMalformed(format!(
                "Duplicate node id: {}",
                node.id
            )));
        }
    }

    let mut in_degree: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), 0))
        .collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::with_capacity(graph.nodes.len());

    for edge in &graph.edges {
        if !known.contains(edge.from.as_str()) {
            return Err(OrchestratorError::PipelineMalformed(format!(
                "Edge references unknown node id: {}",
                edge.from
            )));
        }
        if !known.contains(edge.to.as_str()) {
            return Err(OrchestratorError::PipelineMalformed(format!(
                "Edge references unknown node id: {}",
                edge.to
            )));
        }
        successors
            .entry(edge.from.as_str())
            .or_insert_with(Vec::new)
            .push(edge.to.as_str());
        *in_degree.entry(edge.to.as_str()).or_insert(0) += 1;
    }

    // Seed with roots in declaration order; the queue keeps the tie-break
    // stable as successors unlock.
    let mut queue: VecDeque<&str> = graph
        .nodes
        .iter()
        .filter(|node| in_degree[node.id.as_str()] == 0)
        .map(|node| node.id.as_str())
        .collect();

    let mut order = Vec::with_capacity(graph.nodes.len());
    while let Some(node_id) = queue.pop_front() {
        order.push(node_id.to_string());

        if let Some(next) = successors.get(node_id) {
            for successor in next {
                let degree = in_degree
                    .get_mut(successor)
                    .expect("successor in in-degree map");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(successor);
                }
            }
        }
    }

    if order.len() != graph.nodes.len() {
        return Err(OrchestratorError::PipelineCyclic);
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::pipeline::{Edge, Node, NodeKind};
    use serde_json::Map;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Agent,
            config: Map::new(),
        }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> StepGraph {
        StepGraph {
            nodes: nodes.iter().map(|id| node(id)).collect(),
            edges: edges.iter().map(|(f, t)| edge(f, t)).collect(),
        }
    }

    #[test]
    fn respects_every_edge() {
        let g = graph(
            &["d", "a", "b", "c"],
            &[("a", "b"), ("b", "c"), ("a", "d"), ("d", "c")],
        );
        let order = execution_order(&g).unwrap();

        let index = |id: &str| order.iter().position(|n| n == id).unwrap();
        for (from, to) in &[("a", "b"), ("b", "c"), ("a", "d"), ("d", "c")] {
            assert!(index(from) < index(to), "{} should precede {}", from, to);
        }
    }

    #[test]
    fn roots_keep_declaration_order() {
        let g = graph(&["z", "a", "m"], &[]);
        assert_eq!(execution_order(&g).unwrap(), vec!["z", "a", "m"]);
    }

    #[test]
    fn cycles_are_rejected() {
        let g = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let err = execution_order(&g).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn self_loops_are_cycles() {
        let g = graph(&["a"], &[("a", "a")]);
        assert!(matches!(
            execution_order(&g),
            Err(OrchestratorError::PipelineCyclic)
        ));
    }

    #[test]
    fn unknown_edge_endpoints_are_malformed() {
        let g = graph(&["a"], &[("a", "ghost")]);
        let err = execution_order(&g).unwrap_err();
        assert!(err.to_string().contains("unknown node id: ghost"));

        let g = graph(&["a"], &[("ghost", "a")]);
        assert!(matches!(
            execution_order(&g),
            Err(OrchestratorError::PipelineMalformed(_))
        ));
    }

    #[test]
    fn duplicate_node_ids_are_malformed() {
        let g = graph(&["a", "a"], &[]);
        let err = execution_order(&g).unwrap_err();
        assert!(err.to_string().contains("Duplicate node id"));
    }

    #[test]
    fn empty_graph_yields_empty_order() {
        let g = graph(&[], &[]);
        assert!(execution_order(&g).unwrap().is_empty());
    }
}
