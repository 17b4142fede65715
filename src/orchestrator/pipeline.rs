//! Pipeline data model.
//!
//! A pipeline is immutable for the duration of a run: a set of nodes, the
//! edges between them, and optional execution policies. Node configs stay
//! loosely typed (`serde_json::Map`) because their shape depends on the node
//! type and tools interpolate them against the run context at dispatch time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user-defined DAG of work plus its policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub steps: StepGraph,
    #[serde(default)]
    pub policies: Policies,
}

/// The node/edge structure of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepGraph {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// One unit of pipeline work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable identity within the pipeline.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// The four node types the executor dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Tool,
    Agent,
    Condition,
    Approval,
}

impl NodeKind {
    /// Wire name, as persisted on step records.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Tool => "tool",
            NodeKind::Agent => "agent",
            NodeKind::Condition => "condition",
            NodeKind::Approval => "approval",
        }
    }
}

/// A dependency edge: `from` must complete before `to` starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Execution policies. An empty `allowed_tools` set means unrestricted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policies {
    #[serde(rename = "allowedTools", default)]
    pub allowed_tools: Vec<String>,
}

impl Policies {
    /// Whether the policy permits invoking `tool_name`.
    pub fn allows_tool(&self, tool_name: &str) -> bool {
        self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|t| t == tool_name)
    }
}

impl Node {
    /// String field out of the node config.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    /// The tool a tool-node invokes: `config.tool`, defaulting to the node id.
    pub fn tool_name(&self) -> &str {
        self.config_str("tool").unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialises_the_wire_shape() {
        let pipeline: Pipeline = serde_json::from_value(json!({
            "steps": {
                "nodes": [
                    {"id": "a", "type": "agent", "config": {"prompt": "Hi"}},
                    {"id": "g", "type": "approval"}
                ],
                "edges": [{"from": "a", "to": "g"}]
            },
            "policies": {"allowedTools": ["web_search"]}
        }))
        .unwrap();

        assert_eq!(pipeline.steps.nodes.len(), 2);
        assert_eq!(pipeline.steps.nodes[0].kind, NodeKind::Agent);
        assert_eq!(pipeline.steps.nodes[1].kind, NodeKind::Approval);
        assert!(pipeline.steps.nodes[1].config.is_empty());
        assert_eq!(pipeline.steps.edges[0].from, "a");
        assert!(pipeline.policies.allows_tool("web_search"));
        assert!(!pipeline.policies.allows_tool("competitor_analysis"));
    }

    #[test]
    fn absent_policies_mean_unrestricted() {
        let pipeline: Pipeline = serde_json::from_value(json!({
            "steps": {"nodes": [], "edges": []}
        }))
        .unwrap();
        assert!(pipeline.policies.allows_tool("anything"));
    }

    #[test]
    fn tool_name_defaults_to_the_node_id() {
        let node: Node = serde_json::from_value(json!({
            "id": "web_search", "type": "tool", "config": {"query": "x"}
        }))
        .unwrap();
        assert_eq!(node.tool_name(), "web_search");

        let node: Node = serde_json::from_value(json!({
            "id": "search", "type": "tool", "config": {"tool": "web_search"}
        }))
        .unwrap();
        assert_eq!(node.tool_name(), "web_search");
    }
}
