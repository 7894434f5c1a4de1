use std::collections::{HashMap, HashSet};

use petgraph::{graph::DiGraph, visit::Dfs};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    ProcflowError, Result,
    common::Vars,
    model::{NodeId, WorkflowNode},
};

/// Static graph of nodes and transitions describing one workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub nodes: Vec<WorkflowNode>,
    /// Global configuration visible to every node executor.
    #[serde(default)]
    pub config: Vars,
    /// Entry node; the first node when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node: Option<NodeId>,
}

impl WorkflowDefinition {
    pub fn new(
        id: &str,
        name: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_node(
        mut self,
        node: WorkflowNode,
    ) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<WorkflowDefinition>(s).map_err(|e| ProcflowError::InvalidDefinition(e.to_string()))
    }

    pub fn node(
        &self,
        id: &str,
    ) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Id of the node every instance starts at.
    pub fn start_node_id(&self) -> Option<&str> {
        self.start_node.as_deref().or_else(|| self.nodes.first().map(|n| n.id.as_str()))
    }

    /// Check the structural invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ProcflowError::InvalidDefinition("missing id in workflow".into()));
        }
        if self.nodes.is_empty() {
            return Err(ProcflowError::InvalidDefinition(format!("workflow '{}' has no nodes", self.id)));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ProcflowError::InvalidDefinition(format!("duplicate node id '{}'", node.id)));
            }
        }
        for node in &self.nodes {
            for transition in &node.transitions {
                if !seen.contains(transition.target.as_str()) {
                    return Err(ProcflowError::InvalidDefinition(format!(
                        "transition '{}' on node '{}' targets unknown node '{}'",
                        transition.id, node.id, transition.target
                    )));
                }
            }
        }
        if let Some(start) = &self.start_node {
            if !seen.contains(start.as_str()) {
                return Err(ProcflowError::InvalidDefinition(format!("start node '{}' not found", start)));
            }
        }

        let unreachable = self.unreachable_nodes();
        if !unreachable.is_empty() {
            warn!(workflow = %self.id, ?unreachable, "nodes unreachable from the start node");
        }
        Ok(())
    }

    /// Nodes that no path from the start node reaches.
    pub fn unreachable_nodes(&self) -> Vec<NodeId> {
        let mut graph: DiGraph<&str, i32> = DiGraph::new();
        let indices: HashMap<&str, _> = self.nodes.iter().map(|n| (n.id.as_str(), graph.add_node(n.id.as_str()))).collect();
        for node in &self.nodes {
            for transition in &node.transitions {
                if let (Some(from), Some(to)) = (indices.get(node.id.as_str()), indices.get(transition.target.as_str())) {
                    graph.add_edge(*from, *to, transition.priority);
                }
            }
        }

        let Some(start) = self.start_node_id().and_then(|id| indices.get(id)) else {
            return Vec::new();
        };
        let mut reached = HashSet::new();
        let mut dfs = Dfs::new(&graph, *start);
        while let Some(idx) = dfs.next(&graph) {
            reached.insert(idx);
        }

        self.nodes.iter().filter(|n| indices.get(n.id.as_str()).is_some_and(|idx| !reached.contains(idx))).map(|n| n.id.clone()).collect()
    }

    /// Human-readable dump of the definition graph.
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("=== Workflow {} ({}) ===", self.id, self.name));
        for node in &self.nodes {
            let outgoing: Vec<String> = node
                .ordered_transitions()
                .iter()
                .map(|t| match &t.condition {
                    Some(c) => format!("{}[p{} if {}]", t.target, t.priority, c),
                    None => format!("{}[p{}]", t.target, t.priority),
                })
                .collect();
            if outgoing.is_empty() {
                lines.push(format!("{} <{}> -> (end)", node.id, node.node_type));
            } else {
                lines.push(format!("{} <{}> -> {}", node.id, node.node_type, outgoing.join(", ")));
            }
        }
        lines.join("\n")
    }
}
