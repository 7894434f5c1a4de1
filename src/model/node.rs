use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// node id
pub type NodeId = String;

/// One executable step of a workflow definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    /// Type tag used to look up the node executor.
    #[serde(alias = "type")]
    pub node_type: String,
    #[serde(default)]
    pub description: String,
    /// When set, the engine dispatches the node and evaluates transitions
    /// without waiting for its result.
    #[serde(default, rename = "async")]
    pub is_async: bool,
    /// When set, a failed execution does not halt the instance.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Timeout in seconds for synchronous execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Node-type specific configuration.
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub transitions: Vec<NodeTransition>,
}

impl WorkflowNode {
    pub fn new(
        id: &str,
        node_type: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            node_type: node_type.to_string(),
            ..Default::default()
        }
    }

    pub fn with_config(
        mut self,
        config: Value,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn with_transition(
        mut self,
        transition: NodeTransition,
    ) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn with_async(
        mut self,
        is_async: bool,
    ) -> Self {
        self.is_async = is_async;
        self
    }

    pub fn with_continue_on_error(
        mut self,
        continue_on_error: bool,
    ) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_timeout(
        mut self,
        secs: u64,
    ) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn is_terminal(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Outgoing transitions in evaluation order: ascending priority,
    /// declaration order among equal priorities.
    pub fn ordered_transitions(&self) -> Vec<&NodeTransition> {
        let mut transitions: Vec<&NodeTransition> = self.transitions.iter().collect();
        transitions.sort_by_key(|t| t.priority);
        transitions
    }
}

/// Priority-ordered, optionally conditional edge to another node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTransition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub target: NodeId,
    /// Boolean expression over the instance variables; absent means always.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Lower values are evaluated first.
    #[serde(default)]
    pub priority: i32,
}

impl NodeTransition {
    pub fn to(target: &str) -> Self {
        Self {
            id: target.to_string(),
            name: target.to_string(),
            target: target.to_string(),
            ..Default::default()
        }
    }

    pub fn when(
        mut self,
        condition: &str,
    ) -> Self {
        self.condition = Some(condition.to_string());
        self
    }

    pub fn priority(
        mut self,
        priority: i32,
    ) -> Self {
        self.priority = priority;
        self
    }
}
