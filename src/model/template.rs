use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ProcflowError, Result,
    common::Vars,
    model::{NodeId, NodeTransition},
};

/// Parameterized definition blueprint, materialized at start time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub nodes: Vec<TemplateNode>,
    #[serde(default)]
    pub config: Vars,
}

/// Node blueprint whose string config values may contain `${key}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateNode {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "type")]
    pub node_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "async", skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub transitions: Vec<NodeTransition>,
}

impl WorkflowTemplate {
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
        node: TemplateNode,
    ) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<WorkflowTemplate>(s).map_err(|e| ProcflowError::InvalidDefinition(e.to_string()))
    }
}

impl TemplateNode {
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
}
