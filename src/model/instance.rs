use serde::{Deserialize, Serialize};

use crate::{
    ProcflowError, Result,
    common::Vars,
    model::NodeId,
    utils::{self, time::time_millis},
};

/// instance id
pub type InstanceId = String;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    #[default]
    Created,
    Running,
    Completed,
    Failed,
    Suspended,
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Failed | InstanceStatus::Cancelled)
    }

    pub fn can_transition_to(
        &self,
        to: InstanceStatus,
    ) -> bool {
        use InstanceStatus::*;
        matches!(
            (self, to),
            (Created, Running)
                | (Created, Failed)
                | (Created, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Suspended)
                | (Running, Cancelled)
                | (Suspended, Running)
                | (Suspended, Failed)
                | (Suspended, Cancelled)
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeOutcome {
    Started,
    Succeeded,
    Failed,
    TimedOut,
    /// Async node handed off without waiting.
    Dispatched,
    AsyncSucceeded,
    AsyncFailed,
    Suspended,
    Resumed,
    Cancelled,
    Completed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub node_id: NodeId,
    pub outcome: NodeOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: i64,
}

/// One in-progress or finished execution of a definition.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    pub id: InstanceId,
    pub definition_id: String,
    pub status: InstanceStatus,
    pub current_node: Option<NodeId>,
    /// Sub-task ids while a parallel node fans out.
    #[serde(default)]
    pub active_nodes: Vec<NodeId>,
    pub variables: Vars,
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
}

impl WorkflowInstance {
    pub fn new(
        definition_id: &str,
        start_node: Option<NodeId>,
        variables: Vars,
    ) -> Self {
        let now = time_millis();
        Self {
            id: utils::longid(),
            definition_id: definition_id.to_string(),
            status: InstanceStatus::Created,
            current_node: start_node,
            active_nodes: Vec::new(),
            variables,
            history: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            ended_at: None,
        }
    }

    pub fn record(
        &mut self,
        node_id: &str,
        outcome: NodeOutcome,
        message: Option<String>,
    ) {
        let now = time_millis();
        self.history.push(HistoryEntry {
            node_id: node_id.to_string(),
            outcome,
            message,
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// Node ids in execution order, one per node execution.
    pub fn visited(&self) -> Vec<NodeId> {
        self.history.iter().filter(|h| h.outcome == NodeOutcome::Started).map(|h| h.node_id.clone()).collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `to`, rejecting anything the state machine does not allow.
    pub fn transition_to(
        &mut self,
        to: InstanceStatus,
    ) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(ProcflowError::InvalidStateTransition {
                instance_id: self.id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        let now = time_millis();
        self.status = to;
        self.updated_at = now;
        if to.is_terminal() {
            self.ended_at = Some(now);
        }
        Ok(())
    }
}
