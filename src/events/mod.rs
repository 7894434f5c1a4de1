//! Lifecycle events emitted while instances run.
//!
//! Subscribers registered through [`crate::ChannelEvent`] receive these instead
//! of polling instance status.

mod node;
mod workflow;

pub use node::*;
pub use workflow::*;

use crate::model::{InstanceId, NodeId};

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Top-level event type for instance graph events.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// Instance-level events (started, completed, failed, ...).
    Workflow(WorkflowEvent),
    /// Node-level events (running, succeeded, failed, ...).
    Node(NodeEvent),
}

/// Event message carrying instance and node context.
#[derive(Debug, Clone)]
pub struct Message {
    /// Instance that generated this event.
    pub iid: InstanceId,
    /// Node that generated this event (empty for workflow events).
    pub nid: NodeId,
    pub event: GraphEvent,
}

/// Log line emitted by a node executor.
#[derive(Debug, Clone)]
pub struct Log {
    pub iid: InstanceId,
    pub nid: NodeId,
    pub content: String,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl Message {
    pub fn workflow(
        iid: &str,
        event: WorkflowEvent,
    ) -> Self {
        Self {
            iid: iid.to_string(),
            nid: String::new(),
            event: GraphEvent::Workflow(event),
        }
    }

    pub fn node(
        iid: &str,
        nid: &str,
        event: NodeEvent,
    ) -> Self {
        Self {
            iid: iid.to_string(),
            nid: nid.to_string(),
            event: GraphEvent::Node(event),
        }
    }
}

impl GraphEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, GraphEvent::Workflow(WorkflowEvent::Completed))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, GraphEvent::Workflow(WorkflowEvent::Failed(_)))
    }

    pub fn is_suspend(&self) -> bool {
        matches!(self, GraphEvent::Workflow(WorkflowEvent::Suspended(_)))
    }

    pub fn str(&self) -> &str {
        match self {
            GraphEvent::Workflow(e) => e.str(),
            GraphEvent::Node(e) => e.str(),
        }
    }
}
