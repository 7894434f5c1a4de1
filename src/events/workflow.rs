use crate::common::Vars;

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    Started,
    Completed,
    Failed(WorkflowFailedEvent),
    Suspended(WorkflowSuspendedEvent),
    Resumed,
    Cancelled,
}

impl WorkflowEvent {
    pub fn str(&self) -> &str {
        match self {
            WorkflowEvent::Started => "Started",
            WorkflowEvent::Completed => "Completed",
            WorkflowEvent::Failed(_) => "Failed",
            WorkflowEvent::Suspended(_) => "Suspended",
            WorkflowEvent::Resumed => "Resumed",
            WorkflowEvent::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowFailedEvent {
    pub error: String,
}

/// Emitted when a node parks the instance awaiting external input.
#[derive(Debug, Clone)]
pub struct WorkflowSuspendedEvent {
    pub node_id: String,
    pub outputs: Vars,
}
