use std::fmt;

#[derive(Debug, Clone)]
pub enum NodeEvent {
    Running(i64),
    Succeeded(i64),
    Failed(ErrorReason),
    /// Async node handed off; the instance did not wait for it.
    Dispatched(i64),
    Suspended(i64),
}

impl NodeEvent {
    pub fn str(&self) -> &str {
        match self {
            NodeEvent::Running(_) => "Running",
            NodeEvent::Succeeded(_) => "Succeeded",
            NodeEvent::Failed(_) => "Failed",
            NodeEvent::Dispatched(_) => "Dispatched",
            NodeEvent::Suspended(_) => "Suspended",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorReason {
    Timeout,
    Failed(String),
    UnknownNodeType(String),
}

impl fmt::Display for ErrorReason {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ErrorReason::Timeout => write!(f, "Timeout"),
            ErrorReason::Failed(msg) => write!(f, "Failed: {}", msg),
            ErrorReason::UnknownNodeType(t) => write!(f, "Unknown node type: {}", t),
        }
    }
}
