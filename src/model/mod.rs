mod instance;
mod node;
mod template;
mod workflow;

pub use instance::{HistoryEntry, InstanceId, InstanceStatus, NodeOutcome, WorkflowInstance};
pub use node::{NodeId, NodeTransition, WorkflowNode};
pub use template::{TemplateNode, WorkflowTemplate};
pub use workflow::WorkflowDefinition;
