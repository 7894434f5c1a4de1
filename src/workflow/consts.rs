/// Synthetic entry node of a materialized template.
pub const START_NODE_ID: &str = "__start__";
/// Synthetic exit node of a materialized template.
pub const END_NODE_ID: &str = "__end__";

// built-in node types
pub const START: &str = "start";
pub const END: &str = "end";
pub const WAIT: &str = "wait";
pub const DATA_PROCESS: &str = "data_process";
pub const CONDITION: &str = "condition";
pub const SERVICE_CALL: &str = "service_call";
pub const NOTIFICATION: &str = "notification";
pub const PARALLEL: &str = "parallel";
