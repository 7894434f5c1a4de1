use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    Result,
    common::Vars,
    model::WorkflowNode,
    runtime::Context,
    workflow::actions::{ExecutionResult, NodeExecutor, parse_config},
};

#[derive(Debug, Default, Deserialize)]
struct WaitConfig {
    reason: Option<String>,
}

/// Parks the instance until `continue_workflow` supplies data.
pub struct WaitExecutor;

impl WaitExecutor {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reason": { "type": "string" }
            }
        })
    }
}

#[async_trait]
impl NodeExecutor for WaitExecutor {
    async fn execute(
        &self,
        ctx: Arc<Context>,
        node: &WorkflowNode,
    ) -> Result<ExecutionResult> {
        let config: WaitConfig = parse_config(&node.config, &Self::schema())?;
        let reason = config.reason.unwrap_or_else(|| node.id.clone());
        ctx.emit_log(&node.id, format!("waiting for external input: {}", reason));

        Ok(ExecutionResult::suspended(Vars::new().with("awaiting", reason)))
    }
}
