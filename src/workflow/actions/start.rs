use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    common::Vars,
    model::WorkflowNode,
    runtime::Context,
    workflow::actions::{ExecutionResult, NodeExecutor},
};

/// Entry marker; does nothing.
pub struct StartExecutor;

#[async_trait]
impl NodeExecutor for StartExecutor {
    async fn execute(
        &self,
        _: Arc<Context>,
        _: &WorkflowNode,
    ) -> Result<ExecutionResult> {
        Ok(ExecutionResult::success(Vars::new()))
    }
}
