use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    common::Vars,
    model::WorkflowNode,
    runtime::Context,
    workflow::actions::{ExecutionResult, NodeExecutor},
};

/// Exit marker; does nothing.
pub struct EndExecutor;

#[async_trait]
impl NodeExecutor for EndExecutor {
    async fn execute(
        &self,
        _: Arc<Context>,
        _: &WorkflowNode,
    ) -> Result<ExecutionResult> {
        Ok(ExecutionResult::success(Vars::new()))
    }
}
