//! Node executors and the registry that maps node types to them.

pub mod condition;
pub mod data_process;
pub mod end;
pub mod notification;
pub mod parallel;
pub mod service_call;
pub mod start;
pub mod wait;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    Result,
    common::{Registry, Vars},
    model::WorkflowNode,
    runtime::Context,
    workflow::consts,
};

pub use condition::ConditionExecutor;
pub use data_process::DataProcessExecutor;
pub use end::EndExecutor;
pub use notification::{LogNotifier, NotificationExecutor, NotificationMessage, Notifier};
pub use parallel::ParallelExecutor;
pub use service_call::{ServiceCallExecutor, ServiceInvoker, UnconfiguredServiceInvoker};
pub use start::StartExecutor;
pub use wait::WaitExecutor;

/// Node type tag to executor.
pub type ExecutorRegistry = Registry<dyn NodeExecutor>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Succeeded,
    Failed,
    /// The node parked the instance awaiting external input.
    Suspended,
}

#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Executes the node with the given context.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The [`Context`] of the running instance.
    /// * `node` - The node being executed; its `config` carries the executor parameters.
    ///
    /// # Returns
    ///
    /// An `Err` is handled like an [`ExecutionResult`] with [`ExecutionStatus::Failed`].
    async fn execute(
        &self,
        ctx: Arc<Context>,
        node: &WorkflowNode,
    ) -> Result<ExecutionResult>;
}

/// Outcome of one node execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub outputs: Vars,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(outputs: Vars) -> Self {
        Self {
            status: ExecutionStatus::Succeeded,
            outputs,
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            outputs: Vars::new(),
            error: Some(error),
        }
    }

    /// Failure that still reports partial outputs.
    pub fn failed_with(
        error: String,
        outputs: Vars,
    ) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            outputs,
            error: Some(error),
        }
    }

    pub fn suspended(outputs: Vars) -> Self {
        Self {
            status: ExecutionStatus::Suspended,
            outputs,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }
}

/// Validate a node config against `schema` and deserialize it.
///
/// A missing (`null`) config is treated as an empty object.
pub(crate) fn parse_config<T: DeserializeOwned>(
    config: &Value,
    schema: &Value,
) -> Result<T> {
    let config = if config.is_null() { Value::Object(Default::default()) } else { config.clone() };
    jsonschema::validate(schema, &config)?;
    Ok(serde_json::from_value::<T>(config)?)
}

/// Register every built-in executor.
pub fn register_builtin(
    registry: &ExecutorRegistry,
    notifier: Arc<dyn Notifier>,
    invoker: Arc<dyn ServiceInvoker>,
) {
    registry.register(consts::START, Arc::new(StartExecutor));
    registry.register(consts::END, Arc::new(EndExecutor));
    registry.register(consts::WAIT, Arc::new(WaitExecutor));
    registry.register(consts::DATA_PROCESS, Arc::new(DataProcessExecutor));
    registry.register(consts::CONDITION, Arc::new(ConditionExecutor));
    registry.register(consts::SERVICE_CALL, Arc::new(ServiceCallExecutor::new(invoker)));
    registry.register(consts::NOTIFICATION, Arc::new(NotificationExecutor::new(notifier)));
    registry.register(consts::PARALLEL, Arc::new(ParallelExecutor));
}
