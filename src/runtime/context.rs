use std::sync::Arc;

use tokio::runtime::Handle;

use crate::{
    Result,
    common::{Shutdown, Vars},
    config::ParallelConfig,
    events::Log,
    model::InstanceId,
    runtime::Channel,
    utils,
    workflow::{actions::ExecutorRegistry, expression::ExpressionEvaluator},
};

/// Everything a node executor may see while it runs.
#[derive(Clone)]
pub struct Context {
    iid: InstanceId,
    definition_id: String,
    vars: Vars,
    config: Arc<Vars>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    executors: Arc<ExecutorRegistry>,
    channel: Arc<Channel>,
    handle: Handle,
    parallel: ParallelConfig,

    cancel: Arc<Shutdown>,
}

impl Context {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        iid: InstanceId,
        definition_id: String,
        vars: Vars,
        config: Arc<Vars>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        executors: Arc<ExecutorRegistry>,
        channel: Arc<Channel>,
        handle: Handle,
        parallel: ParallelConfig,
        cancel: Arc<Shutdown>,
    ) -> Self {
        Self {
            iid,
            definition_id,
            vars,
            config,
            evaluator,
            executors,
            channel,
            handle,
            parallel,
            cancel,
        }
    }

    /// Same context with a different cancellation signal.
    pub fn with_cancel(
        &self,
        cancel: Arc<Shutdown>,
    ) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    pub fn iid(&self) -> InstanceId {
        self.iid.to_owned()
    }

    pub fn definition_id(&self) -> &str {
        &self.definition_id
    }

    /// Snapshot of the instance variables taken when the node started.
    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    /// Global configuration of the definition.
    pub fn config(&self) -> &Vars {
        &self.config
    }

    pub fn evaluate_bool(
        &self,
        expression: &str,
    ) -> Result<bool> {
        self.evaluator.evaluate_bool(expression, &self.vars)
    }

    pub fn evaluate(
        &self,
        expression: &str,
    ) -> Result<serde_json::Value> {
        self.evaluator.evaluate(expression, &self.vars)
    }

    pub fn executors(&self) -> Arc<ExecutorRegistry> {
        self.executors.clone()
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn parallel(&self) -> &ParallelConfig {
        &self.parallel
    }

    pub fn emit_log(
        &self,
        nid: &str,
        content: String,
    ) {
        self.channel.emit_log(Log {
            iid: self.iid.clone(),
            nid: nid.to_string(),
            content,
            timestamp: utils::time::time_millis(),
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_terminated()
    }

    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        self.cancel.wait()
    }
}
