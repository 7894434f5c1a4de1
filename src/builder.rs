use std::{sync::Arc, time::Duration};

use tokio::runtime::{Builder, Handle, Runtime};

use crate::{
    Config, ProcflowError, Result, WorkflowManager,
    engine::Engine,
    workflow::{
        actions::{ExecutorRegistry, LogNotifier, Notifier, ServiceInvoker, UnconfiguredServiceInvoker, register_builtin},
        expression::{ExpressionEvaluator, JsExpressionEvaluator},
    },
};

/// Assembles a [`WorkflowManager`] with the built-in executors registered.
///
/// Background work runs on, in order of preference: the runtime passed to
/// [`ManagerBuilder::runtime`], the runtime `build` is called from, or a new
/// multi-thread runtime with `async_worker_thread_number` workers.
pub struct ManagerBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    notifier: Arc<dyn Notifier>,
    service_invoker: Arc<dyn ServiceInvoker>,
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            rt: None,
            evaluator: None,
            notifier: Arc::new(LogNotifier),
            service_invoker: Arc::new(UnconfiguredServiceInvoker),
        }
    }
}

impl ManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    /// Replace the embedded JavaScript evaluator.
    pub fn evaluator(
        mut self,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn notifier(
        mut self,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn service_invoker(
        mut self,
        invoker: Arc<dyn ServiceInvoker>,
    ) -> Self {
        self.service_invoker = invoker;
        self
    }

    pub fn build(&self) -> Result<WorkflowManager> {
        let (handle, runtime) = match (&self.rt, Handle::try_current()) {
            (Some(rt), _) => (rt.handle().clone(), Some(rt.clone())),
            (None, Ok(handle)) => (handle, None),
            (None, Err(_)) => {
                let rt = Builder::new_multi_thread()
                    .worker_threads(self.config.async_worker_thread_number.max(1).into())
                    .enable_all()
                    .build()
                    .map_err(|e| ProcflowError::Engine(format!("failed to build runtime: {}", e)))?;
                let rt = Arc::new(rt);
                (rt.handle().clone(), Some(rt))
            }
        };

        let evaluator = match &self.evaluator {
            Some(evaluator) => evaluator.clone(),
            None => Arc::new(
                JsExpressionEvaluator::new(&self.config.expression.denylist, self.config.expression.cache_size)?
                    .with_timeout(Duration::from_millis(self.config.expression.timeout_ms)),
            ),
        };

        let executors = Arc::new(ExecutorRegistry::new());
        register_builtin(&executors, self.notifier.clone(), self.service_invoker.clone());

        let engine = Engine::new(self.config.clone(), executors, evaluator, handle, runtime);
        Ok(WorkflowManager::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::ManagerBuilder;
    use crate::{
        Config, ProcflowError, Result,
        common::Vars,
        model::{InstanceStatus, WorkflowDefinition, WorkflowNode},
        workflow::expression::ExpressionEvaluator,
    };

    /// Treats every expression as the name of a boolean variable.
    struct Lookup;

    impl ExpressionEvaluator for Lookup {
        fn evaluate(
            &self,
            expression: &str,
            vars: &Vars,
        ) -> Result<Value> {
            vars.get_path(expression).cloned().ok_or_else(|| ProcflowError::Expression(format!("no variable {}", expression)))
        }
    }

    #[test]
    fn test_build_outside_runtime() {
        let manager = ManagerBuilder::new().async_worker_thread_number(2).build().unwrap();
        manager.launch();
        manager.register_workflow_definition(WorkflowDefinition::new("d", "d").with_node(WorkflowNode::new("a", "start"))).unwrap();

        let handle = manager.handle().clone();
        let instance = handle.block_on(manager.start_workflow("d", Vars::new())).unwrap();
        assert_eq!(instance.status, InstanceStatus::Completed);
        handle.block_on(manager.shutdown());
    }

    #[tokio::test]
    async fn test_custom_evaluator_and_config() {
        let mut config = Config::default();
        config.engine.max_steps = 3;
        let manager = ManagerBuilder::new().config(config).evaluator(Arc::new(Lookup)).build().unwrap();
        manager.launch();

        let definition = WorkflowDefinition::new("d", "d").with_node(WorkflowNode::new("c", "condition").with_config(json!({"expression": "flags.on"})));
        manager.register_workflow_definition(definition).unwrap();

        let instance = manager.start_workflow("d", Vars::new().with("flags", json!({"on": true}))).await.unwrap();
        assert_eq!(instance.variables.get::<bool>("conditionResult"), Some(true));
    }
}
