//! Workflow engine - the state machine behind [`crate::WorkflowManager`].
//!
//! The engine owns the definition registry and every instance, and advances
//! instances through the [`Dispatcher`] in the caller's task. Background work
//! is limited to event dispatch, async nodes and the [`Monitor`] that applies
//! their outcomes.

mod monitor;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::runtime::{Handle, Runtime};
use tracing::{info, warn};

use crate::{
    Config, ProcflowError, Result,
    common::{Queue, Registry, Vars},
    dispatcher::{Dispatcher, Step},
    events::{Message, WorkflowEvent},
    model::{InstanceStatus, NodeOutcome, WorkflowDefinition, WorkflowInstance},
    runtime::{Channel, InstanceHandle},
    workflow::{actions::ExecutorRegistry, expression::ExpressionEvaluator},
};

use monitor::Monitor;

pub struct Engine {
    config: Config,
    definitions: Registry<WorkflowDefinition>,
    executors: Arc<ExecutorRegistry>,
    instances: Arc<Registry<InstanceHandle>>,

    dispatcher: Arc<Dispatcher>,
    /// Event channel for broadcasting instance events.
    channel: Arc<Channel>,
    monitor: Monitor,

    running: AtomicBool,
    handle: Handle,
    /// Kept alive when the engine built its own runtime.
    _runtime: Option<Arc<Runtime>>,
}

impl Engine {
    pub(crate) fn new(
        config: Config,
        executors: Arc<ExecutorRegistry>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        handle: Handle,
        runtime: Option<Arc<Runtime>>,
    ) -> Self {
        let channel = Arc::new(Channel::new(handle.clone()));
        let instances = Arc::new(Registry::new());
        let async_done = Queue::new(config.engine.async_queue_size.max(1));
        let dispatcher = Arc::new(Dispatcher::new(
            evaluator,
            executors.clone(),
            channel.clone(),
            async_done.clone(),
            handle.clone(),
            config.engine.clone(),
            config.parallel.clone(),
        ));
        let monitor = Monitor::new(instances.clone(), dispatcher.clone(), async_done, handle.clone());

        Self {
            config,
            definitions: Registry::new(),
            executors,
            instances,
            dispatcher,
            channel,
            monitor,
            running: AtomicBool::new(false),
            handle,
            _runtime: runtime,
        }
    }

    /// Start the event channel and the async outcome monitor. Idempotent.
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.monitor.monitor();
        self.channel.listen();
        info!("engine launched");
    }

    /// Cancel every non-terminal instance and stop background tasks. Idempotent.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        for instance in self.instances.list() {
            if instance.status().is_terminal() {
                continue;
            }
            if let Err(e) = self.cancel(instance.id()).await {
                warn!(instance = %instance.id(), error = %e, "cancel on shutdown failed");
            }
        }
        self.monitor.stop();
        self.channel.shutdown();
        info!("engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Validate and register a definition, replacing one with the same id.
    pub fn register(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<()> {
        definition.validate()?;
        info!(definition = %definition.id, nodes = definition.nodes.len(), "register definition");
        self.definitions.register(&definition.id.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn definition(
        &self,
        id: &str,
    ) -> Option<Arc<WorkflowDefinition>> {
        self.definitions.get(id)
    }

    /// All definitions, ordered by id.
    pub fn definitions(&self) -> Vec<WorkflowDefinition> {
        let mut definitions: Vec<WorkflowDefinition> = self.definitions.list().iter().map(|d| d.as_ref().clone()).collect();
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        definitions
    }

    pub fn executors(&self) -> Arc<ExecutorRegistry> {
        self.executors.clone()
    }

    /// Create an instance of `definition_id` and run it until it stops.
    pub async fn start(
        &self,
        definition_id: &str,
        variables: Vars,
    ) -> Result<WorkflowInstance> {
        self.ensure_running()?;
        let definition = self.definitions.get(definition_id).ok_or_else(|| ProcflowError::DefinitionNotFound(definition_id.to_string()))?;

        let instance = Arc::new(InstanceHandle::new(definition, &self.executors, variables, self.dispatcher.config().async_queue_size));
        let _advancing = instance.try_advance();
        self.instances.register(instance.id(), instance.clone());

        let mut state = instance.lock().await;
        let Some(start) = state.current_node.clone() else {
            let err = ProcflowError::InvalidDefinition(format!("definition '{}' has no start node", definition_id));
            self.dispatcher.fail(&mut state, "", err.to_string());
            instance.publish(&state);
            return Err(err);
        };

        state.transition_to(InstanceStatus::Running)?;
        info!(instance = %state.id, definition = %definition_id, "instance started");
        self.channel.emit(Message::workflow(&state.id, WorkflowEvent::Started));

        self.dispatcher.run(&instance, &mut state, Step::Execute(start)).await?;
        Ok(state.clone())
    }

    /// Merge `data` into a suspended instance and resume after its parked node.
    pub async fn resume(
        &self,
        iid: &str,
        data: Vars,
    ) -> Result<WorkflowInstance> {
        self.ensure_running()?;
        let instance = self.handle_of(iid)?;
        let Some(_advancing) = instance.try_advance() else {
            return Err(ProcflowError::ConcurrentContinuation(iid.to_string()));
        };

        let mut state = instance.lock().await;
        if state.status != InstanceStatus::Suspended {
            return Err(ProcflowError::InvalidStateTransition {
                instance_id: iid.to_string(),
                from: state.status.to_string(),
                to: InstanceStatus::Running.to_string(),
            });
        }

        let nid = state.current_node.clone().unwrap_or_default();
        state.variables.merge(&data);
        state.record(&nid, NodeOutcome::Resumed, None);
        state.transition_to(InstanceStatus::Running)?;
        info!(instance = %iid, node = %nid, "instance resumed");
        self.channel.emit(Message::workflow(iid, WorkflowEvent::Resumed));

        self.dispatcher.run(&instance, &mut state, Step::Transition(nid)).await?;
        Ok(state.clone())
    }

    /// Cancel a non-terminal instance.
    ///
    /// An instance being advanced stops at its next step boundary or while
    /// awaiting its current node; this call waits for that.
    pub async fn cancel(
        &self,
        iid: &str,
    ) -> Result<WorkflowInstance> {
        let instance = self.handle_of(iid)?;
        let invalid = |from: InstanceStatus| ProcflowError::InvalidStateTransition {
            instance_id: iid.to_string(),
            from: from.to_string(),
            to: InstanceStatus::Cancelled.to_string(),
        };

        let status = instance.status();
        if status.is_terminal() {
            return Err(invalid(status));
        }
        instance.cancel_token().shutdown();

        let mut state = instance.lock().await;
        if !state.is_terminal() {
            self.dispatcher.cancel(&mut state);
            instance.publish(&state);
        }
        match state.status {
            InstanceStatus::Cancelled => Ok(state.clone()),
            other => Err(invalid(other)),
        }
    }

    pub fn status(
        &self,
        iid: &str,
    ) -> Result<InstanceStatus> {
        Ok(self.handle_of(iid)?.status())
    }

    /// Latest published snapshot of an instance.
    pub fn instance(
        &self,
        iid: &str,
    ) -> Result<WorkflowInstance> {
        Ok(self.handle_of(iid)?.snapshot())
    }

    /// Instances that have not reached a terminal status, oldest first.
    pub fn running_instances(&self) -> Vec<WorkflowInstance> {
        let mut instances: Vec<WorkflowInstance> = self.instances.list().iter().map(|i| i.snapshot()).filter(|i| !i.is_terminal()).collect();
        instances.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        instances
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn handle_of(
        &self,
        iid: &str,
    ) -> Result<Arc<InstanceHandle>> {
        self.instances.get(iid).ok_or_else(|| ProcflowError::InstanceNotFound(iid.to_string()))
    }

    fn ensure_running(&self) -> Result<()> {
        if !self.is_running() {
            return Err(ProcflowError::Engine("engine is not running".to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Engine").field("running", &self.is_running()).field("definitions", &self.definitions.len()).field("instances", &self.instances.len()).finish()
    }
}
