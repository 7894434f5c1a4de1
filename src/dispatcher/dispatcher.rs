//! Step loop that advances a single instance.
//!
//! The dispatcher is responsible for:
//! - Executing the current node through its executor
//! - Applying timeouts, `continueOnError` and suspension
//! - Evaluating transitions to pick the next node
//! - Applying outcomes of async nodes that finished in the meantime

use std::{sync::Arc, time::Duration};

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::{
    ProcflowError, Result,
    common::{Queue, Vars},
    config::{EngineConfig, ParallelConfig},
    events::{ErrorReason, Message, NodeEvent, WorkflowEvent, WorkflowFailedEvent, WorkflowSuspendedEvent},
    model::{InstanceId, InstanceStatus, NodeId, NodeOutcome, WorkflowInstance, WorkflowNode},
    runtime::{AsyncOutcome, Channel, Context, InstanceHandle},
    utils,
    workflow::{
        actions::{ExecutionResult, ExecutionStatus, ExecutorRegistry, parallel},
        consts,
        expression::ExpressionEvaluator,
    },
};

/// Where the loop resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Run the node, then pick its successor.
    Execute(NodeId),
    /// The node already ran; only pick its successor.
    Transition(NodeId),
}

/// How a synchronous node execution ended.
enum NodeRun {
    Finished(ExecutionResult),
    TimedOut(u64),
    Cancelled,
}

/// Engine-wide dispatcher shared by every instance.
pub(crate) struct Dispatcher {
    evaluator: Arc<dyn ExpressionEvaluator>,
    executors: Arc<ExecutorRegistry>,
    channel: Arc<Channel>,
    /// Instances with queued async outcomes, drained by the monitor.
    async_done: Arc<Queue<InstanceId>>,
    handle: Handle,
    config: EngineConfig,
    parallel: ParallelConfig,
}

impl Dispatcher {
    pub(crate) fn new(
        evaluator: Arc<dyn ExpressionEvaluator>,
        executors: Arc<ExecutorRegistry>,
        channel: Arc<Channel>,
        async_done: Arc<Queue<InstanceId>>,
        handle: Handle,
        config: EngineConfig,
        parallel: ParallelConfig,
    ) -> Self {
        Self {
            evaluator,
            executors,
            channel,
            async_done,
            handle,
            config,
            parallel,
        }
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advance the instance from `step` until it completes, fails, suspends
    /// or is cancelled.
    ///
    /// Only structural errors are returned; business failures end up in the
    /// instance status.
    pub(crate) async fn run(
        &self,
        instance: &InstanceHandle,
        state: &mut WorkflowInstance,
        step: Step,
    ) -> Result<()> {
        let mut next = Some(step);
        let mut steps = 0usize;

        while let Some(step) = next.take() {
            if state.is_terminal() {
                break;
            }
            if instance.is_cancelled() {
                self.cancel(state);
                break;
            }

            let ret = match step {
                Step::Execute(nid) => {
                    self.drain(instance, state);
                    steps += 1;
                    if state.is_terminal() {
                        Ok(None)
                    } else if steps > self.config.max_steps {
                        self.fail(state, &nid, format!("step limit {} exceeded", self.config.max_steps));
                        Ok(None)
                    } else {
                        self.execute(instance, state, nid).await
                    }
                }
                Step::Transition(nid) => self.transition(instance, state, &nid),
            };
            instance.publish(state);
            next = ret?;
        }

        if instance.is_cancelled() && !state.is_terminal() {
            self.cancel(state);
        }
        instance.publish(state);
        Ok(())
    }

    /// Apply every async outcome queued for the instance.
    pub(crate) fn drain(
        &self,
        instance: &InstanceHandle,
        state: &mut WorkflowInstance,
    ) {
        let pending = instance.pending();
        while let Some(outcome) = pending.try_next() {
            self.apply_async_outcome(state, outcome);
        }
    }

    fn apply_async_outcome(
        &self,
        state: &mut WorkflowInstance,
        outcome: AsyncOutcome,
    ) {
        let AsyncOutcome {
            nid,
            continue_on_error,
            result,
        } = outcome;

        if result.is_success() {
            debug!(instance = %state.id, node = %nid, "async node succeeded");
            state.variables.merge(&result.outputs);
            state.record(&nid, NodeOutcome::AsyncSucceeded, None);
            self.channel.emit(Message::node(&state.id, &nid, NodeEvent::Succeeded(utils::time::time_millis())));
            return;
        }

        let error = result.error.unwrap_or_else(|| "async node failed".to_string());
        warn!(instance = %state.id, node = %nid, %error, "async node failed");
        state.record(&nid, NodeOutcome::AsyncFailed, Some(error.clone()));
        self.channel.emit(Message::node(&state.id, &nid, NodeEvent::Failed(ErrorReason::Failed(error.clone()))));

        if !continue_on_error && !state.is_terminal() {
            self.fail(state, &nid, error);
        }
    }

    async fn execute(
        &self,
        instance: &InstanceHandle,
        state: &mut WorkflowInstance,
        nid: NodeId,
    ) -> Result<Option<Step>> {
        let definition = instance.definition().clone();
        let node = match definition.node(&nid) {
            Some(node) => node,
            None => {
                let err = ProcflowError::InvalidDefinition(format!("node '{}' not found in '{}'", nid, definition.id));
                self.fail(state, &nid, err.to_string());
                return Err(err);
            }
        };

        state.current_node = Some(nid.clone());
        state.record(&nid, NodeOutcome::Started, None);
        instance.publish(state);
        self.channel.emit(Message::node(&state.id, &nid, NodeEvent::Running(utils::time::time_millis())));
        debug!(instance = %state.id, node = %nid, node_type = %node.node_type, "execute node");

        let Some(executor) = instance.executor(&node.node_type) else {
            let err = ProcflowError::UnknownNodeType {
                instance_id: state.id.clone(),
                node_id: nid.clone(),
                node_type: node.node_type.clone(),
            };
            state.record(&nid, NodeOutcome::Failed, Some(err.to_string()));
            self.channel.emit(Message::node(&state.id, &nid, NodeEvent::Failed(ErrorReason::UnknownNodeType(node.node_type.clone()))));
            self.fail(state, &nid, err.to_string());
            return Err(err);
        };

        let ctx = Arc::new(self.context(instance, state));
        let timeout = node.timeout.or(self.config.default_node_timeout);

        if node.is_async {
            let node = node.clone();
            let pending = instance.pending();
            let async_done = self.async_done.clone();
            let iid = state.id.clone();
            self.handle.spawn(async move {
                let result = match bounded(executor.execute(ctx, &node), timeout).await {
                    Some(Ok(result)) if result.status == ExecutionStatus::Failed => result,
                    Some(Ok(result)) => ExecutionResult::success(result.outputs),
                    Some(Err(e)) => ExecutionResult::failed(e.to_string()),
                    None => ExecutionResult::failed(
                        ProcflowError::NodeTimeout {
                            node_id: node.id.clone(),
                            timeout_secs: timeout.unwrap_or_default(),
                        }
                        .to_string(),
                    ),
                };
                let outcome = AsyncOutcome {
                    nid: node.id.clone(),
                    continue_on_error: node.continue_on_error,
                    result,
                };
                if pending.send_async(outcome).await.is_ok() {
                    let _ = async_done.send_async(iid).await;
                }
            });

            state.record(&nid, NodeOutcome::Dispatched, None);
            self.channel.emit(Message::node(&state.id, &nid, NodeEvent::Dispatched(utils::time::time_millis())));
            return Ok(Some(Step::Transition(nid)));
        }

        if node.node_type == consts::PARALLEL {
            state.active_nodes = parallel::task_ids(&node.config);
            instance.publish(state);
        }

        let cancelled = instance.cancel_token().wait();
        let run = tokio::select! {
            biased;

            _ = cancelled => NodeRun::Cancelled,
            ret = bounded(executor.execute(ctx, node), timeout) => match ret {
                Some(Ok(result)) => NodeRun::Finished(result),
                Some(Err(e)) => NodeRun::Finished(ExecutionResult::failed(e.to_string())),
                None => NodeRun::TimedOut(timeout.unwrap_or_default()),
            },
        };
        state.active_nodes.clear();

        match run {
            NodeRun::Cancelled => {
                state.record(&nid, NodeOutcome::Cancelled, None);
                self.cancel(state);
                Ok(None)
            }
            NodeRun::TimedOut(secs) => {
                let err = ProcflowError::NodeTimeout {
                    node_id: nid.clone(),
                    timeout_secs: secs,
                };
                state.record(&nid, NodeOutcome::TimedOut, Some(err.to_string()));
                self.channel.emit(Message::node(&state.id, &nid, NodeEvent::Failed(ErrorReason::Timeout)));
                Ok(self.on_failure(state, node, err.to_string()))
            }
            NodeRun::Finished(result) => match result.status {
                ExecutionStatus::Succeeded => {
                    state.variables.merge(&result.outputs);
                    state.record(&nid, NodeOutcome::Succeeded, None);
                    self.channel.emit(Message::node(&state.id, &nid, NodeEvent::Succeeded(utils::time::time_millis())));
                    Ok(Some(Step::Transition(nid)))
                }
                ExecutionStatus::Suspended => {
                    state.variables.merge(&result.outputs);
                    state.record(&nid, NodeOutcome::Suspended, None);
                    state.transition_to(InstanceStatus::Suspended)?;
                    info!(instance = %state.id, node = %nid, "instance suspended");
                    self.channel.emit(Message::node(&state.id, &nid, NodeEvent::Suspended(utils::time::time_millis())));
                    self.channel.emit(Message::workflow(
                        &state.id,
                        WorkflowEvent::Suspended(WorkflowSuspendedEvent {
                            node_id: nid,
                            outputs: result.outputs,
                        }),
                    ));
                    Ok(None)
                }
                ExecutionStatus::Failed => {
                    let err = ProcflowError::NodeExecution {
                        node_id: nid.clone(),
                        message: result.error.unwrap_or_default(),
                    };
                    state.record(&nid, NodeOutcome::Failed, Some(err.to_string()));
                    self.channel.emit(Message::node(&state.id, &nid, NodeEvent::Failed(ErrorReason::Failed(err.to_string()))));
                    Ok(self.on_failure(state, node, err.to_string()))
                }
            },
        }
    }

    /// Failed or timed out: route on with empty output, or fail the instance.
    fn on_failure(
        &self,
        state: &mut WorkflowInstance,
        node: &WorkflowNode,
        error: String,
    ) -> Option<Step> {
        if node.continue_on_error {
            warn!(instance = %state.id, node = %node.id, %error, "node failed, continuing");
            return Some(Step::Transition(node.id.clone()));
        }
        self.fail(state, &node.id, error);
        None
    }

    fn transition(
        &self,
        instance: &InstanceHandle,
        state: &mut WorkflowInstance,
        nid: &str,
    ) -> Result<Option<Step>> {
        let Some(node) = instance.definition().node(nid) else {
            let err = ProcflowError::InvalidDefinition(format!("node '{}' not found in '{}'", nid, instance.definition().id));
            self.fail(state, nid, err.to_string());
            return Err(err);
        };

        match self.select_transition(node, &state.variables, &state.id) {
            Some(target) => {
                debug!(instance = %state.id, from = %nid, to = %target, "transition");
                Ok(Some(Step::Execute(target)))
            }
            None => {
                self.complete(state, nid)?;
                Ok(None)
            }
        }
    }

    /// First transition in priority order whose condition holds.
    fn select_transition(
        &self,
        node: &WorkflowNode,
        vars: &Vars,
        iid: &str,
    ) -> Option<NodeId> {
        for transition in node.ordered_transitions() {
            let condition = match transition.condition.as_deref().map(str::trim) {
                None | Some("") => return Some(transition.target.clone()),
                Some(condition) => condition,
            };
            match self.evaluator.evaluate_bool(condition, vars) {
                Ok(true) => return Some(transition.target.clone()),
                Ok(false) => {}
                Err(e) => warn!(instance = %iid, node = %node.id, target = %transition.target, error = %e, "transition condition not satisfied"),
            }
        }
        None
    }

    fn context(
        &self,
        instance: &InstanceHandle,
        state: &WorkflowInstance,
    ) -> Context {
        Context::new(
            state.id.clone(),
            state.definition_id.clone(),
            state.variables.clone(),
            instance.config(),
            self.evaluator.clone(),
            self.executors.clone(),
            self.channel.clone(),
            self.handle.clone(),
            self.parallel.clone(),
            instance.cancel_token(),
        )
    }

    fn complete(
        &self,
        state: &mut WorkflowInstance,
        nid: &str,
    ) -> Result<()> {
        state.record(nid, NodeOutcome::Completed, None);
        state.transition_to(InstanceStatus::Completed)?;
        info!(instance = %state.id, node = %nid, "instance completed");
        self.channel.emit(Message::workflow(&state.id, WorkflowEvent::Completed));
        Ok(())
    }

    pub(crate) fn fail(
        &self,
        state: &mut WorkflowInstance,
        nid: &str,
        error: String,
    ) {
        if state.transition_to(InstanceStatus::Failed).is_err() {
            return;
        }
        warn!(instance = %state.id, node = %nid, %error, "instance failed");
        state.error = Some(error.clone());
        self.channel.emit(Message::workflow(
            &state.id,
            WorkflowEvent::Failed(WorkflowFailedEvent {
                error,
            }),
        ));
    }

    pub(crate) fn cancel(
        &self,
        state: &mut WorkflowInstance,
    ) {
        if state.transition_to(InstanceStatus::Cancelled).is_err() {
            return;
        }
        info!(instance = %state.id, "instance cancelled");
        self.channel.emit(Message::workflow(&state.id, WorkflowEvent::Cancelled));
    }
}

/// Await `fut`, giving up after `timeout` seconds; `None` on expiry.
async fn bounded<F: Future>(
    fut: F,
    timeout: Option<u64>,
) -> Option<F::Output> {
    match timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), fut).await.ok(),
        None => Some(fut.await),
    }
}
