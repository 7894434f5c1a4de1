//! Public façade over the engine, definitions and templates.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::{
    ProcflowError, Result,
    common::{Registry, Vars},
    engine::Engine,
    model::{InstanceStatus, WorkflowDefinition, WorkflowInstance, WorkflowTemplate},
    runtime::Channel,
    workflow::{actions::NodeExecutor, template},
};

/// Entry point for hosts: registers definitions, templates and executors and
/// starts, continues and cancels instances.
///
/// Build one with [`crate::ManagerBuilder`] and call [`WorkflowManager::launch`]
/// before starting instances.
pub struct WorkflowManager {
    engine: Engine,
    templates: Registry<WorkflowTemplate>,
}

impl WorkflowManager {
    pub(crate) fn new(engine: Engine) -> Self {
        Self {
            engine,
            templates: Registry::new(),
        }
    }

    pub fn launch(&self) {
        self.engine.launch();
    }

    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }

    pub fn register_workflow_definition(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<()> {
        self.engine.register(definition)
    }

    pub fn register_workflow_template(
        &self,
        template: WorkflowTemplate,
    ) {
        info!(template = %template.id, nodes = template.nodes.len(), "register template");
        self.templates.register(&template.id.clone(), Arc::new(template));
    }

    /// Bind a node type tag to an executor. Instances created afterwards use it.
    pub fn register_node_executor(
        &self,
        node_type: &str,
        executor: Arc<dyn NodeExecutor>,
    ) {
        self.engine.executors().register(node_type, executor);
    }

    pub async fn start_workflow(
        &self,
        definition_id: &str,
        initial_data: Vars,
    ) -> Result<WorkflowInstance> {
        self.engine.start(definition_id, initial_data).await
    }

    /// Materialize a template with `params`, register the result and start it.
    pub async fn start_workflow_from_template(
        &self,
        template_id: &str,
        params: Vars,
    ) -> Result<WorkflowInstance> {
        let template = self.templates.get(template_id).ok_or_else(|| ProcflowError::TemplateNotFound(template_id.to_string()))?;

        let definition = template::materialize(&template, &params);
        let definition_id = definition.id.clone();
        self.engine.register(definition)?;

        let initial_data = params.with("templateId", &template.id).with("templateName", &template.name);
        self.engine.start(&definition_id, initial_data).await
    }

    pub async fn continue_workflow(
        &self,
        instance_id: &str,
        data: Vars,
    ) -> Result<WorkflowInstance> {
        self.engine.resume(instance_id, data).await
    }

    pub async fn cancel_workflow(
        &self,
        instance_id: &str,
    ) -> Result<WorkflowInstance> {
        self.engine.cancel(instance_id).await
    }

    pub fn get_workflow_status(
        &self,
        instance_id: &str,
    ) -> Result<InstanceStatus> {
        self.engine.status(instance_id)
    }

    pub fn get_workflow_instance(
        &self,
        instance_id: &str,
    ) -> Result<WorkflowInstance> {
        self.engine.instance(instance_id)
    }

    pub fn get_workflow_definitions(&self) -> Vec<WorkflowDefinition> {
        self.engine.definitions()
    }

    /// All templates, ordered by id.
    pub fn get_workflow_templates(&self) -> Vec<WorkflowTemplate> {
        let mut templates: Vec<WorkflowTemplate> = self.templates.list().iter().map(|t| t.as_ref().clone()).collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }

    pub fn get_running_instances(&self) -> Vec<WorkflowInstance> {
        self.engine.running_instances()
    }

    pub fn channel(&self) -> Arc<Channel> {
        self.engine.channel()
    }

    /// Runtime handle the engine spawns its background work on.
    pub fn handle(&self) -> &Handle {
        self.engine.handle()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::{Notify, mpsc};

    use crate::{
        ChannelEvent, ChannelOptions, ManagerBuilder, ProcflowError, Result, WorkflowManager,
        common::Vars,
        model::{InstanceStatus, NodeOutcome, NodeTransition, TemplateNode, WorkflowDefinition, WorkflowNode, WorkflowTemplate},
        runtime::Context,
        workflow::{
            actions::{ExecutionResult, NodeExecutor},
            consts::{END_NODE_ID, START_NODE_ID},
        },
    };

    struct AlwaysFails;

    #[async_trait]
    impl NodeExecutor for AlwaysFails {
        async fn execute(
            &self,
            _: Arc<Context>,
            _: &WorkflowNode,
        ) -> Result<ExecutionResult> {
            Ok(ExecutionResult::failed("boom".into()))
        }
    }

    /// Succeeds with `{"late": true}` once released.
    struct Gate(Arc<Notify>);

    #[async_trait]
    impl NodeExecutor for Gate {
        async fn execute(
            &self,
            _: Arc<Context>,
            _: &WorkflowNode,
        ) -> Result<ExecutionResult> {
            self.0.notified().await;
            Ok(ExecutionResult::success(Vars::new().with("late", true)))
        }
    }

    struct Blocks;

    #[async_trait]
    impl NodeExecutor for Blocks {
        async fn execute(
            &self,
            _: Arc<Context>,
            _: &WorkflowNode,
        ) -> Result<ExecutionResult> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ExecutionResult::default())
        }
    }

    fn manager() -> WorkflowManager {
        let manager = ManagerBuilder::new().build().unwrap();
        manager.launch();
        manager
    }

    fn noop(id: &str) -> WorkflowNode {
        WorkflowNode::new(id, "data_process")
    }

    /// A validates the amount, B decides, C handles large orders, E closes.
    fn order_definition() -> WorkflowDefinition {
        WorkflowDefinition::new("order", "order approval")
            .with_node(
                WorkflowNode::new("A", "data_process")
                    .with_config(json!({"validate": {"type": "object", "required": ["amount"]}}))
                    .with_transition(NodeTransition::to("B")),
            )
            .with_node(
                WorkflowNode::new("B", "condition")
                    .with_config(json!({"conditionType": "expression", "expression": "amount > 100"}))
                    .with_transition(NodeTransition::to("C").when("conditionResult"))
                    .with_transition(NodeTransition::to("E").priority(1)),
            )
            .with_node(WorkflowNode::new("C", "data_process").with_config(json!({"transform": {"approvalLevel": "'manager'"}})).with_transition(NodeTransition::to("E")))
            .with_node(WorkflowNode::new("E", "notification").with_config(json!({"template": "order_done"})))
    }

    #[tokio::test]
    async fn test_order_routing_by_amount() {
        let manager = manager();
        manager.register_workflow_definition(order_definition()).unwrap();

        let large = manager.start_workflow("order", Vars::new().with("amount", 150)).await.unwrap();
        assert_eq!(large.status, InstanceStatus::Completed);
        assert_eq!(large.visited(), vec!["A", "B", "C", "E"]);
        assert_eq!(large.variables.get::<String>("approvalLevel"), Some("manager".to_string()));

        let small = manager.start_workflow("order", Vars::new().with("amount", 50)).await.unwrap();
        assert_eq!(small.status, InstanceStatus::Completed);
        assert_eq!(small.visited(), vec!["A", "B", "E"]);
        assert_eq!(small.variables.get::<bool>("conditionResult"), Some(false));

        assert_eq!(manager.get_workflow_status(&small.id).unwrap(), InstanceStatus::Completed);
        assert_eq!(manager.get_workflow_definitions().len(), 1);
    }

    #[tokio::test]
    async fn test_start_to_end_routing_with_transition_conditions() {
        let definition = WorkflowDefinition::new("D", "order routing")
            .with_node(WorkflowNode::new(START_NODE_ID, "start").with_transition(NodeTransition::to("A")))
            .with_node(WorkflowNode::new("A", "data_process").with_transition(NodeTransition::to("B").priority(1)))
            .with_node(
                WorkflowNode::new("B", "condition")
                    .with_config(json!({"expression": "amount > 100"}))
                    .with_transition(NodeTransition::to("C").when("amount > 100").priority(1))
                    .with_transition(NodeTransition::to("E").priority(2)),
            )
            .with_node(WorkflowNode::new("C", "notification").with_transition(NodeTransition::to("E")))
            .with_node(WorkflowNode::new("E", "end"));

        let manager = manager();
        manager.register_workflow_definition(definition).unwrap();

        let large = manager.start_workflow("D", Vars::new().with("amount", 150)).await.unwrap();
        assert_eq!(large.status, InstanceStatus::Completed, "{:?}", large.error);
        assert_eq!(large.visited(), vec![START_NODE_ID, "A", "B", "C", "E"]);

        let small = manager.start_workflow("D", Vars::new().with("amount", 50)).await.unwrap();
        assert_eq!(small.status, InstanceStatus::Completed, "{:?}", small.error);
        assert_eq!(small.visited(), vec![START_NODE_ID, "A", "B", "E"]);
    }

    #[tokio::test]
    async fn test_business_failure_fails_instance_without_error() {
        let manager = manager();
        manager.register_workflow_definition(order_definition()).unwrap();

        // A rejects the missing amount
        let instance = manager.start_workflow("order", Vars::new()).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Failed);
        assert_eq!(instance.visited(), vec!["A"]);
        assert!(instance.error.unwrap().contains("validation failed"));
    }

    #[tokio::test]
    async fn test_continue_on_error_keeps_routing() {
        let manager = manager();
        manager.register_node_executor("fails", Arc::new(AlwaysFails));

        let definition = |id: &str, node_type: &str| {
            WorkflowDefinition::new(id, id)
                .with_node(noop("a").with_transition(NodeTransition::to("mid")))
                .with_node(WorkflowNode::new("mid", node_type).with_continue_on_error(true).with_transition(NodeTransition::to("end")))
                .with_node(noop("end"))
        };
        manager.register_workflow_definition(definition("healthy", "data_process")).unwrap();
        manager.register_workflow_definition(definition("broken", "fails")).unwrap();

        let healthy = manager.start_workflow("healthy", Vars::new()).await.unwrap();
        let broken = manager.start_workflow("broken", Vars::new()).await.unwrap();
        assert_eq!(healthy.status, InstanceStatus::Completed);
        assert_eq!(broken.status, InstanceStatus::Completed);
        assert_eq!(healthy.current_node, broken.current_node);
        assert_eq!(healthy.visited(), broken.visited());
        assert!(broken.history.iter().any(|h| h.node_id == "mid" && h.outcome == NodeOutcome::Failed));

        let mut strict = definition("strict", "fails");
        strict.nodes[1].continue_on_error = false;
        manager.register_workflow_definition(strict).unwrap();
        let instance = manager.start_workflow("strict", Vars::new()).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Failed);
        assert_eq!(instance.current_node.as_deref(), Some("mid"));
    }

    #[tokio::test]
    async fn test_unknown_node_type_is_fatal() {
        let manager = manager();
        let definition = WorkflowDefinition::new("d", "d")
            .with_node(noop("a").with_transition(NodeTransition::to("x")))
            .with_node(WorkflowNode::new("x", "teleport").with_continue_on_error(true).with_transition(NodeTransition::to("z")))
            .with_node(noop("z"));
        manager.register_workflow_definition(definition).unwrap();

        let err = manager.start_workflow("d", Vars::new()).await.unwrap_err();
        assert!(matches!(err, ProcflowError::UnknownNodeType { ref node_type, .. } if node_type == "teleport"));

        let ProcflowError::UnknownNodeType { instance_id, .. } = err else { unreachable!() };
        let instance = manager.get_workflow_instance(&instance_id).unwrap();
        assert_eq!(instance.status, InstanceStatus::Failed);
        assert_eq!(instance.visited(), vec!["a", "x"]);
    }

    #[tokio::test]
    async fn test_suspend_and_continue() {
        let manager = manager();
        let definition = WorkflowDefinition::new("approval", "approval")
            .with_node(noop("submit").with_transition(NodeTransition::to("wait")))
            .with_node(
                WorkflowNode::new("wait", "wait")
                    .with_config(json!({"reason": "manager approval"}))
                    .with_transition(NodeTransition::to("approved").when("approved === true"))
                    .with_transition(NodeTransition::to("rejected").priority(1)),
            )
            .with_node(noop("approved"))
            .with_node(noop("rejected"));
        manager.register_workflow_definition(definition).unwrap();

        let instance = manager.start_workflow("approval", Vars::new()).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Suspended);
        assert_eq!(instance.variables.get::<String>("awaiting"), Some("manager approval".to_string()));
        assert_eq!(manager.get_running_instances().len(), 1);

        let resumed = manager.continue_workflow(&instance.id, Vars::new().with("approved", true)).await.unwrap();
        assert_eq!(resumed.status, InstanceStatus::Completed);
        // the parked node is not executed again
        assert_eq!(resumed.visited(), vec!["submit", "wait", "approved"]);
        assert!(manager.get_running_instances().is_empty());

        let err = manager.continue_workflow(&instance.id, Vars::new()).await.unwrap_err();
        assert!(matches!(err, ProcflowError::InvalidStateTransition { .. }));
        assert_eq!(manager.continue_workflow("nope", Vars::new()).await.unwrap_err(), ProcflowError::InstanceNotFound("nope".into()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_continuation_is_rejected() {
        let manager = Arc::new(manager());
        let gate = Arc::new(Notify::new());
        manager.register_node_executor("gate", Arc::new(Gate(gate.clone())));
        let definition = WorkflowDefinition::new("d", "d")
            .with_node(WorkflowNode::new("wait", "wait").with_transition(NodeTransition::to("slow")))
            .with_node(WorkflowNode::new("slow", "gate"));
        manager.register_workflow_definition(definition).unwrap();

        let instance = manager.start_workflow("d", Vars::new()).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Suspended);

        let first = {
            let manager = manager.clone();
            let iid = instance.id.clone();
            tokio::spawn(async move { manager.continue_workflow(&iid, Vars::new()).await })
        };
        while manager.get_workflow_status(&instance.id).unwrap() != InstanceStatus::Running {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let err = manager.continue_workflow(&instance.id, Vars::new()).await.unwrap_err();
        assert_eq!(err, ProcflowError::ConcurrentContinuation(instance.id.clone()));

        gate.notify_one();
        let finished = first.await.unwrap().unwrap();
        assert_eq!(finished.status, InstanceStatus::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_node_does_not_feed_next_transition() {
        let manager = manager();
        let gate = Arc::new(Notify::new());
        manager.register_node_executor("gate", Arc::new(Gate(gate.clone())));
        let definition = WorkflowDefinition::new("d", "d")
            .with_node(
                WorkflowNode::new("fire", "gate")
                    .with_async(true)
                    .with_transition(NodeTransition::to("saw_late").when("typeof late !== 'undefined'"))
                    .with_transition(NodeTransition::to("park").priority(1)),
            )
            .with_node(noop("saw_late"))
            .with_node(WorkflowNode::new("park", "wait"));
        manager.register_workflow_definition(definition).unwrap();

        let instance = manager.start_workflow("d", Vars::new()).await.unwrap();
        assert_eq!(instance.visited(), vec!["fire", "park"]);
        assert_eq!(instance.status, InstanceStatus::Suspended);
        assert!(instance.history.iter().any(|h| h.outcome == NodeOutcome::Dispatched));

        // the monitor applies the outcome while the instance is parked
        gate.notify_one();
        let mut applied = false;
        for _ in 0..100 {
            let snapshot = manager.get_workflow_instance(&instance.id).unwrap();
            if snapshot.variables.get::<bool>("late") == Some(true) {
                assert!(snapshot.history.iter().any(|h| h.node_id == "fire" && h.outcome == NodeOutcome::AsyncSucceeded));
                applied = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(applied);
    }

    #[tokio::test]
    async fn test_async_failure_fails_parked_instance() {
        let manager = manager();
        manager.register_node_executor("fails", Arc::new(AlwaysFails));
        let definition = WorkflowDefinition::new("d", "d")
            .with_node(WorkflowNode::new("fire", "fails").with_async(true).with_transition(NodeTransition::to("park")))
            .with_node(WorkflowNode::new("park", "wait"));
        manager.register_workflow_definition(definition).unwrap();

        let instance = manager.start_workflow("d", Vars::new()).await.unwrap();
        let mut status = instance.status;
        for _ in 0..100 {
            status = manager.get_workflow_status(&instance.id).unwrap();
            if status == InstanceStatus::Failed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(status, InstanceStatus::Failed);
        let snapshot = manager.get_workflow_instance(&instance.id).unwrap();
        assert!(snapshot.history.iter().any(|h| h.outcome == NodeOutcome::AsyncFailed));
    }

    #[tokio::test]
    async fn test_node_timeout_with_and_without_continue_on_error() {
        let manager = manager();
        manager.register_node_executor("blocks", Arc::new(Blocks));
        let definition = |id: &str, continue_on_error: bool| {
            WorkflowDefinition::new(id, id)
                .with_node(WorkflowNode::new("slow", "blocks").with_timeout(1).with_continue_on_error(continue_on_error).with_transition(NodeTransition::to("after")))
                .with_node(noop("after"))
        };
        manager.register_workflow_definition(definition("strict", false)).unwrap();
        manager.register_workflow_definition(definition("lenient", true)).unwrap();

        let strict = manager.start_workflow("strict", Vars::new()).await.unwrap();
        assert_eq!(strict.status, InstanceStatus::Failed);
        assert!(strict.error.unwrap().contains("timed out"));

        let lenient = manager.start_workflow("lenient", Vars::new()).await.unwrap();
        assert_eq!(lenient.status, InstanceStatus::Completed);
        assert_eq!(lenient.visited(), vec!["slow", "after"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_running_and_suspended() {
        let manager = Arc::new(manager());
        manager.register_node_executor("blocks", Arc::new(Blocks));
        manager.register_workflow_definition(WorkflowDefinition::new("block", "block").with_node(WorkflowNode::new("b", "blocks"))).unwrap();
        manager.register_workflow_definition(WorkflowDefinition::new("park", "park").with_node(WorkflowNode::new("w", "wait"))).unwrap();

        let running = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.start_workflow("block", Vars::new()).await })
        };
        let iid = loop {
            if let Some(instance) = manager.get_running_instances().into_iter().find(|i| i.definition_id == "block" && i.status == InstanceStatus::Running) {
                break instance.id;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        let cancelled = tokio::time::timeout(Duration::from_secs(5), manager.cancel_workflow(&iid)).await.unwrap().unwrap();
        assert_eq!(cancelled.status, InstanceStatus::Cancelled);
        assert_eq!(running.await.unwrap().unwrap().status, InstanceStatus::Cancelled);

        let parked = manager.start_workflow("park", Vars::new()).await.unwrap();
        assert_eq!(manager.cancel_workflow(&parked.id).await.unwrap().status, InstanceStatus::Cancelled);
        assert!(matches!(manager.cancel_workflow(&parked.id).await.unwrap_err(), ProcflowError::InvalidStateTransition { .. }));
        assert!(matches!(manager.continue_workflow(&parked.id, Vars::new()).await.unwrap_err(), ProcflowError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_start_from_template() {
        let manager = manager();
        let template = WorkflowTemplate::new("onboard", "onboarding")
            .with_node(TemplateNode::new("greet", "notification").with_config(json!({"template": "welcome_${dept}", "recipients": ["${owner}"]})));
        manager.register_workflow_template(template);

        let instance = manager.start_workflow_from_template("onboard", Vars::new().with("dept", "sales").with("owner", "bob")).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Completed);
        assert!(instance.definition_id.starts_with("temp_onboard_"));
        assert_eq!(instance.visited(), vec![START_NODE_ID, "greet", END_NODE_ID]);
        assert_eq!(instance.variables.get::<String>("templateId"), Some("onboard".to_string()));
        assert_eq!(instance.variables.get::<String>("templateName"), Some("onboarding".to_string()));
        assert_eq!(instance.variables.get::<String>("notificationTemplate"), Some("welcome_sales".to_string()));

        let second = manager.start_workflow_from_template("onboard", Vars::new().with("dept", "ops")).await.unwrap();
        assert_ne!(second.definition_id, instance.definition_id);
        assert_eq!(manager.get_workflow_templates().len(), 1);

        let err = manager.start_workflow_from_template("nope", Vars::new()).await.unwrap_err();
        assert_eq!(err, ProcflowError::TemplateNotFound("nope".into()));
    }

    #[tokio::test]
    async fn test_parallel_node_tracks_active_tasks() {
        let manager = manager();
        let definition = WorkflowDefinition::new("fan", "fan").with_node(WorkflowNode::new("p", "parallel").with_config(json!({
            "maxConcurrency": 2,
            "tasks": [
                {"id": "t1", "nodeType": "data_process", "config": {"transform": {"v": "1"}}},
                {"id": "t2", "nodeType": "data_process", "config": {"transform": {"v": "2"}}}
            ]
        })));
        manager.register_workflow_definition(definition).unwrap();

        let instance = manager.start_workflow("fan", Vars::new()).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Completed);
        assert!(instance.active_nodes.is_empty());
        assert_eq!(instance.variables.get::<usize>("succeeded"), Some(2));
        assert_eq!(instance.variables.get_path("tasks.t2.outputs.v"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_events_and_shutdown() {
        let manager = manager();
        manager.register_workflow_definition(WorkflowDefinition::new("park", "park").with_node(WorkflowNode::new("w", "wait"))).unwrap();
        manager.register_workflow_definition(WorkflowDefinition::new("quick", "quick").with_node(noop("q"))).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        ChannelEvent::channel(manager.channel(), ChannelOptions::default()).unwrap().on_complete(move |iid| {
            let _ = tx.send(iid);
        });

        let quick = manager.start_workflow("quick", Vars::new()).await.unwrap();
        let completed = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(completed, quick.id);

        let parked = manager.start_workflow("park", Vars::new()).await.unwrap();
        manager.shutdown().await;
        assert_eq!(manager.get_workflow_status(&parked.id).unwrap(), InstanceStatus::Cancelled);
        assert_eq!(manager.start_workflow("quick", Vars::new()).await.unwrap_err(), ProcflowError::Engine("engine is not running".into()));
        // idempotent
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_demo_definition_runs() {
        let manager = manager();
        let definition = WorkflowDefinition::from_json(include_str!("../demos/simple/workflow.json")).unwrap();
        manager.register_workflow_definition(definition).unwrap();

        let small = manager.start_workflow("order_approval", Vars::new().with("amount", 40).with("owner", "alice")).await.unwrap();
        assert_eq!(small.status, InstanceStatus::Completed);
        assert_eq!(small.visited(), vec!["check", "decide", "close"]);

        let large = manager.start_workflow("order_approval", Vars::new().with("amount", 250).with("owner", "bob")).await.unwrap();
        assert_eq!(large.status, InstanceStatus::Suspended);
        let rejected = manager.continue_workflow(&large.id, Vars::new().with("approved", false)).await.unwrap();
        assert_eq!(rejected.visited(), vec!["check", "decide", "approve", "reject"]);
        let with_tax = rejected.variables.get::<f64>("amountWithTax").unwrap();
        assert!((with_tax - 300.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_invalid_definition_is_rejected() {
        let manager = manager();
        let definition = WorkflowDefinition::new("d", "d").with_node(noop("a").with_transition(NodeTransition::to("ghost")));
        assert!(matches!(manager.register_workflow_definition(definition).unwrap_err(), ProcflowError::InvalidDefinition(_)));
        assert!(manager.get_workflow_definitions().is_empty());
    }
}
