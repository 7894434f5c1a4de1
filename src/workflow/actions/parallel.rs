use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, warn};

use crate::{
    Result,
    common::{Shutdown, Vars},
    model::WorkflowNode,
    runtime::Context,
    workflow::actions::{ExecutionResult, NodeExecutor, parse_config},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FanOutConfig {
    #[serde(default)]
    max_concurrency: Option<usize>,
    #[serde(default)]
    fail_fast: bool,
    #[serde(default)]
    timeout_seconds: Option<u64>,
    #[serde(default)]
    tasks: Vec<SubTask>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubTask {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(alias = "type")]
    node_type: String,
    #[serde(default)]
    config: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Succeeded,
    Failed,
    /// never started, or dropped mid-flight after an abort
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub outputs: Vars,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskOutcome {
    fn cancelled() -> Self {
        Self {
            status: TaskStatus::Cancelled,
            outputs: Vars::new(),
            error: None,
        }
    }

    fn failed(
        error: String,
        outputs: Vars,
    ) -> Self {
        Self {
            status: TaskStatus::Failed,
            outputs,
            error: Some(error),
        }
    }
}

/// Ids of the sub-tasks a parallel node will fan out to.
pub fn task_ids(config: &Value) -> Vec<String> {
    config.get("tasks").and_then(Value::as_array).map(|tasks| tasks.iter().filter_map(|t| t.get("id").and_then(Value::as_str)).map(String::from).collect()).unwrap_or_default()
}

/// Bounded fan-out of sub-tasks through the executor registry.
///
/// Every sub-task is spawned before any is guaranteed to start; a semaphore
/// keeps at most `maxConcurrency` of them executing. With `failFast` the
/// first failure aborts the group: waiting sub-tasks never start and running
/// ones are dropped at their next await point.
pub struct ParallelExecutor;

impl ParallelExecutor {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "maxConcurrency": { "type": "integer", "minimum": 1 },
                "failFast": { "type": "boolean" },
                "timeoutSeconds": { "type": "integer", "minimum": 1 },
                "tasks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "name": { "type": "string" },
                            "nodeType": { "type": "string" },
                            "type": { "type": "string" },
                            "config": {}
                        },
                        "required": ["id"],
                        "anyOf": [{ "required": ["nodeType"] }, { "required": ["type"] }]
                    }
                }
            },
            "required": ["tasks"]
        })
    }

    async fn run_task(
        ctx: Arc<Context>,
        task: SubTask,
        semaphore: Arc<Semaphore>,
        abort: Arc<Shutdown>,
        fail_fast: bool,
    ) -> TaskOutcome {
        let permit = tokio::select! {
            biased;
            _ = abort.wait() => return TaskOutcome::cancelled(),
            permit = semaphore.acquire_owned() => permit,
        };
        let Ok(permit) = permit else {
            return TaskOutcome::cancelled();
        };
        if abort.is_terminated() {
            return TaskOutcome::cancelled();
        }

        let outcome = match ctx.executors().get(&task.node_type) {
            None => TaskOutcome::failed(format!("unknown node type '{}'", task.node_type), Vars::new()),
            Some(executor) => {
                let node = WorkflowNode {
                    id: task.id.clone(),
                    name: task.name.clone(),
                    node_type: task.node_type.clone(),
                    config: task.config.clone(),
                    ..Default::default()
                };
                let sub_ctx = Arc::new(ctx.with_cancel(abort.clone()));
                tokio::select! {
                    biased;
                    _ = abort.wait() => TaskOutcome::cancelled(),
                    result = executor.execute(sub_ctx, &node) => match result {
                        Ok(r) if r.is_success() => TaskOutcome {
                            status: TaskStatus::Succeeded,
                            outputs: r.outputs,
                            error: None,
                        },
                        Ok(r) => TaskOutcome::failed(r.error.unwrap_or_else(|| format!("sub-task '{}' did not succeed", task.id)), r.outputs),
                        Err(e) => TaskOutcome::failed(e.to_string(), Vars::new()),
                    },
                }
            }
        };

        // abort before the permit is released so no waiter slips in
        if fail_fast && outcome.status == TaskStatus::Failed {
            abort.shutdown();
        }
        drop(permit);
        outcome
    }
}

#[async_trait]
impl NodeExecutor for ParallelExecutor {
    async fn execute(
        &self,
        ctx: Arc<Context>,
        node: &WorkflowNode,
    ) -> Result<ExecutionResult> {
        let config: FanOutConfig = parse_config(&node.config, &Self::schema())?;
        let max = config.max_concurrency.unwrap_or(ctx.parallel().default_max_concurrency).max(1);
        let total = config.tasks.len();
        let fail_fast = config.fail_fast;
        let timeout_seconds = config.timeout_seconds;
        debug!(node = %node.id, total, max, fail_fast, "parallel fan-out");

        let semaphore = Arc::new(Semaphore::new(max));
        let abort = Arc::new(Shutdown::new());
        let mut set = JoinSet::new();
        for task in config.tasks {
            let id = task.id.clone();
            let fut = Self::run_task(ctx.clone(), task, semaphore.clone(), abort.clone(), fail_fast);
            set.spawn_on(async move { (id, fut.await) }, ctx.handle());
        }

        let timer = async move {
            match timeout_seconds {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);
        let parent = ctx.cancelled();
        tokio::pin!(parent);

        let mut outcomes: BTreeMap<String, TaskOutcome> = BTreeMap::new();
        let mut panicked = 0usize;
        let mut timed_out = false;
        let mut cancelled = false;
        loop {
            let next = tokio::select! {
                next = set.join_next() => next,
                _ = &mut timer, if !timed_out && !abort.is_terminated() => {
                    timed_out = true;
                    abort.shutdown();
                    continue;
                }
                _ = &mut parent, if !cancelled && !abort.is_terminated() => {
                    cancelled = true;
                    abort.shutdown();
                    continue;
                }
            };
            match next {
                None => break,
                Some(Ok((id, outcome))) => {
                    outcomes.insert(id, outcome);
                }
                Some(Err(e)) => {
                    warn!(node = %node.id, error = %e, "parallel sub-task panicked");
                    panicked += 1;
                }
            }
        }

        let count = |status: TaskStatus| outcomes.values().filter(|o| o.status == status).count();
        let succeeded = count(TaskStatus::Succeeded);
        let failed = count(TaskStatus::Failed) + panicked;
        let skipped = count(TaskStatus::Cancelled);
        let failed_ids: Vec<&str> = outcomes.iter().filter(|(_, o)| o.status == TaskStatus::Failed).map(|(id, _)| id.as_str()).collect();

        let outputs = Vars::new().with("tasks", &outcomes).with("succeeded", succeeded).with("failed", failed).with("cancelled", skipped);
        ctx.emit_log(&node.id, format!("parallel finished: {} succeeded, {} failed, {} cancelled", succeeded, failed, skipped));

        if timed_out {
            let secs = timeout_seconds.unwrap_or_default();
            return Ok(ExecutionResult::failed_with(format!("parallel fan-out timed out after {}s", secs), outputs));
        }
        if cancelled {
            return Ok(ExecutionResult::failed_with("parallel fan-out cancelled".to_string(), outputs));
        }
        if failed > 0 {
            return Ok(ExecutionResult::failed_with(format!("{} of {} sub-tasks failed: {}", failed, total, failed_ids.join(", ")), outputs));
        }
        Ok(ExecutionResult::success(outputs))
    }
}
