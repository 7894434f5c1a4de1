use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::{Mutex, MutexGuard};

use crate::{
    common::{Queue, Shutdown, Vars},
    model::{InstanceId, InstanceStatus, NodeId, WorkflowDefinition, WorkflowInstance},
    workflow::actions::{ExecutionResult, ExecutorRegistry, NodeExecutor},
};

/// Result of an async node, delivered after the instance moved on.
#[derive(Debug, Clone)]
pub struct AsyncOutcome {
    pub nid: NodeId,
    pub continue_on_error: bool,
    pub result: ExecutionResult,
}

/// Run-time owner of one instance.
///
/// The mutable record sits behind an async mutex held by whoever advances
/// the instance; readers use the snapshot published after every step.
pub struct InstanceHandle {
    id: InstanceId,
    definition: Arc<WorkflowDefinition>,
    config: Arc<Vars>,
    executors: HashMap<String, Arc<dyn NodeExecutor>>,

    state: Mutex<WorkflowInstance>,
    snapshot: RwLock<WorkflowInstance>,
    pending: Arc<Queue<AsyncOutcome>>,
    advancing: AtomicBool,
    cancel: Arc<Shutdown>,
}

/// Marks an instance as being advanced; released on drop.
pub struct AdvanceGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for AdvanceGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl InstanceHandle {
    /// Create the instance and resolve its executors once.
    pub fn new(
        definition: Arc<WorkflowDefinition>,
        registry: &ExecutorRegistry,
        variables: Vars,
        queue_size: usize,
    ) -> Self {
        let instance = WorkflowInstance::new(&definition.id, definition.start_node_id().map(String::from), variables);
        let executors = definition.nodes.iter().filter_map(|n| registry.get(&n.node_type).map(|e| (n.node_type.clone(), e))).collect();

        Self {
            id: instance.id.clone(),
            config: Arc::new(definition.config.clone()),
            definition,
            executors,
            snapshot: RwLock::new(instance.clone()),
            state: Mutex::new(instance),
            pending: Queue::new(queue_size.max(1)),
            advancing: AtomicBool::new(false),
            cancel: Arc::new(Shutdown::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn config(&self) -> Arc<Vars> {
        self.config.clone()
    }

    pub fn executor(
        &self,
        node_type: &str,
    ) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(node_type).cloned()
    }

    pub async fn lock(&self) -> MutexGuard<'_, WorkflowInstance> {
        self.state.lock().await
    }

    /// Claim the right to advance the instance; `None` if someone else holds it.
    pub fn try_advance(&self) -> Option<AdvanceGuard<'_>> {
        if self.advancing.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(AdvanceGuard {
            flag: &self.advancing,
        })
    }

    pub fn publish(
        &self,
        state: &WorkflowInstance,
    ) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = state.clone();
    }

    pub fn snapshot(&self) -> WorkflowInstance {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn status(&self) -> InstanceStatus {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).status
    }

    pub fn pending(&self) -> Arc<Queue<AsyncOutcome>> {
        self.pending.clone()
    }

    pub fn cancel_token(&self) -> Arc<Shutdown> {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_terminated()
    }
}
