use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;

use crate::{
    common::{Queue, Registry, Shutdown},
    dispatcher::Dispatcher,
    model::InstanceId,
    runtime::InstanceHandle,
};

/// Applies async node outcomes to instances nobody is advancing.
///
/// Spawned async nodes queue their outcome on the instance and then post the
/// instance id here. A running dispatcher drains the same queue between steps,
/// so whichever side takes the instance lock first applies the outcome.
pub struct Monitor {
    instances: Arc<Registry<InstanceHandle>>,
    dispatcher: Arc<Dispatcher>,
    async_done: Arc<Queue<InstanceId>>,

    handle: Handle,
    shutdown: Arc<Shutdown>,
}

impl Monitor {
    pub(crate) fn new(
        instances: Arc<Registry<InstanceHandle>>,
        dispatcher: Arc<Dispatcher>,
        async_done: Arc<Queue<InstanceId>>,
        handle: Handle,
    ) -> Self {
        Self {
            instances,
            dispatcher,
            async_done,
            handle,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn monitor(&self) {
        let instances = self.instances.clone();
        let dispatcher = self.dispatcher.clone();
        let async_done = self.async_done.clone();
        let handle = self.handle.clone();
        let shutdown = self.shutdown.clone();

        self.handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(iid) = async_done.next_async() => {
                        let Some(instance) = instances.get(&iid) else {
                            debug!(instance = %iid, "async outcome for unknown instance");
                            continue;
                        };
                        let dispatcher = dispatcher.clone();
                        // waiting for the lock must not hold up other instances
                        handle.spawn(async move {
                            let mut state = instance.lock().await;
                            dispatcher.drain(&instance, &mut state);
                            instance.publish(&state);
                        });
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        self.shutdown.shutdown();
    }
}
