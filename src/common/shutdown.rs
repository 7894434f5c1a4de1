use std::future::Future;

use tokio::sync::watch;

/// One-shot termination signal shared between a coordinator and its tasks.
///
/// Once `shutdown` is called every current and future `wait` resolves.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx,
        }
    }

    /// Signal termination. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_terminated(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `shutdown` has been called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.wait_for(|terminated| *terminated).await;
        }
    }
}
