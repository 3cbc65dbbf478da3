use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dynprice_events::{BusMessage, Subscription};

/// Handle to join a background consumer.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for the worker to stop (after shutdown or once its subscription closes).
    pub async fn join(self) {
        if let Err(err) = self.join.await {
            warn!(worker = self.name, error = %err, "consumer worker task ended abnormally");
        }
    }
}

/// Generic consumer loop.
///
/// - Reads one subscription, one message at a time
/// - Acknowledges each message after its handler returns, success or not
/// - Logs every handler error and moves on; a bad message never stops the loop
/// - Stops when `shutdown` flips to `true` or the subscription closes
#[derive(Debug)]
pub struct ConsumerWorker;

impl ConsumerWorker {
    /// Spawn a worker task on the current tokio runtime.
    ///
    /// A message already being handled when shutdown is signalled is finished
    /// first.
    pub fn spawn<H, Fut, E>(
        name: &'static str,
        subscription: Subscription,
        shutdown: watch::Receiver<bool>,
        handler: H,
    ) -> WorkerHandle
    where
        H: FnMut(BusMessage) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: core::fmt::Display + Send + 'static,
    {
        let join = tokio::spawn(worker_loop(name, subscription, shutdown, handler));
        WorkerHandle { name, join }
    }
}

async fn worker_loop<H, Fut, E>(
    name: &'static str,
    mut sub: Subscription,
    mut shutdown: watch::Receiver<bool>,
    mut handler: H,
) where
    H: FnMut(BusMessage) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: core::fmt::Display,
{
    info!(worker = name, "consumer worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                // Sender dropped counts as shutdown too.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            msg = sub.recv() => match msg {
                Some(msg) => {
                    debug!(worker = name, key = msg.key(), "message received");
                    let delivery_id = msg.delivery_id().map(str::to_owned);
                    if let Err(err) = handler(msg).await {
                        warn!(worker = name, error = %err, "consumer worker handler failed");
                    }
                    if let Some(id) = delivery_id {
                        sub.ack(&id);
                    }
                }
                None => {
                    info!(worker = name, "subscription closed");
                    break;
                }
            },
        }
    }

    info!(worker = name, "consumer worker stopped");
}
