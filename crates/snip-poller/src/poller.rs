use crate::error::PollerError;
use parking_lot::Mutex;
use snip_core::{Owner, ShortCode, Store};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct PollerConfig {
    /// Number of queued requests before `submit` starts waiting.
    #[builder(default = 10)]
    pub capacity: usize,
    /// Upper bound on a single store call. `None` waits indefinitely.
    #[builder(default, setter(strip_option))]
    pub task_timeout: Option<Duration>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug)]
struct DeleteTask {
    ids: Vec<ShortCode>,
    owner: Owner,
}

#[derive(Debug)]
struct Worker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Applies bulk soft deletes on a single background task.
///
/// Requests are processed strictly in submission order. A failed request
/// is logged and dropped; there are no retries.
#[derive(Debug)]
pub struct DeletionPoller {
    input: mpsc::Sender<DeleteTask>,
    worker: Mutex<Option<Worker>>,
}

impl DeletionPoller {
    /// Starts the worker task. Must be called from within a tokio runtime.
    pub fn spawn<S: Store>(store: S, config: PollerConfig) -> Self {
        let (input, rx) = mpsc::channel(config.capacity.max(1));
        let (stop, stop_rx) = oneshot::channel();

        let handle = tokio::spawn(run(store, rx, stop_rx, config.task_timeout));
        info!(capacity = config.capacity, "deletion poller started");

        Self {
            input,
            worker: Mutex::new(Some(Worker { stop, handle })),
        }
    }

    /// Queues a soft delete of `ids` on behalf of `owner`.
    ///
    /// Waits for queue capacity when the worker is behind; never drops a
    /// request while the poller is running.
    pub async fn submit(&self, ids: Vec<ShortCode>, owner: Owner) -> Result<(), PollerError> {
        if self.worker.lock().is_none() {
            return Err(PollerError::Stopped);
        }

        debug!(owner = %owner, count = ids.len(), "queueing soft delete");
        self.input
            .send(DeleteTask { ids, owner })
            .await
            .map_err(|_| PollerError::Stopped)
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// The request currently being applied runs to completion. Anything
    /// still queued is discarded.
    pub async fn close(&self) -> Result<(), PollerError> {
        let Some(worker) = self.worker.lock().take() else {
            return Err(PollerError::Stopped);
        };

        info!("stopping deletion poller");
        // The worker may already be gone if it panicked.
        let _ = worker.stop.send(());

        worker.handle.await.map_err(|err| {
            error!(error = %err, "deletion poller worker failed");
            PollerError::Worker(err.to_string())
        })
    }
}

async fn run<S: Store>(
    store: S,
    mut input: mpsc::Receiver<DeleteTask>,
    mut stop: oneshot::Receiver<()>,
    task_timeout: Option<Duration>,
) {
    loop {
        let task = tokio::select! {
            biased;
            _ = &mut stop => break,
            task = input.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };
        process(&store, task, task_timeout).await;
    }

    let discarded = input.len();
    info!(discarded, "deletion poller stopped");
}

async fn process<S: Store>(store: &S, task: DeleteTask, task_timeout: Option<Duration>) {
    let delete = store.bulk_soft_delete(&task.ids, &task.owner);
    let result = match task_timeout {
        None => delete.await,
        Some(limit) => match tokio::time::timeout(limit, delete).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    owner = %task.owner,
                    count = task.ids.len(),
                    timeout = ?limit,
                    "soft delete timed out"
                );
                return;
            }
        },
    };

    match result {
        Ok(()) => debug!(owner = %task.owner, count = task.ids.len(), "soft delete applied"),
        Err(err) => warn!(
            owner = %task.owner,
            count = task.ids.len(),
            error = %err,
            "soft delete failed"
        ),
    }
}
