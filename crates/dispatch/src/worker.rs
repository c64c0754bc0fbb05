use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::Delivery;
use crate::task::TaskMessage;

/// Error returned by a command handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for the unit of work a worker runs per queued command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handles one command, returning the task's result value if the
    /// command produces one for a waiting caller.
    async fn handle(
        &self,
        message: TaskMessage,
    ) -> std::result::Result<Option<serde_json::Value>, HandlerError>;
}

/// Pool of workers draining one queue.
///
/// Each inbound command runs as an independently scheduled unit of
/// work; a worker suspended waiting on a downstream result holds only
/// its own slot while the rest of the pool keeps servicing the queue.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` workers consuming `receiver` and driving
    /// `handler`.
    pub fn spawn<H: CommandHandler + 'static>(
        receiver: mpsc::UnboundedReceiver<Delivery>,
        handler: Arc<H>,
        count: usize,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..count)
            .map(|worker| {
                let receiver = receiver.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    loop {
                        let delivery = { receiver.lock().await.recv().await };
                        let Some(delivery) = delivery else {
                            break;
                        };
                        Self::process(worker, handler.as_ref(), delivery).await;
                    }
                    tracing::debug!(worker, "queue closed, worker exiting");
                })
            })
            .collect();

        Self { workers }
    }

    async fn process<H: CommandHandler + ?Sized>(worker: usize, handler: &H, delivery: Delivery) {
        let command = delivery.message.command.clone();
        let started = std::time::Instant::now();

        match handler.handle(delivery.message).await {
            Ok(Some(value)) => {
                delivery.completion.complete(value).await;
                metrics::counter!("commands_processed_total").increment(1);
            }
            Ok(None) => {
                // Fire-and-forget command; nothing to hand back.
                metrics::counter!("commands_processed_total").increment(1);
            }
            Err(e) => {
                // The task stays incomplete; a waiting caller observes
                // it as still running rather than a silent success.
                metrics::counter!("commands_failed_total").increment(1);
                tracing::error!(worker, command, error = %e, "command handler failed");
            }
        }

        metrics::histogram!("command_duration_seconds").record(started.elapsed().as_secs_f64());
    }

    /// Waits for every worker to drain and exit. Returns once the
    /// queue's senders are gone and the backlog is processed.
    pub async fn join(self) {
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    /// Aborts the workers without draining the queue.
    pub fn abort(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
