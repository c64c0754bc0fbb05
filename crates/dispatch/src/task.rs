use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};

/// A command queued for a saga participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMessage {
    /// Command name, e.g. `create_payment`.
    pub command: String,
    /// Opaque command arguments.
    pub payload: serde_json::Value,
}

impl TaskMessage {
    /// Creates a new task message.
    pub fn new(command: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            command: command.into(),
            payload,
        }
    }
}

#[derive(Debug, Default)]
struct TaskSlot {
    result: RwLock<Option<serde_json::Value>>,
    notify: Notify,
}

/// Handle to an asynchronously executing task.
///
/// Cheap to clone; all clones observe the same completion slot. The
/// result stays readable after any wait window has elapsed, so a task
/// finishing late is not lost.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    slot: Arc<TaskSlot>,
}

impl TaskHandle {
    /// Creates a handle together with the completion side handed to
    /// the executing worker.
    pub fn channel() -> (TaskHandle, TaskCompletion) {
        let slot = Arc::new(TaskSlot::default());
        (
            TaskHandle { slot: slot.clone() },
            TaskCompletion { slot },
        )
    }

    /// Returns true if the task has completed.
    pub async fn is_complete(&self) -> bool {
        self.slot.result.read().await.is_some()
    }

    /// Returns the task's result value, if it has completed.
    pub async fn result(&self) -> Option<serde_json::Value> {
        self.slot.result.read().await.clone()
    }

    /// Waits up to `wait` for the task to complete.
    ///
    /// Suspends only the calling task. Returns the result as soon as
    /// the worker completes the slot, or `None` once the window
    /// elapses with the task still running.
    pub async fn wait_for_result(&self, wait: Duration) -> Option<serde_json::Value> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            // Register interest before checking, so a completion that
            // lands between the check and the await is not missed.
            let mut notified = pin!(self.slot.notify.notified());
            notified.as_mut().enable();

            if let Some(result) = self.result().await {
                return Some(result);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.result().await;
            }
        }
    }
}

/// The completion side of a [`TaskHandle`].
///
/// Held by the worker executing the task; dropping it without calling
/// [`TaskCompletion::complete`] leaves the task permanently incomplete.
#[derive(Debug)]
pub struct TaskCompletion {
    slot: Arc<TaskSlot>,
}

impl TaskCompletion {
    /// Records the task's result and wakes every waiting handle.
    pub async fn complete(self, value: serde_json::Value) {
        *self.slot.result.write().await = Some(value);
        self.slot.notify.notify_waiters();
    }
}

/// A message paired with the completion slot for its result.
#[derive(Debug)]
pub struct Delivery {
    pub message: TaskMessage,
    pub completion: TaskCompletion,
}
