use async_trait::async_trait;

use crate::{Result, TaskHandle};

/// Trait for submitting commands to other saga participants.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Enqueues `command` with `payload` on the named queue.
    ///
    /// Returns immediately with a handle for the task's eventual
    /// result; never blocks on the downstream service's execution.
    /// Delivery is at-least-once at best, so downstream commands must
    /// carry their own idempotency key.
    async fn send(
        &self,
        queue: &str,
        command: &str,
        payload: serde_json::Value,
    ) -> Result<TaskHandle>;
}
