use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    Delivery, DispatchError, Result, TaskHandle, TaskMessage,
    dispatcher::TaskDispatcher,
};

struct Queue {
    sender: mpsc::UnboundedSender<Delivery>,
    // Taken by the first subscriber; messages sent before anyone
    // subscribes buffer in the channel.
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl Queue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

/// In-process message broker with named queues.
///
/// Stands in for the external broker transport: queues are created on
/// first use, commands buffer until a consumer subscribes, and a queue
/// whose consumer is gone refuses further sends the way an unreachable
/// broker would.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<Mutex<HashMap<String, Queue>>>,
}

impl InMemoryBroker {
    /// Creates a new broker with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the consuming end of the named queue.
    ///
    /// Each queue has a single consumer; a second subscribe fails.
    pub fn subscribe(&self, queue: &str) -> Result<mpsc::UnboundedReceiver<Delivery>> {
        let mut queues = self.queues.lock().expect("broker lock poisoned");
        queues
            .entry(queue.to_string())
            .or_insert_with(Queue::new)
            .receiver
            .take()
            .ok_or_else(|| DispatchError::AlreadyConsumed(queue.to_string()))
    }

    /// Drops the producer side of the named queue.
    ///
    /// The consumer drains the remaining backlog and then observes the
    /// channel as closed, letting its workers exit cleanly.
    pub fn close(&self, queue: &str) {
        self.queues
            .lock()
            .expect("broker lock poisoned")
            .remove(queue);
    }
}

#[async_trait]
impl TaskDispatcher for InMemoryBroker {
    async fn send(
        &self,
        queue: &str,
        command: &str,
        payload: serde_json::Value,
    ) -> Result<TaskHandle> {
        let (handle, completion) = TaskHandle::channel();
        let delivery = Delivery {
            message: TaskMessage::new(command, payload),
            completion,
        };

        let mut queues = self.queues.lock().expect("broker lock poisoned");
        let sender = &queues
            .entry(queue.to_string())
            .or_insert_with(Queue::new)
            .sender;
        sender
            .send(delivery)
            .map_err(|_| DispatchError::QueueUnavailable(queue.to_string()))?;

        metrics::counter!("commands_dispatched_total", "queue" => queue.to_string()).increment(1);
        tracing::debug!(queue, command, "command dispatched");
        Ok(handle)
    }
}
