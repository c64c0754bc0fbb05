//! Asynchronous command dispatch between saga participants.
//!
//! A participant emits the next saga step as a named command on a
//! named queue and gets back a [`TaskHandle`], a completion slot it can
//! wait on for a bounded time. The worker executing the command
//! completes the slot with the task's result value, so a result that
//! lands within the wait window is observed immediately rather than at
//! the end of a fixed sleep.
//!
//! [`InMemoryBroker`] is the in-process stand-in for the broker
//! transport; [`WorkerPool`] drains a queue with a pool of workers so
//! one suspended task never blocks the rest.

pub mod broker;
pub mod dispatcher;
pub mod error;
pub mod task;
pub mod worker;

pub use broker::InMemoryBroker;
pub use dispatcher::TaskDispatcher;
pub use error::{DispatchError, Result};
pub use task::{Delivery, TaskCompletion, TaskHandle, TaskMessage};
pub use worker::{CommandHandler, HandlerError, WorkerPool};
