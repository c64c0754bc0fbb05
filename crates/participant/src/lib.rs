//! Payment participant in the order-fulfillment saga.
//!
//! This crate is the orchestration brain of the payment service: it
//! receives `pay` and `rollback_payment` commands, drives the credit
//! ledger, and advances or compensates the saga by dispatching
//! commands to the order and inventory services.
//!
//! The saga is choreography-style: each participant reacts to an
//! inbound command and emits the next one itself. On insufficient
//! funds the order step is compensated directly; on a successful debit
//! the inventory step is dispatched and its result bridged back to the
//! caller with a bounded wait.

pub mod command;
pub mod error;
pub mod outcome;
pub mod participant;
pub mod routes;
pub mod state;

pub use command::{PaymentCommand, PurchaseRequest};
pub use error::{PaymentError, Result};
pub use outcome::SagaOutcome;
pub use participant::PaymentParticipant;
pub use state::PurchasePhase;
