//! Shared types used across the payment saga crates.

pub mod types;

pub use types::{RequestId, Username};
