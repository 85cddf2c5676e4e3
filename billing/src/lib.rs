//! Client-side caching and admin bulk-operation core for the billing
//! service layer.
//!
//! The data plane (`planes::data`) wraps reads and optimistic writes around
//! a [`ports::CacheStore`]; the control plane (`planes::control`) fans admin
//! mutations out over many targets through the [`retry::RetryExecutor`].

pub mod domain;
pub mod error;
pub mod events;
pub mod planes;
pub mod ports;
pub mod retry;

pub use error::{FailureCode, OperationError, OperationFailure};
