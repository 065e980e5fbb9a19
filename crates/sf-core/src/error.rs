//! Base error type.
//!
//! Sub-crates define their own error enums and either convert them into
//! `CoreError` via `From` impls or wrap `CoreError` as one variant.

use thiserror::Error;

use crate::{NodeId, OrderId, ProfileId, VehicleId};

/// The top-level error type for `sf-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("vehicle profile {0} not found")]
    ProfileNotFound(ProfileId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `sf-core`.
pub type CoreResult<T> = Result<T, CoreError>;
