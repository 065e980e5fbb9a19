//! Spatial-subsystem error type.

use thiserror::Error;

use sf_core::{NodeId, ZoneId};

/// Errors produced by `sf-spatial`.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("node {0} not found in network")]
    NodeNotFound(NodeId),

    #[error("network has no nodes")]
    EmptyNetwork,

    #[error("zone {0} not registered")]
    ZoneNotFound(ZoneId),

    #[error("invalid zone polygon: {0}")]
    InvalidZone(String),
}

pub type SpatialResult<T> = Result<T, SpatialError>;
