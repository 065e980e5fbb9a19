//! Routing error type.

use thiserror::Error;

use sf_core::NodeId;
use sf_spatial::SpatialError;

/// Errors produced by `sf-routing`.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No path respects the battery constraint, even with charging.
    #[error("no battery-feasible route from {from} to {to}")]
    NotFeasible { from: NodeId, to: NodeId },

    /// The plan was computed against an overlay that is no longer current.
    /// Retry with a fresh snapshot.
    #[error("overlay {planned:#x} is stale (current {current:#x})")]
    StaleOverlay { planned: u64, current: u64 },

    #[error("node {0} not found in network")]
    NodeNotFound(NodeId),

    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

pub type RoutingResult<T> = Result<T, RoutingError>;
