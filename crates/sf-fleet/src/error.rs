//! Fleet error type.

use thiserror::Error;

use sf_core::{NodeId, OrderId, ProfileId, VehicleId};
use sf_routing::RoutingError;
use sf_spatial::SpatialError;

use crate::{OrderStatus, VehicleState};

/// Errors produced by `sf-fleet`.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("profile {0} not found")]
    ProfileNotFound(ProfileId),

    #[error("node {0} is not a charging station")]
    StationNotFound(NodeId),

    /// No idle vehicle can serve the order right now.  Non-fatal; the order
    /// stays pending.
    #[error("no vehicle available for order {0}")]
    ResourceExhausted(OrderId),

    #[error("vehicle {vehicle} cannot {action} while {state:?}")]
    InvalidTransition { vehicle: VehicleId, state: VehicleState, action: &'static str },

    #[error("order {order} is {status:?}")]
    OrderClosed { order: OrderId, status: OrderStatus },

    /// A station would exceed its slot capacity.
    #[error("station {station} over capacity ({capacity})")]
    CapacityExceeded { station: NodeId, capacity: u32 },

    /// A safety invariant failed for one vehicle.  Fatal to that vehicle and
    /// its order only.
    #[error("invariant violated for vehicle {vehicle}: {detail}")]
    InvariantViolation { vehicle: VehicleId, detail: String },

    #[error("address not found: {0}")]
    GeocodeNotFound(String),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

pub type FleetResult<T> = Result<T, FleetError>;
