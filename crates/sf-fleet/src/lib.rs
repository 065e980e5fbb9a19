//! `sf-fleet`: vehicles, orders, charging stations, and dispatch.
//!
//! # Ownership
//!
//! [`Dispatcher`] owns every [`Vehicle`], [`Order`], and station slot.  It is
//! the only place that changes a vehicle's [`VehicleState`] or an order's
//! [`OrderStatus`]; the simulation computes outcomes and then asks the
//! dispatcher to apply them.  Every status change is recorded as an
//! [`OrderEvent`] for the broadcast boundary.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`vehicle`]  | `Vehicle`, `VehicleState`, `Location`                     |
//! | [`order`]    | `Order`, `OrderStatus`, `OrderKind`, `OrderEvent`, requests |
//! | [`station`]  | `StationManager`: FIFO slot admission per station         |
//! | [`geocode`]  | `Geocoder` trait, `Endpoint` resolution                   |
//! | [`dispatch`] | `Dispatcher`, `DispatchConfig`, dispatch passes           |
//! | [`error`]    | `FleetError`, `FleetResult<T>`                            |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                   |
//! |------------|----------------------------------------------------------|
//! | `parallel` | Candidate routes for an order are planned with Rayon.    |

pub mod dispatch;
pub mod error;
pub mod geocode;
pub mod order;
pub mod station;
pub mod vehicle;

#[cfg(test)]
mod tests;

pub use dispatch::{CancelOutcome, DispatchConfig, DispatchReport, Dispatcher, FleetSnapshot, InfeasiblePolicy};
pub use error::{FleetError, FleetResult};
pub use geocode::{Endpoint, Geocoder, NoGeocoder, StaticGeocoder};
pub use order::{FailureReason, Order, OrderEvent, OrderKind, OrderRequest, OrderStatus};
pub use station::{SlotGrant, StationManager, StationState};
pub use vehicle::{Location, Vehicle, VehicleState};
