//! `sf-core`: foundational types for the `skyfleet` routing and simulation
//! engine.
//!
//! This crate is a dependency of every other `sf-*` crate.  It has no `sf-*`
//! dependencies and minimal external ones (only `rand` and `thiserror`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                                   |
//! |-----------------|------------------------------------------------------------|
//! | [`ids`]         | `VehicleId`, `NodeId`, `EdgeId`, `OrderId`, `ZoneId`, `ProfileId` |
//! | [`geo`]         | `GeoPoint`, haversine distance, interpolation              |
//! | [`time`]        | `Tick`, `SimClock`, `SimConfig`                            |
//! | [`profile`]     | `VehicleKind`, `VehicleProfile`, `AltitudeBand`, `BandSet` |
//! | [`rng`]         | `SimRng` (seeded, deterministic)                           |
//! | [`error`]       | `CoreError`, `CoreResult`                                  |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |
//!           | Required by `sf-fleet` and `sf-sim` snapshots.             |

pub mod error;
pub mod geo;
pub mod ids;
pub mod profile;
pub mod rng;
pub mod time;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::GeoPoint;
pub use ids::{EdgeId, NodeId, OrderId, ProfileId, VehicleId, ZoneId};
pub use profile::{AltitudeBand, BandSet, VehicleKind, VehicleProfile};
pub use rng::SimRng;
pub use time::{SimClock, SimConfig, Tick};
