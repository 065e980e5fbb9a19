//! `sf-spatial`: air-corridor graph, spatial indexing, and no-fly overlays.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                    |
//! |-------------|-------------------------------------------------------------|
//! | [`network`] | `AirNetwork` (CSR + R-trees), `AirNetworkBuilder`, `NodeKind` |
//! | [`geometry`]| point-in-polygon and segment-crossing primitives           |
//! | [`nofly`]   | `NoFlyZone`, `ZoneRegistry`, `Overlay` snapshots            |
//! | [`error`]   | `SpatialError`, `SpatialResult<T>`                         |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on zone and node types.    |

pub mod error;
pub mod geometry;
pub mod network;
pub mod nofly;


pub use error::{SpatialError, SpatialResult};
pub use network::{AirNetwork, AirNetworkBuilder, NodeKind};
pub use nofly::{ActiveWindow, NoFlyZone, Overlay, OverlayWarning, ZoneRegistry};
