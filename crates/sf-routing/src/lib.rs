//! `sf-routing`: energy-aware route planning.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`route`]  | `Route`, `RouteStep` (planner output, read-only afterwards) |
//! | [`router`] | `Router` trait, `EnergyRouter`, `PlanRequest`, `RouterConfig` |
//! | [`error`]  | `RoutingError`, `RoutingResult<T>`                         |
//!
//! Planning is a pure function of the network, an overlay snapshot, and the
//! request.  Nothing here touches simulation state, so plans may run on any
//! thread while the simulation ticks.

pub mod error;
pub mod route;
pub mod router;


pub use error::{RoutingError, RoutingResult};
pub use route::{Route, RouteStep};
pub use router::{EnergyRouter, PlanRequest, Router, RouterConfig};
