//! `sf-sim`: tick loop orchestrator for the skyfleet engine.
//!
//! # Produce/apply tick loop
//!
//! ```text
//! for tick in 0..config.total_ticks:
//!   ① Aborts     : cancelled in-flight trips stop at the nearer node.
//!   ② Departures : Assigned vehicles take off (replanning stale routes).
//!   ③ Movement   : advance() for every flying vehicle
//!                  (parallel with the `parallel` feature).
//!   ④ Apply      : in ascending VehicleId order, through the Dispatcher:
//!                    InTransit  → record progress
//!                    ChargeStop → request a station slot
//!                    Arrived    → complete the order
//!                    Replan     → reroute, or abandon if infeasible
//!                    Depleted   → fault vehicle, fail order
//!   ⑤ Charging   : one tick on the pad; finished vehicles free their slot.
//!   ⑥ Dispatch   : match pending orders to idle vehicles.
//! ```
//!
//! Observers receive every order status change and, at the configured
//! interval, a position/battery/state snapshot of every vehicle.
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                       |
//! |------------|--------------------------------------------------------------|
//! | `parallel` | Runs the movement phase and candidate planning on Rayon.     |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use sf_routing::EnergyRouter;
//! use sf_sim::{NoopObserver, SimBuilder, VehicleSpec};
//!
//! let mut sim = SimBuilder::new(config, network, EnergyRouter::default())
//!     .profiles(profiles)
//!     .vehicles(vec![VehicleSpec::new(ProfileId(0), base)])
//!     .build()?;
//! sim.run(&mut NoopObserver)?;
//! ```

pub mod builder;
pub mod error;
pub mod movement;
pub mod observer;
pub mod persist;
pub mod sim;


pub use builder::{SimBuilder, VehicleSpec};
pub use error::{SimError, SimResult};
pub use movement::{advance, Movement, StopReason};
pub use observer::{NoopObserver, SimObserver, TickSummary, VehicleSnapshot};
pub use persist::{MemoryStore, SimState, StateStore, STATE_KEY};
pub use sim::{Sim, MAX_WIND_MPS};
