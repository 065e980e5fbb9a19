//! Simulation observer trait: the broadcast boundary.

use serde::{Deserialize, Serialize};

use sf_core::{GeoPoint, OrderId, Tick, VehicleId};
use sf_fleet::{OrderEvent, VehicleState};

/// Per-vehicle status emitted once per snapshot interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id:          VehicleId,
    pub position:    GeoPoint,
    pub battery:     f64,
    pub state:       VehicleState,
    pub order:       Option<OrderId>,
    /// Route distance left, metres.
    pub remaining_m: f64,
    /// Flight time left at the current effective speed plus any charging
    /// time already scheduled, seconds.
    pub eta_secs:    f64,
}

/// Counters for one processed tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick:       Tick,
    /// Orders assigned by this tick's dispatch pass.
    pub dispatched: usize,
    /// Orders still pending after the pass.
    pub backlog:    usize,
    pub completed:  usize,
    pub failed:     usize,
    pub idle:       usize,
    pub flying:     usize,
    pub charging:   usize,
    pub waiting:    usize,
    pub faulted:    usize,
}

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at key points in the
/// tick loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: progress printer
///
/// ```rust,ignore
/// struct ProgressPrinter { interval: u64 }
///
/// impl SimObserver for ProgressPrinter {
///     fn on_tick_end(&mut self, tick: Tick, summary: &TickSummary) {
///         if tick.0 % self.interval == 0 {
///             println!("tick {tick}: {} flying, {} backlog", summary.flying, summary.backlog);
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each tick, before any processing.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called at the end of each tick with that tick's counters.
    fn on_tick_end(&mut self, _tick: Tick, _summary: &TickSummary) {}

    /// Called for every order status change, in the order they happened.
    fn on_order_event(&mut self, _event: &OrderEvent) {}

    /// Called at snapshot intervals (every `config.output_interval_ticks`
    /// ticks) with one entry per vehicle, ascending id.
    fn on_snapshot(&mut self, _tick: Tick, _vehicles: &[VehicleSnapshot]) {}

    /// Called once after the final tick completes.
    fn on_sim_end(&mut self, _final_tick: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
