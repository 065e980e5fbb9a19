//! Pure per-vehicle movement step.
//!
//! [`advance`] moves one flying vehicle along its route for one tick without
//! touching any shared state.  The simulation runs it for every flying
//! vehicle (in parallel with the `parallel` feature) and then applies the
//! outcomes through the dispatcher.

use sf_core::VehicleProfile;
use sf_fleet::{Location, Vehicle};
use sf_spatial::{AirNetwork, Overlay};

/// Battery below `-DEPLETION_EPS` counts as exhausted.
const DEPLETION_EPS: f64 = 1e-9;

/// Why a movement step stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Distance budget for the tick used up.
    InTransit,
    /// Reached a planned charging stop.
    ChargeStop,
    /// Reached the final route node.
    Arrived,
    /// Standing on a node whose next edge is blocked, or a replan was
    /// requested.
    Replan,
    /// Battery ran out before the next charging stop.
    Depleted,
}

/// Result of [`advance`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Movement {
    pub location:  Location,
    pub route_pos: usize,
    pub battery:   f64,
    pub stop:      StopReason,
}

/// Fly `vehicle` for `tick_secs` at `speed_mps`.
///
/// Multiple edges may be covered in one tick.  Movement halts early on any
/// node where something has to happen: a charging stop, the destination, a
/// blocked next edge, or a pending replan.  Battery drains in proportion to
/// the profile's cost of each edge.
pub fn advance(
    net:       &AirNetwork,
    overlay:   &Overlay,
    profile:   &VehicleProfile,
    vehicle:   &Vehicle,
    speed_mps: f64,
    tick_secs: f64,
) -> Movement {
    let mut location = vehicle.location;
    let mut route_pos = vehicle.route_pos;
    let mut battery = vehicle.battery;
    let stop = |location, route_pos, battery: f64, stop| Movement {
        location,
        route_pos,
        battery: battery.max(0.0),
        stop,
    };

    let Some(route) = vehicle.route.as_deref() else {
        return stop(location, route_pos, battery, StopReason::Replan);
    };
    let last = route.steps.len().saturating_sub(1);
    let mut budget = (speed_mps * tick_secs).max(0.0);
    let mut just_arrived = false;

    loop {
        match location {
            Location::OnEdge { edge, progress_m } => {
                let len = net.edge_length_m[edge.index()];
                let remaining = (len - progress_m).max(0.0);
                let step = remaining.min(budget);
                // Battery fraction for the whole edge.  A zero-length edge has
                // no distance to spread it over and is charged on traversal.
                let frac = if profile.max_range > 0.0 {
                    net.edge_cost(edge, profile) / profile.max_range
                } else {
                    0.0
                };
                let spent = if len > 0.0 { frac * step / len } else { frac };
                if battery - spent < -DEPLETION_EPS {
                    let reach = if spent > 0.0 {
                        (step * battery.max(0.0) / spent).min(step)
                    } else {
                        0.0
                    };
                    let here = Location::OnEdge { edge, progress_m: progress_m + reach };
                    return stop(here, route_pos, 0.0, StopReason::Depleted);
                }
                battery -= spent;
                budget -= step;
                if step < remaining {
                    let here = Location::OnEdge { edge, progress_m: progress_m + step };
                    return stop(here, route_pos, battery, StopReason::InTransit);
                }
                route_pos += 1;
                location = Location::AtNode(route.steps[route_pos].node);
                just_arrived = true;
            }
            Location::AtNode(_) => {
                if just_arrived && route.steps[route_pos].is_charging_stop {
                    return stop(location, route_pos, battery, StopReason::ChargeStop);
                }
                // A pending replan wins over arrival: the destination may
                // have moved while the last edge was flown.
                if vehicle.replan_requested {
                    return stop(location, route_pos, battery, StopReason::Replan);
                }
                if route_pos >= last {
                    return stop(location, route_pos, battery, StopReason::Arrived);
                }
                if budget <= 0.0 {
                    return stop(location, route_pos, battery, StopReason::InTransit);
                }
                let Some(edge) = route.steps[route_pos + 1].edge_in else {
                    return stop(location, route_pos, battery, StopReason::Replan);
                };
                if overlay.is_blocked(edge) {
                    return stop(location, route_pos, battery, StopReason::Replan);
                }
                location = Location::OnEdge { edge, progress_m: 0.0 };
                just_arrived = false;
            }
        }
    }
}
