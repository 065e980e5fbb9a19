//! Planner output.
//!
//! A [`Route`] is produced once and never edited; replanning builds a new
//! one.  The simulation shares it behind an `Arc` and tracks its own cursor
//! into `steps`.

use sf_core::{EdgeId, NodeId, VehicleProfile};
use sf_spatial::{AirNetwork, Overlay};

/// One node visit along a route.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteStep {
    pub node: NodeId,
    /// Edge used to reach `node`; `None` for the first step.
    pub edge_in: Option<EdgeId>,
    /// Estimated battery fraction on arrival, before any charging here.
    pub arrival_battery: f64,
    /// The vehicle charges at `node` before continuing.
    pub is_charging_stop: bool,
}

/// A battery-feasible path with its charging stops.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    pub steps: Vec<RouteStep>,
    /// Sum of edge energies plus the energy-equivalent of charging dwell.
    pub total_cost: f64,
    /// Key of the overlay the route was planned against.
    pub overlay_key: u64,
    /// Battery fraction a charging stop restores.
    pub charge_target: f64,
}

impl Route {
    pub fn origin(&self) -> Option<NodeId> {
        self.steps.first().map(|s| s.node)
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.steps.last().map(|s| s.node)
    }

    /// `true` if the route never leaves its first node.
    pub fn is_trivial(&self) -> bool {
        self.steps.len() <= 1
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.steps.iter().map(|s| s.node)
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.steps.iter().filter_map(|s| s.edge_in)
    }

    pub fn charging_stops(&self) -> usize {
        self.steps.iter().filter(|s| s.is_charging_stop).count()
    }

    /// Any charging stop strictly after step `pos`?
    pub fn charge_stop_ahead(&self, pos: usize) -> bool {
        self.steps.iter().skip(pos + 1).any(|s| s.is_charging_stop)
    }

    pub fn length_m(&self, net: &AirNetwork) -> f64 {
        self.remaining_length_m(net, 0)
    }

    /// Length of the edges after step `pos`.
    pub fn remaining_length_m(&self, net: &AirNetwork, pos: usize) -> f64 {
        self.steps
            .iter()
            .skip(pos + 1)
            .filter_map(|s| s.edge_in)
            .map(|e| net.edge_length_m[e.index()])
            .sum()
    }

    /// Index of the first step after `pos` whose incoming edge is blocked.
    pub fn first_blocked_after(&self, overlay: &Overlay, pos: usize) -> Option<usize> {
        self.steps
            .iter()
            .enumerate()
            .skip(pos + 1)
            .find(|(_, s)| s.edge_in.is_some_and(|e| overlay.is_blocked(e)))
            .map(|(i, _)| i)
    }

    /// Energy consumed on each leg between charge events, in order.
    ///
    /// The first leg starts at the origin; each charging stop closes a leg.
    pub fn leg_energies(&self, net: &AirNetwork, profile: &VehicleProfile) -> Vec<f64> {
        let mut legs = Vec::new();
        let mut acc = 0.0;
        for step in &self.steps {
            if let Some(e) = step.edge_in {
                acc += net.edge_cost(e, profile);
            }
            if step.is_charging_stop {
                legs.push(acc);
                acc = 0.0;
            }
        }
        legs.push(acc);
        legs
    }
}
