//! Vehicle state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sf_core::{EdgeId, GeoPoint, NodeId, OrderId, ProfileId, VehicleId};
use sf_routing::Route;
use sf_spatial::AirNetwork;

// ── VehicleState ──────────────────────────────────────────────────────────────

/// Lifecycle state of a vehicle.
///
/// ```text
/// Idle → Assigned → EnRoute ⇄ WaitingForSlot → Charging → EnRoute … → Delivering → Idle
///                 ↘ Faulted (any active state) → Idle via repair
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleState {
    Idle,
    /// Reserved for an order, not yet departed.
    Assigned,
    /// Flying with at least one charging stop ahead.
    EnRoute,
    /// At a charging stop, queued for a slot.
    WaitingForSlot,
    Charging,
    /// Flying the final leg; no charging stops remain.
    Delivering,
    Faulted,
}

impl VehicleState {
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleState::Idle           => "idle",
            VehicleState::Assigned       => "assigned",
            VehicleState::EnRoute        => "en_route",
            VehicleState::WaitingForSlot => "waiting_for_slot",
            VehicleState::Charging       => "charging",
            VehicleState::Delivering     => "delivering",
            VehicleState::Faulted        => "faulted",
        }
    }

    /// Flying along a route.
    #[inline]
    pub fn is_moving(self) -> bool {
        matches!(self, VehicleState::EnRoute | VehicleState::Delivering)
    }

    /// Departed and not yet back to idle.
    #[inline]
    pub fn is_underway(self) -> bool {
        matches!(
            self,
            VehicleState::EnRoute
                | VehicleState::WaitingForSlot
                | VehicleState::Charging
                | VehicleState::Delivering
        )
    }
}

impl std::fmt::Display for VehicleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Location ──────────────────────────────────────────────────────────────────

/// Where a vehicle is: on a node, or part-way along an edge.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Location {
    AtNode(NodeId),
    OnEdge { edge: EdgeId, progress_m: f64 },
}

impl Location {
    /// The node, if the vehicle is standing on one.
    pub fn node(self) -> Option<NodeId> {
        match self {
            Location::AtNode(n) => Some(n),
            Location::OnEdge { .. } => None,
        }
    }

    /// Node-snapped position: the nearer endpoint of the current edge.
    pub fn nearest_node(self, net: &AirNetwork) -> NodeId {
        match self {
            Location::AtNode(n) => n,
            Location::OnEdge { edge, progress_m } => {
                let len = net.edge_length_m[edge.index()];
                if progress_m * 2.0 < len {
                    net.edge_from[edge.index()]
                } else {
                    net.edge_to[edge.index()]
                }
            }
        }
    }

    /// Interpolated coordinate.
    pub fn position(self, net: &AirNetwork) -> GeoPoint {
        match self {
            Location::AtNode(n) => net.node_pos[n.index()],
            Location::OnEdge { edge, progress_m } => {
                let (a, b) = net.edge_segment(edge);
                let len = net.edge_length_m[edge.index()];
                let t = if len > 0.0 { progress_m / len } else { 1.0 };
                a.lerp(b, t)
            }
        }
    }
}

// ── Vehicle ───────────────────────────────────────────────────────────────────

/// One aerial vehicle in the inventory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vehicle {
    pub id:                VehicleId,
    pub profile:           ProfileId,
    /// Base the vehicle was stationed at.
    pub home:              NodeId,
    /// Battery fraction in `[0, 1]`.
    pub battery:           f64,
    pub location:          Location,
    pub state:             VehicleState,
    pub order:             Option<OrderId>,
    pub route:             Option<Arc<Route>>,
    /// Index of the last route step reached.
    pub route_pos:         usize,
    /// Order stops (origin, then waypoints) visited on the current trip.
    pub targets_reached:   usize,
    pub charge_ticks_left: u32,
    /// Abort at the next tick boundary.
    pub abort_requested:   bool,
    /// Replan towards the order's (changed) destination at the next node.
    pub replan_requested:  bool,
}

impl Vehicle {
    pub fn new(id: VehicleId, profile: ProfileId, home: NodeId, battery: f64) -> Self {
        Self {
            id,
            profile,
            home,
            battery: battery.clamp(0.0, 1.0),
            location: Location::AtNode(home),
            state: VehicleState::Idle,
            order: None,
            route: None,
            route_pos: 0,
            targets_reached: 0,
            charge_ticks_left: 0,
            abort_requested: false,
            replan_requested: false,
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state == VehicleState::Idle
    }

    pub fn position(&self, net: &AirNetwork) -> GeoPoint {
        self.location.position(net)
    }

    /// Route step at the vehicle's cursor.
    pub fn current_step(&self) -> Option<&sf_routing::RouteStep> {
        self.route.as_ref().and_then(|r| r.steps.get(self.route_pos))
    }

    /// Remaining route length in metres, including progress already made on
    /// the current edge.
    pub fn remaining_m(&self, net: &AirNetwork) -> f64 {
        let Some(route) = &self.route else { return 0.0 };
        let rest = route.remaining_length_m(net, self.route_pos);
        match self.location {
            Location::OnEdge { progress_m, .. } => (rest - progress_m).max(0.0),
            Location::AtNode(_) => rest,
        }
    }

    /// Clear every per-trip field.
    pub(crate) fn end_trip(&mut self) {
        self.order = None;
        self.route = None;
        self.route_pos = 0;
        self.targets_reached = 0;
        self.charge_ticks_left = 0;
        self.abort_requested = false;
        self.replan_requested = false;
    }
}
