//! The dispatcher: sole owner of vehicle and order state.
//!
//! # Dispatch pass
//!
//! Pending orders are served in id order.  For each order every idle
//! vehicle of the required kind gets a candidate route (vehicle node →
//! order origin → waypoints → destination).  The winner is, in order of
//! preference: a route without charging stops, the vehicle nearest the
//! origin, the lowest vehicle id.  Reservation happens in the same `&mut`
//! call, so a vehicle can never be booked twice.
//!
//! Before committing, the pass checks that the overlay it planned against is
//! still current.  If zones changed in the meantime it replans against a
//! fresh snapshot.
//!
//! # Transitions
//!
//! Every state change goes through a method here.  The simulation decides
//! *what* happened to a vehicle during a tick and calls the matching method;
//! it never writes `state` or `status` fields itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use sf_core::{NodeId, OrderId, ProfileId, Tick, VehicleId, VehicleProfile};
use sf_routing::{PlanRequest, Route, Router, RoutingError, RoutingResult};
use sf_spatial::{AirNetwork, Overlay, ZoneRegistry};

use crate::station::SlotGrant;
use crate::{
    FailureReason, FleetError, FleetResult, Geocoder, Location, Order, OrderEvent, OrderKind,
    OrderRequest, OrderStatus, StationManager, StationState, Vehicle, VehicleState,
};

// ── Configuration ─────────────────────────────────────────────────────────────

/// What to do with an order no idle vehicle can feasibly serve.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfeasiblePolicy {
    /// Leave it pending; retry on the next pass.
    KeepPending,
    /// Mark it failed with [`FailureReason::NotFeasible`].
    Fail,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub on_infeasible:         InfeasiblePolicy,
    /// Arrival battery floor for orders that do not set one.
    pub default_battery_floor: f64,
    /// Replans allowed per order when the overlay goes stale mid-pass.
    pub max_stale_retries:     u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            on_infeasible:         InfeasiblePolicy::KeepPending,
            default_battery_floor: 0.0,
            max_stale_retries:     3,
        }
    }
}

/// Outcome of one [`Dispatcher::dispatch_pass`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DispatchReport {
    pub assigned: Vec<(OrderId, VehicleId)>,
    /// Still pending: no vehicle, or infeasible under `KeepPending`.
    pub backlog:  Vec<OrderId>,
    pub failed:   Vec<OrderId>,
}

/// Result of [`Dispatcher::cancel_order`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Pending order dropped without trace.
    Removed,
    /// Reserved order failed; vehicle back to idle.
    Failed,
    /// Vehicle will abort at the next tick boundary.
    AbortScheduled,
}

/// Serializable fleet state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub vehicles:   Vec<Vehicle>,
    pub orders:     Vec<Order>,
    pub stations:   Vec<StationState>,
    pub next_order: u32,
}

/// Fail with [`RoutingError::StaleOverlay`] if `overlay` no longer matches
/// the zones active at `tick`.
pub fn ensure_current(zones: &ZoneRegistry, overlay: &Overlay, tick: Tick) -> RoutingResult<()> {
    let current = zones.key_at(tick);
    if overlay.key() == current {
        Ok(())
    } else {
        Err(RoutingError::StaleOverlay { planned: overlay.key(), current })
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

pub struct Dispatcher {
    config:     DispatchConfig,
    profiles:   Vec<VehicleProfile>,
    vehicles:   Vec<Vehicle>,
    orders:     BTreeMap<OrderId, Order>,
    stations:   StationManager,
    next_order: u32,
    events:     Vec<OrderEvent>,
}

impl Dispatcher {
    /// Empty fleet with one station entry per charging node of `net`.
    pub fn new(net: &AirNetwork, config: DispatchConfig) -> Self {
        Self {
            config,
            profiles: Vec::new(),
            vehicles: Vec::new(),
            orders: BTreeMap::new(),
            stations: StationManager::from_network(net),
            next_order: 0,
            events: Vec::new(),
        }
    }

    // ── Inventory ─────────────────────────────────────────────────────────

    /// Register a profile; its `id` is overwritten with the assigned one.
    pub fn add_profile(&mut self, mut profile: VehicleProfile) -> ProfileId {
        let id = ProfileId(self.profiles.len() as u16);
        profile.id = id;
        self.profiles.push(profile);
        id
    }

    /// Station a new idle vehicle at `home`, which must be a node of `net`.
    pub fn add_vehicle(
        &mut self,
        net:     &AirNetwork,
        profile: ProfileId,
        home:    NodeId,
        battery: f64,
    ) -> FleetResult<VehicleId> {
        self.profile(profile)?;
        net.check_node(home)?;
        let id = VehicleId(self.vehicles.len() as u32);
        self.vehicles.push(Vehicle::new(id, profile, home, battery));
        Ok(id)
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn profiles(&self) -> &[VehicleProfile] {
        &self.profiles
    }

    pub fn profile(&self, id: ProfileId) -> FleetResult<&VehicleProfile> {
        self.profiles.get(id.index()).ok_or(FleetError::ProfileNotFound(id))
    }

    pub fn profile_of(&self, vehicle: &Vehicle) -> FleetResult<&VehicleProfile> {
        self.profile(vehicle.profile)
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: VehicleId) -> FleetResult<&Vehicle> {
        self.vehicles.get(id.index()).ok_or(FleetError::VehicleNotFound(id))
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn order(&self, id: OrderId) -> FleetResult<&Order> {
        self.orders.get(&id).ok_or(FleetError::OrderNotFound(id))
    }

    pub fn stations(&self) -> &StationManager {
        &self.stations
    }

    /// Order status changes recorded since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.events)
    }

    fn vidx(&self, id: VehicleId) -> FleetResult<usize> {
        if id.index() < self.vehicles.len() {
            Ok(id.index())
        } else {
            Err(FleetError::VehicleNotFound(id))
        }
    }

    // ── Orders ────────────────────────────────────────────────────────────

    /// Create a pending order between resolved nodes.
    ///
    /// Every stop must be a node of `net`; otherwise nothing is recorded.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &mut self,
        net:           &AirNetwork,
        kind:          OrderKind,
        origin:        NodeId,
        destination:   NodeId,
        waypoints:     Vec<NodeId>,
        battery_floor: Option<f64>,
        tick:          Tick,
    ) -> FleetResult<OrderId> {
        net.check_node(origin)?;
        net.check_node(destination)?;
        for &w in &waypoints {
            net.check_node(w)?;
        }
        let id = OrderId(self.next_order);
        self.next_order += 1;
        let floor = battery_floor.unwrap_or(self.config.default_battery_floor).clamp(0.0, 1.0);
        self.orders.insert(id, Order {
            id,
            kind,
            origin,
            destination,
            waypoints,
            battery_floor: floor,
            vehicle: None,
            status: OrderStatus::Pending,
            failure: None,
            created: tick,
        });
        debug!(order = %id, kind = kind.as_str(), origin = %origin, destination = %destination, "order submitted");
        Ok(id)
    }

    /// Resolve a boundary request (addresses, coordinates) and submit it.
    pub fn submit_request(
        &mut self,
        req:      &OrderRequest,
        net:      &AirNetwork,
        geocoder: &dyn Geocoder,
        tick:     Tick,
    ) -> FleetResult<OrderId> {
        let origin = req.origin.resolve(net, geocoder)?;
        let destination = req.destination.resolve(net, geocoder)?;
        let waypoints = req
            .waypoints
            .iter()
            .map(|w| w.resolve(net, geocoder))
            .collect::<FleetResult<Vec<_>>>()?;
        self.submit(net, req.resolved_kind(), origin, destination, waypoints, req.battery_floor, tick)
    }

    pub fn pending_orders(&self) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending)
            .map(|o| o.id)
            .collect()
    }

    fn set_status(
        &mut self,
        order:  OrderId,
        new:    OrderStatus,
        reason: Option<FailureReason>,
        tick:   Tick,
    ) -> FleetResult<()> {
        let o = self.orders.get_mut(&order).ok_or(FleetError::OrderNotFound(order))?;
        let old = o.status;
        if !old.can_become(new) {
            return Err(FleetError::OrderClosed { order, status: old });
        }
        o.status = new;
        if new == OrderStatus::Failed {
            o.failure = reason;
        }
        debug!(order = %order, old = old.as_str(), new = new.as_str(), "order status");
        self.events.push(OrderEvent { order, old, new, tick, vehicle: o.vehicle, reason });
        Ok(())
    }

    // ── Planning ──────────────────────────────────────────────────────────

    /// Route for `vehicle` to serve the remainder of `order` from `from`.
    ///
    /// `targets_reached` counts order stops (origin, then waypoints) the
    /// vehicle has already visited.
    fn plan_trip<R: Router + ?Sized>(
        &self,
        vehicle: &Vehicle,
        from:    NodeId,
        order:   &Order,
        net:     &AirNetwork,
        overlay: &Overlay,
        router:  &R,
    ) -> FleetResult<Route> {
        let profile = self.profile_of(vehicle)?;
        let targets: Vec<NodeId> = std::iter::once(order.origin)
            .chain(order.waypoints.iter().copied())
            .skip(vehicle.targets_reached)
            .collect();
        let req = PlanRequest::new(profile, vehicle.battery, from, order.destination)
            .via(&targets)
            .with_floor(order.battery_floor);
        Ok(router.plan(net, overlay, &req)?)
    }

    /// Replan the current trip of `vehicle` from the node it stands on.
    pub fn replan<R: Router + ?Sized>(
        &self,
        vehicle: VehicleId,
        net:     &AirNetwork,
        overlay: &Overlay,
        router:  &R,
    ) -> FleetResult<Route> {
        let v = self.vehicle(vehicle)?;
        let Some(order) = v.order else {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "replan" });
        };
        let Location::AtNode(from) = v.location else {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "replan off-node" });
        };
        self.plan_trip(v, from, self.order(order)?, net, overlay, router)
    }

    /// Pick and plan a vehicle for `order` against `overlay` without
    /// reserving it.
    pub fn select_vehicle<R: Router + ?Sized>(
        &self,
        order:   OrderId,
        net:     &AirNetwork,
        overlay: &Overlay,
        router:  &R,
    ) -> FleetResult<(VehicleId, Route)> {
        let o = self.order(order)?;
        let origin = net.check_node(o.origin)?;
        let kind = o.kind.required_vehicle();
        let candidates: Vec<&Vehicle> = self
            .vehicles
            .iter()
            .filter(|v| v.is_idle())
            .filter(|v| self.profile_of(v).is_ok_and(|p| p.kind == kind))
            .collect();
        if candidates.is_empty() {
            return Err(FleetError::ResourceExhausted(order));
        }

        let plan = |v: &&Vehicle| -> (VehicleId, FleetResult<Route>) {
            let from = v.location.nearest_node(net);
            (v.id, self.plan_trip(v, from, o, net, overlay, router))
        };

        #[cfg(not(feature = "parallel"))]
        let planned: Vec<(VehicleId, FleetResult<Route>)> = candidates.iter().map(plan).collect();

        #[cfg(feature = "parallel")]
        let planned: Vec<(VehicleId, FleetResult<Route>)> = {
            use rayon::prelude::*;
            candidates.par_iter().map(plan).collect()
        };

        let origin_pos = net.node_pos[origin.index()];
        let best = planned
            .into_iter()
            .filter_map(|(id, r)| match r {
                Ok(route) => Some((id, route)),
                Err(e) => {
                    debug!(order = %order, vehicle = %id, error = %e, "candidate rejected");
                    None
                }
            })
            .map(|(id, route)| {
                let dist = self.vehicles[id.index()].position(net).distance_m(origin_pos);
                (route.charging_stops() > 0, dist, id, route)
            })
            .min_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));

        match best {
            Some((_, _, id, route)) => Ok((id, route)),
            None => Err(RoutingError::NotFeasible { from: o.origin, to: o.destination }.into()),
        }
    }

    /// Assign as many pending orders as possible.
    pub fn dispatch_pass<R: Router + ?Sized>(
        &mut self,
        net:    &AirNetwork,
        zones:  &ZoneRegistry,
        router: &R,
        tick:   Tick,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut overlay: Arc<Overlay> = zones.overlay_at(net, tick);

        for order in self.pending_orders() {
            let mut retries = 0;
            let outcome = loop {
                let outcome = self.select_vehicle(order, net, &overlay, router);
                match ensure_current(zones, &overlay, tick) {
                    Ok(()) => break outcome,
                    Err(stale) => {
                        debug!(order = %order, error = %stale, "replanning against fresh overlay");
                        overlay = zones.overlay_at(net, tick);
                        retries += 1;
                        if retries > self.config.max_stale_retries {
                            break Err(stale.into());
                        }
                    }
                }
            };

            match outcome {
                Ok((vehicle, route)) => match self.reserve(vehicle, order, route, tick) {
                    Ok(()) => report.assigned.push((order, vehicle)),
                    Err(e) => {
                        warn!(order = %order, vehicle = %vehicle, error = %e, "reservation failed");
                        report.backlog.push(order);
                    }
                },
                Err(FleetError::Routing(RoutingError::NotFeasible { .. }))
                    if self.config.on_infeasible == InfeasiblePolicy::Fail =>
                {
                    match self.set_status(order, OrderStatus::Failed, Some(FailureReason::NotFeasible), tick) {
                        Ok(()) => report.failed.push(order),
                        Err(e) => warn!(order = %order, error = %e, "could not fail order"),
                    }
                }
                Err(e) => {
                    debug!(order = %order, error = %e, "order stays pending");
                    report.backlog.push(order);
                }
            }
        }
        report
    }

    // ── Transitions ───────────────────────────────────────────────────────

    /// Idle → Assigned, binding `vehicle`, `order` and `route`.
    pub fn reserve(&mut self, vehicle: VehicleId, order: OrderId, route: Route, tick: Tick) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        let v = &self.vehicles[vi];
        if v.state != VehicleState::Idle {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "reserve" });
        }
        let status = self.order(order)?.status;
        if status != OrderStatus::Pending {
            return Err(FleetError::OrderClosed { order, status });
        }

        if let Some(o) = self.orders.get_mut(&order) {
            o.vehicle = Some(vehicle);
        }
        self.set_status(order, OrderStatus::Assigned, None, tick)?;

        let v = &mut self.vehicles[vi];
        v.state = VehicleState::Assigned;
        v.order = Some(order);
        v.route = Some(Arc::new(route));
        v.route_pos = 0;
        v.targets_reached = 0;
        info!(vehicle = %vehicle, order = %order, "vehicle assigned");
        Ok(())
    }

    /// Assigned → EnRoute / Delivering; order → InProgress.
    ///
    /// If the first route step is a charging stop the vehicle immediately
    /// requests a slot.
    pub fn depart(&mut self, vehicle: VehicleId, tick: Tick, tick_secs: f64) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        let v = &self.vehicles[vi];
        let (Some(order), Some(route)) = (v.order, v.route.clone()) else {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "depart" });
        };
        if v.state != VehicleState::Assigned {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "depart" });
        }
        self.set_status(order, OrderStatus::InProgress, None, tick)?;

        let v = &mut self.vehicles[vi];
        v.route_pos = 0;
        v.state = moving_state(&route, 0);
        let here = v.location;
        if let Location::AtNode(n) = here {
            self.note_node_reached(vi, n)?;
        }
        debug!(vehicle = %vehicle, order = %order, state = %self.vehicles[vi].state, "departed");

        if self.vehicles[vi].current_step().is_some_and(|s| s.is_charging_stop) {
            self.request_charge(vehicle, tick_secs)?;
        }
        Ok(())
    }

    /// Assigned → Faulted before departure; the order goes back to pending.
    pub fn fail_before_departure(&mut self, vehicle: VehicleId, tick: Tick) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        let v = &self.vehicles[vi];
        if v.state != VehicleState::Assigned {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "fail before departure" });
        }
        let order = v.order;
        if let Some(order) = order {
            self.set_status(order, OrderStatus::Pending, None, tick)?;
            if let Some(o) = self.orders.get_mut(&order) {
                o.vehicle = None;
            }
        }
        let v = &mut self.vehicles[vi];
        v.state = VehicleState::Faulted;
        v.end_trip();
        warn!(vehicle = %vehicle, "vehicle faulted before departure; order released");
        Ok(())
    }

    /// Update position, route cursor and battery of a flying vehicle.
    pub fn record_progress(
        &mut self,
        vehicle:   VehicleId,
        location:  Location,
        route_pos: usize,
        battery:   f64,
    ) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        let v = &mut self.vehicles[vi];
        if !v.state.is_moving() {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "move" });
        }
        // Nodes flown through this tick, in route order.
        let reached: Vec<NodeId> = match v.route.as_deref() {
            Some(route) if route_pos > v.route_pos => route
                .steps
                .get(v.route_pos + 1..=route_pos)
                .unwrap_or_default()
                .iter()
                .map(|s| s.node)
                .collect(),
            _ => location.node().into_iter().collect(),
        };
        v.location = location;
        v.route_pos = route_pos;
        v.battery = battery.clamp(0.0, 1.0);
        if let Some(route) = v.route.clone() {
            v.state = moving_state(&route, route_pos);
        }
        for n in reached {
            self.note_node_reached(vi, n)?;
        }
        Ok(())
    }

    /// Count order stops satisfied by standing at `node`.
    fn note_node_reached(&mut self, vi: usize, node: NodeId) -> FleetResult<()> {
        let Some(order) = self.vehicles[vi].order else { return Ok(()) };
        let o = self.order(order)?;
        let targets: Vec<NodeId> = std::iter::once(o.origin).chain(o.waypoints.iter().copied()).collect();
        let v = &mut self.vehicles[vi];
        while v.targets_reached < targets.len() && targets[v.targets_reached] == node {
            v.targets_reached += 1;
        }
        Ok(())
    }

    /// Ticks needed to charge `vehicle` to its route's charge target.
    pub fn charge_ticks(&self, vehicle: &Vehicle, tick_secs: f64) -> FleetResult<u32> {
        let profile = self.profile_of(vehicle)?;
        let target = vehicle.route.as_ref().map_or(1.0, |r| r.charge_target);
        let secs = profile.charge_secs(vehicle.battery, target);
        let ticks = if tick_secs > 0.0 { (secs / tick_secs).ceil() } else { 1.0 };
        Ok((ticks as u32).max(1))
    }

    /// At a planned charging stop: ask the station for a slot.
    ///
    /// Admitted → Charging; otherwise → WaitingForSlot.
    pub fn request_charge(&mut self, vehicle: VehicleId, tick_secs: f64) -> FleetResult<SlotGrant> {
        let vi = self.vidx(vehicle)?;
        let v = &self.vehicles[vi];
        let station = match (v.state.is_moving(), v.location) {
            (true, Location::AtNode(n)) => n,
            _ => return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "request charge" }),
        };
        let grant = self.stations.request_slot(station, vehicle)?;
        match grant {
            SlotGrant::Admitted => self.start_charging(vi, tick_secs)?,
            SlotGrant::Queued { position } => {
                self.vehicles[vi].state = VehicleState::WaitingForSlot;
                debug!(vehicle = %vehicle, station = %station, position, "waiting for slot");
            }
        }
        Ok(grant)
    }

    fn start_charging(&mut self, vi: usize, tick_secs: f64) -> FleetResult<()> {
        let ticks = self.charge_ticks(&self.vehicles[vi], tick_secs)?;
        let v = &mut self.vehicles[vi];
        v.state = VehicleState::Charging;
        v.charge_ticks_left = ticks;
        debug!(vehicle = %v.id, ticks, "charging");
        Ok(())
    }

    /// One tick on the pad.  On completion the slot is released, the queue
    /// head admitted, and the vehicle resumes its route.
    ///
    /// Returns vehicles admitted to a slot as a result.
    pub fn charge_step(&mut self, vehicle: VehicleId, tick_secs: f64) -> FleetResult<Vec<VehicleId>> {
        let vi = self.vidx(vehicle)?;
        let rate = self.profile_of(&self.vehicles[vi])?.charge_rate_per_sec;
        let v = &mut self.vehicles[vi];
        if v.state != VehicleState::Charging {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "charge" });
        }
        let target = v.route.as_ref().map_or(1.0, |r| r.charge_target);
        v.battery = (v.battery + rate * tick_secs).min(target.max(v.battery));
        v.charge_ticks_left = v.charge_ticks_left.saturating_sub(1);
        if v.charge_ticks_left > 0 {
            return Ok(Vec::new());
        }

        v.battery = v.battery.max(target).min(1.0);
        let station = v.location.node().ok_or(FleetError::InvariantViolation {
            vehicle,
            detail: "charging off-node".into(),
        })?;
        v.state = match &v.route {
            Some(r) if r.charge_stop_ahead(v.route_pos) => VehicleState::EnRoute,
            _ => VehicleState::Delivering,
        };
        debug!(vehicle = %vehicle, battery = v.battery, "charging finished");

        let mut admitted = Vec::new();
        if let Some(next) = self.stations.release_slot(station, vehicle)? {
            self.admit(next, tick_secs)?;
            admitted.push(next);
        }
        Ok(admitted)
    }

    fn admit(&mut self, vehicle: VehicleId, tick_secs: f64) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        if self.vehicles[vi].state != VehicleState::WaitingForSlot {
            return Err(FleetError::InvariantViolation {
                vehicle,
                detail: format!("admitted while {}", self.vehicles[vi].state),
            });
        }
        self.start_charging(vi, tick_secs)
    }

    /// Whether `vehicle` stands on its order's destination with every
    /// earlier stop visited.
    pub fn at_destination(&self, vehicle: VehicleId) -> FleetResult<bool> {
        let v = self.vehicle(vehicle)?;
        let Some(order) = v.order else { return Ok(false) };
        let o = self.order(order)?;
        Ok(v.location.node() == Some(o.destination) && v.targets_reached > o.waypoints.len())
    }

    /// Arrived at the destination: order Completed, vehicle Idle.
    ///
    /// Refused anywhere but the order's current destination.
    pub fn complete(&mut self, vehicle: VehicleId, tick: Tick) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        let v = &self.vehicles[vi];
        let Some(order) = v.order.filter(|_| v.state.is_moving()) else {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "complete" });
        };
        if !self.at_destination(vehicle)? {
            let state = self.vehicles[vi].state;
            return Err(FleetError::InvalidTransition { vehicle, state, action: "complete away from destination" });
        }
        self.set_status(order, OrderStatus::Completed, None, tick)?;
        let v = &mut self.vehicles[vi];
        v.state = VehicleState::Idle;
        v.end_trip();
        info!(vehicle = %vehicle, order = %order, "order completed");
        Ok(())
    }

    /// End the trip of an active vehicle, failing its order.
    fn end_trip_with_failure(
        &mut self,
        vi:        usize,
        reason:    FailureReason,
        new_state: VehicleState,
        tick:      Tick,
        tick_secs: f64,
    ) -> FleetResult<()> {
        let vehicle = self.vehicles[vi].id;
        for (_, next) in self.stations.withdraw(vehicle) {
            self.admit(next, tick_secs)?;
        }
        let order = self.vehicles[vi].order;
        if let Some(order) = order {
            self.set_status(order, OrderStatus::Failed, Some(reason), tick)?;
        }
        let v = &mut self.vehicles[vi];
        v.state = new_state;
        v.end_trip();
        Ok(())
    }

    /// Safety fault: vehicle Faulted, order Failed.  Other vehicles are
    /// unaffected.
    pub fn fault(
        &mut self,
        vehicle:   VehicleId,
        reason:    FailureReason,
        detail:    &str,
        tick:      Tick,
        tick_secs: f64,
    ) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        let state = self.vehicles[vi].state;
        if !state.is_underway() {
            return Err(FleetError::InvalidTransition { vehicle, state, action: "fault" });
        }
        error!(vehicle = %vehicle, reason = reason.as_str(), detail, "vehicle faulted");
        self.end_trip_with_failure(vi, reason, VehicleState::Faulted, tick, tick_secs)
    }

    /// Stop at the nearer node of the current edge, fail the order as
    /// cancelled, go idle.  No battery is spent.  Returns the stop node.
    pub fn abort(&mut self, vehicle: VehicleId, net: &AirNetwork, tick: Tick, tick_secs: f64) -> FleetResult<NodeId> {
        let vi = self.vidx(vehicle)?;
        let state = self.vehicles[vi].state;
        if !state.is_underway() {
            return Err(FleetError::InvalidTransition { vehicle, state, action: "abort" });
        }
        let node = self.vehicles[vi].location.nearest_node(net);
        self.vehicles[vi].location = Location::AtNode(node);
        self.end_trip_with_failure(vi, FailureReason::Cancelled, VehicleState::Idle, tick, tick_secs)?;
        info!(vehicle = %vehicle, node = %node, "trip aborted");
        Ok(node)
    }

    /// Give up the trip at the current node (e.g. replanning found no
    /// route): order Failed, vehicle Idle.
    pub fn abandon(&mut self, vehicle: VehicleId, reason: FailureReason, tick: Tick, tick_secs: f64) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        let v = &self.vehicles[vi];
        if !v.state.is_underway() || v.location.node().is_none() {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "abandon" });
        }
        warn!(vehicle = %vehicle, reason = reason.as_str(), "trip abandoned");
        self.end_trip_with_failure(vi, reason, VehicleState::Idle, tick, tick_secs)
    }

    /// Swap in a replanned route starting at the vehicle's node.
    pub fn replace_route(&mut self, vehicle: VehicleId, route: Route) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        let v = &mut self.vehicles[vi];
        let here = v.location.node();
        let valid_state = v.state.is_moving() || v.state == VehicleState::Assigned;
        if !valid_state || here.is_none() || route.origin() != here {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "replace route" });
        }
        if v.state.is_moving() {
            v.state = moving_state(&route, 0);
        }
        v.route = Some(Arc::new(route));
        v.route_pos = 0;
        v.replan_requested = false;
        debug!(vehicle = %vehicle, "route replaced");
        Ok(())
    }

    /// Faulted → Idle at the nearest node, battery unchanged.
    pub fn repair_vehicle(&mut self, vehicle: VehicleId, net: &AirNetwork) -> FleetResult<()> {
        let vi = self.vidx(vehicle)?;
        let v = &mut self.vehicles[vi];
        if v.state != VehicleState::Faulted {
            return Err(FleetError::InvalidTransition { vehicle, state: v.state, action: "repair" });
        }
        v.location = Location::AtNode(v.location.nearest_node(net));
        v.state = VehicleState::Idle;
        v.end_trip();
        info!(vehicle = %vehicle, "vehicle repaired");
        Ok(())
    }

    /// Cancel an order.
    ///
    /// Pending orders are removed outright.  Assigned orders fail and free
    /// their vehicle.  In-progress orders schedule an abort for the next tick.
    pub fn cancel_order(&mut self, order: OrderId, tick: Tick) -> FleetResult<CancelOutcome> {
        let o = self.order(order)?;
        match o.status {
            OrderStatus::Pending => {
                self.orders.remove(&order);
                debug!(order = %order, "pending order removed");
                Ok(CancelOutcome::Removed)
            }
            OrderStatus::Assigned => {
                let vehicle = o.vehicle;
                self.set_status(order, OrderStatus::Failed, Some(FailureReason::Cancelled), tick)?;
                if let Some(vi) = vehicle.and_then(|v| self.vidx(v).ok()) {
                    let v = &mut self.vehicles[vi];
                    v.state = VehicleState::Idle;
                    v.end_trip();
                }
                Ok(CancelOutcome::Failed)
            }
            OrderStatus::InProgress => {
                let vehicle = o.vehicle.ok_or(FleetError::OrderNotFound(order))?;
                let vi = self.vidx(vehicle)?;
                self.vehicles[vi].abort_requested = true;
                debug!(order = %order, vehicle = %vehicle, "abort scheduled");
                Ok(CancelOutcome::AbortScheduled)
            }
            status => Err(FleetError::OrderClosed { order, status }),
        }
    }

    /// Point an open order at a new destination.  A bound vehicle replans at
    /// its next node.
    pub fn update_destination(&mut self, order: OrderId, destination: NodeId, net: &AirNetwork) -> FleetResult<()> {
        net.check_node(destination)?;
        let o = self.orders.get_mut(&order).ok_or(FleetError::OrderNotFound(order))?;
        if o.status.is_terminal() {
            return Err(FleetError::OrderClosed { order, status: o.status });
        }
        o.destination = destination;
        if let Some(vi) = o.vehicle.map(|v| v.index()) {
            if let Some(v) = self.vehicles.get_mut(vi) {
                v.replan_requested = true;
            }
        }
        debug!(order = %order, destination = %destination, "destination updated");
        Ok(())
    }

    // ── Snapshot / restore ────────────────────────────────────────────────

    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            vehicles:   self.vehicles.clone(),
            orders:     self.orders.values().cloned().collect(),
            stations:   self.stations.states().to_vec(),
            next_order: self.next_order,
        }
    }

    /// Replace all mutable fleet state.  Profiles are kept.
    ///
    /// The snapshot is checked against `net` first: order stops must be
    /// nodes of it and station occupancy must fit its capacities.  On
    /// error the current state is left untouched.
    pub fn restore(&mut self, snap: FleetSnapshot, net: &AirNetwork) -> FleetResult<()> {
        for v in &snap.vehicles {
            self.profile(v.profile)?;
        }
        for o in &snap.orders {
            net.check_node(o.origin)?;
            net.check_node(o.destination)?;
            for &w in &o.waypoints {
                net.check_node(w)?;
            }
        }
        let stations = StationManager::from_states(net, snap.stations)?;
        self.vehicles = snap.vehicles;
        self.orders = snap.orders.into_iter().map(|o| (o.id, o)).collect();
        self.stations = stations;
        self.next_order = snap.next_order;
        self.events.clear();
        Ok(())
    }
}

/// Flying state for a vehicle past step `pos` of `route`.
fn moving_state(route: &Route, pos: usize) -> VehicleState {
    if route.charge_stop_ahead(pos) {
        VehicleState::EnRoute
    } else {
        VehicleState::Delivering
    }
}
