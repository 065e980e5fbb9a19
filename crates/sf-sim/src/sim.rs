//! The `Sim` struct and its tick loop.

use sf_core::{GeoPoint, OrderId, SimClock, SimConfig, Tick, VehicleId, ZoneId};
use sf_fleet::{
    CancelOutcome, Dispatcher, Endpoint, FailureReason, FleetError, FleetResult, Geocoder,
    OrderEvent, OrderRequest, OrderStatus, Vehicle, VehicleState,
};
use sf_routing::Router;
use sf_spatial::{ActiveWindow, AirNetwork, NoFlyZone, Overlay, ZoneRegistry};
use tracing::{debug, error, info, warn};

use crate::movement::{advance, Movement, StopReason};
use crate::persist::{SimState, StateStore, STATE_KEY};
use crate::{SimError, SimObserver, SimResult, TickSummary, VehicleSnapshot};

/// Upper bound for the global wind speed, m/s.
pub const MAX_WIND_MPS: f64 = 40.0;

// ── Sim ───────────────────────────────────────────────────────────────────────

/// The main simulation runner.
///
/// `Sim<R>` holds all simulation state and drives the tick loop:
///
/// 1. **Aborts**: vehicles whose order was cancelled in flight stop at the
///    nearer node of their edge and go idle.  No battery is spent.
/// 2. **Departures**: vehicles assigned by the previous dispatch pass take
///    off.  A route that the current overlay now blocks is replanned first;
///    if that fails the vehicle is released and the order goes back to
///    pending.
/// 3. **Movement** (optionally parallel with the `parallel` feature): every
///    flying vehicle is advanced by [`advance`], a pure function of the
///    vehicle, its profile, the network, and the overlay snapshot.
/// 4. **Apply** (sequential, ascending `VehicleId` for determinism): each
///    movement outcome is turned into a dispatcher transition: progress,
///    slot request, completion, reroute, or fault.
/// 5. **Charging**: vehicles that were on a pad at the start of the tick
///    charge for one tick; finished vehicles release their slot.
/// 6. **Dispatch**: pending orders are matched to idle vehicles.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim<R: Router> {
    /// Global configuration (total ticks, seed, tick duration, …).
    pub config: SimConfig,

    /// Simulation clock: tracks the current tick and maps to wall time.
    pub clock: SimClock,

    /// Navigable graph.  Immutable for the lifetime of the simulation.
    pub network: AirNetwork,

    /// No-fly zones.  May change between ticks; every tick plans against a
    /// fresh overlay snapshot.
    pub zones: ZoneRegistry,

    /// Owner of every vehicle, order, and station slot.
    pub dispatcher: Dispatcher,

    /// Route planner used for dispatch and in-flight replanning.
    pub router: R,

    wind_mps: f64,
}

impl<R: Router> Sim<R> {
    pub(crate) fn from_parts(
        config:     SimConfig,
        network:    AirNetwork,
        zones:      ZoneRegistry,
        dispatcher: Dispatcher,
        router:     R,
        wind_mps:   f64,
    ) -> Self {
        Self {
            clock: config.make_clock(),
            config,
            network,
            zones,
            dispatcher,
            router,
            wind_mps: wind_mps.clamp(0.0, MAX_WIND_MPS),
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run the simulation from the current tick to `config.end_tick()`.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        while self.clock.current_tick < self.config.end_tick() {
            self.tick(observer)?;
        }
        info!(tick = %self.clock.current_tick, "simulation finished");
        observer.on_sim_end(self.clock.current_tick);
        Ok(())
    }

    /// Run exactly `n` ticks from the current position (ignores `end_tick`).
    pub fn run_ticks<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        for _ in 0..n {
            self.tick(observer)?;
        }
        Ok(())
    }

    fn tick<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let now = self.clock.current_tick;
        observer.on_tick_start(now);
        let (summary, events) = self.process_tick(now)?;
        for event in &events {
            observer.on_order_event(event);
        }
        observer.on_tick_end(now, &summary);
        if self.config.output_interval_ticks > 0
            && now.0.is_multiple_of(self.config.output_interval_ticks)
        {
            observer.on_snapshot(now, &self.vehicle_snapshots());
        }
        self.clock.advance();
        Ok(())
    }

    pub fn wind_mps(&self) -> f64 {
        self.wind_mps
    }

    /// Set the global wind speed, clamped to `[0, MAX_WIND_MPS]`.
    pub fn set_wind(&mut self, mps: f64) {
        self.wind_mps = mps.clamp(0.0, MAX_WIND_MPS);
        debug!(wind_mps = self.wind_mps, "wind updated");
    }

    /// Status of every vehicle, ascending id.
    pub fn vehicle_snapshots(&self) -> Vec<VehicleSnapshot> {
        let tick_secs = self.clock.tick_secs();
        self.dispatcher
            .vehicles()
            .iter()
            .map(|v| {
                let remaining_m = v.remaining_m(&self.network);
                let flight_secs = match self.dispatcher.profile_of(v) {
                    Ok(p) => remaining_m / p.effective_speed(self.wind_mps),
                    Err(_) => 0.0,
                };
                VehicleSnapshot {
                    id:          v.id,
                    position:    v.position(&self.network),
                    battery:     v.battery,
                    state:       v.state,
                    order:       v.order,
                    remaining_m,
                    eta_secs:    flight_secs + f64::from(v.charge_ticks_left) * tick_secs,
                }
            })
            .collect()
    }

    // ── Orders ────────────────────────────────────────────────────────────

    /// Resolve and submit an order at the current tick.
    pub fn submit_order(&mut self, req: &OrderRequest, geocoder: &dyn Geocoder) -> SimResult<OrderId> {
        let now = self.clock.current_tick;
        Ok(self.dispatcher.submit_request(req, &self.network, geocoder, now)?)
    }

    pub fn cancel_order(&mut self, order: OrderId) -> SimResult<CancelOutcome> {
        Ok(self.dispatcher.cancel_order(order, self.clock.current_tick)?)
    }

    /// Return a faulted vehicle to service at its nearest node.
    pub fn repair_vehicle(&mut self, vehicle: VehicleId) -> SimResult<()> {
        Ok(self.dispatcher.repair_vehicle(vehicle, &self.network)?)
    }

    pub fn update_destination(
        &mut self,
        order:       OrderId,
        destination: &Endpoint,
        geocoder:    &dyn Geocoder,
    ) -> SimResult<()> {
        let node = destination.resolve(&self.network, geocoder)?;
        Ok(self.dispatcher.update_destination(order, node, &self.network)?)
    }

    // ── Zones ─────────────────────────────────────────────────────────────

    pub fn add_zone(&self, polygon: Vec<GeoPoint>, window: Option<ActiveWindow>) -> SimResult<ZoneId> {
        Ok(self.zones.register(polygon, window)?)
    }

    /// Axis-aligned zone between two opposite lat/lon corners.
    pub fn add_zone_rect(&self, a: GeoPoint, b: GeoPoint, window: Option<ActiveWindow>) -> SimResult<ZoneId> {
        Ok(self.zones.register_rect(a, b, window)?)
    }

    pub fn remove_zone(&self, id: ZoneId) -> SimResult<std::sync::Arc<NoFlyZone>> {
        Ok(self.zones.remove(id)?)
    }

    // ── Snapshot / restore ────────────────────────────────────────────────

    pub fn serialize_state(&self) -> SimResult<Vec<u8>> {
        let state = SimState {
            tick:     self.clock.current_tick,
            wind_mps: self.wind_mps,
            fleet:    self.dispatcher.snapshot(),
        };
        Ok(serde_json::to_vec(&state)?)
    }

    /// Replace vehicles, orders, station slots, tick, and wind from a blob
    /// written by [`serialize_state`][Self::serialize_state].
    pub fn restore_state(&mut self, blob: &[u8]) -> SimResult<()> {
        let state: SimState = serde_json::from_slice(blob)?;
        for v in &state.fleet.vehicles {
            self.check_vehicle_on_network(v)?;
        }
        self.dispatcher.restore(state.fleet, &self.network)?;
        self.clock.current_tick = state.tick;
        self.wind_mps = state.wind_mps.clamp(0.0, MAX_WIND_MPS);
        info!(tick = %state.tick, "state restored");
        Ok(())
    }

    pub fn checkpoint(&self, store: &mut dyn StateStore) -> SimResult<()> {
        store.put(STATE_KEY, self.serialize_state()?)
    }

    pub fn restore_from(&mut self, store: &dyn StateStore) -> SimResult<()> {
        let blob = store
            .get(STATE_KEY)?
            .ok_or_else(|| SimError::MissingState(STATE_KEY.to_owned()))?;
        self.restore_state(&blob)
    }

    fn check_vehicle_on_network(&self, v: &Vehicle) -> SimResult<()> {
        self.network.check_node(v.home)?;
        match v.location {
            sf_fleet::Location::AtNode(n) => {
                self.network.check_node(n)?;
            }
            sf_fleet::Location::OnEdge { edge, .. } => {
                if edge.index() >= self.network.edge_count() {
                    return Err(SimError::Config(format!("{} is on unknown {edge}", v.id)));
                }
            }
        }
        Ok(())
    }

    // ── Core tick processing ──────────────────────────────────────────────

    fn process_tick(&mut self, now: Tick) -> SimResult<(TickSummary, Vec<OrderEvent>)> {
        let tick_secs = self.clock.tick_secs();

        // ── Phase 1: aborts requested since the last tick ─────────────────
        let aborting = self.vehicles_where(|v| v.abort_requested);
        for vehicle in aborting {
            let result = self.dispatcher.abort(vehicle, &self.network, now, tick_secs).map(drop);
            self.isolate(vehicle, result, now)?;
        }

        let overlay = self.zones.overlay_at(&self.network, now);
        let charging = self.vehicles_where(|v| v.state == VehicleState::Charging);

        // ── Phase 2: departures ───────────────────────────────────────────
        let departing = self.vehicles_where(|v| v.state == VehicleState::Assigned);
        for vehicle in departing {
            let result = self.depart(vehicle, &overlay, now, tick_secs);
            self.isolate(vehicle, result, now)?;
        }

        // ── Phase 3: movement (produce) ───────────────────────────────────
        let movements = self.compute_movements(&overlay, tick_secs);

        // ── Phase 4: apply (consume) ──────────────────────────────────────
        //
        // Outcomes arrive in ascending VehicleId order, so station queues
        // fill in the same order regardless of how the movement phase ran.
        for (vehicle, mv) in movements {
            let result = self.apply_movement(vehicle, mv, &overlay, now, tick_secs);
            self.isolate(vehicle, result, now)?;
        }

        // ── Phase 5: charging ─────────────────────────────────────────────
        for vehicle in charging {
            if self.dispatcher.vehicle(vehicle)?.state != VehicleState::Charging {
                continue;
            }
            let result = self.dispatcher.charge_step(vehicle, tick_secs).map(|admitted| {
                for next in admitted {
                    debug!(vehicle = %next, "admitted to charging slot");
                }
            });
            self.isolate(vehicle, result, now)?;
        }
        // Vehicles holding a slot beyond a station's capacity are faulted.
        let breaches = self.dispatcher.stations().check_capacity();
        for (vehicle, breach) in breaches {
            self.isolate(vehicle, Err(breach), now)?;
        }

        // ── Phase 6: dispatch ─────────────────────────────────────────────
        let report = self.dispatcher.dispatch_pass(&self.network, &self.zones, &self.router, now);

        let events = self.dispatcher.drain_events();
        let mut summary = TickSummary {
            tick:       now,
            dispatched: report.assigned.len(),
            backlog:    report.backlog.len(),
            completed:  events.iter().filter(|e| e.new == OrderStatus::Completed).count(),
            failed:     events.iter().filter(|e| e.new == OrderStatus::Failed).count(),
            ..TickSummary::default()
        };
        for v in self.dispatcher.vehicles() {
            match v.state {
                VehicleState::Idle | VehicleState::Assigned => summary.idle += 1,
                VehicleState::EnRoute | VehicleState::Delivering => summary.flying += 1,
                VehicleState::Charging => summary.charging += 1,
                VehicleState::WaitingForSlot => summary.waiting += 1,
                VehicleState::Faulted => summary.faulted += 1,
            }
        }
        debug!(
            tick = %now,
            flying = summary.flying,
            charging = summary.charging,
            backlog = summary.backlog,
            "tick processed"
        );
        Ok((summary, events))
    }

    fn vehicles_where(&self, pred: impl Fn(&Vehicle) -> bool) -> Vec<VehicleId> {
        self.dispatcher.vehicles().iter().filter(|v| pred(v)).map(|v| v.id).collect()
    }

    /// Take off, replanning first if the assigned route went stale.
    fn depart(&mut self, vehicle: VehicleId, overlay: &Overlay, now: Tick, tick_secs: f64) -> FleetResult<()> {
        let v = self.dispatcher.vehicle(vehicle)?;
        let stale = v.replan_requested
            || v.route.as_ref().is_none_or(|r| {
                r.overlay_key != overlay.key() && r.first_blocked_after(overlay, 0).is_some()
            });
        if stale {
            match self.dispatcher.replan(vehicle, &self.network, overlay, &self.router) {
                Ok(route) => self.dispatcher.replace_route(vehicle, route)?,
                Err(e) => {
                    warn!(vehicle = %vehicle, error = %e, "assigned route no longer feasible");
                    return self.dispatcher.fail_before_departure(vehicle, now);
                }
            }
        }
        self.dispatcher.depart(vehicle, now, tick_secs)
    }

    /// Advance every flying vehicle.  Read-only; with the `parallel` feature
    /// this runs on Rayon's thread pool.
    fn compute_movements(&self, overlay: &Overlay, tick_secs: f64) -> Vec<(VehicleId, Movement)> {
        // Explicit field borrows so the closure only captures shared refs.
        let net        = &self.network;
        let dispatcher = &self.dispatcher;
        let wind       = self.wind_mps;

        let movers: Vec<&Vehicle> = dispatcher.vehicles().iter().filter(|v| v.state.is_moving()).collect();
        let step = |v: &&Vehicle| -> Option<(VehicleId, Movement)> {
            let profile = dispatcher.profile_of(v).ok()?;
            let speed = profile.effective_speed(wind);
            Some((v.id, advance(net, overlay, profile, v, speed, tick_secs)))
        };

        #[cfg(not(feature = "parallel"))]
        {
            movers.iter().filter_map(step).collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            movers.par_iter().filter_map(step).collect()
        }
    }

    fn apply_movement(
        &mut self,
        vehicle:   VehicleId,
        mv:        Movement,
        overlay:   &Overlay,
        now:       Tick,
        tick_secs: f64,
    ) -> FleetResult<()> {
        self.dispatcher.record_progress(vehicle, mv.location, mv.route_pos, mv.battery)?;
        match mv.stop {
            StopReason::InTransit => Ok(()),
            StopReason::ChargeStop => self.dispatcher.request_charge(vehicle, tick_secs).map(drop),
            StopReason::Arrived if self.dispatcher.at_destination(vehicle)? => {
                self.dispatcher.complete(vehicle, now)
            }
            // End of a route that no longer ends at the order's destination.
            StopReason::Arrived => self.reroute(vehicle, overlay, now, tick_secs),
            StopReason::Replan => self.reroute(vehicle, overlay, now, tick_secs),
            StopReason::Depleted => self.dispatcher.fault(
                vehicle,
                FailureReason::BatteryDepleted,
                "battery exhausted before the next charging stop",
                now,
                tick_secs,
            ),
        }
    }

    /// Replace the route of a vehicle standing on a node.  Gives the order up
    /// if no feasible route remains.
    fn reroute(&mut self, vehicle: VehicleId, overlay: &Overlay, now: Tick, tick_secs: f64) -> FleetResult<()> {
        match self.dispatcher.replan(vehicle, &self.network, overlay, &self.router) {
            Ok(route) => {
                let charge_first = route.steps.first().is_some_and(|s| s.is_charging_stop);
                self.dispatcher.replace_route(vehicle, route)?;
                info!(vehicle = %vehicle, "rerouted");
                if charge_first {
                    self.dispatcher.request_charge(vehicle, tick_secs)?;
                }
                Ok(())
            }
            Err(FleetError::Routing(e)) => {
                warn!(vehicle = %vehicle, error = %e, "no feasible reroute");
                self.dispatcher.abandon(vehicle, FailureReason::NotFeasible, now, tick_secs)
            }
            Err(e) => Err(e),
        }
    }

    /// Contain a failed transition to its own vehicle: log it and take the
    /// vehicle out of service.  Errors only if that, too, fails.
    fn isolate(&mut self, vehicle: VehicleId, result: FleetResult<()>, now: Tick) -> SimResult<()> {
        let Err(e) = result else { return Ok(()) };
        error!(vehicle = %vehicle, error = %e, "transition failed");
        let state = self.dispatcher.vehicle(vehicle)?.state;
        if state == VehicleState::Assigned {
            self.dispatcher.fail_before_departure(vehicle, now)?;
        } else if state.is_underway() {
            let detail = e.to_string();
            self.dispatcher.fault(vehicle, FailureReason::Invariant, &detail, now, self.clock.tick_secs())?;
        }
        Ok(())
    }
}
