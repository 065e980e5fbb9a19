//! Unit tests for sf-fleet.

#[cfg(test)]
mod helpers {
    use sf_core::{GeoPoint, NodeId, ProfileId, VehicleKind, VehicleProfile};
    use sf_routing::{EnergyRouter, RouterConfig};
    use sf_spatial::{AirNetwork, AirNetworkBuilder, NodeKind};

    use crate::{DispatchConfig, Dispatcher};

    /// ```text
    /// base0 ─ j1 ─ st2 ─ j3 ─ base4        iso5 (unconnected)
    /// ```
    /// 1 000 m links.
    pub fn line() -> (AirNetwork, [NodeId; 6]) {
        let mut b = AirNetworkBuilder::new();
        let n0 = b.add_node(GeoPoint::new(0.0, 0.00), NodeKind::Base);
        let n1 = b.add_node(GeoPoint::new(0.0, 0.01), NodeKind::Junction);
        let n2 = b.add_node(GeoPoint::new(0.0, 0.02), NodeKind::ChargingStation { slot_capacity: 1 });
        let n3 = b.add_node(GeoPoint::new(0.0, 0.03), NodeKind::Junction);
        let n4 = b.add_node(GeoPoint::new(0.0, 0.04), NodeKind::Base);
        let n5 = b.add_node(GeoPoint::new(1.0, 1.00), NodeKind::Junction);
        b.add_link(n0, n1, 1_000.0);
        b.add_link(n1, n2, 1_000.0);
        b.add_link(n2, n3, 1_000.0);
        b.add_link(n3, n4, 1_000.0);
        (b.build(), [n0, n1, n2, n3, n4, n5])
    }

    pub fn router() -> EnergyRouter {
        EnergyRouter::new(RouterConfig { charge_dwell_secs: 60.0, ..RouterConfig::default() })
    }

    /// Dispatcher with one cargo and one operator profile registered.
    pub fn dispatcher(net: &AirNetwork, config: DispatchConfig) -> (Dispatcher, ProfileId, ProfileId) {
        let mut d = Dispatcher::new(net, config);
        let cargo = d.add_profile(VehicleProfile::standard(ProfileId(0), VehicleKind::Cargo));
        let op = d.add_profile(VehicleProfile::standard(ProfileId(0), VehicleKind::Operator));
        (d, cargo, op)
    }
}

// ── Orders ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod orders {
    use sf_core::{GeoPoint, VehicleKind};

    use crate::{Endpoint, OrderKind, OrderRequest, OrderStatus};

    #[test]
    fn keyword_classification() {
        assert_eq!(OrderKind::classify("Parcel to 5th avenue"), OrderKind::Delivery);
        assert_eq!(OrderKind::classify("aerial photo of the bridge"), OrderKind::Shooting);
        assert_eq!(OrderKind::classify("wash windows"), OrderKind::Work);
        assert_eq!(OrderKind::Shooting.required_vehicle(), VehicleKind::Operator);
    }

    #[test]
    fn explicit_kind_wins_over_text() {
        let req = OrderRequest::new(Endpoint::Address("parcel depot".into()), Endpoint::Coords(GeoPoint::new(0.0, 0.0)))
            .kind(OrderKind::Work);
        assert_eq!(req.resolved_kind(), OrderKind::Work);
        let req = OrderRequest::new(Endpoint::Address("video shoot".into()), Endpoint::Coords(GeoPoint::new(0.0, 0.0)));
        assert_eq!(req.resolved_kind(), OrderKind::Shooting);
    }

    #[test]
    fn status_moves_forward_only() {
        use OrderStatus::*;
        assert!(Pending.can_become(Assigned));
        assert!(Assigned.can_become(Pending));
        assert!(!InProgress.can_become(Pending));
        assert!(!Completed.can_become(Failed));
        assert!(!Pending.can_become(InProgress));
        assert!(Failed.is_terminal());
    }
}

// ── Stations ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod stations {
    use sf_core::VehicleId;

    use crate::{FleetError, SlotGrant, StationManager};

    #[test]
    fn fifo_admission_and_capacity() {
        let (net, [_, _, st, ..]) = super::helpers::line();
        let mut m = StationManager::from_network(&net);

        assert_eq!(m.request_slot(st, VehicleId(0)).unwrap(), SlotGrant::Admitted);
        assert_eq!(m.request_slot(st, VehicleId(1)).unwrap(), SlotGrant::Queued { position: 0 });
        assert_eq!(m.request_slot(st, VehicleId(2)).unwrap(), SlotGrant::Queued { position: 1 });
        // Asking again does not re-queue.
        assert_eq!(m.request_slot(st, VehicleId(1)).unwrap(), SlotGrant::Queued { position: 0 });
        assert_eq!(m.occupied(st), 1);
        assert!(m.check_capacity().is_empty());

        assert_eq!(m.release_slot(st, VehicleId(0)).unwrap(), Some(VehicleId(1)));
        assert_eq!(m.release_slot(st, VehicleId(1)).unwrap(), Some(VehicleId(2)));
        assert_eq!(m.release_slot(st, VehicleId(2)).unwrap(), None);
        assert_eq!(m.occupied(st), 0);
    }

    #[test]
    fn release_without_slot_is_invariant_violation() {
        let (net, [_, _, st, ..]) = super::helpers::line();
        let mut m = StationManager::from_network(&net);
        assert!(matches!(m.release_slot(st, VehicleId(9)), Err(FleetError::InvariantViolation { .. })));
    }

    #[test]
    fn saved_states_checked_against_network() {
        let (net, [n0, _, st, ..]) = super::helpers::line();
        let mut m = StationManager::from_network(&net);
        m.request_slot(st, VehicleId(0)).unwrap();
        m.request_slot(st, VehicleId(1)).unwrap();
        let mut saved = m.states().to_vec();
        let back = StationManager::from_states(&net, saved.clone()).unwrap();
        assert_eq!(back.queue_len(st), 1);

        // A second vehicle on a one-slot pad.
        saved[0].occupied.push(VehicleId(2));
        assert!(matches!(
            StationManager::from_states(&net, saved.clone()),
            Err(FleetError::CapacityExceeded { station, capacity: 1 }) if station == st
        ));

        saved[0].occupied.pop();
        saved[0].node = n0;
        assert!(matches!(
            StationManager::from_states(&net, saved),
            Err(FleetError::StationNotFound(n)) if n == n0
        ));
    }

    #[test]
    fn withdraw_admits_next() {
        let (net, [_, _, st, ..]) = super::helpers::line();
        let mut m = StationManager::from_network(&net);
        m.request_slot(st, VehicleId(0)).unwrap();
        m.request_slot(st, VehicleId(1)).unwrap();
        m.request_slot(st, VehicleId(2)).unwrap();
        assert!(m.cancel_wait(st, VehicleId(1)));
        assert_eq!(m.withdraw(VehicleId(0)), vec![(st, VehicleId(2))]);
        assert_eq!(m.queue_len(st), 0);
    }

    #[test]
    fn non_station_rejected() {
        let (net, [n0, ..]) = super::helpers::line();
        let mut m = StationManager::from_network(&net);
        assert!(matches!(m.request_slot(n0, VehicleId(0)), Err(FleetError::StationNotFound(_))));
    }
}

// ── Geocoding ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod geocode {
    use sf_core::{GeoPoint, Tick};

    use crate::{DispatchConfig, Endpoint, FleetError, NoGeocoder, OrderKind, OrderRequest, StaticGeocoder};

    #[test]
    fn address_resolves_to_nearest_node() {
        let (net, [_, n1, _, n3, ..]) = super::helpers::line();
        let geo = StaticGeocoder::new()
            .with("Parcel Locker 7", GeoPoint::new(0.0001, 0.0101))
            .with("roof", GeoPoint::new(0.0, 0.0299));
        let (mut d, ..) = super::helpers::dispatcher(&net, DispatchConfig::default());
        let req = OrderRequest::new(Endpoint::Address("  parcel locker 7 ".into()), Endpoint::Address("ROOF".into()));
        let id = d.submit_request(&req, &net, &geo, Tick(0)).unwrap();
        let o = d.order(id).unwrap();
        assert_eq!((o.origin, o.destination), (n1, n3));
        assert_eq!(o.kind, OrderKind::Delivery);
    }

    #[test]
    fn unknown_address_is_reported() {
        let (net, _) = super::helpers::line();
        let (mut d, ..) = super::helpers::dispatcher(&net, DispatchConfig::default());
        let req = OrderRequest::new(Endpoint::Address("nowhere".into()), Endpoint::Coords(GeoPoint::new(0.0, 0.0)));
        let err = d.submit_request(&req, &net, &NoGeocoder, Tick(0));
        assert!(matches!(err, Err(FleetError::GeocodeNotFound(a)) if a == "nowhere"));
        assert!(d.pending_orders().is_empty());
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod dispatch {
    use sf_core::{NodeId, Tick, VehicleId};
    use sf_spatial::ZoneRegistry;

    use super::helpers::{dispatcher, line, router};
    use crate::{DispatchConfig, FleetError, InfeasiblePolicy, OrderKind, OrderStatus, VehicleState};

    #[test]
    fn nearest_vehicle_wins() {
        let (net, [n0, n1, _, n3, n4, _]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let far = d.add_vehicle(&net, cargo, n4, 1.0).unwrap();
        let near = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let order = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();

        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert_eq!(report.assigned, vec![(order, near)]);
        assert_eq!(d.vehicle(near).unwrap().state, VehicleState::Assigned);
        assert_eq!(d.vehicle(far).unwrap().state, VehicleState::Idle);
        assert_eq!(d.order(order).unwrap().status, OrderStatus::Assigned);
    }

    #[test]
    fn no_charge_beats_nearest() {
        let (net, [n0, n1, _, n3, n4, _]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        // 0.1 × 20 000 = 2 000 units: must charge at st2 to reach n3.
        let low = d.add_vehicle(&net, cargo, n0, 0.1).unwrap();
        let full = d.add_vehicle(&net, cargo, n4, 1.0).unwrap();
        let order = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();

        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert_eq!(report.assigned, vec![(order, full)]);
        assert!(d.vehicle(low).unwrap().is_idle());
    }

    #[test]
    fn equal_candidates_take_lowest_id() {
        let (net, [n0, n1, _, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let a = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let _b = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let order = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert_eq!(report.assigned, vec![(order, a)]);
    }

    #[test]
    fn vehicle_never_double_booked() {
        let (net, [n0, n1, _, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let v = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let o1 = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        let o2 = d.submit(&net, OrderKind::Delivery, n3, n1, vec![], None, Tick(0)).unwrap();
        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert_eq!(report.assigned, vec![(o1, v)]);
        assert_eq!(report.backlog, vec![o2]);
        assert_eq!(d.order(o2).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn kind_mismatch_leaves_backlog() {
        let (net, [n0, n1, _, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let order = d.submit(&net, OrderKind::Shooting, n1, n3, vec![], None, Tick(0)).unwrap();
        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert_eq!(report.backlog, vec![order]);
        assert!(d.drain_events().is_empty());
    }

    #[test]
    fn infeasible_policy() {
        let (net, [n0, n1, .., iso]) = line();

        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let keep = d.submit(&net, OrderKind::Delivery, n1, iso, vec![], None, Tick(0)).unwrap();
        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert_eq!(report.backlog, vec![keep]);

        let cfg = DispatchConfig { on_infeasible: InfeasiblePolicy::Fail, ..DispatchConfig::default() };
        let (mut d, cargo, _) = dispatcher(&net, cfg);
        d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let fail = d.submit(&net, OrderKind::Delivery, n1, iso, vec![], None, Tick(0)).unwrap();
        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert_eq!(report.failed, vec![fail]);
        assert_eq!(d.order(fail).unwrap().status, OrderStatus::Failed);
    }

    #[test]
    fn stale_overlay_detected() {
        use sf_core::GeoPoint;
        use crate::dispatch::ensure_current;

        let (net, _) = line();
        let zones = ZoneRegistry::new();
        let before = zones.overlay_at(&net, Tick(0));
        assert!(ensure_current(&zones, &before, Tick(0)).is_ok());
        zones.register_rect(GeoPoint::new(5.0, 5.0), GeoPoint::new(6.0, 6.0), None).unwrap();
        assert!(matches!(
            ensure_current(&zones, &before, Tick(0)),
            Err(sf_routing::RoutingError::StaleOverlay { .. })
        ));
    }

    #[test]
    fn off_network_nodes_rejected() {
        let (net, [n0, n1, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let bad = NodeId(99);

        let err = d.submit(&net, OrderKind::Delivery, bad, n1, vec![], None, Tick(0));
        assert!(matches!(err, Err(FleetError::Spatial(_))));
        assert!(d.submit(&net, OrderKind::Delivery, n0, bad, vec![], None, Tick(0)).is_err());
        assert!(d.submit(&net, OrderKind::Delivery, n0, n1, vec![bad], None, Tick(0)).is_err());
        assert!(d.pending_orders().is_empty());

        assert!(matches!(d.add_vehicle(&net, cargo, bad, 1.0), Err(FleetError::Spatial(_))));
        assert!(d.vehicles().is_empty());

        // The pass still runs with nothing to do.
        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert!(report.assigned.is_empty() && report.backlog.is_empty());
    }

    #[test]
    fn unknown_vehicle_is_an_error() {
        let (net, _) = line();
        let (d, ..) = dispatcher(&net, DispatchConfig::default());
        assert!(d.vehicle(VehicleId(3)).is_err());
    }
}

// ── Lifecycle transitions ─────────────────────────────────────────────────────

#[cfg(test)]
mod lifecycle {
    use sf_core::Tick;
    use sf_spatial::ZoneRegistry;

    use super::helpers::{dispatcher, line, router};
    use crate::{
        CancelOutcome, DispatchConfig, FailureReason, FleetError, Location, OrderKind, OrderStatus,
        VehicleState,
    };

    #[test]
    fn failure_before_departure_returns_order_to_pending() {
        let (net, [n0, n1, _, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let v = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let o = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));

        d.fail_before_departure(v, Tick(1)).unwrap();
        assert_eq!(d.vehicle(v).unwrap().state, VehicleState::Faulted);
        let order = d.order(o).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.vehicle, None);

        let events = d.drain_events();
        let last = events.last().unwrap();
        assert_eq!((last.old, last.new), (OrderStatus::Assigned, OrderStatus::Pending));

        // Faulted vehicles are not dispatched until repaired.
        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(2));
        assert_eq!(report.backlog, vec![o]);
        d.repair_vehicle(v, &net).unwrap();
        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(3));
        assert_eq!(report.assigned, vec![(o, v)]);
    }

    #[test]
    fn depart_charge_and_complete() {
        let (net, [n0, n1, st, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let v = d.add_vehicle(&net, cargo, st, 0.01).unwrap();
        let o = d.submit(&net, OrderKind::Delivery, n1, n0, vec![], None, Tick(0)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));

        // Starts on a station with 200 units: first step is a charge.
        d.depart(v, Tick(1), 60.0).unwrap();
        assert_eq!(d.vehicle(v).unwrap().state, VehicleState::Charging);
        assert_eq!(d.order(o).unwrap().status, OrderStatus::InProgress);

        let mut guard = 0;
        while d.vehicle(v).unwrap().state == VehicleState::Charging {
            d.charge_step(v, 60.0).unwrap();
            guard += 1;
            assert!(guard < 100);
        }
        let veh = d.vehicle(v).unwrap();
        assert_eq!(veh.state, VehicleState::Delivering);
        assert!((veh.battery - 1.0).abs() < 1e-9);
        assert_eq!(d.stations().occupied(st), 0);

        let route = veh.route.clone().unwrap();
        let last = route.steps.len() - 1;
        d.record_progress(v, Location::AtNode(n0), last, 0.9).unwrap();
        d.complete(v, Tick(5)).unwrap();
        assert!(d.vehicle(v).unwrap().is_idle());
        assert_eq!(d.order(o).unwrap().status, OrderStatus::Completed);
    }

    #[test]
    fn complete_only_at_current_destination() {
        let (net, [n0, n1, _, n3, n4, _]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let v = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let o = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        d.depart(v, Tick(1), 60.0).unwrap();

        let route = d.vehicle(v).unwrap().route.clone().unwrap();
        let at_n1 = route.steps.iter().position(|s| s.node == n1).unwrap();
        let last = route.steps.len() - 1;

        d.record_progress(v, Location::AtNode(n1), at_n1, 0.95).unwrap();
        assert!(matches!(d.complete(v, Tick(2)), Err(FleetError::InvalidTransition { .. })));

        // Destination moved while the last edge was flown.
        d.update_destination(o, n4, &net).unwrap();
        d.record_progress(v, Location::AtNode(n3), last, 0.9).unwrap();
        assert!(!d.at_destination(v).unwrap());
        assert!(d.complete(v, Tick(3)).is_err());
        assert_eq!(d.order(o).unwrap().status, OrderStatus::InProgress);
        assert_eq!(d.vehicle(v).unwrap().state, VehicleState::Delivering);
    }

    #[test]
    fn stops_flown_through_count_as_visited() {
        let (net, [n0, n1, _, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let v = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let o = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        d.depart(v, Tick(1), 60.0).unwrap();

        // One tick covering the whole route passes the origin mid-flight.
        let last = d.vehicle(v).unwrap().route.as_ref().unwrap().steps.len() - 1;
        d.record_progress(v, Location::AtNode(n3), last, 0.8).unwrap();
        assert!(d.at_destination(v).unwrap());
        d.complete(v, Tick(2)).unwrap();
        assert_eq!(d.order(o).unwrap().status, OrderStatus::Completed);
    }

    #[test]
    fn queued_vehicle_admitted_when_slot_frees() {
        let (net, [_, n1, st, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let a = d.add_vehicle(&net, cargo, st, 0.01).unwrap();
        let b = d.add_vehicle(&net, cargo, st, 0.01).unwrap();
        d.submit(&net, OrderKind::Delivery, n1, n1, vec![], None, Tick(0)).unwrap();
        d.submit(&net, OrderKind::Delivery, n3, n3, vec![], None, Tick(0)).unwrap();
        let report = d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert_eq!(report.assigned.len(), 2);

        d.depart(a, Tick(1), 60.0).unwrap();
        d.depart(b, Tick(1), 60.0).unwrap();
        assert_eq!(d.vehicle(a).unwrap().state, VehicleState::Charging);
        assert_eq!(d.vehicle(b).unwrap().state, VehicleState::WaitingForSlot);
        assert_eq!(d.stations().occupied(st), 1);

        let mut admitted = Vec::new();
        while d.vehicle(a).unwrap().state == VehicleState::Charging {
            admitted.extend(d.charge_step(a, 60.0).unwrap());
            assert!(d.stations().check_capacity().is_empty());
        }
        assert_eq!(admitted, vec![b]);
        assert_eq!(d.vehicle(b).unwrap().state, VehicleState::Charging);
    }

    #[test]
    fn charge_request_needs_a_flying_vehicle() {
        let (net, [_, n1, st, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let v = d.add_vehicle(&net, cargo, st, 0.01).unwrap();
        assert!(matches!(d.request_charge(v, 60.0), Err(FleetError::InvalidTransition { .. })));

        d.submit(&net, OrderKind::Delivery, n1, n1, vec![], None, Tick(0)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        d.depart(v, Tick(1), 60.0).unwrap();
        assert_eq!(d.stations().state(st).unwrap().occupied, vec![v]);
        // Already on the pad.
        assert!(d.request_charge(v, 60.0).is_err());
        assert_eq!(d.stations().occupied(st), 1);
    }

    #[test]
    fn cancel_outcomes() {
        let (net, [n0, n1, _, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let v = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();

        let pending = d.submit(&net, OrderKind::Work, n1, n3, vec![], None, Tick(0)).unwrap();
        assert_eq!(d.cancel_order(pending, Tick(0)).unwrap(), CancelOutcome::Removed);
        assert!(d.order(pending).is_err());
        assert!(d.drain_events().is_empty());

        let assigned = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        assert_eq!(d.cancel_order(assigned, Tick(1)).unwrap(), CancelOutcome::Failed);
        assert!(d.vehicle(v).unwrap().is_idle());
        assert_eq!(d.order(assigned).unwrap().failure, Some(FailureReason::Cancelled));

        let running = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(2)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(2));
        d.depart(v, Tick(2), 1.0).unwrap();
        assert_eq!(d.cancel_order(running, Tick(3)).unwrap(), CancelOutcome::AbortScheduled);
        assert!(d.vehicle(v).unwrap().abort_requested);

        assert!(matches!(d.cancel_order(assigned, Tick(4)), Err(FleetError::OrderClosed { .. })));
    }

    #[test]
    fn abort_snaps_to_nearer_node() {
        let (net, [n0, n1, _, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let v = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let o = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        d.depart(v, Tick(1), 1.0).unwrap();

        let edge = net.edge_between(n0, n1).unwrap();
        d.record_progress(v, Location::OnEdge { edge, progress_m: 700.0 }, 0, 0.96).unwrap();
        let node = d.abort(v, &net, Tick(2), 1.0).unwrap();
        assert_eq!(node, n1);
        let veh = d.vehicle(v).unwrap();
        assert_eq!(veh.location, Location::AtNode(n1));
        assert!(veh.is_idle());
        assert!((veh.battery - 0.96).abs() < 1e-12);
        assert_eq!(d.order(o).unwrap().failure, Some(FailureReason::Cancelled));
    }

    #[test]
    fn update_destination_flags_replan() {
        let (net, [n0, n1, _, n3, n4, _]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        let v = d.add_vehicle(&net, cargo, n0, 1.0).unwrap();
        let o = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        d.update_destination(o, n4, &net).unwrap();
        assert_eq!(d.order(o).unwrap().destination, n4);
        assert!(d.vehicle(v).unwrap().replan_requested);

        let fresh = d
            .replan(v, &net, &ZoneRegistry::new().overlay_at(&net, Tick(0)), &router())
            .unwrap();
        assert_eq!(fresh.destination(), Some(n4));
        d.replace_route(v, fresh).unwrap();
        assert!(!d.vehicle(v).unwrap().replan_requested);
    }

    #[test]
    fn snapshot_restore_preserves_state() {
        let (net, [n0, n1, _, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        d.add_vehicle(&net, cargo, n0, 0.7).unwrap();
        let o = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        d.dispatch_pass(&net, &ZoneRegistry::new(), &router(), Tick(0));
        let snap = d.snapshot();

        let (mut fresh, ..) = dispatcher(&net, DispatchConfig::default());
        fresh.restore(snap, &net).unwrap();
        assert_eq!(fresh.order(o).unwrap().status, OrderStatus::Assigned);
        assert_eq!(fresh.vehicles()[0].state, VehicleState::Assigned);
        assert!((fresh.vehicles()[0].battery - 0.7).abs() < 1e-12);
        let next = fresh.submit(&net, OrderKind::Work, n1, n3, vec![], None, Tick(1)).unwrap();
        assert_ne!(next, o);
    }

    #[test]
    fn restore_rejects_snapshot_off_network() {
        let (net, [n0, n1, st, n3, ..]) = line();
        let (mut d, cargo, _) = dispatcher(&net, DispatchConfig::default());
        d.add_vehicle(&net, cargo, n0, 0.7).unwrap();
        let o = d.submit(&net, OrderKind::Delivery, n1, n3, vec![], None, Tick(0)).unwrap();
        let good = d.snapshot();

        let mut bad = good.clone();
        bad.orders[0].destination = sf_core::NodeId(42);
        assert!(matches!(d.restore(bad, &net), Err(FleetError::Spatial(_))));

        let mut bad = good.clone();
        bad.stations[0].occupied = vec![sf_core::VehicleId(0), sf_core::VehicleId(1)];
        assert!(matches!(
            d.restore(bad, &net),
            Err(FleetError::CapacityExceeded { station, .. }) if station == st
        ));

        // Rejected snapshots leave the dispatcher as it was.
        assert_eq!(d.order(o).unwrap().destination, n3);
        assert_eq!(d.stations().occupied(st), 0);
        d.restore(good, &net).unwrap();
    }
}
