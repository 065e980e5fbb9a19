//! Unit tests for sf-core primitives.

#[cfg(test)]
mod ids {
    use crate::{EdgeId, NodeId, VehicleId};

    #[test]
    fn index_roundtrip() {
        let id = VehicleId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(VehicleId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn ordering() {
        assert!(VehicleId(0) < VehicleId(1));
        assert!(NodeId(100) > NodeId(99));
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(VehicleId::INVALID.0, u32::MAX);
        assert_eq!(NodeId::INVALID.0, u32::MAX);
        assert_eq!(EdgeId::INVALID.0, u32::MAX);
        assert_eq!(NodeId::default(), NodeId::INVALID);
    }

    #[test]
    fn display() {
        assert_eq!(VehicleId(7).to_string(), "VehicleId(7)");
    }
}

#[cfg(test)]
mod geo {
    use crate::GeoPoint;

    #[test]
    fn zero_distance() {
        let p = GeoPoint::new(52.521, 13.413);
        assert!(p.distance_m(p) < 0.01);
    }

    #[test]
    fn one_degree_latitude() {
        // ~1 degree of latitude ≈ 111 km
        let a = GeoPoint::new(52.0, 13.0);
        let b = GeoPoint::new(53.0, 13.0);
        let d = a.distance_m(b);
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn lerp_midpoint_and_clamp() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 2.0);
        assert_eq!(a.lerp(b, 0.5), GeoPoint::new(0.5, 1.0));
        assert_eq!(a.lerp(b, 3.0), b);
        assert_eq!(a.lerp(b, -1.0), a);
    }

    #[test]
    fn bbox_check() {
        let center = GeoPoint::new(52.52, 13.40);
        let nearby = GeoPoint::new(52.53, 13.41);
        let far = GeoPoint::new(53.5, 13.40);
        assert!(nearby.within_bbox(center, 0.1));
        assert!(!far.within_bbox(center, 0.1));
    }
}

#[cfg(test)]
mod time {
    use crate::{SimClock, SimConfig, Tick};

    #[test]
    fn tick_arithmetic() {
        let t = Tick(10);
        assert_eq!(t + 5, Tick(15));
        assert_eq!(t.offset(3), Tick(13));
        assert_eq!(Tick(15) - Tick(10), 5u64);
        assert_eq!(Tick(3).since(Tick(10)), 0);
    }

    #[test]
    fn clock_elapsed() {
        let mut clock = SimClock::new(0, 1);
        assert_eq!(clock.elapsed_secs(), 0);
        clock.advance();
        assert_eq!(clock.elapsed_secs(), 1);
        clock.advance();
        assert_eq!(clock.elapsed_secs(), 2);
    }

    #[test]
    fn clock_hms() {
        let mut clock = SimClock::new(0, 61);
        for _ in 0..60 {
            clock.advance();
        }
        // 3660 s = 1 h 1 min 0 s
        assert_eq!(clock.elapsed_hms(), (1, 1, 0));
    }

    #[test]
    fn ticks_for_secs_rounds_up() {
        let clock = SimClock::new(0, 5);
        assert_eq!(clock.ticks_for_secs(0.0), 0);
        assert_eq!(clock.ticks_for_secs(1.0), 1);
        assert_eq!(clock.ticks_for_secs(10.0), 2);
        assert_eq!(clock.ticks_for_secs(10.5), 3);
    }

    #[test]
    fn sim_config_defaults() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.tick_duration_secs, 1);
        assert_eq!(cfg.end_tick(), Tick(cfg.total_ticks));
        assert_eq!(cfg.make_clock().current_tick, Tick::ZERO);
    }
}

#[cfg(test)]
mod profile {
    use crate::{AltitudeBand, BandSet, ProfileId, VehicleKind, VehicleProfile};

    #[test]
    fn energy_factors_follow_drain_rates() {
        assert_eq!(VehicleKind::Cargo.energy_factor(), 1.0);
        assert!((VehicleKind::Operator.energy_factor() - 0.8).abs() < 1e-12);
        assert!(VehicleKind::Cleaner.energy_factor() < VehicleKind::Operator.energy_factor());
    }

    #[test]
    fn band_classification() {
        assert_eq!(AltitudeBand::for_altitude(30.0), AltitudeBand::Low);
        assert_eq!(AltitudeBand::for_altitude(60.0), AltitudeBand::Medium);
        assert_eq!(AltitudeBand::for_altitude(150.0), AltitudeBand::High);
    }

    #[test]
    fn band_set_membership() {
        let set = BandSet::of(&[AltitudeBand::Low, AltitudeBand::High]);
        assert!(set.contains(AltitudeBand::Low));
        assert!(!set.contains(AltitudeBand::Medium));
        assert!(set.with(AltitudeBand::Medium).contains(AltitudeBand::Medium));
        assert!(!BandSet::NONE.contains(AltitudeBand::Low));
        assert!(BandSet::default().contains(AltitudeBand::High));
    }

    #[test]
    fn wind_slows_but_floors_at_a_third() {
        let p = VehicleProfile::standard(ProfileId(0), VehicleKind::Cargo);
        assert_eq!(p.effective_speed(0.0), 15.0);
        assert!((p.effective_speed(10.0) - 12.0).abs() < 1e-9);
        assert!((p.effective_speed(40.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn charge_secs_from_rate() {
        let mut p = VehicleProfile::standard(ProfileId(0), VehicleKind::Cargo);
        p.charge_rate_per_sec = 0.01;
        assert!((p.charge_secs(0.5, 1.0) - 50.0).abs() < 1e-9);
        assert_eq!(p.charge_secs(1.0, 0.8), 0.0);
    }

    #[test]
    fn display() {
        assert_eq!(VehicleKind::Operator.to_string(), "operator");
    }
}

#[cfg(test)]
mod rng {
    use crate::SimRng;

    #[test]
    fn deterministic_same_seed() {
        let mut r1 = SimRng::new(12345);
        let mut r2 = SimRng::new(12345);
        for _ in 0..100 {
            let a: f64 = r1.random();
            let b: f64 = r2.random();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn children_diverge() {
        let mut root = SimRng::new(1);
        let mut c0 = root.child(0);
        let mut c1 = root.child(1);
        let a: u64 = c0.random();
        let b: u64 = c1.random();
        assert_ne!(a, b);
    }

    #[test]
    fn gen_range_in_bounds() {
        let mut rng = SimRng::new(0);
        for _ in 0..1000 {
            let v = rng.gen_range(0.0f64..1.0);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn gen_bool_extremes() {
        let mut rng = SimRng::new(0);
        assert!(!rng.gen_bool(0.0));
        assert!(rng.gen_bool(1.0));
    }
}
