//! Fluent builder for constructing a [`Sim`].

use sf_core::{NodeId, ProfileId, SimConfig, VehicleProfile};
use sf_fleet::{DispatchConfig, Dispatcher};
use sf_routing::Router;
use sf_spatial::{AirNetwork, ZoneRegistry};

use crate::{Sim, SimError, SimResult};

/// One vehicle to station at build time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VehicleSpec {
    /// Index into the profiles given to [`SimBuilder::profiles`].
    pub profile: ProfileId,
    pub home:    NodeId,
    /// Initial battery fraction.
    pub battery: f64,
}

impl VehicleSpec {
    pub fn new(profile: ProfileId, home: NodeId) -> Self {
        Self { profile, home, battery: 1.0 }
    }

    pub fn battery(mut self, battery: f64) -> Self {
        self.battery = battery;
        self
    }
}

/// Fluent builder for [`Sim<R>`].
///
/// # Required inputs
///
/// - [`SimConfig`]: total ticks, seed, tick duration, …
/// - [`AirNetwork`]: the navigable graph
/// - `R: Router`: the planner (e.g. [`sf_routing::EnergyRouter`])
///
/// # Optional inputs (have defaults)
///
/// | Method                 | Default                      |
/// |------------------------|------------------------------|
/// | `.dispatch_config(c)`  | `DispatchConfig::default()`  |
/// | `.profiles(v)`         | none                         |
/// | `.vehicles(v)`         | none                         |
/// | `.zones(z)`            | empty `ZoneRegistry`         |
/// | `.wind(mps)`           | `0.0`                        |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, network, EnergyRouter::default())
///     .profiles(vec![VehicleProfile::standard(ProfileId(0), VehicleKind::Cargo)])
///     .vehicles(vec![VehicleSpec::new(ProfileId(0), base)])
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder<R: Router> {
    config:   SimConfig,
    network:  AirNetwork,
    router:   R,
    dispatch: DispatchConfig,
    profiles: Vec<VehicleProfile>,
    vehicles: Vec<VehicleSpec>,
    zones:    Option<ZoneRegistry>,
    wind_mps: f64,
}

impl<R: Router> SimBuilder<R> {
    pub fn new(config: SimConfig, network: AirNetwork, router: R) -> Self {
        Self {
            config,
            network,
            router,
            dispatch: DispatchConfig::default(),
            profiles: Vec::new(),
            vehicles: Vec::new(),
            zones:    None,
            wind_mps: 0.0,
        }
    }

    pub fn dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.dispatch = config;
        self
    }

    /// Vehicle profiles.  Profile ids are reassigned to their position in
    /// `profiles`.
    pub fn profiles(mut self, profiles: Vec<VehicleProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn vehicles(mut self, vehicles: Vec<VehicleSpec>) -> Self {
        self.vehicles = vehicles;
        self
    }

    /// Zones registered ahead of time.  The registry may still be changed
    /// through [`Sim::zones`] once the simulation runs.
    pub fn zones(mut self, zones: ZoneRegistry) -> Self {
        self.zones = Some(zones);
        self
    }

    pub fn wind(mut self, mps: f64) -> Self {
        self.wind_mps = mps;
        self
    }

    /// Validate inputs, register profiles and vehicles, and return a
    /// ready-to-run [`Sim`].
    pub fn build(self) -> SimResult<Sim<R>> {
        if self.config.tick_duration_secs == 0 {
            return Err(SimError::Config("tick_duration_secs must be positive".into()));
        }

        let mut dispatcher = Dispatcher::new(&self.network, self.dispatch);
        for profile in self.profiles {
            if profile.max_range <= 0.0 || profile.speed_mps <= 0.0 {
                return Err(SimError::Config(format!(
                    "profile {} needs positive range and speed",
                    profile.kind.as_str()
                )));
            }
            dispatcher.add_profile(profile);
        }

        for spec in &self.vehicles {
            self.network.check_node(spec.home)?;
            if !(0.0..=1.0).contains(&spec.battery) {
                return Err(SimError::Config(format!(
                    "battery {} at {} outside [0, 1]",
                    spec.battery, spec.home
                )));
            }
            dispatcher.add_vehicle(&self.network, spec.profile, spec.home, spec.battery)?;
        }

        Ok(Sim::from_parts(
            self.config,
            self.network,
            self.zones.unwrap_or_default(),
            dispatcher,
            self.router,
            self.wind_mps,
        ))
    }
}
