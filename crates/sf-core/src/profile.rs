//! Vehicle profiles: the closed set of vehicle kinds and their physical
//! parameters.
//!
//! Profiles are immutable once created; vehicles reference them by
//! [`ProfileId`].  Everything profile-specific (energy per metre, altitude
//! band) is derived by exhaustive `match` on [`VehicleKind`] so a new kind
//! cannot be added without deciding its cost model.

use crate::ProfileId;

// ── VehicleKind ───────────────────────────────────────────────────────────────

/// The kind of aerial vehicle.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleKind {
    /// Parcel delivery.
    Cargo,
    /// Camera / survey work.
    Operator,
    /// Facade and roof cleaning.
    Cleaner,
}

impl VehicleKind {
    /// Energy units drained per metre flown.
    ///
    /// Calibrated so a full charge covers 2000 m per percent for cargo,
    /// 2500 m for operator and 3000 m for cleaner craft.
    #[inline]
    pub fn energy_factor(self) -> f64 {
        match self {
            VehicleKind::Cargo    => 1.0,
            VehicleKind::Operator => 0.8,
            VehicleKind::Cleaner  => 2.0 / 3.0,
        }
    }

    /// Human-readable label, useful for CSV column values.
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleKind::Cargo    => "cargo",
            VehicleKind::Operator => "operator",
            VehicleKind::Cleaner  => "cleaner",
        }
    }
}

impl std::fmt::Display for VehicleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Altitude bands ────────────────────────────────────────────────────────────

/// Coarse altitude class used for edge compatibility.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AltitudeBand {
    /// Below 60 m.
    Low,
    /// 60 m up to 120 m.
    Medium,
    /// 120 m and above.
    High,
}

impl AltitudeBand {
    /// Classify a cruise altitude in metres.
    pub fn for_altitude(altitude_m: f64) -> Self {
        if altitude_m < 60.0 {
            AltitudeBand::Low
        } else if altitude_m < 120.0 {
            AltitudeBand::Medium
        } else {
            AltitudeBand::High
        }
    }

    #[inline]
    fn bit(self) -> u8 {
        match self {
            AltitudeBand::Low    => 0b001,
            AltitudeBand::Medium => 0b010,
            AltitudeBand::High   => 0b100,
        }
    }
}

/// Bit set of [`AltitudeBand`]s an edge may be flown in.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BandSet(u8);

impl BandSet {
    pub const ALL: BandSet = BandSet(0b111);
    pub const NONE: BandSet = BandSet(0);

    pub fn of(bands: &[AltitudeBand]) -> Self {
        BandSet(bands.iter().fold(0, |acc, b| acc | b.bit()))
    }

    #[inline]
    pub fn contains(self, band: AltitudeBand) -> bool {
        self.0 & band.bit() != 0
    }

    pub fn with(self, band: AltitudeBand) -> Self {
        BandSet(self.0 | band.bit())
    }
}

impl Default for BandSet {
    fn default() -> Self {
        BandSet::ALL
    }
}

// ── VehicleProfile ────────────────────────────────────────────────────────────

/// Physical parameters shared by every vehicle of one model.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleProfile {
    pub id: ProfileId,
    pub kind: VehicleKind,
    /// Energy held by a full battery, in energy units.  With an energy factor
    /// of 1.0 this is the range in metres.
    pub max_range: f64,
    /// Cruise altitude in metres; selects the altitude band.
    pub cruise_altitude_m: f64,
    /// Cruise speed in still air, m/s.
    pub speed_mps: f64,
    /// Battery fraction restored per second while on a charging pad.
    pub charge_rate_per_sec: f64,
}

impl VehicleProfile {
    /// A profile with the defaults for `kind`.
    pub fn standard(id: ProfileId, kind: VehicleKind) -> Self {
        let (max_range, cruise_altitude_m, speed_mps) = match kind {
            VehicleKind::Cargo    => (20_000.0, 90.0, 15.0),
            VehicleKind::Operator => (16_000.0, 120.0, 12.0),
            VehicleKind::Cleaner  => (12_000.0, 40.0, 8.0),
        };
        Self {
            id,
            kind,
            max_range,
            cruise_altitude_m,
            speed_mps,
            charge_rate_per_sec: 1.0 / 600.0, // empty → full in 10 minutes
        }
    }

    #[inline]
    pub fn band(&self) -> AltitudeBand {
        AltitudeBand::for_altitude(self.cruise_altitude_m)
    }

    /// Energy cost of flying `length_m` metres.
    #[inline]
    pub fn energy_for(&self, length_m: f64) -> f64 {
        length_m * self.kind.energy_factor()
    }

    /// Cruise speed after headwind drag, never below a third of still-air
    /// speed.
    pub fn effective_speed(&self, wind_mps: f64) -> f64 {
        (self.speed_mps - 0.3 * wind_mps.clamp(0.0, 40.0)).max(self.speed_mps / 3.0)
    }

    /// Seconds needed to charge from `battery` to `target` fraction.
    pub fn charge_secs(&self, battery: f64, target: f64) -> f64 {
        if self.charge_rate_per_sec <= 0.0 {
            return 0.0;
        }
        ((target - battery).max(0.0)) / self.charge_rate_per_sec
    }
}
