//! Simulation time model.
//!
//! # Design
//!
//! Time is represented as a monotonically increasing `Tick` counter.  The
//! mapping to wall-clock time is held in `SimClock`:
//!
//!   wall_time = start_unix_secs + tick * tick_duration_secs
//!
//! The default tick duration is 1 s (a 1 Hz tick driver).  Vehicle movement
//! per tick is `speed × tick_duration_secs`, so coarser ticks trade position
//! fidelity for throughput; the rest of the engine is agnostic.

use std::fmt;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self` (saturating at zero).
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Converts between tick counts and Unix wall-clock seconds.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// Unix timestamp (seconds since epoch) of tick 0.
    pub start_unix_secs: i64,
    /// How many simulated seconds one tick represents.  Default: 1.
    pub tick_duration_secs: u32,
    /// The current tick, advanced by `SimClock::advance()` each iteration.
    pub current_tick: Tick,
}

impl SimClock {
    /// Create a clock starting at `start_unix_secs` with the given resolution.
    pub fn new(start_unix_secs: i64, tick_duration_secs: u32) -> Self {
        Self {
            start_unix_secs,
            tick_duration_secs,
            current_tick: Tick::ZERO,
        }
    }

    /// Advance the clock by one tick.
    #[inline]
    pub fn advance(&mut self) {
        self.current_tick = Tick(self.current_tick.0 + 1);
    }

    /// Tick duration as floating-point seconds, for kinematics.
    #[inline]
    pub fn tick_secs(&self) -> f64 {
        self.tick_duration_secs as f64
    }

    /// Elapsed simulated seconds since tick 0.
    #[inline]
    pub fn elapsed_secs(&self) -> i64 {
        self.current_tick.0 as i64 * self.tick_duration_secs as i64
    }

    /// Break elapsed time into (hour, minute, second) components from sim
    /// start.
    pub fn elapsed_hms(&self) -> (u64, u32, u32) {
        let total_secs = self.elapsed_secs().max(0) as u64;
        let hours = total_secs / 3_600;
        let minutes = ((total_secs % 3_600) / 60) as u32;
        let seconds = (total_secs % 60) as u32;
        (hours, minutes, seconds)
    }

    /// How many ticks span `secs` seconds? (rounds up; a charge never ends
    /// early)
    #[inline]
    pub fn ticks_for_secs(&self, secs: f64) -> u64 {
        if secs <= 0.0 {
            return 0;
        }
        (secs / self.tick_secs()).ceil() as u64
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s) = self.elapsed_hms();
        write!(f, "{} ({:02}:{:02}:{:02})", self.current_tick, h, m, s)
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level simulation configuration.
///
/// Typically loaded from a JSON file by the application crate and passed
/// to the simulation builder.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Unix timestamp for tick 0.
    pub start_unix_secs: i64,

    /// Seconds per tick.  Default: 1 (1 Hz).
    pub tick_duration_secs: u32,

    /// Total ticks to simulate when calling `Sim::run`.
    pub total_ticks: u64,

    /// Master RNG seed.  The same seed always produces identical results.
    pub seed: u64,

    /// Worker thread count passed to Rayon.  `None` uses all logical cores.
    pub num_threads: Option<usize>,

    /// Emit a vehicle snapshot every N ticks.  1 = every tick.
    pub output_interval_ticks: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_unix_secs:       0,
            tick_duration_secs:    1,
            total_ticks:           3_600,
            seed:                  42,
            num_threads:           None,
            output_interval_ticks: 1,
        }
    }
}

impl SimConfig {
    /// The tick at which the simulation ends (exclusive upper bound).
    #[inline]
    pub fn end_tick(&self) -> Tick {
        Tick(self.total_ticks)
    }

    /// Construct a `SimClock` pre-configured for this run.
    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.start_unix_secs, self.tick_duration_secs)
    }
}
