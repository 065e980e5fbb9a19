//! Snapshot/restore of mutable simulation state.
//!
//! The blob covers vehicles (with their active routes), orders, station
//! slots, the current tick, and the wind speed.  The network and no-fly
//! zones are not included; they are rebuilt from their own sources.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use sf_core::Tick;
use sf_fleet::FleetSnapshot;

use crate::SimResult;

/// Key used by [`Sim::checkpoint`][crate::Sim::checkpoint].
pub const STATE_KEY: &str = "sim_state";

/// Everything [`Sim::serialize_state`][crate::Sim::serialize_state] writes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimState {
    pub tick:     Tick,
    pub wind_mps: f64,
    pub fleet:    FleetSnapshot,
}

/// Minimal key-value persistence contract.
pub trait StateStore {
    fn put(&mut self, key: &str, bytes: Vec<u8>) -> SimResult<()>;
    fn get(&self, key: &str) -> SimResult<Option<Vec<u8>>>;
}

/// In-process [`StateStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: FxHashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn put(&mut self, key: &str, bytes: Vec<u8>) -> SimResult<()> {
        self.entries.insert(key.to_owned(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> SimResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }
}
