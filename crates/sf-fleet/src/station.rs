//! Charging-slot admission.
//!
//! Each station admits at most `capacity` vehicles at once; later arrivals
//! wait in a FIFO queue and are admitted, in arrival order, as slots free up.
//! The manager only counts slots.  Charge durations are the caller's concern.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use sf_core::{NodeId, VehicleId};
use sf_spatial::AirNetwork;

use crate::{FleetError, FleetResult};

/// Result of a slot request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotGrant {
    Admitted,
    /// Zero-based position in the wait queue.
    Queued { position: usize },
}

/// Slot occupancy and queue of one station.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StationState {
    pub node:     NodeId,
    pub capacity: u32,
    /// Vehicles holding a slot, in admission order.
    pub occupied: Vec<VehicleId>,
    pub queue:    VecDeque<VehicleId>,
}

impl StationState {
    #[inline]
    pub fn has_free_slot(&self) -> bool {
        (self.occupied.len() as u32) < self.capacity
    }
}

/// Slot bookkeeping for every charging station in a network.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StationManager {
    /// Sorted by node.
    stations: Vec<StationState>,
}

impl StationManager {
    /// One entry per `ChargingStation` node.  A declared capacity of zero is
    /// treated as one so the station can make progress.
    pub fn from_network(net: &AirNetwork) -> Self {
        let stations = net
            .stations()
            .into_iter()
            .map(|(node, capacity)| StationState {
                node,
                capacity: capacity.max(1),
                occupied: Vec::new(),
                queue: VecDeque::new(),
            })
            .collect();
        Self { stations }
    }

    /// Rebuild from saved states.  Capacities come from `net`; a saved
    /// station missing from `net` or holding more vehicles than its
    /// capacity is rejected.
    pub fn from_states(net: &AirNetwork, states: Vec<StationState>) -> FleetResult<Self> {
        let mut mgr = Self::from_network(net);
        for saved in states {
            let st = mgr.get_mut(saved.node)?;
            st.occupied = saved.occupied;
            st.queue = saved.queue;
        }
        if let Some((_, breach)) = mgr.check_capacity().into_iter().next() {
            return Err(breach);
        }
        Ok(mgr)
    }

    pub fn states(&self) -> &[StationState] {
        &self.stations
    }

    pub fn state(&self, station: NodeId) -> Option<&StationState> {
        self.index(station).map(|i| &self.stations[i])
    }

    pub fn occupied(&self, station: NodeId) -> usize {
        self.state(station).map_or(0, |s| s.occupied.len())
    }

    pub fn queue_len(&self, station: NodeId) -> usize {
        self.state(station).map_or(0, |s| s.queue.len())
    }

    fn index(&self, station: NodeId) -> Option<usize> {
        self.stations.binary_search_by_key(&station, |s| s.node).ok()
    }

    fn get_mut(&mut self, station: NodeId) -> FleetResult<&mut StationState> {
        let i = self.index(station).ok_or(FleetError::StationNotFound(station))?;
        Ok(&mut self.stations[i])
    }

    /// Ask for a slot.  Repeated requests by the same vehicle report its
    /// current standing without re-queuing it.
    pub fn request_slot(&mut self, station: NodeId, vehicle: VehicleId) -> FleetResult<SlotGrant> {
        let st = self.get_mut(station)?;
        if st.occupied.contains(&vehicle) {
            return Ok(SlotGrant::Admitted);
        }
        if let Some(position) = st.queue.iter().position(|v| *v == vehicle) {
            return Ok(SlotGrant::Queued { position });
        }
        if st.has_free_slot() && st.queue.is_empty() {
            st.occupied.push(vehicle);
            debug!(station = %station, vehicle = %vehicle, "slot admitted");
            return Ok(SlotGrant::Admitted);
        }
        st.queue.push_back(vehicle);
        let position = st.queue.len() - 1;
        debug!(station = %station, vehicle = %vehicle, position, "slot queued");
        Ok(SlotGrant::Queued { position })
    }

    /// Free `vehicle`'s slot and admit the head of the queue, if any.
    ///
    /// Returns the newly admitted vehicle.
    pub fn release_slot(&mut self, station: NodeId, vehicle: VehicleId) -> FleetResult<Option<VehicleId>> {
        let st = self.get_mut(station)?;
        let Some(i) = st.occupied.iter().position(|v| *v == vehicle) else {
            return Err(FleetError::InvariantViolation {
                vehicle,
                detail: format!("released a slot it does not hold at {station}"),
            });
        };
        st.occupied.remove(i);
        Ok(Self::admit_head(st))
    }

    /// Leave the wait queue without being admitted.
    pub fn cancel_wait(&mut self, station: NodeId, vehicle: VehicleId) -> bool {
        let Ok(st) = self.get_mut(station) else { return false };
        match st.queue.iter().position(|v| *v == vehicle) {
            Some(i) => {
                st.queue.remove(i);
                true
            }
            None => false,
        }
    }

    /// Drop `vehicle` from every station, slot or queue.  Returns vehicles
    /// admitted as a consequence.
    pub fn withdraw(&mut self, vehicle: VehicleId) -> Vec<(NodeId, VehicleId)> {
        let mut admitted = Vec::new();
        for st in &mut self.stations {
            st.queue.retain(|v| *v != vehicle);
            if let Some(i) = st.occupied.iter().position(|v| *v == vehicle) {
                st.occupied.remove(i);
                if let Some(next) = Self::admit_head(st) {
                    admitted.push((st.node, next));
                }
            }
        }
        admitted
    }

    fn admit_head(st: &mut StationState) -> Option<VehicleId> {
        if !st.has_free_slot() {
            return None;
        }
        let next = st.queue.pop_front()?;
        st.occupied.push(next);
        debug!(station = %st.node, vehicle = %next, "queued vehicle admitted");
        Some(next)
    }

    /// Verify `occupied ≤ capacity` everywhere.
    ///
    /// Returns the vehicles admitted after their station was already full,
    /// each paired with the breach.
    pub fn check_capacity(&self) -> Vec<(VehicleId, FleetError)> {
        let mut over = Vec::new();
        for st in &self.stations {
            let cap = st.capacity as usize;
            if st.occupied.len() <= cap {
                continue;
            }
            error!(station = %st.node, occupied = st.occupied.len(), capacity = st.capacity, "station over capacity");
            over.extend(
                st.occupied[cap..]
                    .iter()
                    .map(|&v| (v, FleetError::CapacityExceeded { station: st.node, capacity: st.capacity })),
            );
        }
        over
    }
}

