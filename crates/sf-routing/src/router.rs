//! Routing trait and the default battery-aware planner.
//!
//! # Pluggability
//!
//! The dispatcher and the simulation call planning through the [`Router`]
//! trait, so alternative planners (discretised battery grids, heuristics)
//! can be swapped in without touching the rest of the engine.
//!
//! # Algorithm
//!
//! [`EnergyRouter`] is a label-setting search over `(node, waypoint layer)`
//! states.  Each label carries a continuous battery level in energy units.
//! Labels are expanded in `(cost, charging stops)` order from a binary heap;
//! a label is discarded when another label at the same state has no more
//! cost, no more stops and at least as much energy.  Charging is a
//! same-node transition at charging stations that adds the dwell cost and
//! refills the battery to the configured target.
//!
//! # Cost units
//!
//! Energy units throughout: an edge costs `base_cost × energy_factor`, and a
//! charging stop costs `dwell_secs × speed × energy_factor`, the energy the
//! vehicle would have spent flying for that long.
//!
//! # Determinism
//!
//! Ties on cost are broken by fewer charging stops, then by the
//! lexicographically smallest node-id path.  Identical inputs always yield
//! an identical route.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use tracing::debug;

use sf_core::{EdgeId, NodeId, VehicleProfile};
use sf_spatial::{AirNetwork, Overlay};

use crate::{Route, RouteStep, RoutingError, RoutingResult};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Tunables for [`EnergyRouter`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RouterConfig {
    /// Battery fraction a charging stop restores.
    pub charge_target: f64,
    /// Modelled time on the pad per stop, seconds.
    pub charge_dwell_secs: f64,
    /// Energy tolerance for battery comparisons.
    pub epsilon: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            charge_target:     1.0,
            charge_dwell_secs: 300.0,
            epsilon:           1e-9,
        }
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// Inputs of one planning query.
#[derive(Clone, Debug)]
pub struct PlanRequest<'a> {
    pub profile:             &'a VehicleProfile,
    /// Battery fraction at the origin.
    pub start_battery:       f64,
    pub origin:              NodeId,
    pub destination:         NodeId,
    /// Visited in the given order between origin and destination.
    pub waypoints:           &'a [NodeId],
    /// Battery fraction that must remain on arrival.
    pub min_arrival_battery: f64,
}

impl<'a> PlanRequest<'a> {
    pub fn new(profile: &'a VehicleProfile, start_battery: f64, origin: NodeId, destination: NodeId) -> Self {
        Self {
            profile,
            start_battery,
            origin,
            destination,
            waypoints: &[],
            min_arrival_battery: 0.0,
        }
    }

    pub fn via(mut self, waypoints: &'a [NodeId]) -> Self {
        self.waypoints = waypoints;
        self
    }

    pub fn with_floor(mut self, min_arrival_battery: f64) -> Self {
        self.min_arrival_battery = min_arrival_battery;
        self
    }
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable planning engine.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync` so candidate routes can be planned
/// on Rayon worker threads during dispatch.
pub trait Router: Send + Sync {
    /// Plan a battery-feasible route for `req`, never using an edge the
    /// overlay blocks.
    ///
    /// Returns [`RoutingError::NotFeasible`] when no such route exists.
    fn plan(&self, net: &AirNetwork, overlay: &Overlay, req: &PlanRequest<'_>) -> RoutingResult<Route>;
}

// ── EnergyRouter ──────────────────────────────────────────────────────────────

/// Default [`Router`]: exact label-setting search with domination pruning.
#[derive(Clone, Debug, Default)]
pub struct EnergyRouter {
    config: RouterConfig,
}

impl EnergyRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Cost of one charging stop for `profile`, in energy units.
    pub fn dwell_cost(&self, profile: &VehicleProfile) -> f64 {
        self.config.charge_dwell_secs.max(0.0) * profile.speed_mps * profile.kind.energy_factor()
    }
}

impl Router for EnergyRouter {
    fn plan(&self, net: &AirNetwork, overlay: &Overlay, req: &PlanRequest<'_>) -> RoutingResult<Route> {
        for &n in std::iter::once(&req.origin)
            .chain(req.waypoints)
            .chain(std::iter::once(&req.destination))
        {
            if !net.contains_node(n) {
                return Err(RoutingError::NodeNotFound(n));
            }
        }

        let route = Search::new(self, net, overlay, req).run();
        match &route {
            Some(r) => debug!(
                from = %req.origin,
                to = %req.destination,
                cost = r.total_cost,
                stops = r.charging_stops(),
                "route planned"
            ),
            None => debug!(from = %req.origin, to = %req.destination, "no feasible route"),
        }
        route.ok_or(RoutingError::NotFeasible { from: req.origin, to: req.destination })
    }
}

// ── Search internals ──────────────────────────────────────────────────────────

type LabelIdx = u32;

struct Label {
    node:    NodeId,
    layer:   usize,
    cost:    f64,
    stops:   u32,
    /// Remaining energy units.
    energy:  f64,
    parent:  Option<LabelIdx>,
    edge_in: Option<EdgeId>,
    /// Created by charging at `node`.
    charged: bool,
    alive:   bool,
}

/// Heap priority: cost, then stops, then creation order.
#[derive(PartialEq)]
struct Key {
    cost:  f64,
    stops: u32,
    seq:   LabelIdx,
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then(self.stops.cmp(&other.stops))
            .then(self.seq.cmp(&other.seq))
    }
}

struct Search<'a> {
    net:        &'a AirNetwork,
    overlay:    &'a Overlay,
    profile:    &'a VehicleProfile,
    waypoints:  &'a [NodeId],
    dest:       NodeId,
    capacity:   f64,
    target:     f64,
    floor:      f64,
    dwell_cost: f64,
    eps:        f64,
    start:      f64,
    origin:     NodeId,

    labels: Vec<Label>,
    fronts: FxHashMap<(NodeId, usize), Vec<LabelIdx>>,
    heap:   BinaryHeap<Reverse<Key>>,
}

impl<'a> Search<'a> {
    fn new(router: &EnergyRouter, net: &'a AirNetwork, overlay: &'a Overlay, req: &'a PlanRequest<'a>) -> Self {
        let capacity = req.profile.max_range.max(0.0);
        let cfg = router.config();
        Self {
            net,
            overlay,
            profile:    req.profile,
            waypoints:  req.waypoints,
            dest:       req.destination,
            capacity,
            target:     cfg.charge_target.clamp(0.0, 1.0) * capacity,
            floor:      req.min_arrival_battery.clamp(0.0, 1.0) * capacity,
            dwell_cost: router.dwell_cost(req.profile),
            eps:        cfg.epsilon.max(0.0),
            start:      req.start_battery.clamp(0.0, 1.0) * capacity,
            origin:     req.origin,
            labels:     Vec::new(),
            fronts:     FxHashMap::default(),
            heap:       BinaryHeap::new(),
        }
    }

    fn run(mut self) -> Option<Route> {
        let layer = self.advance(0, self.origin);
        self.offer(Label {
            node: self.origin,
            layer,
            cost: 0.0,
            stops: 0,
            energy: self.start,
            parent: None,
            edge_in: None,
            charged: false,
            alive: true,
        });

        let mut best: Option<LabelIdx> = None;

        while let Some(Reverse(key)) = self.heap.pop() {
            if let Some(b) = best {
                let bl = &self.labels[b as usize];
                if key.cost > bl.cost || (key.cost == bl.cost && key.stops > bl.stops) {
                    break;
                }
            }

            let idx = key.seq;
            if !self.labels[idx as usize].alive {
                continue;
            }

            if self.is_goal(idx) {
                best = match best {
                    Some(b) if self.path_cmp(b, idx) != Ordering::Greater => Some(b),
                    _ => Some(idx),
                };
                continue;
            }

            self.expand(idx);
        }

        best.map(|b| self.reconstruct(b))
    }

    fn is_goal(&self, idx: LabelIdx) -> bool {
        let l = &self.labels[idx as usize];
        l.node == self.dest && l.layer == self.waypoints.len() && l.energy + self.eps >= self.floor
    }

    /// Skip past every waypoint satisfied by standing at `node`.
    fn advance(&self, mut layer: usize, node: NodeId) -> usize {
        while layer < self.waypoints.len() && self.waypoints[layer] == node {
            layer += 1;
        }
        layer
    }

    fn expand(&mut self, idx: LabelIdx) {
        let (node, layer, cost, stops, energy, charged) = {
            let l = &self.labels[idx as usize];
            (l.node, l.layer, l.cost, l.stops, l.energy, l.charged)
        };

        if !charged && self.net.is_station(node) && energy + self.eps < self.target {
            self.offer(Label {
                node,
                layer,
                cost: cost + self.dwell_cost,
                stops: stops + 1,
                energy: self.target,
                parent: Some(idx),
                edge_in: None,
                charged: true,
                alive: true,
            });
        }

        let net = self.net;
        for (edge, to) in net.neighbors(node) {
            if self.overlay.is_blocked(edge) || !net.band_allows(edge, self.profile) {
                continue;
            }
            let c = net.edge_cost(edge, self.profile);
            if energy + self.eps < c {
                continue;
            }
            self.offer(Label {
                node: to,
                layer: self.advance(layer, to),
                cost: cost + c,
                stops,
                energy: (energy - c).max(0.0),
                parent: Some(idx),
                edge_in: Some(edge),
                charged: false,
                alive: true,
            });
        }
    }

    /// `a` is at least as good as `b` on every criterion.
    fn dominates(&self, a: &Label, b: &Label) -> bool {
        a.cost <= b.cost && a.stops <= b.stops && a.energy + self.eps >= b.energy
    }

    /// Insert `label` unless an existing label at its state dominates it.
    fn offer(&mut self, label: Label) {
        let state = (label.node, label.layer);
        let idx = self.labels.len() as LabelIdx;
        self.labels.push(label);

        let front = self.fronts.remove(&state).unwrap_or_default();
        let mut kept = Vec::with_capacity(front.len() + 1);
        let mut accepted = true;

        for &other in &front {
            if !accepted {
                kept.push(other);
                continue;
            }
            let (o, n) = (&self.labels[other as usize], &self.labels[idx as usize]);
            let old_wins = self.dominates(o, n);
            let new_wins = self.dominates(n, o);
            match (old_wins, new_wins) {
                (true, true) if self.path_cmp(idx, other) == Ordering::Less => {
                    self.labels[other as usize].alive = false;
                }
                (true, _) => {
                    accepted = false;
                    kept.push(other);
                }
                (false, true) => self.labels[other as usize].alive = false,
                (false, false) => kept.push(other),
            }
        }

        if accepted {
            kept.push(idx);
            let l = &self.labels[idx as usize];
            self.heap.push(Reverse(Key { cost: l.cost, stops: l.stops, seq: idx }));
        } else {
            self.labels[idx as usize].alive = false;
        }
        self.fronts.insert(state, kept);
    }

    /// Step sequence `(node, charges here)` from the origin to `idx`.
    fn steps_of(&self, idx: LabelIdx) -> Vec<(NodeId, bool)> {
        let mut chain = Vec::new();
        let mut cur = Some(idx);
        while let Some(i) = cur {
            chain.push(i);
            cur = self.labels[i as usize].parent;
        }
        let mut steps: Vec<(NodeId, bool)> = Vec::with_capacity(chain.len());
        for &i in chain.iter().rev() {
            let l = &self.labels[i as usize];
            match steps.last_mut() {
                Some(last) if l.charged => last.1 = true,
                _ => steps.push((l.node, false)),
            }
        }
        steps
    }

    fn path_cmp(&self, a: LabelIdx, b: LabelIdx) -> Ordering {
        self.steps_of(a).cmp(&self.steps_of(b))
    }

    fn reconstruct(&self, idx: LabelIdx) -> Route {
        let mut chain = Vec::new();
        let mut cur = Some(idx);
        while let Some(i) = cur {
            chain.push(i);
            cur = self.labels[i as usize].parent;
        }

        let frac = |energy: f64| if self.capacity > 0.0 { energy / self.capacity } else { 0.0 };
        let mut steps: Vec<RouteStep> = Vec::with_capacity(chain.len());
        for &i in chain.iter().rev() {
            let l = &self.labels[i as usize];
            match steps.last_mut() {
                Some(last) if l.charged => last.is_charging_stop = true,
                _ => steps.push(RouteStep {
                    node:             l.node,
                    edge_in:          l.edge_in,
                    arrival_battery:  frac(l.energy),
                    is_charging_stop: false,
                }),
            }
        }

        Route {
            steps,
            total_cost:    self.labels[idx as usize].cost,
            overlay_key:   self.overlay.key(),
            charge_target: if self.capacity > 0.0 { self.target / self.capacity } else { 0.0 },
        }
    }
}
