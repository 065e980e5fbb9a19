//! No-fly zones and the overlays derived from them.
//!
//! A [`ZoneRegistry`] holds the registered zones.  For any tick it can
//! produce an [`Overlay`]: a per-edge blocked flag computed from the zones
//! active at that tick.  Overlays are immutable, shared via `Arc`, and
//! cached by a hash of the active zone id set, so planners holding an old
//! overlay keep a consistent view while zones change underneath them.
//!
//! Zones themselves are never edited.  [`ZoneRegistry::replace`] retires the
//! old id and registers a new one.

use std::collections::BTreeMap;
use std::hash::Hasher;
use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::{FxHashMap, FxHasher};
use tracing::{debug, warn};

use sf_core::{EdgeId, GeoPoint, NodeId, Tick, ZoneId};

use crate::geometry::{bounding_box, point_in_polygon, segment_touches_polygon};
use crate::{AirNetwork, NodeKind, SpatialError, SpatialResult};

/// Overlays kept per registry before the cache is flushed.
const MAX_CACHED_OVERLAYS: usize = 16;

// ── Zones ─────────────────────────────────────────────────────────────────────

/// Half-open activity window `[from, until)`.  `until = None` means forever.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActiveWindow {
    pub from:  Tick,
    pub until: Option<Tick>,
}

impl ActiveWindow {
    pub fn starting(from: Tick) -> Self {
        Self { from, until: None }
    }

    pub fn between(from: Tick, until: Tick) -> Self {
        Self { from, until: Some(until) }
    }

    #[inline]
    pub fn contains(&self, tick: Tick) -> bool {
        tick >= self.from && self.until.is_none_or(|u| tick < u)
    }
}

/// A restricted polygon.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoFlyZone {
    pub id:      ZoneId,
    /// Ordered ring; the closing vertex may be omitted.
    pub polygon: Vec<GeoPoint>,
    /// `None` means always active.
    pub window:  Option<ActiveWindow>,
}

impl NoFlyZone {
    #[inline]
    pub fn is_active_at(&self, tick: Tick) -> bool {
        self.window.is_none_or(|w| w.contains(tick))
    }

    pub fn contains(&self, p: GeoPoint) -> bool {
        point_in_polygon(p, &self.polygon)
    }

    pub fn intersects_segment(&self, a: GeoPoint, b: GeoPoint) -> bool {
        segment_touches_polygon(a, b, &self.polygon)
    }
}

/// Closed ring for the lat/lon rectangle spanned by two corners.
pub fn rectangle(a: GeoPoint, b: GeoPoint) -> Vec<GeoPoint> {
    let (lat0, lat1) = (a.lat.min(b.lat), a.lat.max(b.lat));
    let (lon0, lon1) = (a.lon.min(b.lon), a.lon.max(b.lon));
    vec![
        GeoPoint::new(lat0, lon0),
        GeoPoint::new(lat0, lon1),
        GeoPoint::new(lat1, lon1),
        GeoPoint::new(lat1, lon0),
        GeoPoint::new(lat0, lon0),
    ]
}

// ── Overlay ───────────────────────────────────────────────────────────────────

/// Condition the caller should surface but that is not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayWarning {
    /// A zone swallows a base or charging station; every incident edge is
    /// blocked, so the node is unreachable.
    NodeEnclosed { zone: ZoneId, node: NodeId, kind: NodeKind },
}

/// Immutable blocked-edge snapshot for one active zone set.
#[derive(Debug)]
pub struct Overlay {
    key:      u64,
    zones:    Vec<ZoneId>,
    blocked:  Vec<bool>,
    warnings: Vec<OverlayWarning>,
}

impl Overlay {
    /// Overlay with nothing blocked, keyed like an empty zone set.
    pub fn clear(net: &AirNetwork) -> Self {
        Self {
            key:      zone_set_key(&[]),
            zones:    Vec::new(),
            blocked:  vec![false; net.edge_count()],
            warnings: Vec::new(),
        }
    }

    /// Overlay blocking exactly `edges`.  Used by tools and tests that want a
    /// blocked set without drawing polygons.
    pub fn from_blocked_edges(net: &AirNetwork, edges: &[EdgeId]) -> Self {
        let mut blocked = vec![false; net.edge_count()];
        let mut h = FxHasher::default();
        h.write_u8(0xED);
        for e in edges {
            if let Some(slot) = blocked.get_mut(e.index()) {
                *slot = true;
                h.write_u32(e.0);
            }
        }
        Self { key: h.finish(), zones: Vec::new(), blocked, warnings: Vec::new() }
    }

    /// Compute the overlay for `zones` against `net`.
    pub fn build(net: &AirNetwork, zones: &[Arc<NoFlyZone>]) -> Self {
        let mut ids: Vec<ZoneId> = zones.iter().map(|z| z.id).collect();
        ids.sort_unstable();

        let mut blocked = vec![false; net.edge_count()];
        let mut warnings = Vec::new();

        for zone in zones {
            let Some((min, max)) = bounding_box(&zone.polygon) else { continue };

            for edge in net.edges_touching_box(min, max) {
                if blocked[edge.index()] {
                    continue;
                }
                let (a, b) = net.edge_segment(edge);
                if zone.intersects_segment(a, b) {
                    blocked[edge.index()] = true;
                }
            }

            for node in net.nodes_in_box(min, max) {
                let kind = net.node_kind[node.index()];
                if !matches!(kind, NodeKind::Base | NodeKind::ChargingStation { .. }) {
                    continue;
                }
                if zone.contains(net.node_pos[node.index()]) {
                    warn!(zone = %zone.id, node = %node, kind = kind.as_str(), "no-fly zone encloses node");
                    warnings.push(OverlayWarning::NodeEnclosed { zone: zone.id, node, kind });
                }
            }
        }

        let overlay = Self { key: zone_set_key(&ids), zones: ids, blocked, warnings };
        debug!(zones = overlay.zones.len(), blocked = overlay.blocked_count(), "overlay built");
        overlay
    }

    /// `true` if `edge` must not be traversed.  Edges unknown to the overlay
    /// are open.
    #[inline]
    pub fn is_blocked(&self, edge: EdgeId) -> bool {
        self.blocked.get(edge.index()).copied().unwrap_or(false)
    }

    /// Hash of the active zone id set this overlay was built from.
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn zone_ids(&self) -> &[ZoneId] {
        &self.zones
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|b| **b).count()
    }

    pub fn warnings(&self) -> &[OverlayWarning] {
        &self.warnings
    }
}

/// Order-independent hash of a zone id set.  `ids` must be sorted.
fn zone_set_key(ids: &[ZoneId]) -> u64 {
    let mut h = FxHasher::default();
    h.write_usize(ids.len());
    for id in ids {
        h.write_u32(id.0);
    }
    h.finish()
}

// ── ZoneRegistry ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct RegistryInner {
    zones:      BTreeMap<ZoneId, Arc<NoFlyZone>>,
    next_id:    u32,
    generation: u64,
    cache:      FxHashMap<u64, Arc<Overlay>>,
}

/// Thread-safe set of registered zones with an overlay cache.
///
/// A registry serves one [`AirNetwork`]; overlays are cached by zone set
/// alone.
#[derive(Default)]
pub struct ZoneRegistry {
    inner: RwLock<RegistryInner>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a polygon zone and return its new id.
    pub fn register(&self, polygon: Vec<GeoPoint>, window: Option<ActiveWindow>) -> SpatialResult<ZoneId> {
        validate_polygon(&polygon)?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = ZoneId(inner.next_id);
        inner.next_id += 1;
        inner.generation += 1;
        inner.zones.insert(id, Arc::new(NoFlyZone { id, polygon, window }));
        debug!(zone = %id, "zone registered");
        Ok(id)
    }

    /// Register the rectangle spanned by two corners.
    pub fn register_rect(&self, a: GeoPoint, b: GeoPoint, window: Option<ActiveWindow>) -> SpatialResult<ZoneId> {
        if a.lat == b.lat || a.lon == b.lon {
            return Err(SpatialError::InvalidZone("degenerate rectangle".into()));
        }
        self.register(rectangle(a, b), window)
    }

    /// Deactivate a zone permanently.
    pub fn remove(&self, id: ZoneId) -> SpatialResult<Arc<NoFlyZone>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let zone = inner.zones.remove(&id).ok_or(SpatialError::ZoneNotFound(id))?;
        inner.generation += 1;
        debug!(zone = %id, "zone removed");
        Ok(zone)
    }

    /// Retire `id` and register the new shape under a fresh id.
    pub fn replace(&self, id: ZoneId, polygon: Vec<GeoPoint>, window: Option<ActiveWindow>) -> SpatialResult<ZoneId> {
        validate_polygon(&polygon)?;
        self.remove(id)?;
        self.register(polygon, window)
    }

    pub fn zone(&self, id: ZoneId) -> Option<Arc<NoFlyZone>> {
        self.read().zones.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().zones.is_empty()
    }

    /// Incremented on every registration or removal.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Ids of zones active at `tick`, ascending.
    pub fn active_ids(&self, tick: Tick) -> Vec<ZoneId> {
        self.read()
            .zones
            .values()
            .filter(|z| z.is_active_at(tick))
            .map(|z| z.id)
            .collect()
    }

    /// Cache key of the overlay that applies at `tick`.
    pub fn key_at(&self, tick: Tick) -> u64 {
        zone_set_key(&self.active_ids(tick))
    }

    /// `true` if `overlay` still reflects the zones active at `tick`.
    pub fn is_current(&self, overlay: &Overlay, tick: Tick) -> bool {
        overlay.key() == self.key_at(tick)
    }

    /// Overlay for the zones active at `tick`, from cache when possible.
    pub fn overlay_at(&self, net: &AirNetwork, tick: Tick) -> Arc<Overlay> {
        let (key, active) = {
            let inner = self.read();
            let active: Vec<Arc<NoFlyZone>> = inner
                .zones
                .values()
                .filter(|z| z.is_active_at(tick))
                .cloned()
                .collect();
            let ids: Vec<ZoneId> = active.iter().map(|z| z.id).collect();
            let key = zone_set_key(&ids);
            if let Some(hit) = inner.cache.get(&key) {
                return Arc::clone(hit);
            }
            (key, active)
        };

        // Built outside the lock; a concurrent builder may race us to the
        // insert, in which case its overlay wins and is identical.
        let overlay = Arc::new(Overlay::build(net, &active));
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.cache.len() >= MAX_CACHED_OVERLAYS {
            inner.cache.clear();
        }
        Arc::clone(inner.cache.entry(key).or_insert(overlay))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate_polygon(polygon: &[GeoPoint]) -> SpatialResult<()> {
    if polygon.len() < 3 {
        return Err(SpatialError::InvalidZone(format!(
            "polygon needs at least 3 vertices, got {}",
            polygon.len()
        )));
    }
    if polygon.iter().any(|p| !p.lat.is_finite() || !p.lon.is_finite()) {
        return Err(SpatialError::InvalidZone("non-finite coordinate".into()));
    }
    Ok(())
}
