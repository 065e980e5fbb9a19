//! Air-corridor network representation and builder.
//!
//! # Data layout
//!
//! The graph uses **Compressed Sparse Row (CSR)** format for outgoing edges.
//! Given a `NodeId n`, its outgoing edges occupy the slice:
//!
//! ```text
//! edge_from[ node_out_start[n] .. node_out_start[n+1] ]
//! ```
//!
//! All edge arrays are sorted by source node (then target node, so neighbor
//! iteration order is deterministic) and indexed by `EdgeId`.
//!
//! # Spatial indexes
//!
//! Two R-trees (via `rstar`):
//!
//! - nodes as `[lat, lon]` points, for snapping order coordinates to the
//!   nearest node;
//! - edges as segment bounding boxes, for finding the candidate edges a
//!   no-fly polygon can touch without scanning the whole graph.
//!
//! The network is immutable once built.  Exclusions are never stored on
//! edges; they live in [`Overlay`](crate::Overlay) snapshots.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use sf_core::{BandSet, EdgeId, GeoPoint, NodeId, VehicleProfile};

use crate::{SpatialError, SpatialResult};

// ── Node kinds ────────────────────────────────────────────────────────────────

/// Role of a node in the network.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    Junction,
    /// Vehicle home base.
    Base,
    /// Charging pad with a fixed number of concurrent slots.
    ChargingStation { slot_capacity: u32 },
    Waypoint,
}

impl NodeKind {
    #[inline]
    pub fn is_station(self) -> bool {
        matches!(self, NodeKind::ChargingStation { .. })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Junction              => "junction",
            NodeKind::Base                  => "base",
            NodeKind::ChargingStation { .. } => "charging_station",
            NodeKind::Waypoint              => "waypoint",
        }
    }
}

// ── R-tree entries ────────────────────────────────────────────────────────────

/// Node entry: a 2-D `[lat, lon]` point with the associated `NodeId`.
#[derive(Clone)]
struct NodeEntry {
    point: [f64; 2],
    id: NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    /// Squared Euclidean distance in lat/lon space.  Sufficient for
    /// nearest-node queries within a city.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.point[0] - point[0];
        let dlon = self.point[1] - point[1];
        dlat * dlat + dlon * dlon
    }
}

/// Edge entry: the bounding box of the segment between its endpoints.
#[derive(Clone)]
struct EdgeEntry {
    envelope: AABB<[f64; 2]>,
    id: EdgeId,
}

impl RTreeObject for EdgeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

// ── AirNetwork ────────────────────────────────────────────────────────────────

/// Directed corridor graph in CSR format plus spatial indexes.
///
/// All per-node and per-edge arrays are `pub` for direct indexed access on
/// hot paths.  Do not construct directly; use [`AirNetworkBuilder`].
pub struct AirNetwork {
    // ── Node data ─────────────────────────────────────────────────────────
    pub node_pos: Vec<GeoPoint>,
    /// Ground/structure elevation at the node, metres.
    pub node_elevation_m: Vec<f32>,
    pub node_kind: Vec<NodeKind>,

    // ── CSR edge adjacency ────────────────────────────────────────────────
    /// Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,

    // ── Edge data (indexed by EdgeId) ─────────────────────────────────────
    pub edge_from: Vec<NodeId>,
    pub edge_to: Vec<NodeId>,
    /// Physical length in metres; drives movement.
    pub edge_length_m: Vec<f64>,
    /// Profile-independent traversal cost; multiplied by a profile's energy
    /// factor to get energy.
    pub edge_base_cost: Vec<f64>,
    /// Altitude bands the edge may be flown in.
    pub edge_bands: Vec<BandSet>,

    // ── Spatial indexes ───────────────────────────────────────────────────
    node_idx: RTree<NodeEntry>,
    edge_idx: RTree<EdgeEntry>,
}

impl AirNetwork {
    /// Construct an empty network with no nodes or edges.
    pub fn empty() -> Self {
        AirNetworkBuilder::new().build()
    }

    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    #[inline]
    pub fn contains_node(&self, node: NodeId) -> bool {
        node.index() < self.node_count()
    }

    /// Validate `node` against the network, for use at API boundaries.
    pub fn check_node(&self, node: NodeId) -> SpatialResult<NodeId> {
        if self.contains_node(node) {
            Ok(node)
        } else {
            Err(SpatialError::NodeNotFound(node))
        }
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Iterator over the `EdgeId`s of all outgoing edges from `node`.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        (start..end).map(|i| EdgeId(i as u32))
    }

    /// `(edge, target)` pairs for every outgoing edge of `node`, in ascending
    /// target order.
    #[inline]
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, NodeId)> + '_ {
        self.out_edges(node).map(|e| (e, self.edge_to[e.index()]))
    }

    #[inline]
    pub fn out_degree(&self, node: NodeId) -> usize {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        end - start
    }

    /// The cheapest edge from `from` to `to`, if any.
    pub fn edge_between(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.out_edges(from)
            .filter(|e| self.edge_to[e.index()] == to)
            .min_by(|a, b| self.edge_base_cost[a.index()].total_cmp(&self.edge_base_cost[b.index()]))
    }

    /// Energy needed by `profile` to traverse `edge`.
    #[inline]
    pub fn edge_cost(&self, edge: EdgeId, profile: &VehicleProfile) -> f64 {
        self.edge_base_cost[edge.index()] * profile.kind.energy_factor()
    }

    /// Whether `profile` may fly `edge` at its cruise altitude band.
    #[inline]
    pub fn band_allows(&self, edge: EdgeId, profile: &VehicleProfile) -> bool {
        self.edge_bands[edge.index()].contains(profile.band())
    }

    #[inline]
    pub fn is_station(&self, node: NodeId) -> bool {
        self.node_kind[node.index()].is_station()
    }

    /// All charging-station nodes with their slot capacity, in id order.
    pub fn stations(&self) -> Vec<(NodeId, u32)> {
        self.node_kind
            .iter()
            .enumerate()
            .filter_map(|(i, k)| match k {
                NodeKind::ChargingStation { slot_capacity } => Some((NodeId(i as u32), *slot_capacity)),
                _ => None,
            })
            .collect()
    }

    /// Edge endpoints as coordinates.
    #[inline]
    pub fn edge_segment(&self, edge: EdgeId) -> (GeoPoint, GeoPoint) {
        (
            self.node_pos[self.edge_from[edge.index()].index()],
            self.node_pos[self.edge_to[edge.index()].index()],
        )
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Return the `NodeId` of the nearest node to `pos`.
    ///
    /// Returns `None` only if the network has no nodes.
    pub fn snap_to_node(&self, pos: GeoPoint) -> Option<NodeId> {
        self.node_idx
            .nearest_neighbor(&[pos.lat, pos.lon])
            .map(|e| e.id)
    }

    /// Nearest node to `pos`, as the graph provider's `resolveCoordinate`.
    pub fn resolve_coordinate(&self, lat: f64, lon: f64) -> SpatialResult<NodeId> {
        self.snap_to_node(GeoPoint::new(lat, lon))
            .ok_or(SpatialError::EmptyNetwork)
    }

    /// Return up to `k` nearest nodes to `pos`, sorted by ascending distance.
    pub fn k_nearest_nodes(&self, pos: GeoPoint, k: usize) -> Vec<NodeId> {
        self.node_idx
            .nearest_neighbor_iter(&[pos.lat, pos.lon])
            .take(k)
            .map(|e| e.id)
            .collect()
    }

    /// Nodes whose position lies inside the given lat/lon box.
    pub fn nodes_in_box(&self, min: GeoPoint, max: GeoPoint) -> Vec<NodeId> {
        let env = AABB::from_corners([min.lat, min.lon], [max.lat, max.lon]);
        self.node_idx
            .locate_in_envelope(&env)
            .map(|e| e.id)
            .collect()
    }

    /// Edges whose segment bounding box intersects the given lat/lon box.
    pub fn edges_touching_box(&self, min: GeoPoint, max: GeoPoint) -> Vec<EdgeId> {
        let env = AABB::from_corners([min.lat, min.lon], [max.lat, max.lon]);
        self.edge_idx
            .locate_in_envelope_intersecting(&env)
            .map(|e| e.id)
            .collect()
    }
}

// ── AirNetworkBuilder ─────────────────────────────────────────────────────────

/// Construct an [`AirNetwork`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use sf_core::GeoPoint;
/// use sf_spatial::{AirNetworkBuilder, NodeKind};
///
/// let mut b = AirNetworkBuilder::new();
/// let a = b.add_node(GeoPoint::new(52.52, 13.40), NodeKind::Base);
/// let c = b.add_node(GeoPoint::new(52.53, 13.41), NodeKind::Junction);
/// b.add_link(a, c, 1_200.0);
/// let net = b.build();
/// assert_eq!(net.node_count(), 2);
/// assert_eq!(net.edge_count(), 2); // bidirectional
/// ```
pub struct AirNetworkBuilder {
    nodes:     Vec<RawNode>,
    raw_edges: Vec<RawEdge>,
}

struct RawNode {
    pos:         GeoPoint,
    elevation_m: f32,
    kind:        NodeKind,
}

struct RawEdge {
    from:      NodeId,
    to:        NodeId,
    length_m:  f64,
    base_cost: f64,
    bands:     BandSet,
}

impl AirNetworkBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), raw_edges: Vec::new() }
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes:     Vec::with_capacity(nodes),
            raw_edges: Vec::with_capacity(edges),
        }
    }

    /// Add a node at ground level and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: GeoPoint, kind: NodeKind) -> NodeId {
        self.add_node_with_elevation(pos, 0.0, kind)
    }

    pub fn add_node_with_elevation(&mut self, pos: GeoPoint, elevation_m: f32, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(RawNode { pos, elevation_m, kind });
        id
    }

    /// Add a **directed** edge whose base cost equals its length and which is
    /// open to every altitude band.
    pub fn add_directed_edge(&mut self, from: NodeId, to: NodeId, length_m: f64) {
        self.add_directed_edge_with(from, to, length_m, length_m, BandSet::ALL);
    }

    /// Add a **directed** edge with an explicit base cost and band set.
    ///
    /// Negative costs are clamped to zero: the router relies on non-negative
    /// edge weights.
    pub fn add_directed_edge_with(
        &mut self,
        from:      NodeId,
        to:        NodeId,
        length_m:  f64,
        base_cost: f64,
        bands:     BandSet,
    ) {
        self.raw_edges.push(RawEdge {
            from,
            to,
            length_m: length_m.max(0.0),
            base_cost: base_cost.max(0.0),
            bands,
        });
    }

    /// Convenience: add edges in **both directions**.
    pub fn add_link(&mut self, a: NodeId, b: NodeId, length_m: f64) {
        self.add_directed_edge(a, b, length_m);
        self.add_directed_edge(b, a, length_m);
    }

    /// Bidirectional variant of [`add_directed_edge_with`](Self::add_directed_edge_with).
    pub fn add_link_with(&mut self, a: NodeId, b: NodeId, length_m: f64, base_cost: f64, bands: BandSet) {
        self.add_directed_edge_with(a, b, length_m, base_cost, bands);
        self.add_directed_edge_with(b, a, length_m, base_cost, bands);
    }

    /// Position of a node added earlier (used by loaders to derive lengths).
    pub fn node_pos(&self, id: NodeId) -> GeoPoint {
        self.nodes[id.index()].pos
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.raw_edges.len() }

    /// Consume the builder and produce an [`AirNetwork`].
    ///
    /// Edges referencing unknown nodes are dropped.
    /// Time complexity: O(E log E) for the edge sort + O(N log N + E log E)
    /// for the R-tree bulk loads.
    pub fn build(self) -> AirNetwork {
        let node_count = self.nodes.len();

        let mut raw: Vec<RawEdge> = self
            .raw_edges
            .into_iter()
            .filter(|e| e.from.index() < node_count && e.to.index() < node_count)
            .collect();
        raw.sort_by_key(|e| (e.from.0, e.to.0));
        let edge_count = raw.len();

        let edge_from:      Vec<NodeId>  = raw.iter().map(|e| e.from).collect();
        let edge_to:        Vec<NodeId>  = raw.iter().map(|e| e.to).collect();
        let edge_length_m:  Vec<f64>     = raw.iter().map(|e| e.length_m).collect();
        let edge_base_cost: Vec<f64>     = raw.iter().map(|e| e.base_cost).collect();
        let edge_bands:     Vec<BandSet> = raw.iter().map(|e| e.bands).collect();

        let mut node_out_start = vec![0u32; node_count + 1];
        for e in &raw {
            node_out_start[e.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, edge_count);

        let node_pos: Vec<GeoPoint> = self.nodes.iter().map(|n| n.pos).collect();
        let node_elevation_m: Vec<f32> = self.nodes.iter().map(|n| n.elevation_m).collect();
        let node_kind: Vec<NodeKind> = self.nodes.iter().map(|n| n.kind).collect();

        let node_entries: Vec<NodeEntry> = node_pos
            .iter()
            .enumerate()
            .map(|(i, pos)| NodeEntry {
                point: [pos.lat, pos.lon],
                id: NodeId(i as u32),
            })
            .collect();
        let node_idx = RTree::bulk_load(node_entries);

        let edge_entries: Vec<EdgeEntry> = raw
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let a = node_pos[e.from.index()];
                let b = node_pos[e.to.index()];
                EdgeEntry {
                    envelope: AABB::from_corners([a.lat, a.lon], [b.lat, b.lon]),
                    id: EdgeId(i as u32),
                }
            })
            .collect();
        let edge_idx = RTree::bulk_load(edge_entries);

        AirNetwork {
            node_pos,
            node_elevation_m,
            node_kind,
            node_out_start,
            edge_from,
            edge_to,
            edge_length_m,
            edge_base_cost,
            edge_bands,
            node_idx,
            edge_idx,
        }
    }
}

impl Default for AirNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
