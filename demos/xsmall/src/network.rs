//! Synthetic air network over downtown Mobile, Alabama.
//!
//! A 3 × 3 grid of junctions about 1.5 km apart with a home base on the
//! west and east edges.  The grid centre hosts a two-slot charging pad and
//! the north-east corner a single-slot pad.

use sf_core::{GeoPoint, NodeId};
use sf_spatial::{AirNetwork, AirNetworkBuilder, NodeKind};

const ROWS: [f64; 3] = [30.670, 30.690, 30.710];
const COLS: [f64; 3] = [-88.065, -88.050, -88.035];

/// Named nodes the scenario refers to.
pub struct Landmarks {
    pub west_base:   NodeId,
    pub east_base:   NodeId,
    pub hub_pad:     NodeId,
    pub north_pad:   NodeId,
    /// Row-major grid, south to north, west to east.
    pub grid:        [NodeId; 9],
}

/// Build the network.  Link lengths are the great-circle distance between
/// their endpoints.
pub fn build_network() -> (AirNetwork, Landmarks) {
    let mut b = AirNetworkBuilder::with_capacity(11, 28);

    let mut grid = [NodeId::INVALID; 9];
    for (r, &lat) in ROWS.iter().enumerate() {
        for (c, &lon) in COLS.iter().enumerate() {
            let kind = match (r, c) {
                (1, 1) => NodeKind::ChargingStation { slot_capacity: 2 },
                (2, 2) => NodeKind::ChargingStation { slot_capacity: 1 },
                (0, 0) => NodeKind::Waypoint,
                _      => NodeKind::Junction,
            };
            grid[r * 3 + c] = b.add_node(GeoPoint::new(lat, lon), kind);
        }
    }
    let west_base = b.add_node(GeoPoint::new(30.690, -88.080), NodeKind::Base);
    let east_base = b.add_node(GeoPoint::new(30.690, -88.020), NodeKind::Base);

    for r in 0..3 {
        for c in 0..3 {
            let here = grid[r * 3 + c];
            if c + 1 < 3 {
                link(&mut b, here, grid[r * 3 + c + 1]);
            }
            if r + 1 < 3 {
                link(&mut b, here, grid[(r + 1) * 3 + c]);
            }
        }
    }
    link(&mut b, west_base, grid[3]);
    link(&mut b, east_base, grid[5]);

    let net = b.build();
    let landmarks = Landmarks {
        west_base,
        east_base,
        hub_pad: grid[4],
        north_pad: grid[8],
        grid,
    };
    (net, landmarks)
}

/// Lat/lon of grid node `(r, c)`.
pub fn grid_point(r: usize, c: usize) -> GeoPoint {
    GeoPoint::new(ROWS[r], COLS[c])
}

fn link(b: &mut AirNetworkBuilder, x: NodeId, y: NodeId) {
    let len = b.node_pos(x).distance_m(b.node_pos(y));
    b.add_link(x, y, len);
}
