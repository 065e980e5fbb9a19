//! Geocoding seam: turning order endpoints into graph nodes.
//!
//! The engine never talks to a geocoding service itself.  Callers supply a
//! [`Geocoder`]; a failed lookup is reported once and not retried.

use rustc_hash::FxHashMap;

use sf_core::{GeoPoint, NodeId};
use sf_spatial::AirNetwork;

use crate::{FleetError, FleetResult};

/// Address → coordinate lookup.
pub trait Geocoder: Send + Sync {
    fn lookup(&self, address: &str) -> Option<GeoPoint>;
}

/// Geocoder that knows no addresses.
pub struct NoGeocoder;

impl Geocoder for NoGeocoder {
    fn lookup(&self, _address: &str) -> Option<GeoPoint> {
        None
    }
}

/// Fixed address table, matched case-insensitively after trimming.
#[derive(Default)]
pub struct StaticGeocoder {
    entries: FxHashMap<String, GeoPoint>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: &str, pos: GeoPoint) {
        self.entries.insert(normalize(address), pos);
    }

    pub fn with(mut self, address: &str, pos: GeoPoint) -> Self {
        self.insert(address, pos);
        self
    }
}

impl Geocoder for StaticGeocoder {
    fn lookup(&self, address: &str) -> Option<GeoPoint> {
        self.entries.get(&normalize(address)).copied()
    }
}

fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

/// An order endpoint as given by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Endpoint {
    Node(NodeId),
    Coords(GeoPoint),
    Address(String),
}

impl Endpoint {
    /// Resolve to the nearest graph node.
    pub fn resolve(&self, net: &AirNetwork, geocoder: &dyn Geocoder) -> FleetResult<NodeId> {
        match self {
            Endpoint::Node(n) => Ok(net.check_node(*n)?),
            Endpoint::Coords(p) => Ok(net.resolve_coordinate(p.lat, p.lon)?),
            Endpoint::Address(a) => {
                let p = geocoder
                    .lookup(a)
                    .ok_or_else(|| FleetError::GeocodeNotFound(a.clone()))?;
                Ok(net.resolve_coordinate(p.lat, p.lon)?)
            }
        }
    }
}
