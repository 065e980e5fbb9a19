//! Orders, their lifecycle, and status-change events.

use serde::{Deserialize, Serialize};

use sf_core::{NodeId, OrderId, Tick, VehicleId, VehicleKind};

use crate::Endpoint;

// ── OrderKind ─────────────────────────────────────────────────────────────────

/// What the customer wants done.  Selects the vehicle kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Delivery,
    Shooting,
    Work,
}

impl OrderKind {
    /// Classify free text (addresses, notes) by keyword.
    pub fn classify(text: &str) -> Self {
        const DELIVERY: [&str; 4] = ["deliver", "parcel", "достав", "посыл"];
        const SHOOTING: [&str; 5] = ["photo", "video", "aerial", "съём", "съем"];

        let text = text.to_lowercase();
        if DELIVERY.iter().any(|k| text.contains(k)) {
            OrderKind::Delivery
        } else if SHOOTING.iter().any(|k| text.contains(k)) {
            OrderKind::Shooting
        } else {
            OrderKind::Work
        }
    }

    pub fn required_vehicle(self) -> VehicleKind {
        match self {
            OrderKind::Delivery => VehicleKind::Cargo,
            OrderKind::Shooting => VehicleKind::Operator,
            OrderKind::Work     => VehicleKind::Cleaner,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderKind::Delivery => "delivery",
            OrderKind::Shooting => "shooting",
            OrderKind::Work     => "work",
        }
    }
}

// ── OrderStatus ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
}

impl OrderStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    /// Allowed moves.  `Assigned → Pending` is the only backward one.
    pub fn can_become(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Pending, Failed)
                | (Assigned, InProgress)
                | (Assigned, Pending)
                | (Assigned, Failed)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending    => "pending",
            OrderStatus::Assigned   => "assigned",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed  => "completed",
            OrderStatus::Failed     => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an order ended in [`OrderStatus::Failed`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    Cancelled,
    NotFeasible,
    /// The vehicle would have run its battery below zero.
    BatteryDepleted,
    /// A slot or state invariant failed for the vehicle.
    Invariant,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Cancelled       => "cancelled",
            FailureReason::NotFeasible     => "not_feasible",
            FailureReason::BatteryDepleted => "battery_depleted",
            FailureReason::Invariant       => "invariant",
        }
    }
}

// ── Order ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id:            OrderId,
    pub kind:          OrderKind,
    pub origin:        NodeId,
    pub destination:   NodeId,
    pub waypoints:     Vec<NodeId>,
    /// Battery fraction that must remain on arrival.
    pub battery_floor: f64,
    pub vehicle:       Option<VehicleId>,
    pub status:        OrderStatus,
    pub failure:       Option<FailureReason>,
    pub created:       Tick,
}

/// One order status change, as emitted to the broadcast boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order:   OrderId,
    pub old:     OrderStatus,
    pub new:     OrderStatus,
    pub tick:    Tick,
    pub vehicle: Option<VehicleId>,
    pub reason:  Option<FailureReason>,
}

// ── OrderRequest ──────────────────────────────────────────────────────────────

/// An order as submitted at the boundary, before geocoding.
#[derive(Clone, Debug)]
pub struct OrderRequest {
    /// Explicit kind; classified from the text when absent.
    pub kind:          Option<OrderKind>,
    pub origin:        Endpoint,
    pub destination:   Endpoint,
    pub waypoints:     Vec<Endpoint>,
    /// Falls back to the dispatcher's default floor when absent.
    pub battery_floor: Option<f64>,
    pub note:          String,
}

impl OrderRequest {
    pub fn new(origin: Endpoint, destination: Endpoint) -> Self {
        Self {
            kind: None,
            origin,
            destination,
            waypoints: Vec::new(),
            battery_floor: None,
            note: String::new(),
        }
    }

    pub fn kind(mut self, kind: OrderKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn via(mut self, waypoint: Endpoint) -> Self {
        self.waypoints.push(waypoint);
        self
    }

    pub fn floor(mut self, battery_floor: f64) -> Self {
        self.battery_floor = Some(battery_floor);
        self
    }

    /// Explicit kind, or keyword classification over note and addresses.
    pub fn resolved_kind(&self) -> OrderKind {
        if let Some(k) = self.kind {
            return k;
        }
        let mut text = self.note.clone();
        for ep in [&self.origin, &self.destination] {
            if let Endpoint::Address(a) = ep {
                text.push(' ');
                text.push_str(a);
            }
        }
        OrderKind::classify(&text)
    }
}
