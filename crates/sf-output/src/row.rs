//! Plain data row types written by output backends.

/// Sentinel for "no id" in integer id columns.
pub const NO_ID: u32 = u32::MAX;

/// One vehicle's status at a given tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleSnapshotRow {
    pub vehicle_id:  u32,
    pub tick:        u64,
    pub lat:         f64,
    pub lon:         f64,
    pub battery:     f64,
    pub state:       &'static str,
    /// [`NO_ID`] when the vehicle has no order.
    pub order_id:    u32,
    pub remaining_m: f64,
    pub eta_secs:    f64,
}

/// One order status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderEventRow {
    pub order_id:       u32,
    pub tick:           u64,
    pub unix_time_secs: i64,
    pub old_status:     &'static str,
    pub new_status:     &'static str,
    /// [`NO_ID`] when no vehicle was bound.
    pub vehicle_id:     u32,
    /// Empty unless the order failed.
    pub reason:         &'static str,
}

/// Summary statistics for one simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummaryRow {
    pub tick:           u64,
    pub unix_time_secs: i64,
    pub dispatched:     u64,
    pub backlog:        u64,
    pub completed:      u64,
    pub failed:         u64,
    pub idle:           u64,
    pub flying:         u64,
    pub charging:       u64,
    pub waiting:        u64,
    pub faulted:        u64,
}
