//! The `OutputWriter` trait implemented by output backends.

use crate::{OrderEventRow, OutputResult, TickSummaryRow, VehicleSnapshotRow};

/// Sink for the three output streams.
///
/// Errors are stored by the observer and retrieved with
/// [`SimOutputObserver::take_error`][crate::SimOutputObserver::take_error].
pub trait OutputWriter {
    /// Write a batch of vehicle snapshots.
    fn write_snapshots(&mut self, rows: &[VehicleSnapshotRow]) -> OutputResult<()>;

    /// Write one order status change.
    fn write_order_event(&mut self, row: &OrderEventRow) -> OutputResult<()>;

    /// Write one tick summary row.
    fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent: safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
