//! CSV output backend.
//!
//! Creates three files in the configured output directory:
//! - `vehicle_snapshots.csv`
//! - `order_events.csv`
//! - `tick_summaries.csv`

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{OrderEventRow, OutputResult, TickSummaryRow, VehicleSnapshotRow};

pub const SNAPSHOT_HEADER: [&str; 9] = [
    "vehicle_id", "tick", "lat", "lon", "battery", "state", "order_id", "remaining_m", "eta_secs",
];

pub const EVENT_HEADER: [&str; 7] = [
    "order_id", "tick", "unix_time_secs", "old_status", "new_status", "vehicle_id", "reason",
];

pub const SUMMARY_HEADER: [&str; 11] = [
    "tick", "unix_time_secs", "dispatched", "backlog", "completed", "failed",
    "idle", "flying", "charging", "waiting", "faulted",
];

/// Writes simulation output to three CSV files.
pub struct CsvWriter {
    snapshots: Writer<File>,
    events:    Writer<File>,
    summaries: Writer<File>,
    finished:  bool,
}

impl CsvWriter {
    /// Open (or create) the CSV files in `dir` and write the header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        std::fs::create_dir_all(dir)?;

        let mut snapshots = Writer::from_path(dir.join("vehicle_snapshots.csv"))?;
        snapshots.write_record(SNAPSHOT_HEADER)?;

        let mut events = Writer::from_path(dir.join("order_events.csv"))?;
        events.write_record(EVENT_HEADER)?;

        let mut summaries = Writer::from_path(dir.join("tick_summaries.csv"))?;
        summaries.write_record(SUMMARY_HEADER)?;

        Ok(Self {
            snapshots,
            events,
            summaries,
            finished: false,
        })
    }
}

impl OutputWriter for CsvWriter {
    fn write_snapshots(&mut self, rows: &[VehicleSnapshotRow]) -> OutputResult<()> {
        for row in rows {
            self.snapshots.write_record(&[
                row.vehicle_id.to_string(),
                row.tick.to_string(),
                format!("{:.6}", row.lat),
                format!("{:.6}", row.lon),
                format!("{:.4}", row.battery),
                row.state.to_owned(),
                row.order_id.to_string(),
                format!("{:.1}", row.remaining_m),
                format!("{:.1}", row.eta_secs),
            ])?;
        }
        Ok(())
    }

    fn write_order_event(&mut self, row: &OrderEventRow) -> OutputResult<()> {
        self.events.write_record(&[
            row.order_id.to_string(),
            row.tick.to_string(),
            row.unix_time_secs.to_string(),
            row.old_status.to_owned(),
            row.new_status.to_owned(),
            row.vehicle_id.to_string(),
            row.reason.to_owned(),
        ])?;
        Ok(())
    }

    fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()> {
        self.summaries.write_record(&[
            row.tick.to_string(),
            row.unix_time_secs.to_string(),
            row.dispatched.to_string(),
            row.backlog.to_string(),
            row.completed.to_string(),
            row.failed.to_string(),
            row.idle.to_string(),
            row.flying.to_string(),
            row.charging.to_string(),
            row.waiting.to_string(),
            row.faulted.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.snapshots.flush()?;
        self.events.flush()?;
        self.summaries.flush()?;
        Ok(())
    }
}
