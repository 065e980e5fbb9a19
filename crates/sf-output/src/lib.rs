//! `sf-output`: CSV sink for the skyfleet broadcast boundary.
//!
//! | Backend | Files created                                                       |
//! |---------|---------------------------------------------------------------------|
//! | CSV     | `vehicle_snapshots.csv`, `order_events.csv`, `tick_summaries.csv`   |
//!
//! Backends implement [`OutputWriter`] and are driven by
//! [`SimOutputObserver`], which implements `sf_sim::SimObserver`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sf_output::{CsvWriter, SimOutputObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let mut obs = SimOutputObserver::new(writer, &config);
//! sim.run(&mut obs)?;
//! if let Some(e) = obs.take_error() {
//!     eprintln!("output error: {e}");
//! }
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(test)]
mod tests;

pub use self::csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::SimOutputObserver;
pub use row::{NO_ID, OrderEventRow, TickSummaryRow, VehicleSnapshotRow};
pub use writer::OutputWriter;
