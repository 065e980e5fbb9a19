//! `SimOutputObserver<W>`: bridges `SimObserver` to an `OutputWriter`.

use sf_core::{SimConfig, Tick};
use sf_fleet::OrderEvent;
use sf_sim::{SimObserver, TickSummary, VehicleSnapshot};

use crate::row::{NO_ID, OrderEventRow, TickSummaryRow, VehicleSnapshotRow};
use crate::writer::OutputWriter;
use crate::OutputError;

/// A [`SimObserver`] that writes vehicle snapshots, order events, and tick
/// summaries to any [`OutputWriter`] backend.
///
/// Errors from the writer are stored internally because `SimObserver` methods
/// have no return value.  After `sim.run()` returns, check for errors with
/// [`take_error`][Self::take_error].
pub struct SimOutputObserver<W: OutputWriter> {
    writer:             W,
    start_unix_secs:    i64,
    tick_duration_secs: u32,
    last_error:         Option<OutputError>,
}

impl<W: OutputWriter> SimOutputObserver<W> {
    /// Create an observer backed by `writer`, using `config` for wall-clock
    /// conversion.
    pub fn new(writer: W, config: &SimConfig) -> Self {
        Self {
            writer,
            start_unix_secs:    config.start_unix_secs,
            tick_duration_secs: config.tick_duration_secs,
            last_error:         None,
        }
    }

    /// Take the stored write error (if any) after `sim.run()` returns.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn unix_time(&self, tick: Tick) -> i64 {
        self.start_unix_secs + tick.0 as i64 * i64::from(self.tick_duration_secs)
    }

    fn store_err(&mut self, result: crate::OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: OutputWriter> SimObserver for SimOutputObserver<W> {
    fn on_tick_end(&mut self, tick: Tick, summary: &TickSummary) {
        let row = TickSummaryRow {
            tick:           tick.0,
            unix_time_secs: self.unix_time(tick),
            dispatched:     summary.dispatched as u64,
            backlog:        summary.backlog as u64,
            completed:      summary.completed as u64,
            failed:         summary.failed as u64,
            idle:           summary.idle as u64,
            flying:         summary.flying as u64,
            charging:       summary.charging as u64,
            waiting:        summary.waiting as u64,
            faulted:        summary.faulted as u64,
        };
        let result = self.writer.write_tick_summary(&row);
        self.store_err(result);
    }

    fn on_order_event(&mut self, event: &OrderEvent) {
        let row = OrderEventRow {
            order_id:       event.order.0,
            tick:           event.tick.0,
            unix_time_secs: self.unix_time(event.tick),
            old_status:     event.old.as_str(),
            new_status:     event.new.as_str(),
            vehicle_id:     event.vehicle.map_or(NO_ID, |v| v.0),
            reason:         event.reason.map_or("", |r| r.as_str()),
        };
        let result = self.writer.write_order_event(&row);
        self.store_err(result);
    }

    fn on_snapshot(&mut self, tick: Tick, vehicles: &[VehicleSnapshot]) {
        let rows: Vec<VehicleSnapshotRow> = vehicles
            .iter()
            .map(|v| VehicleSnapshotRow {
                vehicle_id:  v.id.0,
                tick:        tick.0,
                lat:         v.position.lat,
                lon:         v.position.lon,
                battery:     v.battery,
                state:       v.state.as_str(),
                order_id:    v.order.map_or(NO_ID, |o| o.0),
                remaining_m: v.remaining_m,
                eta_secs:    v.eta_secs,
            })
            .collect();

        if !rows.is_empty() {
            let result = self.writer.write_snapshots(&rows);
            self.store_err(result);
        }
    }

    fn on_sim_end(&mut self, _final_tick: Tick) {
        let result = self.writer.finish();
        self.store_err(result);
    }
}
