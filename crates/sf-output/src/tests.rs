//! Integration tests for sf-output.

#[cfg(test)]
mod csv_tests {
    use tempfile::TempDir;

    use crate::csv::{CsvWriter, EVENT_HEADER, SNAPSHOT_HEADER, SUMMARY_HEADER};
    use crate::row::{NO_ID, OrderEventRow, TickSummaryRow, VehicleSnapshotRow};
    use crate::writer::OutputWriter;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    fn snap_row(vehicle_id: u32, tick: u64) -> VehicleSnapshotRow {
        VehicleSnapshotRow {
            vehicle_id,
            tick,
            lat:         52.5,
            lon:         13.4,
            battery:     0.75,
            state:       "en_route",
            order_id:    NO_ID,
            remaining_m: 1234.56,
            eta_secs:    82.3,
        }
    }

    fn headers(path: std::path::PathBuf) -> Vec<String> {
        let mut rdr = csv::Reader::from_path(path).unwrap();
        rdr.headers().unwrap().iter().map(str::to_owned).collect()
    }

    #[test]
    fn csv_files_created_with_headers() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        assert_eq!(headers(dir.path().join("vehicle_snapshots.csv")), SNAPSHOT_HEADER);
        assert_eq!(headers(dir.path().join("order_events.csv")), EVENT_HEADER);
        assert_eq!(headers(dir.path().join("tick_summaries.csv")), SUMMARY_HEADER);
    }

    #[test]
    fn csv_creates_missing_directory() {
        let dir = tmp();
        let nested = dir.path().join("run").join("out");
        let _w = CsvWriter::new(&nested).unwrap();
        assert!(nested.join("order_events.csv").exists());
    }

    #[test]
    fn csv_snapshot_rows() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_snapshots(&[snap_row(0, 5), snap_row(1, 5)]).unwrap();
        w.finish().unwrap();

        let mut rdr = csv::Reader::from_path(dir.path().join("vehicle_snapshots.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][0], "1");
        assert_eq!(&rows[0][1], "5");
        assert_eq!(&rows[0][4], "0.7500");
        assert_eq!(&rows[0][5], "en_route");
        assert_eq!(&rows[0][6], NO_ID.to_string());
        assert_eq!(&rows[0][7], "1234.6");
    }

    #[test]
    fn csv_event_and_summary_rows() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_order_event(&OrderEventRow {
            order_id:       7,
            tick:           3,
            unix_time_secs: 30,
            old_status:     "in_progress",
            new_status:     "failed",
            vehicle_id:     2,
            reason:         "cancelled",
        })
        .unwrap();
        w.write_tick_summary(&TickSummaryRow {
            tick:           3,
            unix_time_secs: 30,
            dispatched:     1,
            backlog:        4,
            completed:      0,
            failed:         1,
            idle:           2,
            flying:         1,
            charging:       0,
            waiting:        0,
            faulted:        0,
        })
        .unwrap();
        w.finish().unwrap();

        let mut rdr = csv::Reader::from_path(dir.path().join("order_events.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][4], "failed");
        assert_eq!(&rows[0][6], "cancelled");

        let mut rdr = csv::Reader::from_path(dir.path().join("tick_summaries.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][3], "4"); // backlog
    }

    #[test]
    fn csv_finish_idempotent() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_snapshots(&[]).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod observer_tests {
    use tempfile::TempDir;

    use sf_core::{GeoPoint, ProfileId, SimConfig, Tick, VehicleKind, VehicleProfile};
    use sf_fleet::OrderKind;
    use sf_routing::EnergyRouter;
    use sf_sim::{SimBuilder, SimObserver, TickSummary, VehicleSpec};
    use sf_spatial::{AirNetworkBuilder, NodeKind};

    use crate::csv::CsvWriter;
    use crate::observer::SimOutputObserver;
    use crate::row::{OrderEventRow, TickSummaryRow, VehicleSnapshotRow};
    use crate::writer::OutputWriter;
    use crate::{OutputError, OutputResult};

    fn config(total_ticks: u64, interval: u64) -> SimConfig {
        SimConfig {
            start_unix_secs:       1_700_000_000,
            tick_duration_secs:    10,
            total_ticks,
            seed:                  1,
            num_threads:           Some(1),
            output_interval_ticks: interval,
        }
    }

    #[test]
    fn integration_csv() {
        let mut b = AirNetworkBuilder::new();
        let n0 = b.add_node(GeoPoint::new(0.0, 0.00), NodeKind::Base);
        let n1 = b.add_node(GeoPoint::new(0.0, 0.01), NodeKind::Junction);
        let n2 = b.add_node(GeoPoint::new(0.0, 0.02), NodeKind::Base);
        b.add_link(n0, n1, 1_000.0);
        b.add_link(n1, n2, 1_000.0);

        let cfg = config(30, 10);
        let mut sim = SimBuilder::new(cfg.clone(), b.build(), EnergyRouter::default())
            .profiles(vec![VehicleProfile::standard(ProfileId(0), VehicleKind::Cargo)])
            .vehicles(vec![VehicleSpec::new(ProfileId(0), n0), VehicleSpec::new(ProfileId(0), n2)])
            .build()
            .unwrap();
        sim.dispatcher.submit(&sim.network, OrderKind::Delivery, n0, n1, vec![], None, Tick(0)).unwrap();

        let dir = TempDir::new().unwrap();
        let writer = CsvWriter::new(dir.path()).unwrap();
        let mut obs = SimOutputObserver::new(writer, &cfg);
        sim.run(&mut obs).unwrap();
        assert!(obs.take_error().is_none(), "no write errors expected");

        // output_interval = 10 → snapshots at ticks 0, 10, 20 for 2 vehicles.
        let mut rdr = csv::Reader::from_path(dir.path().join("vehicle_snapshots.csv")).unwrap();
        assert_eq!(rdr.records().count(), 6);

        let mut rdr = csv::Reader::from_path(dir.path().join("order_events.csv")).unwrap();
        let statuses: Vec<String> = rdr.records().map(|r| r.unwrap()[4].to_owned()).collect();
        assert_eq!(statuses, ["assigned", "in_progress", "completed"]);

        let mut rdr = csv::Reader::from_path(dir.path().join("tick_summaries.csv")).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 30);
        assert_eq!(&rows[1][1], "1700000010");
    }

    struct FailingWriter {
        calls: usize,
    }

    impl OutputWriter for FailingWriter {
        fn write_snapshots(&mut self, _rows: &[VehicleSnapshotRow]) -> OutputResult<()> {
            Ok(())
        }

        fn write_order_event(&mut self, _row: &OrderEventRow) -> OutputResult<()> {
            Ok(())
        }

        fn write_tick_summary(&mut self, _row: &TickSummaryRow) -> OutputResult<()> {
            self.calls += 1;
            Err(OutputError::Io(std::io::Error::other(format!("disk full #{}", self.calls))))
        }

        fn finish(&mut self) -> OutputResult<()> {
            Ok(())
        }
    }

    #[test]
    fn first_error_kept() {
        let cfg = config(5, 1);
        let mut obs = SimOutputObserver::new(FailingWriter { calls: 0 }, &cfg);
        obs.on_tick_end(Tick(0), &TickSummary::default());
        obs.on_tick_end(Tick(1), &TickSummary::default());
        let err = obs.take_error().unwrap();
        assert!(err.to_string().contains("#1"));
        assert!(obs.take_error().is_none());
        assert_eq!(obs.into_writer().calls, 2);
    }
}
