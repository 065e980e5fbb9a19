//! xsmall: smallest end-to-end scenario for the skyfleet engine.
//!
//! Six drones (two of each kind) serve a stream of delivery, shooting and
//! work orders over a synthetic 11-node air network above Mobile, Alabama.
//! Midway through the run a no-fly zone closes the north-central junction
//! and the wind picks up, forcing replans and slower flights.
//!
//! ```text
//! cargo run -p xsmall                    # built-in config
//! cargo run -p xsmall -- run.json        # SimConfig from JSON
//! RUST_LOG=sf_sim=debug cargo run -p xsmall
//! ```

mod network;

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sf_core::{GeoPoint, OrderId, ProfileId, SimConfig, SimRng, Tick, VehicleKind, VehicleProfile};
use sf_fleet::{Endpoint, OrderEvent, OrderKind, OrderRequest, OrderStatus, StaticGeocoder};
use sf_output::{CsvWriter, OutputWriter, SimOutputObserver};
use sf_routing::EnergyRouter;
use sf_sim::{MemoryStore, SimBuilder, SimObserver, TickSummary, VehicleSnapshot, VehicleSpec};
use sf_spatial::ActiveWindow;

use network::{build_network, grid_point, Landmarks};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:                  u64 = 42;
const TICK_DURATION_SECS:    u32 = 10;
const TOTAL_TICKS:           u64 = 360;  // one hour
const OUTPUT_INTERVAL_TICKS: u64 = 6;    // snapshot every minute
const RANDOM_ORDERS:         usize = 9;
const STORM_WIND_MPS:        f64 = 12.0;
const OUTPUT_DIR:            &str = "output/xsmall";

// ── Observer wrapper to count rows ───────────────────────────────────────────

struct CountingObserver<W: OutputWriter> {
    inner:         SimOutputObserver<W>,
    snapshot_rows: usize,
    event_rows:    usize,
    summary_rows:  usize,
}

impl<W: OutputWriter> CountingObserver<W> {
    fn new(inner: SimOutputObserver<W>) -> Self {
        Self { inner, snapshot_rows: 0, event_rows: 0, summary_rows: 0 }
    }
}

impl<W: OutputWriter> SimObserver for CountingObserver<W> {
    fn on_tick_end(&mut self, tick: Tick, summary: &TickSummary) {
        self.summary_rows += 1;
        self.inner.on_tick_end(tick, summary);
    }

    fn on_order_event(&mut self, event: &OrderEvent) {
        self.event_rows += 1;
        self.inner.on_order_event(event);
    }

    fn on_snapshot(&mut self, tick: Tick, vehicles: &[VehicleSnapshot]) {
        self.snapshot_rows += vehicles.len();
        self.inner.on_snapshot(tick, vehicles);
    }

    fn on_sim_end(&mut self, final_tick: Tick) {
        self.inner.on_sim_end(final_tick);
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

fn load_config() -> Result<SimConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            let config: SimConfig = serde_json::from_str(&text)
                .with_context(|| format!("parsing config {path}"))?;
            info!(%path, "loaded config");
            Ok(config)
        }
        None => Ok(SimConfig {
            start_unix_secs:       1_700_000_000,
            tick_duration_secs:    TICK_DURATION_SECS,
            total_ticks:           TOTAL_TICKS,
            seed:                  SEED,
            num_threads:           None,
            output_interval_ticks: OUTPUT_INTERVAL_TICKS,
        }),
    }
}

fn profiles() -> Vec<VehicleProfile> {
    [VehicleKind::Cargo, VehicleKind::Operator, VehicleKind::Cleaner]
        .into_iter()
        .enumerate()
        .map(|(i, kind)| VehicleProfile::standard(ProfileId(i as u16), kind))
        .collect()
}

/// Two drones per profile, split between the bases.  The cleaners start
/// half charged so they need the pads early.
fn vehicles(lm: &Landmarks) -> Vec<VehicleSpec> {
    vec![
        VehicleSpec::new(ProfileId(0), lm.west_base),
        VehicleSpec::new(ProfileId(0), lm.east_base),
        VehicleSpec::new(ProfileId(1), lm.west_base),
        VehicleSpec::new(ProfileId(1), lm.east_base).battery(0.8),
        VehicleSpec::new(ProfileId(2), lm.west_base).battery(0.5),
        VehicleSpec::new(ProfileId(2), lm.east_base).battery(0.4),
    ]
}

fn geocoder() -> StaticGeocoder {
    StaticGeocoder::new()
        .with("Parcel locker, Government Plaza", grid_point(1, 1))
        .with("Aerial video, Cathedral Square", grid_point(2, 0))
        .with("Roof cleaning, 300 Dauphin St", grid_point(0, 2))
        .with("Riverfront warehouse", grid_point(1, 2))
}

/// Orders with random endpoints and kinds drawn from the scenario seed.
fn random_orders(rng: &mut SimRng, lm: &Landmarks, count: usize) -> Vec<OrderRequest> {
    const KINDS: [OrderKind; 3] = [OrderKind::Delivery, OrderKind::Shooting, OrderKind::Work];
    (0..count)
        .filter_map(|_| {
            let from = *rng.choose(&lm.grid[..])?;
            let to = loop {
                let to = *rng.choose(&lm.grid[..])?;
                if to != from {
                    break to;
                }
            };
            let kind = *rng.choose(&KINDS[..])?;
            Some(OrderRequest::new(Endpoint::Node(from), Endpoint::Node(to)).kind(kind))
        })
        .collect()
}

/// Orders given as free text and addresses; their kind is classified.
fn street_orders(lm: &Landmarks) -> Vec<OrderRequest> {
    vec![
        OrderRequest::new(
            Endpoint::Node(lm.west_base),
            Endpoint::Address("Parcel locker, Government Plaza".into()),
        ),
        OrderRequest::new(
            Endpoint::Address("Riverfront warehouse".into()),
            Endpoint::Address("Aerial video, Cathedral Square".into()),
        ),
        OrderRequest::new(
            Endpoint::Coords(GeoPoint::new(30.6702, -88.0648)),
            Endpoint::Address("Roof cleaning, 300 Dauphin St".into()),
        )
        .via(Endpoint::Node(lm.hub_pad))
        .floor(0.25),
    ]
}

fn submit_all(sim: &mut sf_sim::Sim<EnergyRouter>, reqs: &[OrderRequest], geo: &StaticGeocoder) -> Vec<OrderId> {
    reqs.iter()
        .filter_map(|req| match sim.submit_order(req, geo) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "order rejected");
                None
            }
        })
        .collect()
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;

    #[cfg(feature = "parallel")]
    if let Some(n) = config.num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("configuring rayon pool")?;
    }

    println!("=== xsmall: skyfleet drone dispatch ===");
    println!(
        "Ticks: {} × {} s  |  Seed: {}  |  Snapshot every {} ticks",
        config.total_ticks, config.tick_duration_secs, config.seed, config.output_interval_ticks
    );
    println!();

    // 1. Air network.
    let (network, lm) = build_network();
    println!(
        "Air network: {} nodes, {} edges, {} charging pads",
        network.node_count(),
        network.edge_count(),
        network.stations().len()
    );

    // 2. Simulation.
    let mut sim = SimBuilder::new(config.clone(), network, EnergyRouter::default())
        .profiles(profiles())
        .vehicles(vehicles(&lm))
        .build()?;

    // 3. Output.
    let writer = CsvWriter::new(Path::new(OUTPUT_DIR))?;
    let mut obs = CountingObserver::new(SimOutputObserver::new(writer, &config));

    // 4. Opening orders.
    let geo = geocoder();
    let mut rng = SimRng::new(config.seed);
    let mut orders = submit_all(&mut sim, &street_orders(&lm), &geo);
    orders.extend(submit_all(&mut sim, &random_orders(&mut rng, &lm, RANDOM_ORDERS), &geo));
    println!("Submitted {} orders", orders.len());

    // 5. First third: calm weather.
    let t0 = Instant::now();
    let first_leg = config.total_ticks / 3;
    sim.run_ticks(first_leg, &mut obs)?;

    // 6. Weather turns: a half-hour closure over the north-central junction
    //    and a stiff breeze.
    let now = sim.clock.current_tick;
    let closed = grid_point(2, 1);
    let zone = sim.add_zone_rect(
        GeoPoint::new(closed.lat - 0.003, closed.lon - 0.003),
        GeoPoint::new(closed.lat + 0.003, closed.lon + 0.003),
        Some(ActiveWindow::between(now, now.offset(180))),
    )?;
    sim.set_wind(STORM_WIND_MPS);
    info!(%zone, clock = %sim.clock, wind = STORM_WIND_MPS, "storm front");

    // One customer changes their mind, another gives up.
    if let Some(&first) = orders.first() {
        if let Err(e) = sim.update_destination(first, &Endpoint::Node(lm.north_pad), &geo) {
            warn!(order = %first, error = %e, "destination change refused");
        }
    }
    if let Some(&last) = orders.last() {
        match sim.cancel_order(last) {
            Ok(outcome) => info!(order = %last, ?outcome, "order cancelled"),
            Err(e) => warn!(order = %last, error = %e, "cancel refused"),
        }
    }
    orders.extend(submit_all(&mut sim, &random_orders(&mut rng, &lm, RANDOM_ORDERS / 3), &geo));

    // 7. Checkpoint mid-run and resume from it.
    let mut store = MemoryStore::new();
    sim.checkpoint(&mut store)?;
    sim.restore_from(&store)?;
    info!(tick = %sim.clock.current_tick, "resumed from checkpoint");

    // 8. Run to the end.
    sim.run(&mut obs)?;
    let elapsed = t0.elapsed();

    if let Some(e) = obs.inner.take_error() {
        eprintln!("output error: {e}");
    }

    // 9. Summary.
    println!("Simulation complete in {:.3} s", elapsed.as_secs_f64());
    println!("  vehicle_snapshots.csv : {} rows", obs.snapshot_rows);
    println!("  order_events.csv      : {} rows", obs.event_rows);
    println!("  tick_summaries.csv    : {} rows", obs.summary_rows);
    println!();

    let count = |status: OrderStatus| sim.dispatcher.orders().filter(|o| o.status == status).count();
    println!(
        "Orders: {} completed, {} failed, {} in progress, {} pending",
        count(OrderStatus::Completed),
        count(OrderStatus::Failed),
        count(OrderStatus::InProgress) + count(OrderStatus::Assigned),
        count(OrderStatus::Pending),
    );
    println!();

    // 10. Final fleet table.
    println!("{:<8} {:<10} {:<12} {:>8} {:<22}", "Vehicle", "Kind", "State", "Battery", "Position");
    println!("{}", "-".repeat(64));
    for snap in sim.vehicle_snapshots() {
        let kind = sim
            .dispatcher
            .vehicle(snap.id)
            .and_then(|v| sim.dispatcher.profile_of(v))
            .map(|p| p.kind.as_str())
            .unwrap_or("?");
        println!(
            "{:<8} {:<10} {:<12} {:>7.1}% {:>9.5}, {:>9.5}",
            snap.id.0,
            kind,
            snap.state.as_str(),
            snap.battery * 100.0,
            snap.position.lat,
            snap.position.lon,
        );
    }

    Ok(())
}
