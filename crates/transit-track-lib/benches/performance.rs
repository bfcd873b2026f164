//! Performance benchmarks for transit-track-lib
//!
//! Run with: cargo bench --package transit-track-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::time::Duration;
use transit_track_lib::interline::{self, StationLineIndex};
use transit_track_lib::projection::{self, ProjectionOptions};
use transit_track_lib::{ChangeSet, Line, MapSnapshot, Simulator, SimulatorConfig, Station};

/// A grid city: `lines` east-west lines over a shared trunk of stations.
///
/// Every line runs along the trunk for a while before branching off, so the
/// interline builder has plenty of shared runs to merge.
fn generate_network(lines: usize, stops_per_line: usize) -> MapSnapshot {
    let mut snapshot = MapSnapshot::new();

    for i in 0..stops_per_line {
        let lng = -0.2 + i as f64 * 0.005;
        snapshot.insert_station(Station::new(format!("T{i}"), 51.5, lng));
    }

    for l in 0..lines {
        let shared = stops_per_line / 2;
        let mut ids: Vec<String> = (l % 4..shared).map(|i| format!("T{i}")).collect();
        for i in shared..stops_per_line {
            let id = format!("L{l}S{i}");
            let lat = 51.5 + (l + 1) as f64 * 0.003;
            let lng = -0.2 + i as f64 * 0.005;
            let station = if i % 3 == 0 {
                Station::waypoint(id.clone(), lat, lng)
            } else {
                Station::new(id.clone(), lat, lng)
            };
            snapshot.insert_station(station);
            ids.push(id);
        }

        let color = format!("#{:06x}", (l * 0x1f3d5b) % 0xffffff);
        let mut line = Line::new(format!("L{l}"), color, ids);
        line.mode = Some(["BUS", "TRAM", "METRO"][l % 3].to_string());
        snapshot.insert_line(line);
    }

    snapshot
}

// ============================================================================
// Core Benchmarks
// ============================================================================

fn bench_interline(c: &mut Criterion) {
    let mut group = c.benchmark_group("interline");
    group.sample_size(20);

    for lines in [10, 50] {
        let snapshot = generate_network(lines, 100);
        let index = StationLineIndex::build(snapshot.lines.values());

        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::new("build_segments", lines), &lines, |b, _| {
            b.iter(|| {
                interline::build_segments(snapshot.lines.values(), &snapshot.stations, &index, 6.0)
            });
        });
    }

    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");

    let mut stations = std::collections::HashMap::new();
    let mut ids = Vec::new();
    // A round-the-world air route: long hauls and an antimeridian crossing
    for (i, (lat, lng)) in [
        (51.47, -0.45),
        (25.25, 55.36),
        (1.36, 103.99),
        (35.55, 139.78),
        (37.62, -122.38),
        (40.64, -73.78),
    ]
    .into_iter()
    .enumerate()
    {
        let id = format!("A{i}");
        stations.insert(id.clone(), Station::new(id.clone(), lat, lng));
        ids.push(id);
    }
    let options = ProjectionOptions::default();

    group.bench_function("project_multi_world", |b| {
        b.iter(|| projection::project_multi(&stations, &ids, &options));
    });
    group.bench_function("project_world", |b| {
        b.iter(|| projection::project(&stations, &ids, &options));
    });

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulator");

    let snapshot = generate_network(50, 100);
    let mut simulator = Simulator::new(SimulatorConfig::default());
    simulator.recompute(&snapshot, &ChangeSet::full());

    let mut now = Duration::ZERO;
    group.throughput(Throughput::Elements(snapshot.lines.len() as u64));
    group.bench_function("tick_50_lines", |b| {
        b.iter(|| {
            now += Duration::from_millis(16);
            simulator.tick(&snapshot, now).vehicles.len()
        });
    });

    group.sample_size(10);
    group.bench_function("recompute_full_50_lines", |b| {
        b.iter(|| {
            let mut simulator = Simulator::new(SimulatorConfig::default());
            simulator.recompute(&snapshot, &ChangeSet::full()).len()
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_interline, bench_projection, bench_tick);

criterion_main!(benches);
