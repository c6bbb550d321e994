//! Run one simulation on a ring with random chords and print its record.
//!
//! ```sh
//! cargo run --example simulate --features with_serde -- [config.json] [alpha-cache.json]
//! ```
//!
//! Without a configuration file a 500-node run with default sketch parameters is used.
//! Set `RUST_LOG=debug` to follow individual rounds.

use std::collections::HashSet;
use std::error::Error;

use network_cardinality_estimator::{
    frac_rel_error_below, simulate, AdjacencyList, CacheStore, Calibrator, FileCache,
    GraphDescription, MemoryCache, SimulationConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tabled::settings::{Settings, Style};
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

/// Random chords added per node
const CHORDS_PER_NODE: f64 = 0.5;

#[derive(Tabled)]
struct Row {
    metric: &'static str,
    value: String,
}

fn ring_with_chords(n: usize, chords: usize, seed: u64) -> Result<AdjacencyList, Box<dyn Error>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut edges: HashSet<(usize, usize)> = HashSet::new();
    if n > 2 {
        edges.extend((0..n).map(|i| (i.min((i + 1) % n), i.max((i + 1) % n))));
    }
    let target = (edges.len() + chords).min(n * n.saturating_sub(1) / 2);
    while edges.len() < target {
        let (a, b) = (rng.gen_range(0..n), rng.gen_range(0..n));
        if a != b {
            edges.insert((a.min(b), a.max(b)));
        }
    }
    let edges: Vec<_> = edges.into_iter().collect();
    Ok(AdjacencyList::from_edges(n, &edges)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => SimulationConfig {
            nodes: 500,
            ..SimulationConfig::default()
        },
    };
    let cache = match args.next() {
        Some(path) => CacheStore::from(FileCache::open(path)?),
        None => CacheStore::from(MemoryCache::new()),
    };
    let calibrator = Calibrator::new(cache);

    let chords = (config.nodes as f64 * CHORDS_PER_NODE) as usize;
    let graph = ring_with_chords(config.nodes, chords, config.seed)?;
    let description = GraphDescription::new("ring_with_chords")
        .with_parameter("n", config.nodes)
        .with_parameter("chords", chords);

    let record = simulate(&graph, description, &config, &calibrator)?;
    let metrics = record.metrics()?;
    let truth = record.truth_as_f64();

    let rows = vec![
        Row {
            metric: "rmse",
            value: format!("{:.4}", metrics.rmse),
        },
        Row {
            metric: "mae",
            value: format!("{:.4}", metrics.mae),
        },
        Row {
            metric: "mre",
            value: format!("{:.4}", metrics.mre),
        },
        Row {
            metric: "medre",
            value: format!("{:.4}", metrics.medre),
        },
        Row {
            metric: "rel. error < 0.25",
            value: format!("{:.4}", frac_rel_error_below(&record.estimates, &truth, 0.25)?),
        },
        Row {
            metric: "markers",
            value: record.marker_nodes.len().to_string(),
        },
    ];
    let table_config = Settings::default().with(Style::markdown());
    eprintln!("{}", Table::new(rows).with(table_config));
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
