//! One complete protocol run and the record it produces for persistence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "with_serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::CalibrationCache;
use crate::calibration::Calibrator;
use crate::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::ground_truth::{argmax, ground_truth};
use crate::metrics::Metrics;
use crate::network::Network;
use crate::sampler::RngSampler;
use crate::topology::Topology;

/// Revision of the code producing a record
pub const SOURCE_REVISION: &str = match option_env!("SOURCE_REVISION") {
    Some(revision) => revision,
    None => env!("CARGO_PKG_VERSION"),
};

/// Description of the topology a run was performed on
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "with_serde", derive(Serialize, Deserialize))]
pub struct GraphDescription {
    /// Generator family, e.g. `"hyperbolic"`
    pub graph_type: String,
    /// Generator parameters by name
    pub parameters: BTreeMap<String, String>,
}

impl GraphDescription {
    pub fn new(graph_type: impl Into<String>) -> Self {
        Self {
            graph_type: graph_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add generator parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.insert(name.into(), value.to_string());
        self
    }
}

/// Outcome of one protocol run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "with_serde", derive(Serialize, Deserialize))]
pub struct SimulationRecord {
    pub graph: GraphDescription,
    /// Number of nodes `N`
    pub nodes: usize,
    /// Bits per register `l`
    pub register_width: u32,
    /// Sketch bits per node `m`
    pub bit_budget: usize,
    /// Resource probability `p`
    pub resource_probability: f64,
    /// Register rounds and ground-truth radius `R`
    pub rounds: u32,
    pub seed: u64,
    pub timestamp: DateTime<Utc>,
    pub source_revision: String,
    /// Estimates after marker propagation
    pub estimates: Vec<f64>,
    /// Nodes still holding the marker
    pub marker_nodes: Vec<usize>,
    /// Exact resource counts within radius `R`
    pub ground_truth: Vec<usize>,
    /// Node with the largest ground truth, the first one on ties
    pub argmax_ground_truth: Option<usize>,
    pub has_resource: Vec<bool>,
}

impl SimulationRecord {
    /// Error summary of the recorded estimates against ground truth
    pub fn metrics(&self) -> Result<Metrics> {
        Metrics::compute(&self.estimates, &self.truth_as_f64())
    }

    /// Ground truth converted for comparison with estimates
    pub fn truth_as_f64(&self) -> Vec<f64> {
        self.ground_truth.iter().map(|&t| t as f64).collect()
    }
}

/// Run the protocol once on `topology` and record the outcome.
///
/// Resource flags and sketch observations are drawn from a random source seeded
/// with `config.seed`, so runs with equal inputs produce equal records apart
/// from the timestamp.
pub fn simulate<T, C>(
    topology: &T,
    graph: GraphDescription,
    config: &SimulationConfig,
    calibrator: &Calibrator<C>,
) -> Result<SimulationRecord>
where
    T: Topology + ?Sized,
    C: CalibrationCache,
{
    let params = config.validate()?;
    let nodes = topology.node_count();
    if config.nodes != nodes {
        return Err(Error::NodeCountMismatch {
            configured: config.nodes,
            topology: nodes,
        });
    }
    // resolved before any round runs, so cache I/O stays out of the rounds
    let alpha = calibrator.alpha(params.registers_per_node())?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let has_resource: Vec<bool> = (0..nodes)
        .map(|_| rng.gen_bool(config.resource_probability))
        .collect();
    let mut sampler = RngSampler::new(rng);

    info!(
        graph_type = %graph.graph_type,
        nodes,
        registers_per_node = params.registers_per_node(),
        register_width = params.register_width(),
        rounds = config.rounds,
        "starting simulation"
    );

    let mut network = Network::new(topology, has_resource, params, &mut sampler)?;
    network.propagate_registers(config.rounds as usize);
    network.compute_estimates(alpha);
    network.propagate_markers(config.marker_rounds_for(nodes));

    let truth = ground_truth(topology, network.has_resource(), i64::from(config.rounds))?;
    let marker_nodes = network.marker_nodes();
    info!(
        markers = marker_nodes.len(),
        clamped = network.clamped_samples(),
        "simulation complete"
    );

    Ok(SimulationRecord {
        graph,
        nodes,
        register_width: params.register_width(),
        bit_budget: params.bit_budget(),
        resource_probability: config.resource_probability,
        rounds: config.rounds,
        seed: config.seed,
        timestamp: Utc::now(),
        source_revision: SOURCE_REVISION.to_string(),
        estimates: network.estimates().to_vec(),
        marker_nodes,
        argmax_ground_truth: argmax(&truth),
        ground_truth: truth,
        has_resource: network.has_resource().to_vec(),
    })
}
