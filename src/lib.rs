//! `network-cardinality-estimator` simulates a gossip protocol estimating, at every node of a graph,
//! how many resource-holding nodes lie within a bounded hop radius, and electing the nodes with
//! locally maximal estimates as markers.
//!
//! Each node keeps a HyperLogLog-style sketch which is merged with its neighbors' sketches by
//! synchronous max-consensus rounds. A bounded breadth-first search provides the exact counts
//! the estimates are validated against.
//!
//! ```
//! use network_cardinality_estimator::{
//!     AdjacencyList, Calibrator, Network, RngSampler, SketchParams, ground_truth,
//! };
//!
//! let graph = AdjacencyList::from_edges(5, &[(0, 1), (1, 2), (2, 3), (3, 4)]).unwrap();
//! let has_resource = vec![true, false, false, false, true];
//! let params = SketchParams::new(64 * 5, 5).unwrap();
//! let mut sampler = RngSampler::seeded(7);
//!
//! let mut network = Network::new(&graph, has_resource.clone(), params, &mut sampler).unwrap();
//! network.propagate_registers(2);
//! network.compute_estimates_with(&Calibrator::default()).unwrap();
//! network.elect_markers();
//!
//! let truth = ground_truth(&graph, &has_resource, 2).unwrap();
//! assert_eq!(truth, vec![1, 1, 2, 1, 1]);
//! assert!(!network.marker_nodes().is_empty());
//! ```
pub mod cache;
pub mod calibration;
pub mod config;
pub mod error;
pub mod estimate;
pub mod ground_truth;
pub mod metrics;
pub mod network;
mod registers;
pub mod sampler;
pub mod simulation;
pub mod topology;

pub use cache::{CacheStore, CalibrationCache, FileCache, MemoryCache, NoCache};
pub use calibration::{compute_alpha, Calibrator};
pub use config::{SimulationConfig, SketchParams};
pub use error::{Error, Result};
pub use ground_truth::{ground_truth, BoundedBfs};
pub use metrics::{frac_rel_error_below, Metrics};
pub use network::Network;
pub use registers::MAX_REGISTER_WIDTH;
pub use sampler::{HashSampler, RankSampler, RngSampler};
pub use simulation::{simulate, GraphDescription, SimulationRecord};
pub use topology::{AdjacencyList, Topology};
