//! Network of per-node sketches evolving through synchronous gossip rounds.
//!
//! Every node holds `M` registers of `W` bits. A resource-holding node starts
//! with exactly one non-zero register; all others start at zero, which encodes
//! "no observation". Registers are then flooded outward by max-consensus rounds,
//! so after `R` rounds register `j` of node `i` is the maximum of register `j`
//! over all nodes within `R` hops of `i`, and the sketch estimates the number of
//! resource-holding nodes in that ball.
//!
//! Once estimates are computed, the maximum estimate is flooded the same way:
//! nodes that ever see a strictly larger neighbor estimate stop being markers,
//! leaving the locally-maximal nodes elected.
//!
//! # Round semantics
//! Both kinds of rounds are bulk-synchronous. Each round computes every node's
//! next state from a frozen snapshot of the previous round into a second buffer,
//! and the buffers are swapped once the round is complete. A round never
//! observes a value written in the same round.

use std::fmt::{Debug, Formatter};
use std::mem::{size_of, swap};

use tracing::{debug, warn};

use crate::cache::CalibrationCache;
use crate::calibration::Calibrator;
use crate::config::SketchParams;
use crate::error::{Error, Result};
use crate::estimate::estimate_sketch;
use crate::registers::{merge_max, Registers};
use crate::sampler::RankSampler;
use crate::topology::Topology;

/// Protocol state of all nodes of a topology
pub struct Network<'t, T: Topology + ?Sized> {
    /// Borrowed graph the protocol runs on
    topology: &'t T,
    /// Sketch dimensions
    params: SketchParams,
    /// Whether each node holds the resource
    has_resource: Vec<bool>,
    /// Registers of the last completed round
    registers: Registers,
    /// Registers being computed by the current round
    next_registers: Registers,
    /// Per-node cardinality estimates
    estimates: Vec<f64>,
    /// Whether each node is still a marker
    markers: Vec<bool>,
    /// Number of sampled ranks clamped to register width
    clamped: usize,
}

impl<'t, T: Topology + ?Sized> Network<'t, T> {
    /// Create network over `topology`, seeding the sketch of every resource-holding node
    /// with one observation drawn from `sampler`.
    ///
    /// Ranks exceeding the register width are clamped to the largest representable value.
    pub fn new<S: RankSampler + ?Sized>(
        topology: &'t T,
        has_resource: Vec<bool>,
        params: SketchParams,
        sampler: &mut S,
    ) -> Result<Self> {
        let nodes = topology.node_count();
        if has_resource.len() != nodes {
            return Err(Error::ResourceFlagsLength {
                nodes,
                flags: has_resource.len(),
            });
        }

        let per_node = params.registers_per_node();
        let max_rank = params.max_rank();
        let mut registers = Registers::new(nodes, per_node, params.register_width());
        let mut clamped = 0;
        for node in (0..nodes).filter(|&node| has_resource[node]) {
            let (idx, rank) = sampler.sample(node, per_node);
            if idx >= per_node {
                return Err(Error::SampledIndexOutOfRange {
                    node,
                    idx,
                    registers: per_node,
                });
            }
            let rank = if rank > max_rank {
                warn!(node, rank, max_rank, "sampled rank exceeds register width, clamping");
                clamped += 1;
                max_rank
            } else {
                rank
            };
            registers.set(node, idx, rank);
        }

        Ok(Self {
            topology,
            params,
            has_resource,
            next_registers: registers.clone(),
            registers,
            estimates: vec![0.0; nodes],
            markers: vec![true; nodes],
            clamped,
        })
    }

    /// Create network with sketches of `bit_budget` bits split into `register_width`-bit registers
    pub fn with_budget<S: RankSampler + ?Sized>(
        topology: &'t T,
        has_resource: Vec<bool>,
        bit_budget: usize,
        register_width: u32,
        sampler: &mut S,
    ) -> Result<Self> {
        let params = SketchParams::new(bit_budget, register_width)?;
        Self::new(topology, has_resource, params, sampler)
    }

    /// Run `rounds` register gossip rounds.
    ///
    /// Each round replaces every node's registers with the element-wise maximum of
    /// its own and its neighbors' registers from the previous round. Running `a`
    /// rounds and then `b` rounds is identical to running `a + b` rounds.
    pub fn propagate_registers(&mut self, rounds: usize) {
        let nodes = self.node_count();
        if rounds == 0 || nodes == 0 {
            return;
        }
        let topology = self.topology;
        let per_node = self.params.registers_per_node();
        let mut acc = vec![0u32; per_node];
        let mut row = vec![0u32; per_node];

        for round in 0..rounds {
            for node in 0..nodes {
                self.registers.read_row(node, &mut acc);
                for &neighbor in topology.neighbors(node) {
                    self.registers.read_row(neighbor, &mut row);
                    merge_max(&mut acc, &row);
                }
                self.next_registers.write_row(node, &acc);
            }
            swap(&mut self.registers, &mut self.next_registers);
            debug!(round, "register round complete");
        }
    }

    /// Compute every node's estimate from its registers using calibration constant `alpha`.
    ///
    /// Nodes whose sketch is degenerate (all registers saturated) get estimate zero.
    pub fn compute_estimates(&mut self, alpha: f64) {
        let mut row = vec![0u32; self.params.registers_per_node()];
        for node in 0..self.node_count() {
            self.registers.read_row(node, &mut row);
            self.estimates[node] = match estimate_sketch(&row, alpha) {
                Some(estimate) => estimate,
                None => {
                    warn!(node, "all registers saturated, estimating zero");
                    0.0
                }
            };
        }
    }

    /// Compute every node's estimate, looking the calibration constant up once.
    pub fn compute_estimates_with<C: CalibrationCache>(
        &mut self,
        calibrator: &Calibrator<C>,
    ) -> Result<()> {
        let alpha = calibrator.alpha(self.params.registers_per_node())?;
        self.compute_estimates(alpha);
        Ok(())
    }

    /// Run `rounds` marker flooding rounds.
    ///
    /// A node adopts the largest neighbor estimate that strictly exceeds its own
    /// and then stops being a marker. Estimates never decrease and markers are
    /// never restored.
    pub fn propagate_markers(&mut self, rounds: usize) {
        let nodes = self.node_count();
        if rounds == 0 || nodes == 0 {
            return;
        }
        let topology = self.topology;
        let mut next_estimates = self.estimates.clone();
        let mut next_markers = self.markers.clone();

        for round in 0..rounds {
            let mut adopted = 0usize;
            for node in 0..nodes {
                let current = self.estimates[node];
                let best = topology
                    .neighbors(node)
                    .iter()
                    .map(|&neighbor| self.estimates[neighbor])
                    .fold(current, f64::max);
                next_estimates[node] = best;
                next_markers[node] = self.markers[node] && best <= current;
                adopted += usize::from(best > current);
            }
            swap(&mut self.estimates, &mut next_estimates);
            swap(&mut self.markers, &mut next_markers);
            debug!(round, adopted, "marker round complete");
        }
    }

    /// Run marker flooding for `N` rounds, enough to converge on any topology
    pub fn elect_markers(&mut self) {
        self.propagate_markers(self.node_count());
    }

    #[inline]
    pub fn topology(&self) -> &'t T {
        self.topology
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.has_resource.len()
    }

    #[inline]
    pub fn params(&self) -> SketchParams {
        self.params
    }

    #[inline]
    pub fn has_resource(&self) -> &[bool] {
        &self.has_resource
    }

    #[inline]
    pub fn estimates(&self) -> &[f64] {
        &self.estimates
    }

    #[inline]
    pub fn markers(&self) -> &[bool] {
        &self.markers
    }

    /// Return ids of nodes which are still markers
    pub fn marker_nodes(&self) -> Vec<usize> {
        self.markers
            .iter()
            .enumerate()
            .filter_map(|(node, &marker)| marker.then_some(node))
            .collect()
    }

    /// Return register `idx` of `node`
    #[inline]
    pub fn register(&self, node: usize, idx: usize) -> u32 {
        self.registers.get(node, idx)
    }

    /// Return unpacked registers of `node`
    pub fn registers_of(&self, node: usize) -> Vec<u32> {
        let mut row = vec![0; self.params.registers_per_node()];
        self.registers.read_row(node, &mut row);
        row
    }

    /// Return number of sampled ranks clamped to register width during initialization
    pub fn clamped_samples(&self) -> usize {
        self.clamped
    }

    /// Return memory size of `Network` including both register buffers
    pub fn size_of(&self) -> usize {
        size_of::<Self>()
            + self.registers.size_of()
            + self.next_registers.size_of()
            + self.has_resource.len() * size_of::<bool>() * 2
            + self.estimates.len() * size_of::<f64>()
    }

    /// Overwrite register `idx` of `node`
    #[cfg(test)]
    pub(crate) fn set_register(&mut self, node: usize, idx: usize, value: u32) {
        self.registers.set(node, idx, value);
    }
}

impl<T: Topology + ?Sized> Debug for Network<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("nodes", &self.node_count())
            .field("registers_per_node", &self.params.registers_per_node())
            .field("register_width", &self.params.register_width())
            .field("markers", &self.markers.iter().filter(|&&m| m).count())
            .field("size", &self.size_of())
            .finish()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::calibration::compute_alpha;
    use crate::sampler::RngSampler;
    use crate::topology::AdjacencyList;
    use test_case::test_case;

    /// Sampler replaying fixed observations per node
    struct Fixed(Vec<(usize, u32)>);

    impl RankSampler for Fixed {
        fn sample(&mut self, node: usize, _registers: usize) -> (usize, u32) {
            self.0[node]
        }
    }

    fn path(n: usize) -> AdjacencyList {
        let edges: Vec<_> = (1..n).map(|i| (i - 1, i)).collect();
        AdjacencyList::from_edges(n, &edges).unwrap()
    }

    #[test]
    fn test_initialization() {
        let graph = path(4);
        let params = SketchParams::new(16, 4).unwrap();
        let mut sampler = Fixed(vec![(0, 3), (1, 1), (2, 7), (3, 2)]);
        let network =
            Network::new(&graph, vec![true, false, true, false], params, &mut sampler).unwrap();

        assert_eq!(network.registers_of(0), vec![3, 0, 0, 0]);
        assert_eq!(network.registers_of(1), vec![0, 0, 0, 0]);
        assert_eq!(network.registers_of(2), vec![0, 0, 7, 0]);
        assert_eq!(network.registers_of(3), vec![0, 0, 0, 0]);
        assert_eq!(network.estimates(), &[0.0; 4]);
        assert_eq!(network.markers(), &[true; 4]);
        assert_eq!(network.clamped_samples(), 0);
    }

    #[test]
    fn test_rank_clamped_to_register_width() {
        let graph = path(2);
        let params = SketchParams::new(8, 2).unwrap();
        let mut sampler = Fixed(vec![(1, 9), (0, 3)]);
        let network = Network::new(&graph, vec![true, true], params, &mut sampler).unwrap();
        assert_eq!(network.registers_of(0), vec![0, 3, 0, 0]);
        assert_eq!(network.registers_of(1), vec![3, 0, 0, 0]);
        assert_eq!(network.clamped_samples(), 1);
    }

    #[test_case(48, 4; "twelve registers")]
    #[test_case(64, 3; "indivisible budget")]
    fn test_invalid_budget(bits: usize, width: u32) {
        let graph = path(3);
        let mut sampler = RngSampler::seeded(0);
        let err = Network::with_budget(&graph, vec![true; 3], bits, width, &mut sampler)
            .unwrap_err();
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn test_resource_flags_length() {
        let graph = path(3);
        let mut sampler = RngSampler::seeded(0);
        let err = Network::with_budget(&graph, vec![true; 2], 64, 4, &mut sampler).unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceFlagsLength { nodes: 3, flags: 2 }
        ));
    }

    #[test]
    fn test_sampled_index_out_of_range() {
        let graph = path(2);
        let params = SketchParams::new(16, 4).unwrap();
        let mut sampler = Fixed(vec![(4, 3), (0, 1)]);
        let err = Network::new(&graph, vec![true, false], params, &mut sampler).unwrap_err();
        assert!(matches!(
            err,
            Error::SampledIndexOutOfRange {
                node: 0,
                idx: 4,
                registers: 4
            }
        ));
        assert!(err.is_invalid_configuration());

        let mut sampler = Fixed(vec![(3, 3), (0, 1)]);
        let network = Network::new(&graph, vec![true, false], params, &mut sampler).unwrap();
        assert_eq!(network.registers_of(0), vec![0, 0, 0, 3]);
        assert_eq!(network.registers_of(1), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_rounds_are_synchronous() {
        // a single round moves a value exactly one hop
        let graph = path(5);
        let params = SketchParams::new(4, 4).unwrap();
        let mut sampler = Fixed(vec![(0, 5); 5]);
        let mut network = Network::new(
            &graph,
            vec![true, false, false, false, false],
            params,
            &mut sampler,
        )
        .unwrap();
        network.propagate_registers(1);
        let slot0: Vec<u32> = (0..5).map(|i| network.register(i, 0)).collect();
        assert_eq!(slot0, vec![5, 5, 0, 0, 0]);
        network.propagate_registers(2);
        let slot0: Vec<u32> = (0..5).map(|i| network.register(i, 0)).collect();
        assert_eq!(slot0, vec![5, 5, 5, 5, 0]);
    }

    #[test]
    fn test_estimates_on_empty_sketches() {
        let graph = path(3);
        let mut sampler = RngSampler::seeded(0);
        let mut network =
            Network::with_budget(&graph, vec![false; 3], 64, 4, &mut sampler).unwrap();
        network.propagate_registers(2);
        network.compute_estimates(compute_alpha(16).unwrap());
        assert_eq!(network.estimates(), &[0.0; 3]);
    }

    #[test]
    fn test_degenerate_sketch_estimates_zero() {
        let graph = path(2);
        let params = SketchParams::new(44, 11).unwrap();
        let mut sampler = Fixed(vec![(0, 1), (0, 1)]);
        let mut network = Network::new(&graph, vec![true, true], params, &mut sampler).unwrap();
        for idx in 0..4 {
            network.set_register(0, idx, 2047);
        }
        network.compute_estimates(compute_alpha(4).unwrap());
        assert_eq!(network.estimates()[0], 0.0);
        assert!(network.estimates()[1] > 0.0);
    }

    #[test]
    fn test_marker_rounds() {
        // estimates 5 - 3 - 10 - 1 along a path
        let graph = path(4);
        let mut sampler = RngSampler::seeded(0);
        let mut network =
            Network::with_budget(&graph, vec![false; 4], 64, 4, &mut sampler).unwrap();
        network.estimates = vec![5.0, 3.0, 10.0, 1.0];

        network.propagate_markers(1);
        assert_eq!(network.estimates(), &[5.0, 10.0, 10.0, 10.0]);
        assert_eq!(network.markers(), &[true, false, true, false]);

        network.propagate_markers(1);
        assert_eq!(network.estimates(), &[10.0; 4]);
        assert_eq!(network.marker_nodes(), vec![2]);

        network.elect_markers();
        assert_eq!(network.marker_nodes(), vec![2]);
    }

    #[test]
    fn test_marker_ties_survive() {
        let graph = path(5);
        let mut sampler = RngSampler::seeded(0);
        let mut network =
            Network::with_budget(&graph, vec![false; 5], 64, 4, &mut sampler).unwrap();
        network.estimates = vec![7.0, 2.0, 7.0, 1.0, 7.0];
        network.elect_markers();
        assert_eq!(network.marker_nodes(), vec![0, 2, 4]);
        assert_eq!(network.estimates(), &[7.0; 5]);
    }

    #[test]
    fn test_empty_topology() {
        let graph = AdjacencyList::default();
        let mut sampler = RngSampler::seeded(0);
        let mut network = Network::with_budget(&graph, vec![], 64, 4, &mut sampler).unwrap();
        network.propagate_registers(3);
        network.compute_estimates(0.7);
        network.elect_markers();
        assert!(network.marker_nodes().is_empty());
        assert_eq!(
            format!("{:?}", network),
            format!(
                "Network {{ nodes: 0, registers_per_node: 16, register_width: 4, markers: 0, size: {} }}",
                network.size_of()
            )
        );
    }
}
