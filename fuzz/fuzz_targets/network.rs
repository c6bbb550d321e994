#![no_main]

use libfuzzer_sys::fuzz_target;
use network_cardinality_estimator::{
    ground_truth, AdjacencyList, HashSampler, Network, SketchParams, Topology,
};
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // first byte picks node count, the rest are edge endpoints
    let nodes = usize::from(data[0] % 32) + 1;
    let mut edges: Vec<(usize, usize)> = data[1..]
        .chunks_exact(2)
        .map(|pair| (usize::from(pair[0]) % nodes, usize::from(pair[1]) % nodes))
        .filter(|(a, b)| a != b)
        .map(|(a, b)| (a.min(b), a.max(b)))
        .collect();
    edges.sort_unstable();
    edges.dedup();
    let Ok(graph) = AdjacencyList::from_edges(nodes, &edges) else {
        return;
    };

    let seed = wyhash(data, 0);
    let has_resource: Vec<bool> = (0..nodes).map(|i| (seed >> (i % 64)) & 1 == 1).collect();
    let rounds = usize::from(data[1] % 6);
    let params = SketchParams::new(16 * 4, 4).unwrap();
    let mut sampler = HashSampler::<wyhash::WyHash>::new(seed);
    let mut network = Network::new(&graph, has_resource.clone(), params, &mut sampler).unwrap();

    let initial: Vec<Vec<u32>> = (0..nodes).map(|n| network.registers_of(n)).collect();
    network.propagate_registers(rounds);
    for node in 0..nodes {
        for (slot, &r) in initial[node].iter().enumerate() {
            assert!(network.register(node, slot) >= r);
        }
        for &neighbor in graph.neighbors(node).iter().filter(|_| rounds > 0) {
            for slot in 0..params.registers_per_node() {
                assert!(network.register(node, slot) >= initial[neighbor][slot]);
            }
        }
    }

    network.compute_estimates(0.673);
    let before = network.estimates().to_vec();
    network.elect_markers();
    assert!(network.estimates().iter().zip(&before).all(|(a, b)| a >= b));
    for &marker in &network.marker_nodes() {
        assert_eq!(network.estimates()[marker], before[marker]);
    }

    let truth = ground_truth(&graph, &has_resource, rounds as i64).unwrap();
    assert!(truth.iter().all(|&t| t <= nodes));
});
