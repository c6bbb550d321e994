//! Graph topologies the protocol runs on.
//!
//! The protocol only needs the node count and neighbor enumeration of an
//! undirected simple graph. Nodes are identified by ids in `[0, N)`.

use crate::error::{Error, Result};

/// Read-only view of an undirected simple graph
pub trait Topology {
    /// Number of nodes `N`
    fn node_count(&self) -> usize;

    /// Neighbors of `node`, which must be in `[0, N)`
    fn neighbors(&self, node: usize) -> &[usize];

    /// Number of edges incident to `node`
    fn degree(&self, node: usize) -> usize {
        self.neighbors(node).len()
    }
}

/// Adjacency list representation of an undirected simple graph
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdjacencyList {
    adjacency: Vec<Vec<usize>>,
}

impl AdjacencyList {
    /// Build graph with `n` nodes from undirected `edges`.
    ///
    /// Self loops, parallel edges and endpoints outside `[0, n)` are rejected.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut adjacency = vec![Vec::new(); n];
        for &(a, b) in edges {
            if a >= n || b >= n {
                return Err(Error::InvalidTopology(format!(
                    "edge ({a}, {b}) out of range for {n} nodes"
                )));
            }
            if a == b {
                return Err(Error::InvalidTopology(format!("self loop at node {a}")));
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        for (node, neighbors) in adjacency.iter_mut().enumerate() {
            neighbors.sort_unstable();
            if let Some(pair) = neighbors.windows(2).find(|pair| pair[0] == pair[1]) {
                return Err(Error::InvalidTopology(format!(
                    "parallel edge ({node}, {})",
                    pair[0]
                )));
            }
        }
        Ok(Self { adjacency })
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }
}

impl Topology for AdjacencyList {
    #[inline]
    fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    #[inline]
    fn neighbors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }
}
