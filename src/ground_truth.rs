//! Exact count of resource-holding nodes within a hop radius, used to validate estimates.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::topology::Topology;

/// Breadth-first search bounded to a radius, reusing its scratch buffers across sources
#[derive(Debug, Clone)]
pub struct BoundedBfs {
    /// Search in which each node was last visited
    visited: Vec<usize>,
    /// Hop distance from the current source, valid for visited nodes
    distance: Vec<usize>,
    queue: VecDeque<usize>,
    /// Current search, starting at 1 so zeroed `visited` means unvisited
    epoch: usize,
}

impl BoundedBfs {
    /// Create search over graphs with `nodes` nodes
    pub fn new(nodes: usize) -> Self {
        Self {
            visited: vec![0; nodes],
            distance: vec![0; nodes],
            queue: VecDeque::with_capacity(nodes),
            epoch: 0,
        }
    }

    /// Count resource-holding nodes within `radius` hops of `source`, `source` included
    pub fn count<T: Topology + ?Sized>(
        &mut self,
        topology: &T,
        has_resource: &[bool],
        source: usize,
        radius: usize,
    ) -> usize {
        self.epoch += 1;
        self.queue.clear();
        self.visited[source] = self.epoch;
        self.distance[source] = 0;
        self.queue.push_back(source);

        let mut count = 0;
        while let Some(node) = self.queue.pop_front() {
            count += usize::from(has_resource[node]);
            let distance = self.distance[node];
            if distance >= radius {
                continue;
            }
            for &neighbor in topology.neighbors(node) {
                if self.visited[neighbor] != self.epoch {
                    self.visited[neighbor] = self.epoch;
                    self.distance[neighbor] = distance + 1;
                    self.queue.push_back(neighbor);
                }
            }
        }
        count
    }
}

/// Count, for every node, the resource-holding nodes within `radius` hops.
pub fn ground_truth<T: Topology + ?Sized>(
    topology: &T,
    has_resource: &[bool],
    radius: i64,
) -> Result<Vec<usize>> {
    let radius = usize::try_from(radius).map_err(|_| Error::NegativeRadius(radius))?;
    let nodes = topology.node_count();
    if has_resource.len() != nodes {
        return Err(Error::ResourceFlagsLength {
            nodes,
            flags: has_resource.len(),
        });
    }

    let mut bfs = BoundedBfs::new(nodes);
    Ok((0..nodes)
        .map(|source| bfs.count(topology, has_resource, source, radius))
        .collect())
}

/// Return node with the largest count, the first one on ties
pub fn argmax(counts: &[usize]) -> Option<usize> {
    counts
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, usize)>, (node, &count)| match best {
            Some((_, max)) if max >= count => best,
            _ => Some((node, count)),
        })
        .map(|(node, _)| node)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::topology::AdjacencyList;
    use test_case::test_case;

    fn path(n: usize) -> AdjacencyList {
        let edges: Vec<_> = (1..n).map(|i| (i - 1, i)).collect();
        AdjacencyList::from_edges(n, &edges).unwrap()
    }

    #[test_case(0 => vec![1, 0, 0, 0, 1])]
    #[test_case(1 => vec![1, 1, 0, 1, 1])]
    #[test_case(2 => vec![1, 1, 2, 1, 1])]
    #[test_case(3 => vec![1, 2, 2, 2, 1])]
    #[test_case(4 => vec![2, 2, 2, 2, 2])]
    #[test_case(100 => vec![2, 2, 2, 2, 2])]
    fn test_path_ground_truth(radius: i64) -> Vec<usize> {
        ground_truth(&path(5), &[true, false, false, false, true], radius).unwrap()
    }

    #[test]
    fn test_disconnected_components() {
        let graph = AdjacencyList::from_edges(6, &[(0, 1), (1, 2), (3, 4)]).unwrap();
        let has_resource = [true, true, true, true, false, true];
        assert_eq!(
            ground_truth(&graph, &has_resource, 10).unwrap(),
            vec![3, 3, 3, 1, 1, 1]
        );
    }

    #[test]
    fn test_star_radius_one() {
        let graph = AdjacencyList::from_edges(5, &[(0, 1), (0, 2), (0, 3), (0, 4)]).unwrap();
        let has_resource = [false, true, true, true, true];
        assert_eq!(
            ground_truth(&graph, &has_resource, 1).unwrap(),
            vec![4, 1, 1, 1, 1]
        );
    }

    #[test]
    fn test_invalid_arguments() {
        let graph = path(3);
        let err = ground_truth(&graph, &[true; 3], -1).unwrap_err();
        assert!(matches!(err, Error::NegativeRadius(-1)));
        assert!(err.is_invalid_argument());
        assert!(ground_truth(&graph, &[true; 2], 1).is_err());
    }

    #[test_case(&[] => None)]
    #[test_case(&[3] => Some(0))]
    #[test_case(&[1, 4, 2, 4] => Some(1))]
    #[test_case(&[0, 0, 0] => Some(0))]
    fn test_argmax(counts: &[usize]) -> Option<usize> {
        argmax(counts)
    }
}
