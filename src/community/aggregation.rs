// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Coarsening of the working graph along the refined communities.

use fixedbitset::FixedBitSet;
use foldhash::{HashMap, HashMapExt};
use rayon::prelude::*;

use super::common::NeighborWeights;
use crate::concurrency::AtomicLongArray;
use crate::error::Result;
use crate::graph::{AdjacencyGraph, Graph, Orientation};
use crate::progress::TerminationFlag;

/// Builds a graph with one node per refined community.
///
/// Aggregated nodes are numbered by increasing community id and report that
/// id through `to_original_node_id`. Relationship weights between two
/// communities are summed; weights inside a community become a single
/// self-loop so intra-community weight is preserved for modularity.
pub(crate) struct GraphAggregationPhase<'a, G> {
    pub(crate) graph: &'a G,
    pub(crate) orientation: Orientation,
    pub(crate) communities: &'a [u64],
    pub(crate) maximum_community_id: u64,
    pub(crate) termination: &'a TerminationFlag,
}

impl<G: Graph> GraphAggregationPhase<'_, G> {
    /// Must run inside the worker pool.
    pub(crate) fn run(&self) -> Result<AdjacencyGraph> {
        let id_bound = self.maximum_community_id as usize + 1;

        let mut present = FixedBitSet::with_capacity(id_bound);
        for &community in self.communities {
            present.insert(community as usize);
        }
        let original_ids: Vec<u64> = present.ones().map(|c| c as u64).collect();
        let mut mapped = vec![usize::MAX; id_bound];
        for (node, &community) in original_ids.iter().enumerate() {
            mapped[community as usize] = node;
        }

        // members of each aggregated node, in working graph order
        let aggregated_count = original_ids.len();
        let mut offsets = vec![0usize; aggregated_count + 1];
        for &community in self.communities {
            offsets[mapped[community as usize] + 1] += 1;
        }
        for idx in 0..aggregated_count {
            offsets[idx + 1] += offsets[idx];
        }
        let mut cursor = offsets.clone();
        let mut members = vec![0usize; self.communities.len()];
        for (node, &community) in self.communities.iter().enumerate() {
            let slot = &mut cursor[mapped[community as usize]];
            members[*slot] = node;
            *slot += 1;
        }

        let adjacency = (0..aggregated_count)
            .into_par_iter()
            .map_init(NeighborWeights::new, |weights, aggregated| {
                self.termination.assert_running()?;
                weights.clear();
                for &member in &members[offsets[aggregated]..offsets[aggregated + 1]] {
                    self.graph.for_each_relationship(member, 1.0, |target, weight| {
                        let target_community = self.communities[target] as usize;
                        weights.add(mapped[target_community] as u64, weight);
                    });
                }
                let mut relationships: Vec<(usize, f64)> = weights
                    .entries()
                    .iter()
                    .map(|&(target, weight)| (target as usize, weight))
                    .collect();
                relationships.sort_unstable_by_key(|&(target, _)| target);
                Ok(relationships)
            })
            .collect::<Result<Vec<Vec<(usize, f64)>>>>()?;

        Ok(AdjacencyGraph::from_adjacency(
            self.orientation,
            adjacency,
            original_ids,
            id_bound,
        ))
    }
}

/// Community state handed from one iteration to the next.
#[derive(Debug)]
pub(crate) struct CommunityData {
    /// Starting community of every aggregated node.
    pub(crate) communities: Vec<u64>,
    pub(crate) community_volumes: Vec<f64>,
    pub(crate) node_volumes: Vec<f64>,
    pub(crate) community_count: usize,
}

/// Carry the local move partition over to the aggregated graph.
///
/// Each aggregated node stands for a refined community, which lies inside
/// exactly one local move community. All aggregated nodes of the same local
/// move community start in one community, identified by the first of them
/// encountered. A refined community id is the id of one of its members, so
/// it can be looked up directly in `local_communities`.
pub(crate) fn maintain_partition<G: Graph>(
    aggregated: &G,
    local_communities: &AtomicLongArray,
    refined_community_volumes: &[f64],
) -> CommunityData {
    let node_count = aggregated.node_count();
    let mut local_to_aggregated: HashMap<u64, u64> = HashMap::new();
    let mut communities = Vec::with_capacity(node_count);
    let mut node_volumes = Vec::with_capacity(node_count);
    let mut community_volumes = vec![0.0; node_count];

    for node in 0..node_count {
        let refined = aggregated.to_original_node_id(node) as usize;
        let local = local_communities.get(refined);
        let community = *local_to_aggregated.entry(local).or_insert(node as u64);
        let volume = refined_community_volumes[refined];
        community_volumes[community as usize] += volume;
        communities.push(community);
        node_volumes.push(volume);
    }

    CommunityData {
        communities,
        community_volumes,
        node_volumes,
        community_count: local_to_aggregated.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relationships(graph: &AdjacencyGraph, node: usize) -> Vec<(usize, f64)> {
        let mut out = Vec::new();
        graph.for_each_relationship(node, 1.0, |t, w| out.push((t, w)));
        out
    }

    #[test]
    fn communities_become_nodes_with_summed_weights() {
        let graph = AdjacencyGraph::from_edges(
            6,
            Orientation::Undirected,
            &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)],
        )
        .unwrap();
        let communities = [1, 1, 1, 5, 5, 5];
        let termination = TerminationFlag::new();
        let aggregated = GraphAggregationPhase {
            graph: &graph,
            orientation: Orientation::Undirected,
            communities: &communities,
            maximum_community_id: 5,
            termination: &termination,
        }
        .run()
        .unwrap();

        assert_eq!(aggregated.node_count(), 2);
        assert_eq!(aggregated.to_original_node_id(0), 1);
        assert_eq!(aggregated.to_original_node_id(1), 5);
        assert_eq!(aggregated.to_mapped_node_id(5), Some(1));
        assert_eq!(relationships(&aggregated, 0), vec![(0, 6.0), (1, 1.0)]);
        assert_eq!(relationships(&aggregated, 1), vec![(0, 1.0), (1, 6.0)]);
        assert!(aggregated.has_relationship_property());
    }

    #[test]
    fn cancelled_aggregation_returns_error() {
        let graph = AdjacencyGraph::from_edges(2, Orientation::Undirected, &[(0, 1)]).unwrap();
        let termination = TerminationFlag::new();
        termination.terminate();
        let result = GraphAggregationPhase {
            graph: &graph,
            orientation: Orientation::Undirected,
            communities: &[0, 1],
            maximum_community_id: 1,
            termination: &termination,
        }
        .run();
        assert!(result.unwrap_err().is_cancelled());
    }

    #[test]
    fn first_aggregated_node_names_the_local_community() {
        // refined communities 0, 2, 3, 5 of a six node graph; local move
        // communities put {0, 3} and {2, 5} together
        let aggregated = AdjacencyGraph::from_adjacency(
            Orientation::Undirected,
            vec![vec![]; 4],
            vec![0, 2, 3, 5],
            6,
        );
        let local = AtomicLongArray::from_vec(vec![4, 4, 1, 4, 1, 1]);
        let refined_volumes = [2.0, 0.0, 1.0, 3.0, 0.0, 4.0];
        let data = maintain_partition(&aggregated, &local, &refined_volumes);
        assert_eq!(data.communities, vec![0, 1, 0, 1]);
        assert_eq!(data.node_volumes, vec![2.0, 1.0, 3.0, 4.0]);
        assert_eq!(data.community_volumes, vec![5.0, 5.0, 0.0, 0.0]);
        assert_eq!(data.community_count, 2);
    }
}
