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

//! Greedy node moves towards the neighboring community with the best gain.
//!
//! The gain of putting node `v` into community `C` is
//! `w(v, C) - gamma * vol(v) * vol(C)`, where `gamma` is already scaled by the
//! modularity coefficient. The current community is evaluated with `v`
//! removed from it, and a move is only made on a strict improvement.
//!
//! Nodes are processed in parallel over degree balanced partitions. Community
//! ids and volumes are shared atomics, so concurrent moves see each other's
//! effects without locking. After the first pass only nodes whose neighbor
//! moved to a different community are revisited.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;

use super::common::NeighborWeights;
use super::volume::VolumeTable;
use crate::concurrency::{degree_partitions, AtomicLongArray, MIN_BATCH_SIZE};
use crate::error::{LeidenError, Result};
use crate::graph::Graph;
use crate::progress::TerminationFlag;

/// Result of one local move run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LocalMoveOutcome {
    /// Successful moves summed over all passes.
    pub(crate) swaps: usize,
    /// Non-empty communities after the run.
    pub(crate) community_count: usize,
}

pub(crate) struct LocalMovePhase<'a, G> {
    graph: &'a G,
    communities: &'a AtomicLongArray,
    volumes: &'a VolumeTable,
    community_sizes: Vec<AtomicUsize>,
    community_count: AtomicUsize,
    gamma: f64,
    concurrency: usize,
    termination: &'a TerminationFlag,
}

impl<'a, G: Graph> LocalMovePhase<'a, G> {
    /// Prepares a run, checking that `community_count` matches the number of
    /// non-empty communities in `communities`.
    pub(crate) fn create(
        graph: &'a G,
        communities: &'a AtomicLongArray,
        volumes: &'a VolumeTable,
        gamma: f64,
        community_count: usize,
        concurrency: usize,
        termination: &'a TerminationFlag,
    ) -> Result<Self> {
        let node_count = graph.node_count();
        if community_count > node_count {
            return Err(LeidenError::InconsistentState(format!(
                "{community_count} communities for {node_count} nodes"
            )));
        }

        let mut sizes = vec![0usize; node_count];
        for node in 0..node_count {
            let community = communities.get(node) as usize;
            if community >= node_count {
                return Err(LeidenError::InconsistentState(format!(
                    "community id {community} out of range for {node_count} nodes"
                )));
            }
            sizes[community] += 1;
        }
        let non_empty = sizes.iter().filter(|&&size| size > 0).count();
        if non_empty != community_count {
            return Err(LeidenError::InconsistentState(format!(
                "expected {community_count} communities, found {non_empty}"
            )));
        }

        Ok(LocalMovePhase {
            graph,
            communities,
            volumes,
            community_sizes: sizes.into_iter().map(AtomicUsize::new).collect(),
            community_count: AtomicUsize::new(community_count),
            gamma,
            concurrency,
            termination,
        })
    }

    /// Moves nodes until a pass makes no move. Must run inside the worker pool.
    pub(crate) fn run(&self) -> Result<LocalMoveOutcome> {
        let node_count = self.graph.node_count();
        let partitions = degree_partitions(self.graph, self.concurrency, MIN_BATCH_SIZE);
        let mut active: Vec<AtomicBool> = (0..node_count).map(|_| AtomicBool::new(true)).collect();
        let mut swaps = 0;
        let mut pass = 0;

        loop {
            let next_active: Vec<AtomicBool> =
                (0..node_count).map(|_| AtomicBool::new(false)).collect();

            let pass_swaps: usize = partitions
                .par_iter()
                .map(|range| {
                    self.termination.assert_running()?;
                    let mut weights = NeighborWeights::new();
                    let mut moved = 0;
                    for node in range.clone() {
                        if !active[node].load(Ordering::Relaxed) {
                            continue;
                        }
                        if let Some(community) = self.move_node(node, &mut weights) {
                            moved += 1;
                            self.activate_neighbors(node, community, &next_active);
                        }
                    }
                    Ok(moved)
                })
                .collect::<Result<Vec<usize>>>()?
                .into_iter()
                .sum();

            self.volumes.verify(self.communities)?;
            swaps += pass_swaps;
            pass += 1;
            log::trace!("local move pass {pass}: {pass_swaps} swaps");

            if pass_swaps == 0 || self.community_count() == node_count {
                break;
            }
            active = next_active;
        }

        Ok(LocalMoveOutcome {
            swaps,
            community_count: self.community_count(),
        })
    }

    fn community_count(&self) -> usize {
        self.community_count.load(Ordering::Acquire)
    }

    fn size_of(&self, community: u64) -> usize {
        self.community_sizes[community as usize].load(Ordering::Relaxed)
    }

    /// Returns the new community if `node` moved.
    fn move_node(&self, node: usize, weights: &mut NeighborWeights) -> Option<u64> {
        let current = self.communities.get(node);
        let node_volume = self.volumes.node_volumes[node];
        let community_volumes = &self.volumes.community_volumes;

        weights.clear();
        self.graph.for_each_relationship(node, 1.0, |target, weight| {
            if target != node {
                weights.add(self.communities.get(target), weight);
            }
        });

        let current_volume = community_volumes.get(current as usize) - node_volume;
        let mut best = current;
        let mut best_gain = weights.get(current) - node_volume * current_volume * self.gamma;
        let leaving_singleton = self.size_of(current) == 1;

        for &(candidate, weight) in weights.entries() {
            if candidate == current {
                continue;
            }
            // two singletons only merge towards the smaller id, so concurrent
            // moves cannot swap them past each other
            if leaving_singleton && candidate > current && self.size_of(candidate) == 1 {
                continue;
            }
            let gain = weight - node_volume * community_volumes.get(candidate as usize) * self.gamma;
            if gain > best_gain {
                best = candidate;
                best_gain = gain;
            }
        }

        if best == current {
            return None;
        }

        self.communities.set(node, best);
        community_volumes.add(current as usize, -node_volume);
        community_volumes.add(best as usize, node_volume);
        if self.community_sizes[current as usize].fetch_sub(1, Ordering::AcqRel) == 1 {
            self.community_count.fetch_sub(1, Ordering::AcqRel);
        }
        if self.community_sizes[best as usize].fetch_add(1, Ordering::AcqRel) == 0 {
            self.community_count.fetch_add(1, Ordering::AcqRel);
        }
        Some(best)
    }

    fn activate_neighbors(&self, node: usize, community: u64, next_active: &[AtomicBool]) {
        self.graph.for_each_relationship(node, 1.0, |target, _| {
            if target != node && self.communities.get(target) != community {
                next_active[target].store(true, Ordering::Relaxed);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::volume::init_volumes;
    use crate::graph::{AdjacencyGraph, Orientation};

    fn run_phase(graph: &AdjacencyGraph, concurrency: usize) -> (Vec<u64>, LocalMoveOutcome) {
        let termination = TerminationFlag::new();
        let start: Vec<u64> = (0..graph.node_count() as u64).collect();
        let (volumes, coefficient) =
            init_volumes(graph, &start, true, concurrency, &termination).unwrap();
        let communities = AtomicLongArray::from_vec(start);
        let phase = LocalMovePhase::create(
            graph,
            &communities,
            &volumes,
            coefficient,
            graph.node_count(),
            concurrency,
            &termination,
        )
        .unwrap();
        let outcome = phase.run().unwrap();
        (communities.to_vec(), outcome)
    }

    #[test]
    fn two_disjoint_edges_form_two_communities() {
        let graph =
            AdjacencyGraph::from_edges(4, Orientation::Undirected, &[(0, 1), (2, 3)]).unwrap();
        let (communities, outcome) = run_phase(&graph, 1);
        assert_eq!(communities, vec![0, 0, 2, 2]);
        assert_eq!(outcome.community_count, 2);
        assert_eq!(outcome.swaps, 2);
    }

    #[test]
    fn isolated_nodes_never_move() {
        let graph = AdjacencyGraph::from_edges(5, Orientation::Undirected, &[]).unwrap();
        let (communities, outcome) = run_phase(&graph, 2);
        assert_eq!(communities, vec![0, 1, 2, 3, 4]);
        assert_eq!(outcome.swaps, 0);
        assert_eq!(outcome.community_count, 5);
    }

    #[test]
    fn two_triangles_joined_by_a_bridge() {
        let graph = AdjacencyGraph::from_edges(
            6,
            Orientation::Undirected,
            &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)],
        )
        .unwrap();
        for concurrency in [1, 4] {
            let (communities, outcome) = run_phase(&graph, concurrency);
            assert_eq!(outcome.community_count, 2);
            assert_eq!(communities[0], communities[1]);
            assert_eq!(communities[1], communities[2]);
            assert_eq!(communities[3], communities[4]);
            assert_eq!(communities[4], communities[5]);
            assert_ne!(communities[0], communities[3]);
        }
    }

    #[test]
    fn mismatched_community_count_is_rejected() {
        let graph = AdjacencyGraph::from_edges(2, Orientation::Undirected, &[(0, 1)]).unwrap();
        let termination = TerminationFlag::new();
        let (volumes, _) = init_volumes(&graph, &[0, 1], true, 1, &termination).unwrap();
        let communities = AtomicLongArray::from_vec(vec![0, 1]);
        let result =
            LocalMovePhase::create(&graph, &communities, &volumes, 0.5, 1, 1, &termination);
        assert!(matches!(result, Err(LeidenError::InconsistentState(_))));
    }

    #[test]
    fn cancellation_aborts_the_run() {
        let graph = AdjacencyGraph::from_edges(2, Orientation::Undirected, &[(0, 1)]).unwrap();
        let termination = TerminationFlag::new();
        let (volumes, coefficient) = init_volumes(&graph, &[0, 1], true, 1, &termination).unwrap();
        let communities = AtomicLongArray::from_vec(vec![0, 1]);
        let phase =
            LocalMovePhase::create(&graph, &communities, &volumes, coefficient, 2, 1, &termination)
                .unwrap();
        termination.terminate();
        assert!(phase.run().unwrap_err().is_cancelled());
    }
}
