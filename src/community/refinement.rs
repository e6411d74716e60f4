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
// https://arxiv.org/abs/1810.08473

//! Splits local move communities into well-connected refined communities.
//!
//! Every node starts alone. Visiting nodes in random order, a node that is
//! still alone and well connected to its local move community may merge into
//! a well-connected refined community inside that same local community. The
//! target is drawn with probability proportional to `exp(gain / theta)` over
//! all candidates with non-negative gain, staying alone included (gain 0).
//! Refined community ids are the id of their first member, which never moves.

use fixedbitset::FixedBitSet;
use rand::prelude::*;
use rayon::prelude::*;

use super::common::{build_rng, shuffle_nodes, CommunityRng, NeighborWeights};
use crate::concurrency::{range_partitions, AtomicDoubleArray, AtomicLongArray, MIN_BATCH_SIZE};
use crate::error::Result;
use crate::graph::Graph;
use crate::progress::TerminationFlag;

/// Nodes visited between two termination checks.
const TERMINATION_CHECK_INTERVAL: usize = 10_000;

#[derive(Debug)]
pub(crate) struct RefinementResult {
    /// Refined community of every node of the working graph.
    pub(crate) communities: Vec<u64>,
    /// Volume per refined community id.
    pub(crate) community_volumes: Vec<f64>,
    pub(crate) maximum_refined_community_id: u64,
}

pub(crate) struct RefinementPhase<'a, G> {
    pub(crate) graph: &'a G,
    pub(crate) local_communities: &'a AtomicLongArray,
    pub(crate) node_volumes: &'a [f64],
    pub(crate) local_community_volumes: &'a AtomicDoubleArray,
    pub(crate) gamma: f64,
    pub(crate) theta: f64,
    pub(crate) seed: u64,
    pub(crate) concurrency: usize,
    pub(crate) termination: &'a TerminationFlag,
}

impl<G: Graph> RefinementPhase<'_, G> {
    /// Must run inside the worker pool.
    pub(crate) fn run(&self) -> Result<RefinementResult> {
        let node_count = self.graph.node_count();
        let internal_weights = self.internal_weights()?;

        let mut refined: Vec<u64> = (0..node_count as u64).collect();
        let mut refined_volumes = self.node_volumes.to_vec();
        let mut cut_weights = internal_weights.clone();
        let mut singleton = FixedBitSet::with_capacity(node_count);
        singleton.insert_range(..);

        let mut rng = build_rng(Some(self.seed));
        let mut order: Vec<usize> = (0..node_count).collect();
        shuffle_nodes(&mut rng, &mut order);

        let mut weights = NeighborWeights::new();
        let mut candidates: Vec<(u64, f64)> = Vec::new();
        let mut probabilities: Vec<f64> = Vec::new();

        for (visited, &node) in order.iter().enumerate() {
            if visited % TERMINATION_CHECK_INTERVAL == 0 {
                self.termination.assert_running()?;
            }
            if !singleton.contains(node) {
                continue;
            }

            let local = self.local_communities.get(node);
            let local_volume = self.local_community_volumes.get(local as usize);
            let volume = self.node_volumes[node];
            if internal_weights[node] < volume * (local_volume - volume) * self.gamma {
                continue;
            }

            weights.clear();
            self.graph.for_each_relationship(node, 1.0, |target, weight| {
                if target != node && self.local_communities.get(target) == local {
                    weights.add(refined[target], weight);
                }
            });

            candidates.clear();
            candidates.push((node as u64, 0.0));
            let mut max_gain = 0.0f64;
            for &(community, weight) in weights.entries() {
                let community_volume = refined_volumes[community as usize];
                let well_connected = cut_weights[community as usize]
                    >= community_volume * (local_volume - community_volume) * self.gamma;
                if !well_connected {
                    continue;
                }
                let gain = weight - volume * community_volume * self.gamma;
                if gain >= 0.0 {
                    candidates.push((community, gain));
                    max_gain = max_gain.max(gain);
                }
            }

            let chosen = choose_community(
                &candidates,
                max_gain,
                self.theta,
                &mut probabilities,
                &mut rng,
            );
            if chosen == node as u64 {
                continue;
            }

            refined[node] = chosen;
            refined_volumes[chosen as usize] += volume;
            refined_volumes[node] = 0.0;
            cut_weights[chosen as usize] += internal_weights[node] - 2.0 * weights.get(chosen);
            singleton.set(chosen as usize, false);
            singleton.set(node, false);
        }

        let maximum_refined_community_id = refined.iter().copied().max().unwrap_or(0);
        Ok(RefinementResult {
            communities: refined,
            community_volumes: refined_volumes,
            maximum_refined_community_id,
        })
    }

    /// Weight from every node to the other members of its local community.
    fn internal_weights(&self) -> Result<Vec<f64>> {
        let node_count = self.graph.node_count();
        Ok(range_partitions(node_count, self.concurrency, MIN_BATCH_SIZE)
            .into_par_iter()
            .map(|range| {
                self.termination.assert_running()?;
                let mut out = Vec::with_capacity(range.len());
                for node in range {
                    let local = self.local_communities.get(node);
                    let mut sum = 0.0;
                    self.graph.for_each_relationship(node, 1.0, |target, weight| {
                        if target != node && self.local_communities.get(target) == local {
                            sum += weight;
                        }
                    });
                    out.push(sum);
                }
                Ok(out)
            })
            .collect::<Result<Vec<Vec<f64>>>>()?
            .concat())
    }
}

/// Draws a candidate with probability proportional to `exp(gain / theta)`.
///
/// Weights are taken relative to `max_gain`, so each lies in `(0, 1]` and a
/// tiny `theta` converges to the greedy choice instead of overflowing.
fn choose_community(
    candidates: &[(u64, f64)],
    max_gain: f64,
    theta: f64,
    probabilities: &mut Vec<f64>,
    rng: &mut CommunityRng,
) -> u64 {
    if candidates.len() == 1 {
        return candidates[0].0;
    }

    probabilities.clear();
    let mut total = 0.0;
    for &(_, gain) in candidates {
        let p = ((gain - max_gain) / theta).exp();
        probabilities.push(p);
        total += p;
    }

    if !total.is_finite() || total <= 0.0 {
        return candidates
            .iter()
            .find(|&&(_, gain)| gain >= max_gain)
            .map_or(candidates[0].0, |&(community, _)| community);
    }

    let mut remaining = rng.random::<f64>() * total;
    for (&(community, _), &p) in candidates.iter().zip(probabilities.iter()) {
        if remaining < p {
            return community;
        }
        remaining -= p;
    }
    candidates[candidates.len() - 1].0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::volume::init_volumes;
    use crate::graph::{AdjacencyGraph, Orientation};

    fn refine(graph: &AdjacencyGraph, local: Vec<u64>, theta: f64, seed: u64) -> RefinementResult {
        let termination = TerminationFlag::new();
        let (volumes, coefficient) = init_volumes(graph, &local, true, 1, &termination).unwrap();
        let local = AtomicLongArray::from_vec(local);
        RefinementPhase {
            graph,
            local_communities: &local,
            node_volumes: &volumes.node_volumes,
            local_community_volumes: &volumes.community_volumes,
            gamma: coefficient,
            theta,
            seed,
            concurrency: 1,
            termination: &termination,
        }
        .run()
        .unwrap()
    }

    #[test]
    fn disconnected_local_community_is_split() {
        // 0-1 and 2-3 are not connected, yet share one local community
        let graph =
            AdjacencyGraph::from_edges(4, Orientation::Undirected, &[(0, 1), (2, 3)]).unwrap();
        let result = refine(&graph, vec![0, 0, 0, 0], 0.01, 7);
        let c = &result.communities;
        assert_eq!(c[0], c[1]);
        assert_eq!(c[2], c[3]);
        assert_ne!(c[0], c[2]);
        assert!(result.maximum_refined_community_id <= 3);
    }

    #[test]
    fn refined_partition_is_finer_than_local() {
        let graph = AdjacencyGraph::from_edges(
            6,
            Orientation::Undirected,
            &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)],
        )
        .unwrap();
        let local = vec![0, 0, 0, 3, 3, 3];
        for seed in 0..5 {
            let result = refine(&graph, local.clone(), 0.01, seed);
            for (node, &refined) in result.communities.iter().enumerate() {
                assert_eq!(local[refined as usize], local[node]);
            }
            let volume_sum: f64 = result.community_volumes.iter().sum();
            assert!((volume_sum - 14.0).abs() < 1e-12);
        }
    }

    #[test]
    fn refinement_is_reproducible_for_a_seed() {
        let graph = AdjacencyGraph::from_edges(
            5,
            Orientation::Undirected,
            &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 0)],
        )
        .unwrap();
        let first = refine(&graph, vec![0; 5], 0.5, 11);
        let second = refine(&graph, vec![0; 5], 0.5, 11);
        assert_eq!(first.communities, second.communities);
    }

    #[test]
    fn tiny_theta_picks_the_best_gain() {
        let mut rng = build_rng(Some(1));
        let mut buffer = Vec::new();
        let candidates = [(0, 0.0), (4, 0.5), (9, 2.0)];
        for _ in 0..20 {
            assert_eq!(
                choose_community(&candidates, 2.0, 1e-300, &mut buffer, &mut rng),
                9
            );
        }
    }
}
