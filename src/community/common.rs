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

//! Common utilities for the Leiden phases.

use foldhash::{HashMap, HashMapExt};
use rand::prelude::*;
use rand_pcg::Pcg64;

// ============================================================================
// RNG Utilities
// ============================================================================

/// RNG used by the randomized phases.
pub(crate) type CommunityRng = Pcg64;

/// Build RNG from optional seed.
///
/// If seed is provided, creates a deterministic RNG seeded with that value.
/// Otherwise, creates an RNG seeded from the operating system's entropy source.
#[inline]
pub(crate) fn build_rng(seed: Option<u64>) -> CommunityRng {
    match seed {
        Some(s) => Pcg64::seed_from_u64(s),
        None => Pcg64::from_os_rng(),
    }
}

/// Seed for a phase run in a given iteration, so every iteration draws an
/// independent but reproducible stream.
#[inline]
pub(crate) fn iteration_seed(random_seed: u64, iteration: usize) -> u64 {
    random_seed ^ (iteration as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Shuffle a vector of node indices in-place using the provided RNG.
#[inline]
pub(crate) fn shuffle_nodes(rng: &mut CommunityRng, nodes: &mut [usize]) {
    nodes.shuffle(rng);
}

// ============================================================================
// Neighbor Weight Accumulation
// ============================================================================

/// Sums relationship weights per neighboring community.
///
/// Entries keep first-encounter order so candidate evaluation does not depend
/// on hash iteration order. Reused across nodes to avoid reallocation.
#[derive(Debug, Default)]
pub(crate) struct NeighborWeights {
    index: HashMap<u64, usize>,
    entries: Vec<(u64, f64)>,
}

impl NeighborWeights {
    pub(crate) fn new() -> Self {
        NeighborWeights {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    #[inline]
    pub(crate) fn add(&mut self, community: u64, weight: f64) {
        match self.index.get(&community) {
            Some(&slot) => self.entries[slot].1 += weight,
            None => {
                self.index.insert(community, self.entries.len());
                self.entries.push((community, weight));
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, community: u64) -> f64 {
        self.index
            .get(&community)
            .map_or(0.0, |&slot| self.entries[slot].1)
    }

    #[inline]
    pub(crate) fn entries(&self) -> &[(u64, f64)] {
        &self.entries
    }
}

// ============================================================================
// Label/Community Grouping
// ============================================================================

/// Group nodes by their labels into communities.
///
/// Takes a slice of labels (where labels[i] is the community label for node i)
/// and returns a vector of communities (each community is a vector of node indices).
#[inline]
pub(crate) fn group_by_labels(labels: &[u64]) -> Vec<Vec<usize>> {
    let n = labels.len();
    let mut comms: HashMap<u64, Vec<usize>> = HashMap::with_capacity(n);
    for (node, &label) in labels.iter().enumerate() {
        comms.entry(label).or_default().push(node);
    }
    // Sort communities by their minimum node index for deterministic output order.
    let mut result: Vec<Vec<usize>> = comms.into_values().collect();
    result.sort_by_key(|comm| comm.first().copied().unwrap_or(usize::MAX));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rng_is_reproducible() {
        let mut first: Vec<usize> = (0..20).collect();
        let mut second: Vec<usize> = (0..20).collect();
        shuffle_nodes(&mut build_rng(Some(42)), &mut first);
        shuffle_nodes(&mut build_rng(Some(42)), &mut second);
        assert_eq!(first, second);
        assert_ne!(iteration_seed(42, 0), iteration_seed(42, 1));
    }

    #[test]
    fn neighbor_weights_keep_encounter_order() {
        let mut weights = NeighborWeights::new();
        weights.add(9, 1.0);
        weights.add(3, 2.0);
        weights.add(9, 0.5);
        assert_eq!(weights.entries(), &[(9, 1.5), (3, 2.0)]);
        assert_eq!(weights.get(3), 2.0);
        assert_eq!(weights.get(4), 0.0);
        weights.clear();
        assert!(weights.entries().is_empty());
    }

    #[test]
    fn groups_are_ordered_by_smallest_member() {
        let groups = group_by_labels(&[7, 2, 7, 5, 2]);
        assert_eq!(groups, vec![vec![0, 2], vec![1, 4], vec![3]]);
    }
}
