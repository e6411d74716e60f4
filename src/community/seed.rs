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

//! Starting communities, optionally derived from externally supplied seeds.

use foldhash::{HashMap, HashMapExt};

use crate::concurrency::AtomicLongArray;
use crate::error::{LeidenError, Result};
use crate::graph::Graph;

/// Where the first local move phase starts from.
#[derive(Clone, Copy, Debug)]
pub(crate) enum InitialCommunities<'a> {
    /// Every node is its own community.
    Singleton,
    /// Nodes sharing a seed label share a community. Nodes without a label
    /// start alone.
    Seeded(&'a [Option<u64>]),
}

impl InitialCommunities<'_> {
    /// Dense starting communities plus the manager translating them back to
    /// seed labels.
    pub(crate) fn resolve(
        &self,
        node_count: usize,
    ) -> Result<(Vec<u64>, SeedCommunityManager)> {
        Ok(match *self {
            InitialCommunities::Singleton => (
                (0..node_count as u64).collect(),
                SeedCommunityManager::Unseeded {
                    community_count: node_count,
                },
            ),
            InitialCommunities::Seeded(seeds) => {
                let unlabelled_offset = unlabelled_offset(seeds)?;
                let mut label_to_community: HashMap<u64, u64> = HashMap::new();
                let mut labels: HashMap<u64, u64> = HashMap::new();
                let mut next_id = 0u64;
                let communities = seeds
                    .iter()
                    .map(|seed| match seed {
                        Some(label) => {
                            *label_to_community.entry(*label).or_insert_with(|| {
                                labels.insert(next_id, *label);
                                next_id += 1;
                                next_id - 1
                            })
                        }
                        None => {
                            next_id += 1;
                            next_id - 1
                        }
                    })
                    .collect();
                (
                    communities,
                    SeedCommunityManager::Seeded {
                        labels,
                        unlabelled_offset,
                        community_count: next_id as usize,
                    },
                )
            }
        })
    }
}

/// First output id for communities without a seed label: one past the
/// largest label.
///
/// Working community ids stay below the node count, so every unlabelled id
/// must fit in `offset..offset + node_count`. Labels too close to `u64::MAX`
/// for that range are rejected when some node has no label.
pub(crate) fn unlabelled_offset(seeds: &[Option<u64>]) -> Result<u64> {
    let max_label = seeds.iter().flatten().copied().max();
    if seeds.iter().all(Option::is_some) {
        return Ok(max_label.map_or(0, |m| m.saturating_add(1)));
    }
    let offset = match max_label {
        Some(m) => m.checked_add(1),
        None => Some(0),
    };
    offset
        .filter(|o| o.checked_add(seeds.len() as u64 - 1).is_some())
        .ok_or_else(|| {
            LeidenError::invalid(
                "seed_property",
                format!(
                    "seed labels up to {} leave no ids for {} nodes without a seed",
                    max_label.unwrap_or_default(),
                    seeds.iter().filter(|s| s.is_none()).count()
                ),
            )
        })
}

/// Tracks the seed label of each working community across levels.
#[derive(Debug)]
pub(crate) enum SeedCommunityManager {
    Unseeded {
        community_count: usize,
    },
    Seeded {
        /// working community id -> seed label
        labels: HashMap<u64, u64>,
        unlabelled_offset: u64,
        community_count: usize,
    },
}

impl SeedCommunityManager {
    /// Distinct starting communities.
    pub(crate) fn communities_count(&self) -> usize {
        match self {
            SeedCommunityManager::Unseeded { community_count }
            | SeedCommunityManager::Seeded {
                community_count, ..
            } => *community_count,
        }
    }

    pub(crate) fn is_seeded(&self) -> bool {
        matches!(self, SeedCommunityManager::Seeded { .. })
    }

    /// Output id of a working community: its seed label when it has one.
    /// Unlabelled communities are shifted past the largest label so the two
    /// id ranges cannot collide.
    #[inline]
    pub(crate) fn map_to_seed(&self, community: u64) -> u64 {
        match self {
            SeedCommunityManager::Unseeded { .. } => community,
            SeedCommunityManager::Seeded {
                labels,
                unlabelled_offset,
                ..
            } => match labels.get(&community) {
                Some(&label) => label,
                // in range, see `unlabelled_offset`
                None => unlabelled_offset.saturating_add(community),
            },
        }
    }

    /// Re-key labels after partition maintenance: the community of aggregated
    /// node `a` is `next[a]` and it descends from the local move community of
    /// the refined community `a` was built from.
    pub(crate) fn carry_forward<G: Graph>(
        &mut self,
        aggregated: &G,
        previous_local: &AtomicLongArray,
        next: &[u64],
    ) {
        if let SeedCommunityManager::Seeded { labels, .. } = self {
            let mut carried = HashMap::with_capacity(labels.len());
            for (node, &community) in next.iter().enumerate() {
                let refined = aggregated.to_original_node_id(node) as usize;
                if let Some(&label) = labels.get(&previous_local.get(refined)) {
                    carried.insert(community, label);
                }
            }
            *labels = carried;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AdjacencyGraph, Orientation};

    #[test]
    fn singleton_start() {
        let (communities, manager) = InitialCommunities::Singleton.resolve(3).unwrap();
        assert_eq!(communities, vec![0, 1, 2]);
        assert_eq!(manager.communities_count(), 3);
        assert_eq!(manager.map_to_seed(2), 2);
        assert!(!manager.is_seeded());
    }

    #[test]
    fn seeds_are_compacted_in_encounter_order() {
        let seeds = [Some(40), Some(10), Some(40), None, Some(10)];
        let (communities, manager) = InitialCommunities::Seeded(&seeds).resolve(5).unwrap();
        assert_eq!(communities, vec![0, 1, 0, 2, 1]);
        assert_eq!(manager.communities_count(), 3);
        assert_eq!(manager.map_to_seed(0), 40);
        assert_eq!(manager.map_to_seed(1), 10);
        // unlabelled community lands past the largest seed
        assert_eq!(manager.map_to_seed(2), 43);
    }

    #[test]
    fn labels_follow_communities_through_aggregation() {
        let seeds = [Some(5), Some(5), Some(8), Some(8)];
        let (communities, mut manager) = InitialCommunities::Seeded(&seeds).resolve(4).unwrap();
        let local = AtomicLongArray::from_vec(communities);
        // aggregated node 0 was refined community 1, node 1 was refined community 2
        let aggregated = AdjacencyGraph::from_adjacency(
            Orientation::Undirected,
            vec![vec![], vec![]],
            vec![1, 2],
            4,
        );
        manager.carry_forward(&aggregated, &local, &[0, 1]);
        assert_eq!(manager.map_to_seed(0), 5);
        assert_eq!(manager.map_to_seed(1), 8);
    }

    #[test]
    fn labels_at_the_top_of_the_range() {
        let seeds = [Some(u64::MAX), Some(u64::MAX), None];
        let err = InitialCommunities::Seeded(&seeds).resolve(3).unwrap_err();
        assert!(err.is_configuration_error());

        let seeds = [Some(u64::MAX), Some(u64::MAX)];
        let (_, manager) = InitialCommunities::Seeded(&seeds).resolve(2).unwrap();
        assert_eq!(manager.map_to_seed(0), u64::MAX);

        let seeds = [Some(u64::MAX - 5), None, None];
        let (communities, manager) = InitialCommunities::Seeded(&seeds).resolve(3).unwrap();
        assert_eq!(communities, vec![0, 1, 2]);
        assert_eq!(manager.map_to_seed(1), u64::MAX - 3);
        assert_eq!(manager.map_to_seed(2), u64::MAX - 2);
    }
}
