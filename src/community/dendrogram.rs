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

//! Per-iteration community assignments expressed in root node ids.

use rayon::prelude::*;
use serde::Serialize;

use super::seed::SeedCommunityManager;
use crate::concurrency::AtomicLongArray;
use crate::error::{LeidenError, Result};
use crate::graph::Graph;

/// Root nodes per parallel work item when translating a level.
const MIN_NODES_PER_TASK: usize = 4_096;

/// Community assignments of every recorded iteration, one level per
/// iteration, each indexed by root node id.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dendrogram {
    levels: Vec<Vec<u64>>,
}

impl Dendrogram {
    /// All levels, coarsening from first to last.
    pub fn levels(&self) -> &[Vec<u64>] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// The last, coarsest level.
    pub fn current(&self) -> Option<&[u64]> {
        self.levels.last().map(Vec::as_slice)
    }

    pub fn community_of(&self, level: usize, node: usize) -> Option<u64> {
        self.levels.get(level).and_then(|l| l.get(node)).copied()
    }
}

/// Records local move communities per iteration and chains refined
/// communities from the root graph to the current working graph.
#[derive(Debug)]
pub(crate) struct DendrogramManager {
    include_intermediate_communities: bool,
    levels: Vec<Vec<u64>>,
    /// Refined community of every root node, in the original id space of the
    /// current working graph.
    current_actual_communities: Vec<u64>,
}

impl DendrogramManager {
    pub(crate) fn new(
        root_node_count: usize,
        max_levels: usize,
        include_intermediate_communities: bool,
    ) -> Self {
        let capacity = if include_intermediate_communities {
            max_levels
        } else {
            1
        };
        DendrogramManager {
            include_intermediate_communities,
            levels: Vec::with_capacity(capacity),
            current_actual_communities: (0..root_node_count as u64).collect(),
        }
    }

    /// Store the local move communities of `working` as a level, translated to
    /// root nodes and to seed labels. Must run inside the worker pool.
    pub(crate) fn update_output_dendrogram<G: Graph>(
        &mut self,
        working: &G,
        local_communities: &AtomicLongArray,
        seeds: &SeedCommunityManager,
    ) -> Result<()> {
        let level = self
            .translate(working, |working_node| {
                seeds.map_to_seed(local_communities.get(working_node))
            })?;
        if self.include_intermediate_communities || self.levels.is_empty() {
            self.levels.push(level);
        } else {
            self.levels[0] = level;
        }
        Ok(())
    }

    /// Advance the root-to-working chain by one refinement step.
    /// Must run inside the worker pool.
    pub(crate) fn update_algorithm_dendrogram<G: Graph>(
        &mut self,
        working: &G,
        refined_communities: &[u64],
    ) -> Result<()> {
        self.current_actual_communities =
            self.translate(working, |working_node| refined_communities[working_node])?;
        Ok(())
    }

    fn translate<G, F>(&self, working: &G, lookup: F) -> Result<Vec<u64>>
    where
        G: Graph,
        F: Fn(usize) -> u64 + Sync,
    {
        self.current_actual_communities
            .par_iter()
            .with_min_len(MIN_NODES_PER_TASK)
            .enumerate()
            .map(|(root_node, &original)| {
                working
                    .to_mapped_node_id(original)
                    .map(&lookup)
                    .ok_or_else(|| {
                        LeidenError::InconsistentState(format!(
                            "root node {root_node} maps to {original}, \
                             which is not a node of the working graph"
                        ))
                    })
            })
            .collect()
    }

    /// The most recent level, if any was recorded.
    pub(crate) fn current(&self) -> Option<&[u64]> {
        self.levels.last().map(Vec::as_slice)
    }

    pub(crate) fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// The public handle, only when intermediate levels were kept.
    pub(crate) fn into_dendrogram(self) -> Option<Dendrogram> {
        self.include_intermediate_communities
            .then_some(Dendrogram {
                levels: self.levels,
            })
    }
}
