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

//! Node and community volumes, the normalization basis of every gain.
//!
//! The volume of a node is the summed weight of the relationships traversed
//! from it (its degree on unweighted graphs). The volume of a community is the
//! summed volume of its members. Phases keep the community side current with
//! incremental atomic updates instead of recomputing it.

use rayon::prelude::*;

use crate::concurrency::{range_partitions, AtomicDoubleArray, AtomicLongArray, MIN_BATCH_SIZE};
use crate::error::{LeidenError, Result};
use crate::graph::Graph;
use crate::progress::TerminationFlag;

/// Tolerated drift per unit of total volume in the consistency check.
const VOLUME_EPSILON: f64 = 1e-6;

/// Node volumes and the community volumes derived from them.
#[derive(Debug)]
pub(crate) struct VolumeTable {
    pub(crate) node_volumes: Vec<f64>,
    pub(crate) community_volumes: AtomicDoubleArray,
}

impl VolumeTable {
    /// Volumes handed over from partition maintenance.
    pub(crate) fn from_parts(node_volumes: Vec<f64>, community_volumes: Vec<f64>) -> Self {
        VolumeTable {
            node_volumes,
            community_volumes: AtomicDoubleArray::from_vec(community_volumes),
        }
    }

    /// Fails if a community volume drifted from the sum of its members.
    ///
    /// Incremental updates leave rounding residue proportional to the largest
    /// volumes involved, even on communities that became empty, so the
    /// tolerance is taken relative to the total volume.
    pub(crate) fn verify(&self, communities: &AtomicLongArray) -> Result<()> {
        let total_volume: f64 = self.node_volumes.iter().map(|v| v.abs()).sum();
        let tolerance = VOLUME_EPSILON * total_volume;
        let mut expected = vec![0.0f64; self.community_volumes.len()];
        for (node, volume) in self.node_volumes.iter().enumerate() {
            let community = communities.get(node) as usize;
            match expected.get_mut(community) {
                Some(slot) => *slot += volume,
                None => {
                    return Err(LeidenError::InconsistentState(format!(
                        "node {node} is assigned to community {community}, \
                         beyond the {} available ids",
                        expected.len()
                    )))
                }
            }
        }
        for (community, &sum) in expected.iter().enumerate() {
            let actual = self.community_volumes.get(community);
            if (actual - sum).abs() > tolerance {
                return Err(LeidenError::InconsistentState(format!(
                    "volume of community {community} is {actual}, members sum to {sum}"
                )));
            }
        }
        Ok(())
    }
}

/// Compute volumes of the root graph under the starting communities and the
/// modularity scale coefficient `1 / total volume`.
///
/// An empty relationship set yields a coefficient of `1`.
/// Must run inside the worker pool.
pub(crate) fn init_volumes<G: Graph>(
    graph: &G,
    communities: &[u64],
    count_self_loops: bool,
    concurrency: usize,
    termination: &TerminationFlag,
) -> Result<(VolumeTable, f64)> {
    let node_count = graph.node_count();
    let community_volumes = AtomicDoubleArray::new(node_count);
    let degree_is_volume = !graph.has_relationship_property() && count_self_loops;

    let node_volumes = range_partitions(node_count, concurrency, MIN_BATCH_SIZE)
        .into_par_iter()
        .map(|range| {
            termination.assert_running()?;
            let mut volumes = Vec::with_capacity(range.len());
            for node in range {
                let volume = if degree_is_volume {
                    graph.degree(node) as f64
                } else {
                    let mut sum = 0.0;
                    graph.for_each_relationship(node, 1.0, |target, weight| {
                        if count_self_loops || target != node {
                            sum += weight;
                        }
                    });
                    sum
                };
                community_volumes.add(communities[node] as usize, volume);
                volumes.push(volume);
            }
            Ok(volumes)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?
        .concat();

    let total_volume = if degree_is_volume {
        graph.relationship_count() as f64
    } else {
        node_volumes.iter().sum()
    };
    let coefficient = if total_volume > 0.0 {
        1.0 / total_volume
    } else {
        1.0
    };

    Ok((
        VolumeTable {
            node_volumes,
            community_volumes,
        },
        coefficient,
    ))
}
