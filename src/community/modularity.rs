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

//! Modularity of a partition under the scaled resolution.

use rayon::prelude::*;

use crate::concurrency::{degree_partitions, AtomicDoubleArray, AtomicLongArray, MIN_BATCH_SIZE};
use crate::error::Result;
use crate::graph::Graph;
use crate::progress::TerminationFlag;

/// Modularity of `communities` on `graph`:
/// `coefficient * (sum of intra-community weights - gamma * sum_c vol(c)^2)`.
///
/// `gamma` is the already scaled resolution. Partition sums are reduced in
/// partition order. Must run inside the worker pool.
pub(crate) fn compute_modularity<G: Graph>(
    graph: &G,
    communities: &AtomicLongArray,
    community_volumes: &AtomicDoubleArray,
    gamma: f64,
    coefficient: f64,
    concurrency: usize,
    termination: &TerminationFlag,
) -> Result<f64> {
    let intra_weight: f64 = degree_partitions(graph, concurrency, MIN_BATCH_SIZE)
        .into_par_iter()
        .map(|range| {
            termination.assert_running()?;
            let mut sum = 0.0;
            for node in range {
                let community = communities.get(node);
                graph.for_each_relationship(node, 1.0, |target, weight| {
                    if communities.get(target) == community {
                        sum += weight;
                    }
                });
            }
            Ok(sum)
        })
        .collect::<Result<Vec<f64>>>()?
        .into_iter()
        .sum();

    let null_model: f64 = (0..community_volumes.len())
        .map(|community| {
            let volume = community_volumes.get(community);
            volume * volume
        })
        .sum();

    Ok((intra_weight - null_model * gamma) * coefficient)
}
