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

//! Shared-memory primitives for the data-parallel phases.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;
use crate::graph::Graph;

/// Smallest number of nodes handed to a single partition.
pub(crate) const MIN_BATCH_SIZE: usize = 1_000;

/// Fixed-size worker pool shared by all phases of a run.
pub(crate) fn build_pool(concurrency: usize) -> Result<ThreadPool> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .thread_name(|idx| format!("leiden-worker-{idx}"))
        .build()?)
}

/// Array of `f64` supporting lock-free concurrent accumulation.
#[derive(Debug)]
pub struct AtomicDoubleArray {
    bits: Vec<AtomicU64>,
}

impl AtomicDoubleArray {
    pub fn new(len: usize) -> Self {
        AtomicDoubleArray {
            bits: (0..len).map(|_| AtomicU64::new(0f64.to_bits())).collect(),
        }
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        AtomicDoubleArray {
            bits: values
                .into_iter()
                .map(|v| AtomicU64::new(v.to_bits()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        f64::from_bits(self.bits[index].load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, index: usize, value: f64) {
        self.bits[index].store(value.to_bits(), Ordering::Release);
    }

    /// Atomically adds `delta`, retrying on contention.
    #[inline]
    pub fn add(&self, index: usize, delta: f64) {
        let cell = &self.bits[index];
        let mut current = cell.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match cell.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}

/// Array of `u64` ids readable and writable from many threads.
#[derive(Debug)]
pub struct AtomicLongArray {
    values: Vec<AtomicU64>,
}

impl AtomicLongArray {
    pub fn from_vec(values: Vec<u64>) -> Self {
        AtomicLongArray {
            values: values.into_iter().map(AtomicU64::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        self.values[index].load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, index: usize, value: u64) {
        self.values[index].store(value, Ordering::Release);
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.values.iter().map(|v| v.load(Ordering::Acquire)).collect()
    }
}

/// Split `0..node_count` into at most `concurrency` contiguous ranges of at
/// least `min_batch_size` nodes.
pub(crate) fn range_partitions(
    node_count: usize,
    concurrency: usize,
    min_batch_size: usize,
) -> Vec<Range<usize>> {
    if node_count == 0 {
        return Vec::new();
    }
    let batch = node_count
        .div_ceil(concurrency.max(1))
        .max(min_batch_size)
        .max(1);
    (0..node_count)
        .step_by(batch)
        .map(|start| start..(start + batch).min(node_count))
        .collect()
}

/// Split the nodes of `graph` into contiguous ranges carrying roughly the same
/// number of relationships, so skewed degree distributions do not serialize
/// on one worker.
pub(crate) fn degree_partitions<G: Graph>(
    graph: &G,
    concurrency: usize,
    min_batch_size: usize,
) -> Vec<Range<usize>> {
    let node_count = graph.node_count();
    if concurrency <= 1 || node_count <= min_batch_size {
        return range_partitions(node_count, 1, min_batch_size);
    }
    let total = graph.relationship_count() + node_count;
    let target = total.div_ceil(concurrency);

    let mut partitions = Vec::with_capacity(concurrency);
    let mut start = 0;
    let mut load = 0;
    for node in 0..node_count {
        load += graph.degree(node) + 1;
        if load >= target && node + 1 - start >= min_batch_size {
            partitions.push(start..node + 1);
            start = node + 1;
            load = 0;
        }
    }
    if start < node_count {
        partitions.push(start..node_count);
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AdjacencyGraph, Orientation};
    use rayon::prelude::*;

    #[test]
    fn concurrent_adds_are_not_lost() {
        let pool = build_pool(4).unwrap();
        let array = AtomicDoubleArray::new(2);
        pool.install(|| {
            (0..10_000).into_par_iter().for_each(|i| {
                array.add(i % 2, 0.5);
            });
        });
        assert_eq!(array.get(0), 2_500.0);
        assert_eq!(array.get(1), 2_500.0);
    }

    #[test]
    fn range_partitions_cover_all_nodes() {
        let parts = range_partitions(10, 3, 1);
        assert_eq!(parts, vec![0..4, 4..8, 8..10]);
        assert_eq!(range_partitions(10, 3, 100), vec![0..10]);
        assert!(range_partitions(0, 3, 1).is_empty());
    }

    #[test]
    fn degree_partitions_are_contiguous() {
        let edges: Vec<(usize, usize)> = (1..50).map(|t| (0, t)).collect();
        let graph = AdjacencyGraph::from_edges(50, Orientation::Undirected, &edges).unwrap();
        let parts = degree_partitions(&graph, 4, 1);
        assert_eq!(parts.first().map(|r| r.start), Some(0));
        assert_eq!(parts.last().map(|r| r.end), Some(50));
        for pair in parts.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        // the hub alone carries a quarter of the load
        assert_eq!(parts[0], 0..1);
    }
}
