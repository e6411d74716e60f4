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

//! The graph capability consumed by the community detection phases.
//!
//! Loading and storing graphs is not the job of this crate. Phases only need a
//! read-only view offering node counts, per-node relationship iteration and an
//! id translation to the graph level the view was built from. Any storage
//! layer can provide this through the [`Graph`] trait. [`AdjacencyGraph`] is the
//! in-memory CSR implementation used for aggregated levels and tests.

use foldhash::{HashMap, HashMapExt};
use petgraph::visit::EdgeRef;
use petgraph::EdgeType;
use serde::{Deserialize, Serialize};

use crate::error::{LeidenError, Result};

/// Sentinel for "no mapped node" in dense reverse id maps.
const NOT_MAPPED: usize = usize::MAX;

/// How relationships of a graph are traversed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Relationships are traversed in both directions.
    Undirected,
    /// Relationships are traversed from source to target only.
    Natural,
}

/// Read-only view over a loaded graph.
///
/// Implementations must be safe to traverse from many worker threads at once.
/// Node ids are dense and 0-based.
pub trait Graph: Sync {
    /// Number of nodes.
    fn node_count(&self) -> usize;

    /// Number of stored relationships. Undirected relationships count once per
    /// traversal direction.
    fn relationship_count(&self) -> usize;

    /// Traversal orientation of the relationships.
    fn orientation(&self) -> Orientation;

    /// Whether relationships carry a weight property.
    fn has_relationship_property(&self) -> bool;

    /// Number of relationships traversed from `node`.
    fn degree(&self, node: usize) -> usize;

    /// Calls `consumer(target, weight)` for every relationship of `node`.
    ///
    /// Unweighted graphs report `fallback_weight` for every relationship.
    fn for_each_relationship<F>(&self, node: usize, fallback_weight: f64, consumer: F)
    where
        F: FnMut(usize, f64);

    /// Id of `node` in the graph this view was derived from.
    fn to_original_node_id(&self, node: usize) -> u64 {
        node as u64
    }

    /// Inverse of [`Graph::to_original_node_id`].
    fn to_mapped_node_id(&self, original: u64) -> Option<usize> {
        usize::try_from(original)
            .ok()
            .filter(|&node| node < self.node_count())
    }

    /// Per-node integer property, used for seeding.
    fn node_property(&self, _key: &str) -> Option<&[Option<u64>]> {
        None
    }
}

/// Compressed sparse row graph held in memory.
#[derive(Clone, Debug)]
pub struct AdjacencyGraph {
    orientation: Orientation,
    offsets: Vec<usize>,
    targets: Vec<usize>,
    weights: Option<Vec<f64>>,
    original_ids: Option<Vec<u64>>,
    mapped_ids: Vec<usize>,
    node_properties: HashMap<String, Vec<Option<u64>>>,
}

impl AdjacencyGraph {
    /// Build an unweighted graph from an edge list.
    ///
    /// With [`Orientation::Undirected`] every edge is stored in both directions,
    /// self-loops are stored once.
    pub fn from_edges(
        node_count: usize,
        orientation: Orientation,
        edges: &[(usize, usize)],
    ) -> Result<Self> {
        Self::build(
            node_count,
            orientation,
            edges.iter().map(|&(s, t)| (s, t, 1.0)),
            false,
        )
    }

    /// Build a weighted graph from an edge list. Weights must be positive.
    pub fn from_weighted_edges(
        node_count: usize,
        orientation: Orientation,
        edges: &[(usize, usize, f64)],
    ) -> Result<Self> {
        Self::build(node_count, orientation, edges.iter().copied(), true)
    }

    fn build<I>(node_count: usize, orientation: Orientation, edges: I, weighted: bool) -> Result<Self>
    where
        I: Iterator<Item = (usize, usize, f64)> + Clone,
    {
        let mut degrees = vec![0usize; node_count];
        for (s, t, w) in edges.clone() {
            if s >= node_count || t >= node_count {
                return Err(LeidenError::invalid(
                    "graph",
                    format!("relationship ({s}, {t}) references a node outside 0..{node_count}"),
                ));
            }
            if !(w > 0.0) || !w.is_finite() {
                return Err(LeidenError::invalid(
                    "graph",
                    "Leiden algorithm requires positive edge weights.",
                ));
            }
            degrees[s] += 1;
            if orientation == Orientation::Undirected && s != t {
                degrees[t] += 1;
            }
        }

        let mut offsets = Vec::with_capacity(node_count + 1);
        offsets.push(0);
        for degree in &degrees {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + degree);
        }

        let relationship_count = offsets[node_count];
        let mut targets = vec![0usize; relationship_count];
        let mut weights = vec![0.0f64; relationship_count];
        let mut cursor = offsets[..node_count].to_vec();
        let mut push = |s: usize, t: usize, w: f64| {
            targets[cursor[s]] = t;
            weights[cursor[s]] = w;
            cursor[s] += 1;
        };
        for (s, t, w) in edges {
            push(s, t, w);
            if orientation == Orientation::Undirected && s != t {
                push(t, s, w);
            }
        }

        Ok(AdjacencyGraph {
            orientation,
            offsets,
            targets,
            weights: weighted.then_some(weights),
            original_ids: None,
            mapped_ids: Vec::new(),
            node_properties: HashMap::new(),
        })
    }

    /// Assemble a weighted graph from per-node adjacency lists, remembering the
    /// id each node had in the graph it was derived from.
    ///
    /// `original_id_bound` is an exclusive upper bound on `original_ids`.
    pub(crate) fn from_adjacency(
        orientation: Orientation,
        adjacency: Vec<Vec<(usize, f64)>>,
        original_ids: Vec<u64>,
        original_id_bound: usize,
    ) -> Self {
        let node_count = adjacency.len();
        let mut offsets = Vec::with_capacity(node_count + 1);
        offsets.push(0);
        let total: usize = adjacency.iter().map(Vec::len).sum();
        let mut targets = Vec::with_capacity(total);
        let mut weights = Vec::with_capacity(total);
        for relationships in adjacency {
            for (target, weight) in relationships {
                targets.push(target);
                weights.push(weight);
            }
            offsets.push(targets.len());
        }

        let mut mapped_ids = vec![NOT_MAPPED; original_id_bound];
        for (node, &original) in original_ids.iter().enumerate() {
            mapped_ids[original as usize] = node;
        }

        AdjacencyGraph {
            orientation,
            offsets,
            targets,
            weights: Some(weights),
            original_ids: Some(original_ids),
            mapped_ids,
            node_properties: HashMap::new(),
        }
    }

    /// Attach a named per-node property, e.g. seed community labels.
    pub fn with_node_property(
        mut self,
        key: impl Into<String>,
        values: Vec<Option<u64>>,
    ) -> Result<Self> {
        if values.len() != self.node_count() {
            return Err(LeidenError::invalid(
                "node_property",
                format!(
                    "expected {} values, got {}",
                    self.node_count(),
                    values.len()
                ),
            ));
        }
        self.node_properties.insert(key.into(), values);
        Ok(self)
    }
}

impl Graph for AdjacencyGraph {
    fn node_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn relationship_count(&self) -> usize {
        self.targets.len()
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn has_relationship_property(&self) -> bool {
        self.weights.is_some()
    }

    fn degree(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }

    #[inline]
    fn for_each_relationship<F>(&self, node: usize, fallback_weight: f64, mut consumer: F)
    where
        F: FnMut(usize, f64),
    {
        let range = self.offsets[node]..self.offsets[node + 1];
        match &self.weights {
            Some(weights) => {
                for idx in range {
                    consumer(self.targets[idx], weights[idx]);
                }
            }
            None => {
                for &target in &self.targets[range] {
                    consumer(target, fallback_weight);
                }
            }
        }
    }

    fn to_original_node_id(&self, node: usize) -> u64 {
        match &self.original_ids {
            Some(ids) => ids[node],
            None => node as u64,
        }
    }

    fn to_mapped_node_id(&self, original: u64) -> Option<usize> {
        if self.original_ids.is_none() {
            return usize::try_from(original)
                .ok()
                .filter(|&node| node < self.node_count());
        }
        usize::try_from(original)
            .ok()
            .and_then(|idx| self.mapped_ids.get(idx).copied())
            .filter(|&node| node != NOT_MAPPED)
    }

    fn node_property(&self, key: &str) -> Option<&[Option<u64>]> {
        self.node_properties.get(key).map(Vec::as_slice)
    }
}

impl<N, Ty: EdgeType> TryFrom<&petgraph::Graph<N, f64, Ty>> for AdjacencyGraph {
    type Error = LeidenError;

    /// Weighted view over a `petgraph` graph; node indices are kept as ids.
    fn try_from(graph: &petgraph::Graph<N, f64, Ty>) -> Result<Self> {
        let orientation = if Ty::is_directed() {
            Orientation::Natural
        } else {
            Orientation::Undirected
        };
        let edges: Vec<(usize, usize, f64)> = graph
            .edge_references()
            .map(|edge| (edge.source().index(), edge.target().index(), *edge.weight()))
            .collect();
        Self::from_weighted_edges(graph.node_count(), orientation, &edges)
    }
}

/// The graph a Leiden iteration works on: the caller's root graph for the
/// first iteration, an aggregated graph afterwards.
pub(crate) enum WorkingGraph<'g, G> {
    Root(&'g G),
    Aggregated(AdjacencyGraph),
}

impl<G: Graph> Graph for WorkingGraph<'_, G> {
    fn node_count(&self) -> usize {
        match self {
            WorkingGraph::Root(g) => g.node_count(),
            WorkingGraph::Aggregated(g) => g.node_count(),
        }
    }

    fn relationship_count(&self) -> usize {
        match self {
            WorkingGraph::Root(g) => g.relationship_count(),
            WorkingGraph::Aggregated(g) => g.relationship_count(),
        }
    }

    fn orientation(&self) -> Orientation {
        match self {
            WorkingGraph::Root(g) => g.orientation(),
            WorkingGraph::Aggregated(g) => g.orientation(),
        }
    }

    fn has_relationship_property(&self) -> bool {
        match self {
            WorkingGraph::Root(g) => g.has_relationship_property(),
            WorkingGraph::Aggregated(g) => g.has_relationship_property(),
        }
    }

    fn degree(&self, node: usize) -> usize {
        match self {
            WorkingGraph::Root(g) => g.degree(node),
            WorkingGraph::Aggregated(g) => g.degree(node),
        }
    }

    #[inline]
    fn for_each_relationship<F>(&self, node: usize, fallback_weight: f64, consumer: F)
    where
        F: FnMut(usize, f64),
    {
        match self {
            WorkingGraph::Root(g) => g.for_each_relationship(node, fallback_weight, consumer),
            WorkingGraph::Aggregated(g) => g.for_each_relationship(node, fallback_weight, consumer),
        }
    }

    fn to_original_node_id(&self, node: usize) -> u64 {
        match self {
            WorkingGraph::Root(g) => g.to_original_node_id(node),
            WorkingGraph::Aggregated(g) => g.to_original_node_id(node),
        }
    }

    fn to_mapped_node_id(&self, original: u64) -> Option<usize> {
        match self {
            WorkingGraph::Root(g) => g.to_mapped_node_id(original),
            WorkingGraph::Aggregated(g) => g.to_mapped_node_id(original),
        }
    }
}
