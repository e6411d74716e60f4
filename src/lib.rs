// Licensed under the Apache License, Version 2.0 (the "License"); you may
// not use this file except in compliance with the License. You may obtain
// a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations
// under the License.

//! Parallel Leiden community detection.
//!
//! ```no_run
//! use leiden::{leiden_communities, AdjacencyGraph, LeidenConfig, Orientation};
//!
//! let graph = AdjacencyGraph::from_edges(4, Orientation::Undirected, &[(0, 1), (2, 3)])?;
//! let result = leiden_communities(&graph, LeidenConfig::default().with_random_seed(7))?;
//! assert_eq!(result.community_count(), 2);
//! # Ok::<(), leiden::LeidenError>(())
//! ```

pub mod community;
pub mod concurrency;
pub mod error;
pub mod graph;
pub mod progress;

pub use community::{
    leiden_communities, Dendrogram, Leiden, LeidenConfig, LeidenResult, TerminalState,
};
pub use error::{LeidenError, Result};
pub use graph::{AdjacencyGraph, Graph, Orientation};
pub use progress::{LoggingProgressTracker, ProgressTracker, TerminationFlag};
