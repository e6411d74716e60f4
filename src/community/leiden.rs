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

//! Leiden community detection: configuration, result and the iteration loop
//! driving the phases.
//!
//! Every iteration runs a local move phase on the working graph, measures the
//! modularity of the resulting partition and records it as a dendrogram level.
//! While iterations remain, the local communities are refined into
//! well-connected sub-communities, the working graph is aggregated along the
//! refined communities and the local partition is carried over as the
//! starting point of the next iteration.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::aggregation::{maintain_partition, GraphAggregationPhase};
use super::common::{build_rng, group_by_labels, iteration_seed};
use super::dendrogram::{Dendrogram, DendrogramManager};
use super::local_move::LocalMovePhase;
use super::modularity::compute_modularity;
use super::refinement::RefinementPhase;
use super::seed::{unlabelled_offset, InitialCommunities, SeedCommunityManager};
use super::volume::{init_volumes, VolumeTable};
use crate::concurrency::{build_pool, AtomicLongArray};
use crate::error::{LeidenError, Result};
use crate::graph::{Graph, Orientation, WorkingGraph};
use crate::progress::{LoggingProgressTracker, ProgressTracker, TerminationFlag};

// ========================
// Configuration
// ========================

/// Parameters of a Leiden run.
///
/// Deserializes from partial JSON documents; absent fields keep their default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeidenConfig {
    /// Upper bound on iterations (levels of the dendrogram).
    pub max_levels: usize,
    /// Resolution. Higher values favor more, smaller communities.
    pub gamma: f64,
    /// Randomness of the refinement merges.
    pub theta: f64,
    /// Minimum modularity gain between iterations to keep going.
    pub tolerance: f64,
    /// Seed for the refinement RNG; drawn from the OS when absent.
    pub random_seed: Option<u64>,
    /// Keep one dendrogram level per iteration instead of the last only.
    pub include_intermediate_communities: bool,
    /// Worker threads.
    pub concurrency: usize,
    /// Node property holding initial community labels.
    pub seed_property: Option<String>,
    /// Whether self-loops contribute to node volumes.
    pub count_self_loops: bool,
}

impl Default for LeidenConfig {
    fn default() -> Self {
        LeidenConfig {
            max_levels: 10,
            gamma: 1.0,
            theta: 0.01,
            tolerance: 0.0001,
            random_seed: None,
            include_intermediate_communities: false,
            concurrency: 4,
            seed_property: None,
            count_self_loops: true,
        }
    }
}

impl LeidenConfig {
    pub fn with_max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = max_levels;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn with_intermediate_communities(mut self, include: bool) -> Self {
        self.include_intermediate_communities = include;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_seed_property(mut self, key: impl Into<String>) -> Self {
        self.seed_property = Some(key.into());
        self
    }

    pub fn with_count_self_loops(mut self, count: bool) -> Self {
        self.count_self_loops = count;
        self
    }

    /// Rejects out-of-range parameters.
    pub fn validate(&self) -> Result<()> {
        if self.max_levels < 1 {
            return Err(LeidenError::invalid("max_levels", "must be at least 1"));
        }
        if !(self.gamma > 0.0) || !self.gamma.is_finite() {
            return Err(LeidenError::invalid(
                "gamma",
                format!("must be a positive finite number, got {}", self.gamma),
            ));
        }
        if !(self.theta > 0.0) || !self.theta.is_finite() {
            return Err(LeidenError::invalid(
                "theta",
                format!("must be a positive finite number, got {}", self.theta),
            ));
        }
        if !(self.tolerance >= 0.0) || !self.tolerance.is_finite() {
            return Err(LeidenError::invalid(
                "tolerance",
                format!("must be a non-negative finite number, got {}", self.tolerance),
            ));
        }
        if self.concurrency < 1 {
            return Err(LeidenError::invalid("concurrency", "must be at least 1"));
        }
        Ok(())
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LeidenConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// ========================
// Result
// ========================

/// Why a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TerminalState {
    /// The local move phase made no progress, or the modularity gain fell
    /// below the tolerance.
    Converged,
    /// Modularity decreased; the previous iteration's partition is returned.
    ToleranceExhausted,
    /// `max_levels` iterations ran without converging.
    MaxIterationsReached,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeidenResult {
    /// Final community of every node of the input graph.
    pub communities: Vec<u64>,
    pub ran_iterations: usize,
    pub did_converge: bool,
    pub terminal_state: TerminalState,
    /// Present only when intermediate communities were requested and the
    /// seed partition was not already optimal.
    pub dendrogram: Option<Dendrogram>,
    /// Modularity of every iteration run.
    pub modularities: Vec<f64>,
    pub modularity: f64,
}

impl LeidenResult {
    /// Number of distinct final communities.
    pub fn community_count(&self) -> usize {
        self.communities_grouped().len()
    }

    /// Final communities as node lists, ordered by their smallest member.
    pub fn communities_grouped(&self) -> Vec<Vec<usize>> {
        group_by_labels(&self.communities)
    }
}

/// Outcome of comparing an iteration's modularity with the previous one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ToleranceStatus {
    Continue,
    Converged,
    Decreased,
}

fn tolerance_status(modularities: &[f64], iteration: usize, tolerance: f64) -> ToleranceStatus {
    if iteration == 0 {
        return ToleranceStatus::Continue;
    }
    let difference = modularities[iteration] - modularities[iteration - 1];
    if difference < 0.0 {
        ToleranceStatus::Decreased
    } else if difference < tolerance {
        ToleranceStatus::Converged
    } else {
        ToleranceStatus::Continue
    }
}

// ========================
// Algorithm
// ========================

/// A configured Leiden run over `graph`.
pub struct Leiden<'g, G: Graph> {
    graph: &'g G,
    config: LeidenConfig,
    seed_values: Option<&'g [Option<u64>]>,
    progress: Box<dyn ProgressTracker + 'g>,
    termination: TerminationFlag,
}

impl<'g, G: Graph> Leiden<'g, G> {
    /// Validates `config` and resolves its seed property against `graph`,
    /// which must be undirected.
    pub fn new(graph: &'g G, config: LeidenConfig) -> Result<Self> {
        config.validate()?;
        if graph.orientation() != Orientation::Undirected {
            return Err(LeidenError::invalid(
                "graph",
                "Leiden requires an undirected graph",
            ));
        }
        let seed_values = match &config.seed_property {
            Some(key) => {
                let values = graph.node_property(key).ok_or_else(|| {
                    LeidenError::invalid(
                        "seed_property",
                        format!("graph has no node property '{key}'"),
                    )
                })?;
                check_seeds(graph, values)?;
                Some(values)
            }
            None => None,
        };
        Ok(Leiden {
            graph,
            config,
            seed_values,
            progress: Box::new(LoggingProgressTracker::default()),
            termination: TerminationFlag::new(),
        })
    }

    /// Seeds the run with explicit labels instead of a node property.
    pub fn with_seed_values(mut self, seeds: &'g [Option<u64>]) -> Result<Self> {
        check_seeds(self.graph, seeds)?;
        self.seed_values = Some(seeds);
        Ok(self)
    }

    pub fn with_progress_tracker(mut self, progress: impl ProgressTracker + 'g) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn with_termination_flag(mut self, termination: TerminationFlag) -> Self {
        self.termination = termination;
        self
    }

    /// A handle that cancels this run when raised.
    pub fn termination_flag(&self) -> TerminationFlag {
        self.termination.clone()
    }

    pub fn config(&self) -> &LeidenConfig {
        &self.config
    }

    /// Runs the algorithm on a dedicated pool of `concurrency` workers.
    pub fn compute(&self) -> Result<LeidenResult> {
        let pool = build_pool(self.config.concurrency)?;
        self.progress.begin_subtask("Leiden");
        let result = pool.install(|| self.run());
        self.progress.end_subtask("Leiden");
        result
    }

    fn run(&self) -> Result<LeidenResult> {
        let config = &self.config;
        let concurrency = config.concurrency;
        let termination = &self.termination;
        let node_count = self.graph.node_count();

        self.progress.begin_subtask("Initialization");
        let initial = match self.seed_values {
            Some(seeds) => InitialCommunities::Seeded(seeds),
            None => InitialCommunities::Singleton,
        };
        let (starting_communities, mut seeds) = initial.resolve(node_count)?;
        let (mut volumes, coefficient) = init_volumes(
            self.graph,
            &starting_communities,
            config.count_self_loops,
            concurrency,
            termination,
        )?;
        let gamma = config.gamma * coefficient;
        let random_seed = config
            .random_seed
            .unwrap_or_else(|| build_rng(None).random());
        self.progress.end_subtask("Initialization");

        let mut working = WorkingGraph::Root(self.graph);
        let mut local_communities = AtomicLongArray::from_vec(starting_communities);
        let mut community_count = seeds.communities_count();
        let mut dendrogram = DendrogramManager::new(
            node_count,
            config.max_levels,
            config.include_intermediate_communities,
        );
        let mut tracker = IterationTracker::new(config.max_levels, config.tolerance);

        while tracker.iteration() < config.max_levels {
            let iteration = tracker.iteration();
            self.progress.begin_subtask("Iteration");

            self.progress.begin_subtask("Local Move");
            let outcome = LocalMovePhase::create(
                &working,
                &local_communities,
                &volumes,
                gamma,
                community_count,
                concurrency,
                termination,
            )?
            .run()?;
            self.progress.end_subtask("Local Move");

            let local_phase_converged =
                outcome.swaps == 0 || outcome.community_count == working.node_count();
            let seed_is_optimal = local_phase_converged && seeds.is_seeded() && iteration == 0;

            if !local_phase_converged || seed_is_optimal {
                self.progress.begin_subtask("Modularity Computation");
                tracker.set_modularity(compute_modularity(
                    &working,
                    &local_communities,
                    &volumes.community_volumes,
                    gamma,
                    coefficient,
                    concurrency,
                    termination,
                )?);
                self.progress.end_subtask("Modularity Computation");
            }

            self.progress.log_message(&format!(
                "iteration {iteration}: {} swaps, {} communities, modularity {}",
                outcome.swaps,
                outcome.community_count,
                tracker.current_modularity()
            ));

            match tracker.step(local_phase_converged) {
                IterationStep::Stop => {
                    self.progress.end_subtask("Iteration");
                    break;
                }
                IterationStep::RecordAndStop => {
                    dendrogram.update_output_dendrogram(&working, &local_communities, &seeds)?;
                    tracker.complete_iteration();
                    self.progress.end_subtask("Iteration");
                    break;
                }
                IterationStep::RecordAndContinue => {
                    dendrogram.update_output_dendrogram(&working, &local_communities, &seeds)?;
                }
            }

            if iteration < config.max_levels - 1 {
                self.progress.begin_subtask("Refinement");
                let refinement = RefinementPhase {
                    graph: &working,
                    local_communities: &local_communities,
                    node_volumes: &volumes.node_volumes,
                    local_community_volumes: &volumes.community_volumes,
                    gamma,
                    theta: config.theta,
                    seed: iteration_seed(random_seed, iteration),
                    concurrency,
                    termination,
                }
                .run()?;
                dendrogram.update_algorithm_dendrogram(&working, &refinement.communities)?;
                self.progress.end_subtask("Refinement");

                self.progress.begin_subtask("Aggregation");
                let aggregated = GraphAggregationPhase {
                    graph: &working,
                    orientation: working.orientation(),
                    communities: &refinement.communities,
                    maximum_community_id: refinement.maximum_refined_community_id,
                    termination,
                }
                .run()?;
                let next = maintain_partition(
                    &aggregated,
                    &local_communities,
                    &refinement.community_volumes,
                );
                seeds.carry_forward(&aggregated, &local_communities, &next.communities);
                log::debug!(
                    "aggregated {} nodes into {} nodes in {} communities",
                    working.node_count(),
                    aggregated.node_count(),
                    next.community_count
                );
                self.progress.end_subtask("Aggregation");

                local_communities = AtomicLongArray::from_vec(next.communities);
                volumes = VolumeTable::from_parts(next.node_volumes, next.community_volumes);
                community_count = next.community_count;
                working = WorkingGraph::Aggregated(aggregated);
            }

            tracker.complete_iteration();
            self.progress.end_subtask("Iteration");
        }

        log::info!(
            "Leiden stopped after {} iterations ({:?}), {} dendrogram levels recorded",
            tracker.iteration(),
            tracker.terminal_state,
            dendrogram.level_count()
        );

        Ok(tracker.into_result(node_count, dendrogram, &seeds, &local_communities))
    }
}

/// What the loop does once the local move phase of an iteration finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IterationStep {
    /// Stop without recording the iteration.
    Stop,
    /// Record the iteration as the last one.
    RecordAndStop,
    /// Record the iteration and go on while levels remain.
    RecordAndContinue,
}

/// Modularity history and stop state of a run.
#[derive(Debug)]
struct IterationTracker {
    modularities: Vec<f64>,
    modularity: f64,
    iteration: usize,
    did_converge: bool,
    terminal_state: TerminalState,
    tolerance: f64,
}

impl IterationTracker {
    fn new(max_levels: usize, tolerance: f64) -> Self {
        IterationTracker {
            modularities: vec![0.0; max_levels],
            modularity: 0.0,
            iteration: 0,
            did_converge: false,
            terminal_state: TerminalState::MaxIterationsReached,
            tolerance,
        }
    }

    fn iteration(&self) -> usize {
        self.iteration
    }

    fn set_modularity(&mut self, modularity: f64) {
        self.modularities[self.iteration] = modularity;
    }

    fn current_modularity(&self) -> f64 {
        self.modularities[self.iteration]
    }

    fn step(&mut self, local_phase_converged: bool) -> IterationStep {
        if local_phase_converged {
            self.did_converge = true;
            self.terminal_state = TerminalState::Converged;
            return IterationStep::Stop;
        }
        match tolerance_status(&self.modularities, self.iteration, self.tolerance) {
            ToleranceStatus::Decreased => {
                log::debug!(
                    "modularity decreased in iteration {}, keeping iteration {}",
                    self.iteration,
                    self.iteration - 1
                );
                self.terminal_state = TerminalState::ToleranceExhausted;
                IterationStep::Stop
            }
            ToleranceStatus::Converged => {
                self.did_converge = true;
                self.terminal_state = TerminalState::Converged;
                IterationStep::RecordAndStop
            }
            ToleranceStatus::Continue => IterationStep::RecordAndContinue,
        }
    }

    fn complete_iteration(&mut self) {
        self.modularity = self.modularities[self.iteration];
        self.iteration += 1;
    }

    /// `local_communities` are those of the last local move phase, read
    /// only when no dendrogram level was recorded.
    fn into_result(
        mut self,
        node_count: usize,
        dendrogram: DendrogramManager,
        seeds: &SeedCommunityManager,
        local_communities: &AtomicLongArray,
    ) -> LeidenResult {
        let seed_communities = || {
            (0..node_count)
                .map(|node| seeds.map_to_seed(local_communities.get(node)))
                .collect()
        };

        if self.did_converge && seeds.is_seeded() && self.iteration == 0 {
            // the seed partition could not be improved
            let modularity = self.modularities[0];
            return LeidenResult {
                communities: seed_communities(),
                ran_iterations: 1,
                did_converge: true,
                terminal_state: self.terminal_state,
                dendrogram: None,
                modularities: vec![modularity],
                modularity,
            };
        }

        // nothing recorded means the first local move converged on the root
        // graph, whose communities are still the starting ones
        let communities = match dendrogram.current() {
            Some(level) => level.to_vec(),
            None => seed_communities(),
        };
        self.modularities.truncate(self.iteration);

        LeidenResult {
            communities,
            ran_iterations: self.iteration,
            did_converge: self.did_converge,
            terminal_state: self.terminal_state,
            dendrogram: dendrogram.into_dendrogram(),
            modularities: self.modularities,
            modularity: self.modularity,
        }
    }
}

fn check_seeds<G: Graph>(graph: &G, seeds: &[Option<u64>]) -> Result<()> {
    if seeds.len() != graph.node_count() {
        return Err(LeidenError::invalid(
            "seed_property",
            format!(
                "expected one seed per node ({}), got {}",
                graph.node_count(),
                seeds.len()
            ),
        ));
    }
    unlabelled_offset(seeds).map(|_| ())
}

/// Find communities of `graph` with the Leiden algorithm.
///
/// Shorthand for `Leiden::new(graph, config)?.compute()`.
pub fn leiden_communities<G: Graph>(graph: &G, config: LeidenConfig) -> Result<LeidenResult> {
    Leiden::new(graph, config)?.compute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AdjacencyGraph;

    fn two_edges() -> AdjacencyGraph {
        AdjacencyGraph::from_edges(4, Orientation::Undirected, &[(0, 1), (2, 3)]).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        let config = LeidenConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_levels, 10);
        assert_eq!(config.theta, 0.01);
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        let base = LeidenConfig::default();
        for config in [
            base.clone().with_max_levels(0),
            base.clone().with_gamma(0.0),
            base.clone().with_gamma(f64::NAN),
            base.clone().with_theta(-1.0),
            base.clone().with_tolerance(-0.1),
            base.clone().with_concurrency(0),
        ] {
            assert!(config.validate().unwrap_err().is_configuration_error());
        }
    }

    #[test]
    fn tolerance_statuses() {
        let history = [0.3, 0.5, 0.50001, 0.4];
        assert_eq!(tolerance_status(&history, 0, 0.0001), ToleranceStatus::Continue);
        assert_eq!(tolerance_status(&history, 1, 0.0001), ToleranceStatus::Continue);
        assert_eq!(tolerance_status(&history, 2, 0.0001), ToleranceStatus::Converged);
        assert_eq!(tolerance_status(&history, 3, 0.0001), ToleranceStatus::Decreased);
    }

    #[test]
    fn two_edges_form_two_communities() {
        let graph = two_edges();
        let config = LeidenConfig::default()
            .with_random_seed(42)
            .with_concurrency(1);
        let result = leiden_communities(&graph, config).unwrap();
        assert!(result.did_converge);
        assert_eq!(result.terminal_state, TerminalState::Converged);
        assert_eq!(result.ran_iterations, 1);
        assert_eq!(result.communities_grouped(), vec![vec![0, 1], vec![2, 3]]);
        assert_eq!(result.modularities.len(), 1);
        assert!((result.modularity - 0.5).abs() < 1e-12);
        assert!(result.dendrogram.is_none());
    }

    #[test]
    fn single_level_stops_at_the_limit() {
        let graph = two_edges();
        let config = LeidenConfig::default().with_max_levels(1).with_random_seed(1);
        let result = leiden_communities(&graph, config).unwrap();
        assert!(!result.did_converge);
        assert_eq!(result.terminal_state, TerminalState::MaxIterationsReached);
        assert_eq!(result.ran_iterations, 1);
        assert_eq!(result.community_count(), 2);
    }

    #[test]
    fn optimal_seeds_short_circuit() {
        let graph = two_edges();
        let seeds = [Some(7), Some(7), Some(3), Some(3)];
        let result = Leiden::new(&graph, LeidenConfig::default().with_random_seed(1))
            .unwrap()
            .with_seed_values(&seeds)
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(result.communities, vec![7, 7, 3, 3]);
        assert_eq!(result.ran_iterations, 1);
        assert!(result.did_converge);
        assert!(result.dendrogram.is_none());
        assert!((result.modularities[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_seed_property_is_a_configuration_error() {
        let graph = two_edges();
        let config = LeidenConfig::default().with_seed_property("missing");
        let err = Leiden::new(&graph, config).err().unwrap();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn seed_values_must_cover_every_node() {
        let graph = two_edges();
        let seeds = [Some(1), Some(1)];
        let err = Leiden::new(&graph, LeidenConfig::default())
            .unwrap()
            .with_seed_values(&seeds)
            .err()
            .unwrap();
        assert!(err.is_configuration_error());
    }

    /// Drives the tracker through one iteration per `(modularity, local
    /// communities)` pair, recording levels on `graph` like the loop does.
    fn replay(
        graph: &AdjacencyGraph,
        tolerance: f64,
        history: Vec<(f64, Vec<u64>)>,
    ) -> LeidenResult {
        let node_count = graph.node_count();
        let (_, seeds) = InitialCommunities::Singleton.resolve(node_count).unwrap();
        let mut dendrogram = DendrogramManager::new(node_count, history.len(), true);
        let mut tracker = IterationTracker::new(history.len(), tolerance);
        let mut local = AtomicLongArray::from_vec((0..node_count as u64).collect());

        for (modularity, communities) in history {
            local = AtomicLongArray::from_vec(communities);
            tracker.set_modularity(modularity);
            match tracker.step(false) {
                IterationStep::Stop => break,
                IterationStep::RecordAndStop => {
                    dendrogram.update_output_dendrogram(graph, &local, &seeds).unwrap();
                    tracker.complete_iteration();
                    break;
                }
                IterationStep::RecordAndContinue => {
                    dendrogram.update_output_dendrogram(graph, &local, &seeds).unwrap();
                    tracker.complete_iteration();
                }
            }
        }
        tracker.into_result(node_count, dendrogram, &seeds, &local)
    }

    #[test]
    fn modularity_decrease_rolls_back_to_previous_level() {
        let graph = two_edges();
        let result = replay(
            &graph,
            0.0001,
            vec![
                (0.3, vec![0, 0, 2, 2]),
                (0.5, vec![0, 0, 0, 0]),
                (0.4, vec![1, 1, 1, 1]),
            ],
        );
        assert_eq!(result.terminal_state, TerminalState::ToleranceExhausted);
        assert!(!result.did_converge);
        assert_eq!(result.ran_iterations, 2);
        assert_eq!(result.modularities, vec![0.3, 0.5]);
        assert_eq!(result.modularity, 0.5);
        assert_eq!(result.communities, vec![0, 0, 0, 0]);
        let dendrogram = result.dendrogram.unwrap();
        assert_eq!(dendrogram.level_count(), 2);
        assert_eq!(dendrogram.levels()[0], vec![0, 0, 2, 2]);
    }

    #[test]
    fn small_gain_records_the_last_level() {
        let graph = two_edges();
        let result = replay(
            &graph,
            0.001,
            vec![
                (0.3, vec![0, 0, 2, 2]),
                (0.30001, vec![0, 0, 0, 0]),
                (0.9, vec![1, 1, 1, 1]),
            ],
        );
        assert_eq!(result.terminal_state, TerminalState::Converged);
        assert!(result.did_converge);
        assert_eq!(result.ran_iterations, 2);
        assert_eq!(result.modularities, vec![0.3, 0.30001]);
        assert_eq!(result.modularity, 0.30001);
        assert_eq!(result.communities, vec![0, 0, 0, 0]);
    }

    #[test]
    fn exhausted_levels_keep_every_iteration() {
        let graph = two_edges();
        let result = replay(
            &graph,
            0.0001,
            vec![(0.1, vec![0, 1, 2, 2]), (0.5, vec![0, 0, 2, 2])],
        );
        assert_eq!(result.terminal_state, TerminalState::MaxIterationsReached);
        assert!(!result.did_converge);
        assert_eq!(result.ran_iterations, 2);
        assert_eq!(result.modularities, vec![0.1, 0.5]);
        assert_eq!(result.communities, vec![0, 0, 2, 2]);
    }

    #[test]
    fn directed_graphs_are_rejected() {
        let graph =
            AdjacencyGraph::from_edges(3, Orientation::Natural, &[(0, 1), (1, 2)]).unwrap();
        let err = Leiden::new(&graph, LeidenConfig::default()).err().unwrap();
        assert!(matches!(
            err,
            LeidenError::InvalidConfiguration { name: "graph", .. }
        ));
    }

    #[test]
    fn seed_labels_without_room_are_rejected_up_front() {
        let graph = AdjacencyGraph::from_edges(3, Orientation::Undirected, &[(0, 1)]).unwrap();
        let seeds = [Some(u64::MAX), Some(u64::MAX), None];
        let err = Leiden::new(&graph, LeidenConfig::default())
            .unwrap()
            .with_seed_values(&seeds)
            .err()
            .unwrap();
        assert!(err.is_configuration_error());
    }
}
