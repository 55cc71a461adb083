//! Repeat discovery from the k-mer table
//! =====================================
//!
//! - Seed on any k-mer above the threshold and grow its graph through
//!   neighbor k-mers of comparable coverage
//! - Small graphs are noise, big graphs go to the greedy extractor, the
//!   rest are trimmed, enumerated and solved for path flows
//! - Every k-mer of a consumed graph leaves the table

use crate::assembly::graph::{AssemblyGraph, GraphSettings};
use crate::assembly::node::NodeId;
use crate::assembly::trimmer::{GraphTrimmer, TrimSettings};
use crate::core::data_structures::{KmerCount, Position};
use crate::core::kmer::{Kmer, KmerCode};
use crate::core::repeats::{CountedRepeat, Repeats};
use crate::solver::EquationSystem;
use crate::utils::configuration::{AssemblerConfig, AssemblerError};
use crate::utils::kmer_table::OccurrenceTable;
use ahash::AHashMap;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct FinderSettings {
    pub threshold: KmerCount,
    pub frequency_difference: f64,
    /// Consecutive small graphs after which discovery stops (0 = never)
    pub nb_small_graphs: usize,
    pub graph: GraphSettings,
    pub trim: TrimSettings,
}

impl FinderSettings {
    pub fn from_config(config: &AssemblerConfig, threshold: KmerCount) -> Self {
        Self {
            threshold,
            frequency_difference: config.frequency_difference,
            nb_small_graphs: config.nb_small_graphs,
            graph: GraphSettings::from_config(config),
            trim: TrimSettings::from_config(config),
        }
    }
}

/// How each grown graph was handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FinderStats {
    pub small_graphs: usize,
    pub big_graphs: usize,
    pub solved_graphs: usize,
    /// Normal graphs whose enumeration overflowed into greedy extraction
    pub greedy_fallbacks: usize,
    pub repeats: usize,
}

/// Graph classes of the discovery loop
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOutcome {
    Small,
    Big(Vec<CountedRepeat>),
    Solved(Vec<CountedRepeat>),
    GreedyFallback(Vec<CountedRepeat>),
}

pub struct GraphRepeatFinder<'t, T: OccurrenceTable> {
    table: &'t mut T,
    settings: FinderSettings,
    /// Code of each node of the current graph, by node id
    kmers: Vec<KmerCode>,
    index: AHashMap<KmerCode, NodeId>,
    repeats: Repeats,
    stats: FinderStats,
}

impl<'t, T: OccurrenceTable> GraphRepeatFinder<'t, T> {
    pub fn new(table: &'t mut T, settings: FinderSettings) -> Self {
        Self {
            table,
            settings,
            kmers: Vec::new(),
            index: AHashMap::new(),
            repeats: Repeats::new(),
            stats: FinderStats::default(),
        }
    }

    pub fn stats(&self) -> &FinderStats {
        &self.stats
    }

    /// Drain the table into repeats, sorted and cut to the threshold
    pub fn find_repeats(&mut self) -> Result<Repeats, AssemblerError> {
        info!("🔍 Finding repeats with threshold {}", self.settings.threshold);
        let initial_size = self.table.len().max(1);
        let mut nb_small = 0usize;

        while !self.table.is_empty() {
            let Some(seed) = self.table.random_above_threshold(self.settings.threshold) else {
                break;
            };
            match self.build_and_solve(seed)? {
                GraphOutcome::Small => nb_small += 1,
                GraphOutcome::Big(repeats)
                | GraphOutcome::Solved(repeats)
                | GraphOutcome::GreedyFallback(repeats) => {
                    for repeat in repeats {
                        self.repeats.add(repeat);
                    }
                    nb_small = 0;
                }
            }
            if nb_small > 0 && nb_small % 1000 == 0 {
                info!(
                    "Found {} small graphs in a row ({}% of the table remaining)",
                    nb_small,
                    self.table.len() * 100 / initial_size
                );
            }
            if self.settings.nb_small_graphs != 0 && nb_small >= self.settings.nb_small_graphs {
                info!(
                    "Stopping after {} small graphs in a row ({}% of the table remaining)",
                    nb_small,
                    self.table.len() * 100 / initial_size
                );
                break;
            }
        }

        let mut repeats = std::mem::take(&mut self.repeats);
        repeats.cut_to_threshold(self.settings.threshold);
        repeats.sort();
        self.stats.repeats = repeats.len();
        info!(
            "✅ Found {} repeats ({} small, {} big and {} solved graphs)",
            repeats.len(),
            self.stats.small_graphs,
            self.stats.big_graphs,
            self.stats.solved_graphs
        );
        Ok(repeats)
    }

    /// Grow the graph of `seed`, extract its repeats and remove its k-mers from the table
    pub fn build_and_solve(&mut self, seed: KmerCode) -> Result<GraphOutcome, AssemblerError> {
        let mut graph = self.fill_graph(seed)?;
        let outcome = if graph.is_small() {
            self.stats.small_graphs += 1;
            GraphOutcome::Small
        } else if graph.is_big() {
            debug!("Graph of {} nodes is big, extracting greedily", graph.len());
            self.stats.big_graphs += 1;
            graph.find_greedy_paths()?;
            GraphOutcome::Big(graph.repeats()?.to_vec())
        } else {
            GraphTrimmer::new(&mut graph, self.settings.trim).trim(true)?;
            if graph.find_all_paths()? {
                self.solve_flows(&mut graph);
                graph.select_paths(self.settings.threshold);
                self.stats.solved_graphs += 1;
                GraphOutcome::Solved(graph.repeats()?.to_vec())
            } else {
                self.stats.greedy_fallbacks += 1;
                GraphOutcome::GreedyFallback(graph.repeats()?.to_vec())
            }
        };
        for code in self.kmers.drain(..) {
            self.table.remove(code);
        }
        self.index.clear();
        Ok(outcome)
    }

    fn admits(&self, count: KmerCount, current: KmerCount) -> bool {
        let band = self.settings.frequency_difference;
        let (count, current_f) = (count as f64, current as f64);
        count >= self.settings.threshold as f64 && count >= current_f / band && count <= current_f * band
    }

    fn fill_graph(&mut self, seed: KmerCode) -> Result<AssemblyGraph, AssemblerError> {
        let k = self.settings.graph.kmer_size;
        let mut graph = AssemblyGraph::new(self.settings.graph);
        let first = Kmer::from_code(seed, k);
        graph.add_node(0, self.table.count(first.code()), first.sequence())?;
        self.kmers.clear();
        self.index.clear();
        self.kmers.push(first.code());
        self.index.insert(first.code(), 0);

        let mut pending: Vec<NodeId> = vec![0];
        while let Some(current) = pending.pop() {
            let kmer = Kmer::from_code(self.kmers[current], k);
            let current_count = self.table.count(kmer.code());
            for position in Position::ALL {
                for nucleotide in 0..4u8 {
                    let next = kmer.neighbor(nucleotide, position);
                    let Some(direction) = kmer.compare(&next, position) else {
                        continue;
                    };
                    if let Some(&id) = self.index.get(&next.code()) {
                        graph.add_link(current, position, direction, id)?;
                        continue;
                    }
                    let next_count = self.table.count(next.code());
                    if !self.admits(next_count, current_count) {
                        continue;
                    }
                    let id = self.kmers.len();
                    graph.add_node(id, next_count, next.sequence())?;
                    graph.add_link(current, position, direction, id)?;
                    self.kmers.push(next.code());
                    self.index.insert(next.code(), id);
                    pending.push(id);
                }
            }
            if self.kmers.len() % 1000 == 0 {
                debug!(
                    "Growing graph: {} nodes explored, {} pending",
                    self.kmers.len(),
                    pending.len()
                );
            }
        }
        if !graph.is_small() {
            debug!("Built graph with {} nodes", graph.len());
        }
        Ok(graph)
    }

    /// Give each path the flow that best explains the coverage of its nodes
    fn solve_flows(&self, graph: &mut AssemblyGraph) {
        let mut equations = EquationSystem::new(graph.paths().len());
        for (i, path) in graph.paths().iter().enumerate() {
            for node in path.nodes() {
                equations.set_count(node, graph.node(node).count());
                equations.add_path(node, i);
            }
        }
        let flows = equations.solve();
        for (path, flow) in graph.paths_mut().iter_mut().zip(flows) {
            path.set_count(flow);
        }
    }
}
