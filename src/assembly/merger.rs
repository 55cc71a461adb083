//! Repeat Merger
//! =============
//!
//! Second pass of the graph engine over finished repeats instead of k-mers.
//!
//! - Every candidate pair is compared in parallel, both strands and both ends
//! - Accepted overlaps become links of a per-component assembly graph
//! - Each graph is trimmed without chain merging and enumerated; selected
//!   paths are stitched back into repeats using the aligned overlap lengths

use crate::assembly::comparator::{OverlapAligner, SequenceComparator};
use crate::assembly::graph::{AssemblyGraph, GraphSettings};
use crate::assembly::node::NodeId;
use crate::assembly::trimmer::{GraphTrimmer, TrimSettings};
use crate::core::data_structures::{mirror, Direction, KmerCount, Position};
use crate::core::kmer::{canonical_kmers, KmerCode};
use crate::core::repeats::{CountedRepeat, Repeats};
use crate::utils::configuration::{AssemblerConfig, AssemblerError};
use ahash::{AHashMap, AHashSet};
use colored::Colorize;
use parking_lot::Mutex;
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct MergeSettings {
    pub threshold: KmerCount,
    pub frequency_difference: f64,
    /// Repeats must be strictly longer than this
    pub min_merge_size: usize,
    /// Bases of each end handed to the comparator
    pub max_merge_size: usize,
    pub max_penalty: u32,
    pub min_identity: f64,
    /// Only the longest candidates are compared (0 = all)
    pub merge_max_nb: usize,
    /// Largest number of overlaps a repeat may keep (0 = unbounded)
    pub merge_max_nodes: usize,
    pub short_kmer_size: usize,
    pub threads: usize,
    pub graph: GraphSettings,
    pub trim: TrimSettings,
}

impl MergeSettings {
    pub fn from_config(config: &AssemblerConfig, threshold: KmerCount) -> Self {
        // Overlaps come from alignments, not from k-mer adjacency
        let graph = GraphSettings {
            kmer_size: 1,
            max_paths: config.max_paths,
            min_nb_nodes: 0,
            max_nb_nodes: usize::MAX,
        };
        let trim = TrimSettings::from_config(config);
        Self {
            threshold,
            frequency_difference: config.frequency_difference,
            min_merge_size: config.min_merge_size,
            max_merge_size: config.max_merge_size,
            max_penalty: config.max_penalty,
            min_identity: config.min_identity,
            merge_max_nb: config.merge_max_nb,
            merge_max_nodes: config.merge_max_nodes,
            short_kmer_size: config.short_kmer_size,
            threads: config.threads,
            graph,
            trim,
        }
    }
}

/// One accepted overlap: `that` continues `this` at `position` with `direction`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Junction {
    this: usize,
    that: usize,
    position: Position,
    direction: Direction,
    score: u32,
    /// Bases of each word inside the overlap
    this_overlap: usize,
    that_overlap: usize,
}

pub struct RepeatMerger<C: SequenceComparator = OverlapAligner> {
    settings: MergeSettings,
    comparator: C,
}

impl RepeatMerger<OverlapAligner> {
    pub fn from_config(config: &AssemblerConfig, threshold: KmerCount) -> Self {
        Self::new(
            MergeSettings::from_config(config, threshold),
            OverlapAligner::from_config(config),
        )
    }
}

impl<C: SequenceComparator> RepeatMerger<C> {
    pub fn new(settings: MergeSettings, comparator: C) -> Self {
        Self {
            settings,
            comparator,
        }
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Merge overlapping repeats; repeats left out of the comparison pass through
    pub fn merge(&self, repeats: Repeats) -> crate::Result<Repeats> {
        info!(
            "{}",
            format!("🔗 Merging repeats ({} elements)...", repeats.len()).bright_cyan()
        );
        let (candidates, mut merged) = self.split_candidates(repeats);
        if candidates.len() < 2 {
            merged.extend(Repeats::from(candidates));
            merged.sort();
            return Ok(merged);
        }

        let junctions = self.compare_all(&candidates)?;
        let junctions = self.restrict_connections(&candidates, junctions);
        info!("  📊 {} overlaps kept between {} repeats", junctions.len(), candidates.len());

        let components = components(candidates.len(), &junctions);
        let mut nb_merged = 0;
        for (members, edges) in components {
            if members.len() == 1 {
                merged.add(candidates[members[0]].clone());
                continue;
            }
            let stitched = self.stitch_component(&candidates, &members, &edges)?;
            nb_merged += members.len().saturating_sub(stitched.len());
            for repeat in stitched {
                merged.add(repeat);
            }
        }
        merged.sort();
        info!("✅ Merging done: {} repeats absorbed, {} left", nb_merged, merged.len());
        Ok(merged)
    }

    /// Repeats worth comparing, and the others
    fn split_candidates(&self, repeats: Repeats) -> (Vec<CountedRepeat>, Repeats) {
        let settings = &self.settings;
        let mut passthrough = Repeats::new();
        let mut candidates = Vec::new();
        for repeat in repeats.into_vec() {
            if repeat.len() > settings.min_merge_size && repeat.count >= settings.threshold {
                candidates.push(repeat);
            } else {
                passthrough.add(repeat);
            }
        }
        debug!(
            "Kept {} repeats longer than {} and seen at least {} times",
            candidates.len(),
            settings.min_merge_size,
            settings.threshold
        );
        if settings.merge_max_nb > 0 && candidates.len() > settings.merge_max_nb {
            candidates.sort_by(|a, b| b.len().cmp(&a.len()));
            for repeat in candidates.drain(settings.merge_max_nb..) {
                passthrough.add(repeat);
            }
            debug!("Kept the {} longest repeats for merging", settings.merge_max_nb);
        }
        (candidates, passthrough)
    }

    fn in_band(&self, a: KmerCount, b: KmerCount) -> bool {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        self.settings.frequency_difference * low as f64 >= high as f64
    }

    /// Every overlap between candidate pairs, computed on `threads` workers
    fn compare_all(&self, candidates: &[CountedRepeat]) -> crate::Result<Vec<Junction>> {
        let short_k = self.settings.short_kmer_size;
        let kmer_sets: Vec<AHashSet<KmerCode>> = candidates
            .iter()
            .map(|r| {
                canonical_kmers(r.sequence.first_word().as_bytes(), short_k)
                    .into_iter()
                    .collect()
            })
            .collect();
        let pairs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|i| (0..i).map(move |j| (i, j)))
            .filter(|&(i, j)| self.in_band(candidates[i].count, candidates[j].count))
            .filter(|&(i, j)| {
                let (small, large) = if kmer_sets[i].len() < kmer_sets[j].len() {
                    (&kmer_sets[i], &kmer_sets[j])
                } else {
                    (&kmer_sets[j], &kmer_sets[i])
                };
                small.iter().any(|code| large.contains(code))
            })
            .collect();
        info!("  🔍 Comparing {} candidate pairs", pairs.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.threads.max(1))
            .build()?;
        let cells: Mutex<Vec<Junction>> = Mutex::new(Vec::new());
        let done = AtomicUsize::new(0);
        pool.install(|| {
            pairs.par_iter().for_each(|&(i, j)| {
                let found = self.compare_pair(candidates, i, j);
                if !found.is_empty() {
                    cells.lock().extend(found);
                }
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % 10_000 == 0 {
                    info!("  📊 {} comparisons done", finished);
                }
            })
        });
        let mut cells = cells.into_inner();
        // Worker interleaving must not change the result
        cells.sort_by_key(|c| (c.this, c.that, c.position.index(), c.direction.index()));
        Ok(cells)
    }

    /// Overlaps of `j` (either strand) at both ends of `i`
    fn compare_pair(&self, candidates: &[CountedRepeat], i: usize, j: usize) -> Vec<Junction> {
        let window = self.settings.max_merge_size;
        let this = candidates[i].sequence.first_word().as_bytes();
        let this_prefix = &this[..this.len().min(window)];
        let this_suffix = &this[this.len().saturating_sub(window)..];
        let mut found = Vec::new();
        for direction in Direction::ALL {
            let that = candidates[j].sequence.word(direction).as_bytes();
            let that_prefix = &that[..that.len().min(window)];
            let that_suffix = &that[that.len().saturating_sub(window)..];

            if let Some(alignment) = self.comparator.compare(this_suffix, that_prefix) {
                if self.accepts(alignment.score, alignment.identity) {
                    found.push(Junction {
                        this: i,
                        that: j,
                        position: Position::After,
                        direction,
                        score: alignment.score,
                        this_overlap: alignment.first_overlap(this_suffix.len()),
                        that_overlap: alignment.end_second,
                    });
                }
            }
            if let Some(alignment) = self.comparator.compare(that_suffix, this_prefix) {
                if self.accepts(alignment.score, alignment.identity) {
                    found.push(Junction {
                        this: i,
                        that: j,
                        position: Position::Before,
                        direction,
                        score: alignment.score,
                        this_overlap: alignment.end_second,
                        that_overlap: alignment.first_overlap(that_suffix.len()),
                    });
                }
            }
        }
        found
    }

    fn accepts(&self, score: u32, identity: f64) -> bool {
        score <= self.settings.max_penalty && identity >= self.settings.min_identity
    }

    /// Lower the penalty cut-off until no repeat keeps more than
    /// `merge_max_nodes` overlaps
    fn restrict_connections(&self, candidates: &[CountedRepeat], junctions: Vec<Junction>) -> Vec<Junction> {
        let limit = self.settings.merge_max_nodes;
        if limit == 0 || junctions.is_empty() {
            return junctions;
        }
        let too_connected = |cutoff: u32| {
            let mut degrees = vec![0usize; candidates.len()];
            for junction in junctions.iter().filter(|j| j.score <= cutoff) {
                degrees[junction.this] += 1;
                degrees[junction.that] += 1;
            }
            degrees.iter().any(|&d| d > limit)
        };
        let mut scores: Vec<u32> = junctions.iter().map(|j| j.score).collect();
        scores.sort_unstable();
        scores.dedup();
        let keep = scores.partition_point(|&s| !too_connected(s));
        if keep == scores.len() {
            return junctions;
        }
        let Some(&cutoff) = keep.checked_sub(1).and_then(|k| scores.get(k)) else {
            debug!("Every overlap connects a repeat to more than {} others", limit);
            return Vec::new();
        };
        debug!("Penalty cut-off lowered to {} ({} repeats max per repeat)", cutoff, limit);
        junctions.into_iter().filter(|j| j.score <= cutoff).collect()
    }

    /// Merged repeats of one connected component
    fn stitch_component(
        &self,
        candidates: &[CountedRepeat],
        members: &[usize],
        edges: &[Junction],
    ) -> Result<Vec<CountedRepeat>, AssemblerError> {
        let local: AHashMap<usize, NodeId> = members
            .iter()
            .enumerate()
            .map(|(id, &member)| (member, id))
            .collect();
        let mut graph = AssemblyGraph::new(self.settings.graph);
        for (id, &member) in members.iter().enumerate() {
            let repeat = &candidates[member];
            graph.add_node(id, repeat.count, repeat.sequence.clone())?;
        }
        // Bases of the reached node already spelled by the one it is reached from
        let mut overlaps: AHashMap<(NodeId, NodeId, Position, Direction), usize> = AHashMap::new();
        for edge in edges {
            let (this, that) = (local[&edge.this], local[&edge.that]);
            graph.add_link(this, edge.position, edge.direction, that)?;
            overlaps.insert((this, that, edge.position, edge.direction), edge.that_overlap);
            let (position, direction) = mirror(edge.position, edge.direction);
            overlaps.insert((that, this, position, direction), edge.this_overlap);
        }

        GraphTrimmer::new(&mut graph, self.settings.trim).trim(false)?;
        if !graph.find_all_paths()? {
            warn!(
                "Too many ways to merge a group of {} repeats, keeping them apart",
                members.len()
            );
            return Ok(members.iter().map(|&m| candidates[m].clone()).collect());
        }
        graph.select_paths(0);

        let mut stitched = Vec::with_capacity(graph.paths().len());
        for path in graph.paths() {
            let word = graph.stitch_path(path, |previous, step| {
                overlaps
                    .get(&(previous, step.node, step.position, step.direction))
                    .copied()
                    .ok_or_else(|| AssemblerError::StitchFailure {
                        message: format!("no recorded overlap between repeats {} and {}", previous, step.node),
                    })
            })?;
            let (mut weighted, mut size) = (0u64, 0u64);
            for &id in path.node_ids() {
                let node = graph.node(id);
                weighted += node.count() as u64 * node.len() as u64;
                size += node.len() as u64;
            }
            let count = if size == 0 { 0 } else { (weighted / size) as KmerCount };
            stitched.push(CountedRepeat::from_word(&word, count, path.is_cycle()));
        }
        Ok(stitched)
    }
}

/// Connected components as (member indices, their junctions), in order of
/// their smallest member
fn components(nb_repeats: usize, junctions: &[Junction]) -> Vec<(Vec<usize>, Vec<Junction>)> {
    let mut union = UnionFind::<usize>::new(nb_repeats);
    for junction in junctions {
        union.union(junction.this, junction.that);
    }
    let labels = union.into_labeling();
    let mut index: AHashMap<usize, usize> = AHashMap::new();
    let mut groups: Vec<(Vec<usize>, Vec<Junction>)> = Vec::new();
    for (repeat, &label) in labels.iter().enumerate() {
        let group = *index.entry(label).or_insert_with(|| {
            groups.push((Vec::new(), Vec::new()));
            groups.len() - 1
        });
        groups[group].0.push(repeat);
    }
    for junction in junctions {
        groups[index[&labels[junction.this]]].1.push(*junction);
    }
    groups
}
