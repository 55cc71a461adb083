//! Bidirected Assembly Graph
//! =========================
//!
//! Arena of nodes addressed by dense ids. Nodes are never removed, only
//! unset, so adjacency indices stay valid for the lifetime of the graph.
//!
//! - Construction: `add_node` / `add_link` (links are stored on both ends
//!   through `mirror`)
//! - Classification: leaf, vee and fork nodes for the trimmer
//! - Exhaustive path enumeration bounded by `max_paths`, falling back to
//!   greedy heaviest-neighbor extraction
//! - Non-overlapping path selection and stitching into consensus repeats

use crate::assembly::node::{AssemblyNode, NodeId};
use crate::assembly::path::{AssemblyPath, PathStep};
use crate::core::data_structures::{mirror, Direction, KmerCount, Position, Sequence};
use crate::core::repeats::CountedRepeat;
use crate::utils::configuration::{AssemblerConfig, AssemblerError};
use ahash::AHashMap;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Size limits of one graph
#[derive(Debug, Clone, Copy)]
pub struct GraphSettings {
    pub kmer_size: usize,
    /// Path cap of the exhaustive enumeration (0 = unbounded)
    pub max_paths: usize,
    pub min_nb_nodes: usize,
    pub max_nb_nodes: usize,
}

impl GraphSettings {
    pub fn from_config(config: &AssemblerConfig) -> Self {
        Self {
            kmer_size: config.kmer,
            max_paths: config.max_paths,
            min_nb_nodes: config.min_nb_nodes,
            max_nb_nodes: config.max_nb_nodes,
        }
    }

    pub fn overlap(&self) -> usize {
        self.kmer_size.saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyGraph {
    settings: GraphSettings,
    nodes: Vec<AssemblyNode>,
    paths: Vec<AssemblyPath>,
    repeats: Vec<CountedRepeat>,
}

/// Append `word` at `position` of `acc`, dropping the `overlap` shared bases
pub(crate) fn extend_word(
    acc: &mut String,
    word: &str,
    position: Position,
    overlap: usize,
) -> Result<(), AssemblerError> {
    let missing = || AssemblerError::StitchFailure {
        message: format!("'{word}' is shorter than the {overlap}-base overlap"),
    };
    match position {
        Position::After => acc.push_str(word.get(overlap..).ok_or_else(missing)?),
        Position::Before => {
            let cut = word.len().checked_sub(overlap).ok_or_else(missing)?;
            acc.insert_str(0, &word[..cut]);
        }
    }
    Ok(())
}

impl AssemblyGraph {
    pub fn new(settings: GraphSettings) -> Self {
        Self {
            settings,
            nodes: Vec::new(),
            paths: Vec::new(),
            repeats: Vec::new(),
        }
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Size of the node table, dead nodes included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_live()).count()
    }

    pub fn is_small(&self) -> bool {
        self.settings.overlap() + self.live_count() < self.settings.min_nb_nodes
    }

    pub fn is_big(&self) -> bool {
        self.nodes.len() > self.settings.max_nb_nodes
    }

    /// Insert at `id`, which must be an existing slot or the next free one
    pub fn add_node(
        &mut self,
        id: NodeId,
        count: KmerCount,
        sequence: Sequence,
    ) -> Result<(), AssemblerError> {
        let node = AssemblyNode::new(id, count, sequence);
        match id.cmp(&self.nodes.len()) {
            std::cmp::Ordering::Less => self.nodes[id] = node,
            std::cmp::Ordering::Equal => self.nodes.push(node),
            std::cmp::Ordering::Greater => {
                return Err(AssemblerError::Validation {
                    field: "node id".to_string(),
                    reason: format!("{} skips past the table size {}", id, self.nodes.len()),
                })
            }
        }
        Ok(())
    }

    /// Link end `position` of `n1` to `n2` in strand mode `direction`
    pub fn add_link(
        &mut self,
        n1: NodeId,
        position: Position,
        direction: Direction,
        n2: NodeId,
    ) -> Result<(), AssemblerError> {
        let size = self.nodes.len();
        if n1 >= size || n2 >= size {
            return Err(AssemblerError::Validation {
                field: "link".to_string(),
                reason: format!("{n1} <-> {n2} outside a table of {size} nodes"),
            });
        }
        self.nodes[n1].add_neighbor(n2, position, direction);
        let (p2, d2) = mirror(position, direction);
        self.nodes[n2].add_neighbor(n1, p2, d2);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> &AssemblyNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut AssemblyNode {
        &mut self.nodes[id]
    }

    pub fn nodes(&self) -> &[AssemblyNode] {
        &self.nodes
    }

    pub fn paths(&self) -> &[AssemblyPath] {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> &mut [AssemblyPath] {
        &mut self.paths
    }

    /// Live neighbors at each end, indexed by `Position`
    pub fn live_neighbor_counts(&self, id: NodeId) -> [usize; 2] {
        let mut counts = [0; 2];
        for (p, _, n) in self.nodes[id].links() {
            if self.nodes[n].is_live() {
                counts[p.index()] += 1;
            }
        }
        counts
    }

    /// One end is bare or only reaches dead nodes
    pub fn is_leaf(&self, id: NodeId) -> bool {
        let counts = self.live_neighbor_counts(id);
        self.nodes[id].has_bare_end() || counts.contains(&0)
    }

    /// Ends with more than one live neighbor, AFTER first
    pub fn vee_positions(&self, id: NodeId) -> &'static [Position] {
        let counts = self.live_neighbor_counts(id);
        let after = counts[Position::After.index()] > 1;
        let before = counts[Position::Before.index()] > 1;
        match (after, before) {
            (true, true) => &[Position::After, Position::Before],
            (false, true) => &[Position::Before],
            (true, false) => &[Position::After],
            (false, false) => &[],
        }
    }

    /// Fan-out end of a node with one straight side and one branching side
    pub fn fork_position(&self, id: NodeId) -> Option<Position> {
        if self.nodes[id].has_bare_end() {
            return None;
        }
        let counts = self.live_neighbor_counts(id);
        let after = counts[Position::After.index()];
        let before = counts[Position::Before.index()];
        if before == 1 && after > 1 {
            Some(Position::After)
        } else if before > 1 && after == 1 {
            Some(Position::Before)
        } else {
            None
        }
    }

    /// Bases spelled by a path once the overlaps are removed
    pub fn cumulated_size(&self, path: &AssemblyPath) -> usize {
        let overlap = self.settings.overlap();
        overlap
            + path
                .nodes()
                .map(|id| self.nodes[id].len().saturating_sub(overlap))
                .sum::<usize>()
    }

    fn is_new_path(&self, path: &AssemblyPath) -> bool {
        !self.paths.iter().any(|stored| stored == path)
    }

    /// Store a path and index its ends; `false` once the cap is exceeded
    fn push_path(
        &mut self,
        ends: &mut AHashMap<NodeId, Vec<usize>>,
        path: AssemblyPath,
    ) -> bool {
        let index = self.paths.len();
        if !path.is_cycle() {
            ends.entry(path.first()).or_default().push(index);
            if path.last() != path.first() {
                ends.entry(path.last()).or_default().push(index);
            }
        }
        self.paths.push(path);
        self.settings.max_paths == 0 || self.paths.len() <= self.settings.max_paths
    }

    fn abandon_enumeration(&mut self) -> Result<bool, AssemblerError> {
        debug!(
            "Path cap of {} exceeded, switching to greedy extraction",
            self.settings.max_paths
        );
        self.paths.clear();
        self.find_greedy_paths()?;
        Ok(false)
    }

    /// Enumerate every simple path and cycle over the live nodes.
    ///
    /// Returns `false` when the path cap was hit; the greedy repeats are then
    /// already collected.
    pub fn find_all_paths(&mut self) -> Result<bool, AssemblerError> {
        self.paths.clear();
        let mut ends: AHashMap<NodeId, Vec<usize>> = AHashMap::new();

        for node_id in 0..self.nodes.len() {
            if !self.nodes[node_id].is_live() {
                continue;
            }
            let start = self.paths.len();

            // Extend every path ending at a processed neighbor
            let neighbors: Vec<NodeId> = self.nodes[node_id].links().map(|(_, _, n)| n).collect();
            for neighbor_id in neighbors {
                if !self.nodes[neighbor_id].is_live() {
                    continue;
                }
                let candidates = ends.get(&neighbor_id).cloned().unwrap_or_default();
                for path_index in candidates {
                    let extended = self.paths[path_index]
                        .extend_through(&self.nodes[neighbor_id], &self.nodes[node_id]);
                    for path in extended {
                        if self.is_new_path(&path) && !self.push_path(&mut ends, path) {
                            return self.abandon_enumeration();
                        }
                    }
                }
            }
            let end = self.paths.len();

            // Close the new paths whose far end links back to their anchor
            for path_index in start..end {
                let path = &self.paths[path_index];
                if path.is_cycle() {
                    continue;
                }
                let (Some(exit), Some(start_position)) = (path.exit_position(), path.start_position())
                else {
                    continue;
                };
                let direction = if exit == start_position {
                    Direction::Direct
                } else {
                    Direction::Reverse
                };
                let first = path.first();
                if self.nodes[path.last()]
                    .neighbors(exit, direction)
                    .contains(&first)
                {
                    let mut cycle = path.clone();
                    cycle.push(exit, direction, first);
                    cycle.set_cycle();
                    if self.is_new_path(&cycle) && !self.push_path(&mut ends, cycle) {
                        return self.abandon_enumeration();
                    }
                }
            }

            // Join pairs of new paths meeting at this node
            for i in start..end {
                if self.paths[i].is_cycle() {
                    continue;
                }
                for j in (i + 1)..end {
                    if self.paths[j].is_cycle() {
                        continue;
                    }
                    if let Some(merged) = self.paths[i].merge(node_id, &self.paths[j]) {
                        if self.is_new_path(&merged) && !self.push_path(&mut ends, merged) {
                            return self.abandon_enumeration();
                        }
                    }
                }
            }

            if !self.push_path(&mut ends, AssemblyPath::new(node_id)) {
                return self.abandon_enumeration();
            }
        }
        debug!("Found {} paths", self.paths.len());
        Ok(true)
    }

    fn most_seen_node(&self) -> Option<NodeId> {
        let mut best: Option<(NodeId, KmerCount)> = None;
        for node in self.nodes.iter().filter(|n| n.is_live()) {
            if node.count() > best.map_or(0, |(_, c)| c) {
                best = Some((node.id(), node.count()));
            }
        }
        best.map(|(id, _)| id)
    }

    fn most_seen_neighbor(&self, id: NodeId, position: Position) -> Option<(NodeId, Direction)> {
        let mut best: Option<(NodeId, Direction, KmerCount)> = None;
        for direction in Direction::ALL {
            for &n in self.nodes[id].neighbors(position, direction) {
                let node = &self.nodes[n];
                if node.is_live() && node.count() > best.map_or(0, |(_, _, c)| c) {
                    best = Some((n, direction, node.count()));
                }
            }
        }
        best.map(|(n, d, _)| (n, d))
    }

    /// Consume the graph from its heaviest node outwards, always following
    /// the heaviest live neighbor
    pub fn find_greedy_paths(&mut self) -> Result<(), AssemblerError> {
        let overlap = self.settings.overlap();
        while let Some(seed) = self.most_seen_node() {
            let mut sequence = self.nodes[seed].oriented_word().to_string();
            // Coverage weighted by the bases each node adds to the consensus
            let mut total = self.nodes[seed].count() as u64 * sequence.len() as u64;
            let mut weight = sequence.len() as u64;
            self.nodes[seed].unset();
            for position in Position::ALL {
                let mut current = seed;
                let mut p = position;
                let mut d = Direction::Direct;
                while let Some((next, direction)) = self.most_seen_neighbor(current, p) {
                    current = next;
                    if direction == Direction::Reverse {
                        p = p.opposite();
                        d = d.flip();
                    }
                    let node = &self.nodes[current];
                    extend_word(&mut sequence, node.word(d), position, overlap)?;
                    let added = node.len().saturating_sub(overlap) as u64;
                    total += node.count() as u64 * added;
                    weight += added;
                    self.nodes[current].unset();
                }
            }
            let count = total.checked_div(weight).unwrap_or(0) as KmerCount;
            self.repeats
                .push(CountedRepeat::from_word(&sequence, count, false));
        }
        debug!("Greedy extraction produced {} repeats", self.repeats.len());
        Ok(())
    }

    /// Keep paths with a flow of at least `threshold`, longest first, that
    /// share no node with an already kept path
    pub fn select_paths(&mut self, threshold: KmerCount) {
        let mut paths = std::mem::take(&mut self.paths);
        paths.retain(|p| p.count() >= threshold);
        paths.sort_by_cached_key(|p| Reverse(self.cumulated_size(p)));
        let mut claimed: BTreeSet<NodeId> = BTreeSet::new();
        for path in paths {
            if path.nodes().any(|id| claimed.contains(&id)) {
                continue;
            }
            claimed.extend(path.nodes());
            self.paths.push(path);
        }
    }

    /// Consensus of one path, read in the anchor's orientation
    pub fn path_sequence(&self, path: &AssemblyPath) -> Result<String, AssemblerError> {
        let overlap = self.settings.overlap();
        self.stitch_path(path, |_, _| Ok(overlap))
    }

    /// Consensus of one path where `overlap(previous, step)` gives how many
    /// bases of the step's node are already spelled by the previous node
    pub fn stitch_path<F>(&self, path: &AssemblyPath, mut overlap: F) -> Result<String, AssemblerError>
    where
        F: FnMut(NodeId, &PathStep) -> Result<usize, AssemblerError>,
    {
        let mut word = self.nodes[path.first()].oriented_word().to_string();
        let mut position = None;
        let mut direction = Direction::Direct;
        let mut previous = path.first();
        for step in path.steps() {
            let position = *position.get_or_insert(step.position);
            if step.direction == Direction::Reverse {
                direction = direction.flip();
            }
            let shared = overlap(previous, step)?;
            extend_word(&mut word, self.nodes[step.node].word(direction), position, shared)?;
            previous = step.node;
        }
        Ok(word)
    }

    /// Repeats of this graph: the greedy ones if any, else one per kept path
    pub fn repeats(&mut self) -> Result<&[CountedRepeat], AssemblerError> {
        if self.repeats.is_empty() {
            let mut repeats = Vec::with_capacity(self.paths.len());
            for path in &self.paths {
                let word = self.path_sequence(path)?;
                repeats.push(CountedRepeat::from_word(&word, path.count(), path.is_cycle()));
            }
            self.repeats = repeats;
        }
        Ok(&self.repeats)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.paths.clear();
        self.repeats.clear();
    }
}

impl fmt::Display for AssemblyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes:")?;
        for node in self.nodes.iter().filter(|n| n.is_live()) {
            writeln!(f, "{node}")?;
        }
        if !self.paths.is_empty() {
            writeln!(f, "Paths:")?;
            for path in &self.paths {
                writeln!(f, "{path}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(k: usize) -> GraphSettings {
        GraphSettings {
            kmer_size: k,
            max_paths: 0,
            min_nb_nodes: 1,
            max_nb_nodes: 1000,
        }
    }

    /// Direct chain of the k-mers of `word`, all with the given counts
    fn chain(word: &str, k: usize, counts: &[KmerCount]) -> AssemblyGraph {
        let mut graph = AssemblyGraph::new(settings(k));
        for i in 0..=word.len() - k {
            let kmer = &word[i..i + k];
            graph.add_node(i, counts[i], Sequence::new(kmer)).unwrap();
        }
        for i in 1..graph.len() {
            let prev = graph.node(i - 1).sequence().clone();
            let next = graph.node(i).sequence().clone();
            let (position, dir) = Position::ALL
                .into_iter()
                .find_map(|p| prev.compare_next(&next, p).map(|d| (p, d)))
                .unwrap();
            graph.add_link(i - 1, position, dir, i).unwrap();
        }
        graph
    }

    #[test]
    fn test_add_node_requires_dense_ids() {
        let mut graph = AssemblyGraph::new(settings(5));
        assert!(graph.add_node(0, 1, Sequence::new("ACGTA")).is_ok());
        assert!(graph.add_node(2, 1, Sequence::new("ACGTA")).is_err());
        assert!(graph.add_node(0, 3, Sequence::new("ACGTC")).is_ok());
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(0).count(), 3);
        assert!(graph.add_link(0, Position::After, Direction::Direct, 5).is_err());
    }

    #[test]
    fn test_links_are_mirrored() {
        let mut graph = AssemblyGraph::new(settings(5));
        for i in 0..3 {
            graph.add_node(i, 1, Sequence::new("ACGTA")).unwrap();
        }
        graph.add_link(0, Position::After, Direction::Direct, 1).unwrap();
        graph.add_link(0, Position::After, Direction::Reverse, 2).unwrap();
        assert_eq!(graph.node(1).neighbors(Position::Before, Direction::Direct), &[0]);
        assert_eq!(graph.node(2).neighbors(Position::After, Direction::Reverse), &[0]);
    }

    #[test]
    fn test_classification() {
        // 0 fans out to 1 and 2 at AFTER, 3 hangs before 0
        let mut graph = AssemblyGraph::new(settings(5));
        for i in 0..4 {
            graph.add_node(i, 1, Sequence::new("ACGTA")).unwrap();
        }
        graph.add_link(0, Position::After, Direction::Direct, 1).unwrap();
        graph.add_link(0, Position::After, Direction::Direct, 2).unwrap();
        graph.add_link(3, Position::After, Direction::Direct, 0).unwrap();
        assert_eq!(graph.vee_positions(0), &[Position::After]);
        assert_eq!(graph.fork_position(0), Some(Position::After));
        assert!(graph.is_leaf(1));
        assert!(!graph.is_leaf(0));

        graph.node_mut(3).unset();
        assert!(graph.is_leaf(0));
        assert_eq!(graph.fork_position(0), None);
    }

    #[test]
    fn test_chain_paths_and_sequence() {
        let word = "AACGTCAGGT";
        let mut graph = chain(word, 5, &[4; 6]);
        assert!(graph.find_all_paths().unwrap());
        let longest = graph
            .paths()
            .iter()
            .max_by_key(|p| p.len())
            .unwrap()
            .clone();
        assert_eq!(longest.len(), 6);
        assert_eq!(graph.cumulated_size(&longest), word.len());
        let spelled = graph.path_sequence(&longest).unwrap();
        assert!(spelled == word || spelled == crate::core::reverse_complement(word));
    }

    #[test]
    fn test_path_cap_falls_back_to_greedy() {
        let word = "AACGTCAGGT";
        let mut graph = chain(word, 5, &[4, 5, 6, 7, 8, 9]);
        graph.settings.max_paths = 3;
        assert!(!graph.find_all_paths().unwrap());
        assert!(graph.paths().is_empty());
        let repeats = graph.repeats().unwrap().to_vec();
        assert_eq!(repeats.len(), 1);
        assert_eq!(repeats[0].len(), word.len());
        // Seed 9 spans 5 bases, every other node adds one
        assert_eq!(repeats[0].count, (9 * 5 + 4 + 5 + 6 + 7 + 8) / 10);
        assert_eq!(graph.live_count(), 0);
    }

    #[test]
    fn test_select_paths_disjoint_longest_first() {
        let word = "AACGTCAGGT";
        let mut graph = chain(word, 5, &[4; 6]);
        graph.find_all_paths().unwrap();
        for path in graph.paths_mut() {
            path.set_count(4);
        }
        graph.select_paths(1);
        assert_eq!(graph.paths().len(), 1);
        assert_eq!(graph.paths()[0].len(), 6);
        let repeats = graph.repeats().unwrap();
        assert_eq!(repeats[0].count, 4);
        assert_eq!(repeats[0].len(), word.len());
    }

    #[test]
    fn test_select_paths_drops_low_flow() {
        let mut graph = chain("AACGTCAGGT", 5, &[4; 6]);
        graph.find_all_paths().unwrap();
        graph.select_paths(1);
        assert!(graph.paths().is_empty());
    }

    #[test]
    fn test_cycle_is_detected() {
        // Four k-mers of the circular word ACGGTACC... closing on themselves
        let mut graph = AssemblyGraph::new(settings(3));
        for i in 0..3 {
            graph.add_node(i, 2, Sequence::new("ACG")).unwrap();
        }
        graph.add_link(0, Position::After, Direction::Direct, 1).unwrap();
        graph.add_link(1, Position::After, Direction::Direct, 2).unwrap();
        graph.add_link(2, Position::After, Direction::Direct, 0).unwrap();
        assert!(graph.find_all_paths().unwrap());
        let cycles: Vec<&AssemblyPath> = graph.paths().iter().filter(|p| p.is_cycle()).collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 4);
        assert_eq!(cycles[0].first(), cycles[0].last());
    }

    #[test]
    fn test_greedy_count_is_weighted_by_added_bases() {
        let long = "ACGTTGCATAGGCAT";
        let short = "GCATC";
        let mut graph = AssemblyGraph::new(settings(5));
        graph.add_node(0, 100, Sequence::new(long)).unwrap();
        graph.add_node(1, 10, Sequence::new(short)).unwrap();
        let (first, second) = (graph.node(0).sequence().clone(), graph.node(1).sequence().clone());
        let (position, dir) = Position::ALL
            .into_iter()
            .find_map(|p| first.compare_next(&second, p).map(|d| (p, d)))
            .unwrap();
        graph.add_link(0, position, dir, 1).unwrap();

        graph.find_greedy_paths().unwrap();
        let repeats = graph.repeats().unwrap();
        assert_eq!(repeats.len(), 1);
        assert_eq!(repeats[0].len(), 16);
        let spelled = repeats[0].sequence.first_word();
        let expected = "ACGTTGCATAGGCATC";
        assert!(spelled == expected || spelled == crate::core::reverse_complement(expected));
        // 15 bases at 100 and one added base at 10, not the plain mean of 55
        assert_eq!(repeats[0].count, (100 * 15 + 10) / 16);
    }

    #[test]
    fn test_small_and_big() {
        let mut graph = chain("AACGTCAGGT", 5, &[4; 6]);
        graph.settings.min_nb_nodes = 20;
        assert!(graph.is_small());
        graph.settings.min_nb_nodes = 5;
        graph.settings.max_nb_nodes = 5;
        assert!(!graph.is_small());
        assert!(graph.is_big());
    }
}
