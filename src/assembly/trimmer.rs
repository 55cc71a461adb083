//! Graph simplification run to a fixed point
//!
//! Each round merges unambiguous chains, pinches bubbles, then fuses and
//! removes tips. Rounds repeat while a bubble or a tip disappears.

use crate::assembly::graph::AssemblyGraph;
use crate::assembly::node::NodeId;
use crate::core::data_structures::{exit_position, Direction, Position};
use crate::utils::configuration::{AssemblerConfig, AssemblerError, BubblePolicy};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct TrimSettings {
    /// Largest cumulated size of a walk explored when looking for a bubble
    pub bubble_size: usize,
    pub bubble_policy: BubblePolicy,
}

impl TrimSettings {
    pub fn from_config(config: &AssemblerConfig) -> Self {
        Self {
            bubble_size: config.bubble_size,
            bubble_policy: config.bubble_policy,
        }
    }
}

/// What one `trim` call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimReport {
    pub rounds: usize,
    pub merges: usize,
    pub bubbles: usize,
    pub fused_tips: usize,
    pub removed_tips: usize,
}

pub struct GraphTrimmer<'a> {
    graph: &'a mut AssemblyGraph,
    settings: TrimSettings,
}

struct BubbleFrame {
    candidates: Vec<(Position, Direction, NodeId)>,
    next: usize,
    position: Position,
    change: bool,
}

impl<'a> GraphTrimmer<'a> {
    pub fn new(graph: &'a mut AssemblyGraph, settings: TrimSettings) -> Self {
        Self { graph, settings }
    }

    fn kmer_size(&self) -> usize {
        self.graph.settings().kmer_size
    }

    /// Simplify until no bubble is pinched and no tip is cut; chain merging is optional
    pub fn trim(&mut self, merge: bool) -> Result<TrimReport, AssemblerError> {
        let mut report = TrimReport::default();
        loop {
            report.rounds += 1;
            if merge {
                report.merges += self.merge_nodes()?;
            }
            let pinched = self.pinch_bubbles();
            let fused = self.fuse_tips();
            let removed = self.remove_tips();
            report.bubbles += pinched;
            report.fused_tips += fused;
            report.removed_tips += removed;
            // A pinched bubble leaves a chain that the next round can merge
            if pinched + fused + removed == 0 {
                break;
            }
        }
        debug!(
            "Trimmed graph in {} rounds: {} merges, {} bubbles, {} fused and {} removed tips",
            report.rounds, report.merges, report.bubbles, report.fused_tips, report.removed_tips
        );
        Ok(report)
    }

    fn live_at(&self, id: NodeId, position: Position) -> impl Iterator<Item = (Direction, NodeId)> + '_ {
        let graph: &AssemblyGraph = self.graph;
        let node = graph.node(id);
        Direction::ALL.into_iter().flat_map(move |d| {
            node.neighbors(position, d)
                .iter()
                .filter(move |&&n| graph.node(n).is_live())
                .map(move |&n| (d, n))
        })
    }

    /// The only live neighbor at `position`, with the strand mode reaching it
    fn single_live_neighbor(&self, id: NodeId, position: Position) -> Option<(NodeId, Direction)> {
        let mut live = self.live_at(id, position);
        let (direction, neighbor) = live.next()?;
        match live.next() {
            Some(_) => None,
            None => Some((neighbor, direction)),
        }
    }

    /// Fold every node with a unique, reciprocal neighbor into it
    fn merge_nodes(&mut self) -> Result<usize, AssemblerError> {
        let mut pending: Vec<NodeId> = (0..self.graph.len())
            .filter(|&i| self.graph.node(i).is_live())
            .collect();
        let kmer_size = self.kmer_size();
        let mut merges = 0;
        while let Some(i) = pending.pop() {
            if !self.graph.node(i).is_live() {
                continue;
            }
            for position in Position::ALL {
                let Some((j, direction)) = self.single_live_neighbor(i, position) else {
                    continue;
                };
                if i == j {
                    continue;
                }
                let other_position = match direction {
                    Direction::Direct => position.opposite(),
                    Direction::Reverse => position,
                };
                if self.live_at(j, other_position).count() != 1 {
                    continue;
                }
                let far = other_position.opposite();
                let loops = Direction::ALL
                    .into_iter()
                    .any(|d| self.graph.node(j).neighbors(far, d).contains(&i));
                if loops {
                    continue;
                }

                let absorbed = self.graph.node(j).clone();
                self.graph
                    .node_mut(i)
                    .merge(position, direction, &absorbed, kmer_size)?;
                for (_, _, k) in absorbed.links() {
                    if k != i && self.graph.node(k).is_live() {
                        self.graph
                            .node_mut(k)
                            .update_links(j, i, direction.is_direct());
                    }
                }
                self.graph.node_mut(j).unset();
                merges += 1;
                pending.push(i);
                break;
            }
        }
        Ok(merges)
    }

    fn pinch_bubbles(&mut self) -> usize {
        if self.graph.len() < 3 {
            return 0;
        }
        let mut bubbles = 0;
        for i in 0..self.graph.len() {
            loop {
                if !self.graph.node(i).is_live() {
                    break;
                }
                let mut found = false;
                for &position in self.graph.vee_positions(i) {
                    if let Some(path) = self.find_bubble(i, position) {
                        self.pinch(&path);
                        bubbles += 1;
                        found = true;
                    }
                }
                if !found {
                    break;
                }
            }
        }
        bubbles
    }

    fn span(&self, id: NodeId) -> usize {
        self.graph
            .node(id)
            .len()
            .saturating_sub(self.kmer_size().saturating_sub(1))
    }

    fn bubble_frame(&self, path: &[NodeId], position: Position, change: bool) -> BubbleFrame {
        let last = path[path.len() - 1];
        let node = self.graph.node(last);
        let turn_allowed = !change && path.len() > 2;
        let mut candidates = Vec::new();
        for p in Position::ALL {
            if p != position && !turn_allowed {
                continue;
            }
            for d in Direction::ALL {
                for &next in node.neighbors(p, d) {
                    if self.graph.node(next).is_live() {
                        candidates.push((p, d, next));
                    }
                }
            }
        }
        BubbleFrame {
            candidates,
            next: 0,
            position,
            change,
        }
    }

    /// Walk that leaves `anchor` at `position`, turns back once at a branch
    /// node and returns to `anchor` within the bubble size budget
    fn find_bubble(&self, anchor: NodeId, position: Position) -> Option<Vec<NodeId>> {
        let budget = self.settings.bubble_size;
        let mut size = self.kmer_size().saturating_sub(1) + self.span(anchor);
        if size > budget {
            return None;
        }
        let mut path = vec![anchor];
        let mut on_path: BTreeSet<NodeId> = BTreeSet::from([anchor]);
        let mut stack = vec![self.bubble_frame(&path, position, false)];

        while let Some(frame) = stack.last_mut() {
            if frame.next == frame.candidates.len() {
                stack.pop();
                if !stack.is_empty() {
                    if let Some(id) = path.pop() {
                        on_path.remove(&id);
                        size -= self.span(id);
                    }
                }
                continue;
            }
            let (p, d, next) = frame.candidates[frame.next];
            frame.next += 1;
            let turned = frame.change || p != frame.position;
            if next == anchor && turned {
                return Some(path);
            }
            if on_path.contains(&next) {
                continue;
            }
            let added = self.span(next);
            if size + added > budget {
                continue;
            }
            size += added;
            path.push(next);
            on_path.insert(next);
            let child = self.bubble_frame(&path, exit_position(p, d), turned);
            stack.push(child);
        }
        None
    }

    fn pinch(&mut self, path: &[NodeId]) {
        let branch = &path[1..];
        let count = |id: &NodeId| self.graph.node(*id).count();
        match self.settings.bubble_policy {
            BubblePolicy::DropWeakest => {
                // min_by_key keeps the first minimum
                if let Some(&weakest) = branch.iter().min_by_key(|id| count(id)) {
                    self.graph.node_mut(weakest).unset();
                }
            }
            BubblePolicy::KeepStrongest => {
                let mut strongest: Option<NodeId> = None;
                for id in branch {
                    if strongest.map_or(true, |s| count(id) > count(&s)) {
                        strongest = Some(*id);
                    }
                }
                let doomed: Vec<NodeId> = branch
                    .iter()
                    .copied()
                    .filter(|&id| Some(id) != strongest)
                    .collect();
                for id in doomed {
                    self.graph.node_mut(id).unset();
                }
            }
        }
    }

    /// Longest live neighbor at `position` when every live neighbor is a
    /// leaf other than `id` itself
    fn longest_tip(&self, id: NodeId, position: Position) -> Option<NodeId> {
        let mut longest: Option<(NodeId, usize)> = None;
        for (_, n) in self.live_at(id, position) {
            if n == id || !self.graph.is_leaf(n) {
                return None;
            }
            let size = self.graph.node(n).len();
            if size > longest.map_or(0, |(_, s)| s) {
                longest = Some((n, size));
            }
        }
        longest.map(|(n, _)| n)
    }

    fn unset_except(&mut self, id: NodeId, position: Position, keep: NodeId) -> usize {
        let doomed: Vec<NodeId> = self
            .live_at(id, position)
            .map(|(_, n)| n)
            .filter(|&n| n != keep)
            .collect();
        let mut unset = 0;
        for n in doomed {
            if self.graph.node(n).is_live() {
                self.graph.node_mut(n).unset();
                unset += 1;
            }
        }
        unset
    }

    fn forks(&self) -> Vec<(NodeId, Position)> {
        (0..self.graph.len())
            .filter(|&i| self.graph.node(i).is_live())
            .filter_map(|i| self.graph.fork_position(i).map(|p| (i, p)))
            .collect()
    }

    /// Keep only the longest dead-end branch at each fork
    fn fuse_tips(&mut self) -> usize {
        let mut fused = 0;
        for (i, position) in self.forks() {
            if !self.graph.node(i).is_live() || self.graph.fork_position(i) != Some(position) {
                continue;
            }
            if let Some(longest) = self.longest_tip(i, position) {
                fused += self.unset_except(i, position, longest);
            }
        }
        fused
    }

    /// Like fusing, but every sibling of the longest branch, dead ones
    /// included, must be a leaf
    fn remove_tips(&mut self) -> usize {
        let mut removed = 0;
        for (i, position) in self.forks() {
            if !self.graph.node(i).is_live() || self.graph.fork_position(i) != Some(position) {
                continue;
            }
            let Some(longest) = self.longest_tip(i, position) else {
                continue;
            };
            let node = self.graph.node(i);
            let all_leaves = Direction::ALL.into_iter().all(|d| {
                node.neighbors(position, d)
                    .iter()
                    .all(|&n| n == longest || self.graph.is_leaf(n))
            });
            if all_leaves {
                removed += self.unset_except(i, position, longest);
            }
        }
        removed
    }
}
