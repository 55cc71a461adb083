//! Walks through the assembly graph
//!
//! A path starts at an anchor node and continues through annotated steps;
//! step `j` says that its node sits in the `(position, direction)` adjacency
//! list of the node before it.

use crate::assembly::node::{AssemblyNode, NodeId};
use crate::core::data_structures::{exit_position, mirror, Direction, KmerCount, Position};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub position: Position,
    pub direction: Direction,
    pub node: NodeId,
}

#[derive(Debug, Clone)]
pub struct AssemblyPath {
    anchor: NodeId,
    steps: Vec<PathStep>,
    node_ids: BTreeSet<NodeId>,
    cycle: bool,
    count: KmerCount,
}

impl AssemblyPath {
    pub fn new(anchor: NodeId) -> Self {
        Self {
            anchor,
            steps: Vec::new(),
            node_ids: BTreeSet::from([anchor]),
            cycle: false,
            count: 0,
        }
    }

    pub fn push(&mut self, position: Position, direction: Direction, node: NodeId) {
        self.steps.push(PathStep {
            position,
            direction,
            node,
        });
        self.node_ids.insert(node);
    }

    /// Remove the last step; the anchor always stays
    pub fn pop(&mut self) -> Option<PathStep> {
        let step = self.steps.pop()?;
        if step.node != self.anchor && !self.steps.iter().any(|s| s.node == step.node) {
            self.node_ids.remove(&step.node);
        }
        Some(step)
    }

    /// Number of entries, anchor included
    pub fn len(&self) -> usize {
        self.steps.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn node(&self, i: usize) -> NodeId {
        match i {
            0 => self.anchor,
            _ => self.steps[i - 1].node,
        }
    }

    pub fn first(&self) -> NodeId {
        self.anchor
    }

    pub fn last(&self) -> NodeId {
        self.steps.last().map_or(self.anchor, |s| s.node)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Node ids in walk order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.anchor).chain(self.steps.iter().map(|s| s.node))
    }

    pub fn node_ids(&self) -> &BTreeSet<NodeId> {
        &self.node_ids
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node_ids.contains(&id)
    }

    /// Anchor end the walk leaves from
    pub fn start_position(&self) -> Option<Position> {
        self.steps.first().map(|s| s.position)
    }

    /// End of the last node through which the walk would continue
    pub fn exit_position(&self) -> Option<Position> {
        self.steps
            .last()
            .map(|s| exit_position(s.position, s.direction))
    }

    pub fn set_cycle(&mut self) {
        self.cycle = true;
    }

    pub fn is_cycle(&self) -> bool {
        self.cycle
    }

    pub fn count(&self) -> KmerCount {
        self.count
    }

    pub fn set_count(&mut self, count: KmerCount) {
        self.count = count;
    }

    /// Same walk read from the other end
    pub fn reverse(&mut self) {
        let mut nodes: Vec<NodeId> = self.nodes().collect();
        nodes.reverse();
        let annotations: Vec<(Position, Direction)> = self
            .steps
            .iter()
            .rev()
            .map(|s| mirror(s.position, s.direction))
            .collect();
        self.anchor = nodes[0];
        self.steps = nodes[1..]
            .iter()
            .zip(annotations)
            .map(|(&node, (position, direction))| PathStep {
                position,
                direction,
                node,
            })
            .collect();
    }

    /// Extensions of this path by `new`, attached through `link`, one of its ends
    pub fn extend_through(&self, link: &AssemblyNode, new: &AssemblyNode) -> Vec<AssemblyPath> {
        let (link_id, new_id) = (link.id(), new.id());
        let mut paths = Vec::new();
        // Closing back onto a visited node is the cycle detector's job
        if self.contains(new_id) {
            return paths;
        }
        match (self.start_position(), self.exit_position()) {
            (None, _) | (_, None) => {
                for p in Position::ALL {
                    for d in Direction::ALL {
                        if link.neighbors(p, d).contains(&new_id) {
                            let mut path = AssemblyPath::new(link_id);
                            path.push(p, d, new_id);
                            paths.push(path);
                        }
                    }
                }
            }
            (Some(start), _) if link_id == self.anchor => {
                for position in Position::ALL {
                    let direction = if position == start {
                        Direction::Direct
                    } else {
                        Direction::Reverse
                    };
                    if new.neighbors(position, direction).contains(&link_id) {
                        let mut path = AssemblyPath::new(new_id);
                        path.push(position, direction, link_id);
                        for step in &self.steps {
                            path.push(step.position, step.direction, step.node);
                        }
                        paths.push(path);
                    }
                }
            }
            (_, Some(exit)) if link_id == self.last() => {
                for direction in Direction::ALL {
                    if link.neighbors(exit, direction).contains(&new_id) {
                        let mut path = self.clone();
                        path.push(exit, direction, new_id);
                        paths.push(path);
                    }
                }
            }
            _ => warn!("Node {} is not an end of path {}", link_id, self),
        }
        paths
    }

    /// Join two paths that both end at `link` into one walk through it.
    ///
    /// `None` when the paths share another node or meet with incompatible ends.
    pub fn merge(&self, link: NodeId, other: &AssemblyPath) -> Option<AssemblyPath> {
        let (mut p1, mut p2) = (self.clone(), other.clone());
        if p1.first() == link && p2.last() == link {
            std::mem::swap(&mut p1, &mut p2);
        } else {
            if p1.first() == link {
                p1.reverse();
            }
            if p2.last() == link {
                p2.reverse();
            }
        }
        if other
            .node_ids
            .iter()
            .any(|&id| id != link && self.node_ids.contains(&id))
        {
            return None;
        }
        if p1.last() != link || p2.first() != link {
            warn!("Cannot merge paths {} and {} through {}", self, other, link);
            return None;
        }
        if p1.exit_position()? != p2.start_position()? {
            return None;
        }
        let mut merged = p1;
        for step in &p2.steps {
            merged.push(step.position, step.direction, step.node);
        }
        Some(merged)
    }
}

impl PartialEq for AssemblyPath {
    /// Same cycle flag, same length and same node set
    fn eq(&self, other: &Self) -> bool {
        self.cycle == other.cycle && self.len() == other.len() && self.node_ids == other.node_ids
    }
}

impl fmt::Display for AssemblyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.anchor)?;
        for step in &self.steps {
            let arrow = match step.position {
                Position::After => "-->",
                Position::Before => "<--",
            };
            let strand = if step.direction.is_direct() { '+' } else { '-' };
            write!(f, " {} ({}) {}", arrow, strand, step.node)?;
        }
        if self.count > 0 {
            write!(f, " -- {}", self.count)?;
        }
        if self.cycle {
            write!(f, " -- cycle")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data_structures::Sequence;

    fn linked(ids: &[NodeId]) -> Vec<AssemblyNode> {
        // Direct chain ids[0] -> ids[1] -> ...
        let mut nodes: Vec<AssemblyNode> = ids
            .iter()
            .map(|&id| AssemblyNode::new(id, 1, Sequence::new("ACGTA")))
            .collect();
        for i in 0..ids.len() - 1 {
            nodes[i].add_neighbor(ids[i + 1], Position::After, Direction::Direct);
            nodes[i + 1].add_neighbor(ids[i], Position::Before, Direction::Direct);
        }
        nodes
    }

    #[test]
    fn test_single_node_extension() {
        let nodes = linked(&[0, 1]);
        let paths = AssemblyPath::new(0).extend_through(&nodes[0], &nodes[1]);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].first(), 0);
        assert_eq!(paths[0].last(), 1);
        assert_eq!(paths[0].start_position(), Some(Position::After));
        assert_eq!(paths[0].exit_position(), Some(Position::After));
    }

    #[test]
    fn test_extension_at_last_and_first() {
        let nodes = linked(&[0, 1, 2]);
        let path = AssemblyPath::new(0).extend_through(&nodes[0], &nodes[1]).remove(0);
        let longer = path.extend_through(&nodes[1], &nodes[2]);
        assert_eq!(longer.len(), 1);
        assert_eq!(longer[0].nodes().collect::<Vec<_>>(), vec![0, 1, 2]);

        // Prepending through the anchor: path 1 -> 2 grows into 0 -> 1 -> 2
        let tail = AssemblyPath::new(1).extend_through(&nodes[1], &nodes[2]).remove(0);
        let grown = tail.extend_through(&nodes[1], &nodes[0]);
        assert_eq!(grown.len(), 1);
        assert_eq!(grown[0].nodes().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(grown[0].start_position(), Some(Position::After));
    }

    #[test]
    fn test_reverse_mirrors_annotations() {
        let mut path = AssemblyPath::new(0);
        path.push(Position::After, Direction::Direct, 1);
        path.push(Position::After, Direction::Reverse, 2);
        path.reverse();
        assert_eq!(path.nodes().collect::<Vec<_>>(), vec![2, 1, 0]);
        assert_eq!(
            path.steps()[0],
            PathStep {
                position: Position::After,
                direction: Direction::Reverse,
                node: 1
            }
        );
        assert_eq!(
            path.steps()[1],
            PathStep {
                position: Position::Before,
                direction: Direction::Direct,
                node: 0
            }
        );
        path.reverse();
        assert_eq!(path.nodes().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(path.steps()[1].direction, Direction::Reverse);
    }

    #[test]
    fn test_merge_through_link() {
        let nodes = linked(&[0, 1, 2]);
        let left = AssemblyPath::new(0).extend_through(&nodes[0], &nodes[1]).remove(0);
        let right = AssemblyPath::new(2).extend_through(&nodes[2], &nodes[1]).remove(0);
        let merged = left.merge(1, &right).unwrap();
        assert_eq!(merged.nodes().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(merged.exit_position(), Some(Position::After));
    }

    #[test]
    fn test_merge_rejects_shared_nodes() {
        let mut a = AssemblyPath::new(0);
        a.push(Position::After, Direction::Direct, 1);
        let mut b = AssemblyPath::new(1);
        b.push(Position::Before, Direction::Direct, 0);
        assert!(a.merge(1, &b).is_none());
    }

    #[test]
    fn test_equality_ignores_order() {
        let mut a = AssemblyPath::new(0);
        a.push(Position::After, Direction::Direct, 1);
        let mut b = AssemblyPath::new(1);
        b.push(Position::Before, Direction::Direct, 0);
        assert_eq!(a, b);
        b.set_cycle();
        assert_ne!(a, b);
    }

    #[test]
    fn test_pop_keeps_anchor() {
        let mut a = AssemblyPath::new(0);
        a.push(Position::After, Direction::Direct, 1);
        assert!(a.pop().is_some());
        assert!(a.pop().is_none());
        assert!(a.contains(0));
        assert!(!a.contains(1));
        assert_eq!(a.len(), 1);
    }
}
