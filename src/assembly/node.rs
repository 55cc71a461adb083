//! Bidirected assembly node
//!
//! A node owns four adjacency lists indexed by `[Position][Direction]`. Its
//! `direct` flag records whether the consensus is currently read on the
//! stored first strand; all positions in the adjacency lists refer to that
//! oriented word.

use crate::core::data_structures::{Direction, KmerCount, Position, Sequence};
use crate::utils::configuration::AssemblerError;
use std::fmt;

/// Index of a node in its graph's table
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct AssemblyNode {
    id: NodeId,
    count: KmerCount,
    sequence: Sequence,
    live: bool,
    direct: bool,
    neighbors: [[Vec<NodeId>; 2]; 2],
}

impl AssemblyNode {
    pub fn new(id: NodeId, count: KmerCount, sequence: Sequence) -> Self {
        Self {
            id,
            count,
            sequence,
            live: true,
            direct: true,
            neighbors: Default::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn count(&self) -> KmerCount {
        self.count
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Soft-delete; the slot and its links stay in place
    pub fn unset(&mut self) {
        self.live = false;
    }

    pub fn is_direct(&self) -> bool {
        self.direct
    }

    /// Consensus as the adjacency lists see it (`Direct`) or its reverse complement
    pub fn word(&self, direction: Direction) -> &str {
        if self.direct {
            self.sequence.word(direction)
        } else {
            self.sequence.word(direction.flip())
        }
    }

    pub fn oriented_word(&self) -> &str {
        self.word(Direction::Direct)
    }

    pub fn neighbors(&self, position: Position, direction: Direction) -> &[NodeId] {
        &self.neighbors[position.index()][direction.index()]
    }

    /// All `(position, direction, neighbor)` entries, dead neighbors included
    pub fn links(&self) -> impl Iterator<Item = (Position, Direction, NodeId)> + '_ {
        Position::ALL.into_iter().flat_map(move |p| {
            Direction::ALL
                .into_iter()
                .flat_map(move |d| self.neighbors(p, d).iter().map(move |&n| (p, d, n)))
        })
    }

    pub fn add_neighbor(&mut self, id: NodeId, position: Position, direction: Direction) {
        let list = &mut self.neighbors[position.index()][direction.index()];
        if !list.contains(&id) {
            list.push(id);
        }
    }

    /// No link at all at one of the ends, regardless of liveness
    pub fn has_bare_end(&self) -> bool {
        Position::ALL.into_iter().any(|p| {
            Direction::ALL
                .into_iter()
                .all(|d| self.neighbors(p, d).is_empty())
        })
    }

    /// Absorb `other`, reached from this node's `position` end with `direction`.
    ///
    /// The `position` end inherits `other`'s far end; the consensus gains
    /// `other`'s word minus the `kmer_size - 1` overlap and the coverage
    /// becomes the length-weighted average of both nodes.
    pub fn merge(
        &mut self,
        position: Position,
        direction: Direction,
        other: &AssemblyNode,
        kmer_size: usize,
    ) -> Result<(), AssemblerError> {
        let far = match direction {
            Direction::Direct => position,
            Direction::Reverse => position.opposite(),
        };
        for d in Direction::ALL {
            let source = match direction {
                Direction::Direct => d,
                Direction::Reverse => d.flip(),
            };
            self.neighbors[position.index()][d.index()] = other.neighbors(far, source).to_vec();
        }

        let (s1, s2) = (self.len() as u64, other.len() as u64);
        if s1 + s2 > 0 {
            let weighted = self.count as u64 * s1 + other.count as u64 * s2;
            self.count = (weighted / (s1 + s2)) as KmerCount;
        }

        let this = self.oriented_word();
        let that = if other.direct == direction.is_direct() {
            other.sequence.first_word()
        } else {
            other.sequence.second_word()
        };
        let (head, tail) = match position {
            Position::After => (this, that),
            Position::Before => (that, this),
        };
        let overlap = kmer_size.saturating_sub(1);
        let tail = tail.get(overlap..).ok_or_else(|| AssemblerError::StitchFailure {
            message: format!(
                "node {} is shorter than the {}-base overlap while merging into node {}",
                other.id, overlap, self.id
            ),
        })?;
        let merged = format!("{head}{tail}");
        self.sequence = Sequence::new(&merged);
        self.direct = self.sequence.first_word() == merged;
        Ok(())
    }

    /// Point links to the absorbed node `old` at its absorber `new`.
    ///
    /// A direct merge substitutes in place; a reverse merge flipped the
    /// absorber, so the link is added under the opposite strand mode.
    pub fn update_links(&mut self, old: NodeId, new: NodeId, direct: bool) {
        for p in Position::ALL {
            for d in Direction::ALL {
                let hits = self.neighbors[p.index()][d.index()]
                    .iter()
                    .filter(|&&n| n == old)
                    .count();
                if hits == 0 {
                    continue;
                }
                if direct {
                    let list = &mut self.neighbors[p.index()][d.index()];
                    for n in list.iter_mut().filter(|n| **n == old) {
                        *n = new;
                    }
                    let mut seen = Vec::with_capacity(list.len());
                    list.retain(|n| {
                        if seen.contains(n) {
                            false
                        } else {
                            seen.push(*n);
                            true
                        }
                    });
                } else {
                    self.add_neighbor(new, p, d.flip());
                }
            }
        }
    }
}

impl fmt::Display for AssemblyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in Direction::ALL {
            let list = self.neighbors(Position::Before, d);
            if !list.is_empty() {
                write!(f, "({}) {:?} ", if d.is_direct() { '+' } else { '-' }, list)?;
            }
        }
        write!(f, "<-- ({}, {}, {})", self.id, self.sequence, self.count)?;
        if !self.direct {
            write!(f, " (-)")?;
        }
        write!(f, " -->")?;
        for d in Direction::ALL {
            let list = self.neighbors(Position::After, d);
            if !list.is_empty() {
                write!(f, " ({}) {:?}", if d.is_direct() { '+' } else { '-' }, list)?;
            }
        }
        Ok(())
    }
}
