//! Core data structures shared by the graph engine
//! ===============================================
//!
//! - Node ends (`Position`) and strand modes (`Direction`)
//! - The `mirror` rule that keeps bidirected adjacency symmetric
//! - Double-stranded `Sequence` with overlap detection between neighbors

use std::fmt;

/// Occurrence count of a k-mer, node or repeat
pub type KmerCount = u32;

/// One of the two ends of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Position {
    After = 0,
    Before = 1,
}

impl Position {
    pub const ALL: [Position; 2] = [Position::After, Position::Before];

    pub fn opposite(self) -> Position {
        match self {
            Position::After => Position::Before,
            Position::Before => Position::After,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Strand mode of an edge: whether the neighbor is read as stored or reverse-complemented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Direct = 0,
    Reverse = 1,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Direct, Direction::Reverse];

    pub fn flip(self) -> Direction {
        match self {
            Direction::Direct => Direction::Reverse,
            Direction::Reverse => Direction::Direct,
        }
    }

    pub fn is_direct(self) -> bool {
        self == Direction::Direct
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Slot of the reverse entry for an edge installed at `(position, direction)`.
///
/// A direct edge leaving the AFTER end enters the neighbor through its BEFORE
/// end; a reverse edge enters through the same end it left from.
pub fn mirror(position: Position, direction: Direction) -> (Position, Direction) {
    match direction {
        Direction::Direct => (position.opposite(), direction),
        Direction::Reverse => (position, direction),
    }
}

/// End of a node through which a walk leaves after entering it via an edge
/// stored at `(position, direction)` on the previous node
pub fn exit_position(position: Position, direction: Direction) -> Position {
    match direction {
        Direction::Direct => position,
        Direction::Reverse => position.opposite(),
    }
}

/// 2-bit code of a nucleotide (A=0, C=1, G=2, T=3)
pub fn nucleotide_code(base: u8) -> Option<u8> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

pub fn code_nucleotide(code: u8) -> u8 {
    b"ACGT"[(code & 0b11) as usize]
}

pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        other => other,
    }
}

pub fn reverse_complement(word: &str) -> String {
    word.bytes()
        .rev()
        .map(|b| complement(b) as char)
        .collect()
}

/// Double-stranded sequence.
///
/// `first` is the lexicographically smaller of the word and its reverse
/// complement, `second` the other strand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Sequence {
    first: String,
    second: String,
}

impl Sequence {
    pub fn new(word: &str) -> Self {
        let word = word.to_ascii_uppercase();
        let rc = reverse_complement(&word);
        if rc < word {
            Self {
                first: rc,
                second: word,
            }
        } else {
            Self {
                first: word,
                second: rc,
            }
        }
    }

    pub fn first_word(&self) -> &str {
        &self.first
    }

    pub fn second_word(&self) -> &str {
        &self.second
    }

    pub fn word(&self, direction: Direction) -> &str {
        match direction {
            Direction::Direct => &self.first,
            Direction::Reverse => &self.second,
        }
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// Number of unambiguous (ACGT) bases
    pub fn unambiguous_len(&self) -> usize {
        self.first
            .bytes()
            .filter(|b| nucleotide_code(*b).is_some())
            .count()
    }

    /// Strand under which `other` continues this sequence at `position`,
    /// overlapping on `min(len) - 1` bases
    pub fn compare_next(&self, other: &Sequence, position: Position) -> Option<Direction> {
        let this_size = self.len();
        let that_size = other.len();
        let last = this_size.min(that_size).checked_sub(1)?;
        match position {
            Position::After => {
                let suffix = &self.first[this_size - last..];
                if &other.first[..last] == suffix {
                    Some(Direction::Direct)
                } else if &other.second[..last] == suffix {
                    Some(Direction::Reverse)
                } else {
                    None
                }
            }
            Position::Before => {
                let prefix = &self.first[..last];
                if &other.first[that_size - last..] == prefix {
                    Some(Direction::Direct)
                } else if &other.second[that_size - last..] == prefix {
                    Some(Direction::Reverse)
                } else {
                    None
                }
            }
        }
    }

    /// FASTA record with 60-column sequence lines
    pub fn to_fasta(&self, title: &str) -> String {
        let mut record = format!(">{} ({})\n", title, self.len());
        for line in self.first.as_bytes().chunks(60) {
            record.push_str(&String::from_utf8_lossy(line));
            record.push('\n');
        }
        record
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)
    }
}
