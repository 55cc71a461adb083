//! Overlap alignment evidence between repeats
//!
//! The merger asks a `SequenceComparator` whether the end of one word runs
//! into the start of another. `OverlapAligner` answers with a full
//! dynamic-programming alignment of a suffix of the first word against a
//! prefix of the second.

use crate::utils::configuration::AssemblerConfig;

/// Best suffix/prefix alignment between two words
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub score: u32,
    /// Identical columns over aligned (match or mismatch) columns
    pub identity: f64,
    /// First aligned base of the first word
    pub start_first: usize,
    /// One past the last aligned base of the second word
    pub end_second: usize,
}

impl Alignment {
    /// Bases of the first word inside the overlap
    pub fn first_overlap(&self, first_len: usize) -> usize {
        first_len.saturating_sub(self.start_first)
    }
}

pub trait SequenceComparator: Send + Sync {
    /// Alignment of a suffix of `first` followed by a prefix of `second`,
    /// `None` when they do not overlap at all
    fn compare(&self, first: &[u8], second: &[u8]) -> Option<Alignment>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalties {
    /// Per unaligned base at either flank
    pub size: u32,
    pub mismatch: u32,
    pub indel: u32,
    /// Rows whose every cell reaches this value abort the alignment
    pub max: u32,
}

impl Default for Penalties {
    fn default() -> Self {
        Self {
            size: 1,
            mismatch: 10,
            indel: 30,
            max: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlapAligner {
    penalties: Penalties,
    /// Shortest overlap worth reporting
    min_overlap: usize,
}

impl OverlapAligner {
    pub fn new(penalties: Penalties, min_overlap: usize) -> Self {
        Self {
            penalties,
            min_overlap,
        }
    }

    pub fn from_config(config: &AssemblerConfig) -> Self {
        Self::new(
            Penalties {
                size: config.penalty_size,
                mismatch: config.penalty_mismatch,
                indel: config.penalty_indel,
                max: config.max_penalty,
            },
            config.min_merge_size,
        )
    }
}

impl SequenceComparator for OverlapAligner {
    fn compare(&self, first: &[u8], second: &[u8]) -> Option<Alignment> {
        let Penalties {
            size,
            mismatch,
            indel,
            max,
        } = self.penalties;
        let (n1, n2) = (first.len(), second.len());
        let min = self.min_overlap;
        if n1 <= min || n2 <= min {
            return None;
        }
        let width = n2 + 1;
        let at = |i: usize, j: usize| i * width + j;
        let substitution = |i: usize, j: usize| {
            if first[i - 1] == second[j - 1] {
                0
            } else {
                mismatch
            }
        };

        let mut table = vec![0u32; (n1 + 1) * width];
        // The unaligned head of the first word is cheap only while the
        // remaining suffix can still hold a minimal overlap
        let max_unaligned = n1 - min;
        for i in 0..=n1 {
            table[at(i, 0)] = if i < max_unaligned { i as u32 * size } else { max };
        }
        for j in 0..=n2 {
            table[at(0, j)] = j as u32 * indel;
        }
        for i in 1..=n1 {
            let mut row_min = u32::MAX;
            for j in 1..=n2 {
                let value = (table[at(i - 1, j - 1)] + substitution(i, j))
                    .min(table[at(i, j - 1)] + indel)
                    .min(table[at(i - 1, j)] + indel);
                table[at(i, j)] = value;
                row_min = row_min.min(value);
            }
            if row_min >= max {
                return None;
            }
        }

        // Unaligned tail of the second word costs `size` per base
        let mut best: Option<(usize, u32)> = None;
        for j in (min + 1)..=n2 {
            let value = table[at(n1, j)] + (n2 - j) as u32 * size;
            if best.map_or(true, |(_, score)| value < score) {
                best = Some((j, value));
            }
        }
        let (end_second, score) = best?;

        let (mut i, mut j) = (n1, end_second);
        let (mut aligned, mut identical) = (0usize, 0usize);
        while i > max_unaligned || j > 0 {
            if i == 0 {
                j -= 1;
            } else if j == 0 {
                i -= 1;
            } else {
                let cell = table[at(i, j)];
                if cell == table[at(i - 1, j - 1)] + substitution(i, j) {
                    if first[i - 1] == second[j - 1] {
                        identical += 1;
                    }
                    aligned += 1;
                    i -= 1;
                    j -= 1;
                } else if cell == table[at(i - 1, j)] + indel {
                    i -= 1;
                } else if cell == table[at(i, j - 1)] + indel {
                    j -= 1;
                } else {
                    return None;
                }
            }
        }
        let identity = if aligned == 0 {
            0.0
        } else {
            identical as f64 / aligned as f64
        };
        Some(Alignment {
            score,
            identity,
            start_first: i,
            end_second,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligner(max: u32) -> OverlapAligner {
        OverlapAligner::new(
            Penalties {
                max,
                ..Penalties::default()
            },
            4,
        )
    }

    #[test]
    fn test_exact_overlap() {
        let alignment = aligner(500)
            .compare(b"GGGGGACGTTGCA", b"ACGTTGCATTTTT")
            .unwrap();
        // 5 unaligned bases on each flank, no edit inside the overlap
        assert_eq!(alignment.score, 10);
        assert_eq!(alignment.identity, 1.0);
        assert_eq!(alignment.start_first, 5);
        assert_eq!(alignment.end_second, 8);
        assert_eq!(alignment.first_overlap(13), 8);
    }

    #[test]
    fn test_overlap_with_mismatch() {
        let alignment = aligner(500)
            .compare(b"GGGGGACGTAGCA", b"ACGTTGCATTTTT")
            .unwrap();
        assert_eq!(alignment.score, 20);
        assert_eq!(alignment.identity, 0.875);
        assert_eq!(alignment.end_second, 8);
    }

    #[test]
    fn test_unrelated_words() {
        let alignment = aligner(500)
            .compare(b"AAAAAAAAAAAA", b"CCCCCCCCCCCC")
            .unwrap();
        assert_eq!(alignment.identity, 0.0);
        assert!(alignment.score > 50);
        assert!(aligner(30).compare(b"AAAAAAAAAAAA", b"CCCCCCCCCCCC").is_none());
    }

    #[test]
    fn test_too_short_for_minimal_overlap() {
        assert!(aligner(500).compare(b"ACGT", b"ACGTACGT").is_none());
        assert!(aligner(500).compare(b"ACGTACGT", b"ACG").is_none());
    }
}
