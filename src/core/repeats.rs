//! Counted repeat collection
//!
//! Consensus sequences produced by the graph engine, with their estimated
//! copy coverage, plus the filtering and ordering used before output.

use crate::core::data_structures::{KmerCount, Sequence};
use serde::Serialize;
use std::cmp::Ordering;
use std::io::Write;

/// One consensus repeat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedRepeat {
    pub sequence: Sequence,
    pub count: KmerCount,
    pub is_loop: bool,
}

impl CountedRepeat {
    pub fn new(sequence: Sequence, count: KmerCount, is_loop: bool) -> Self {
        Self {
            sequence,
            count,
            is_loop,
        }
    }

    pub fn from_word(word: &str, count: KmerCount, is_loop: bool) -> Self {
        Self::new(Sequence::new(word), count, is_loop)
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    fn clear(&mut self) {
        self.sequence = Sequence::default();
        self.count = 0;
    }

    pub fn to_fasta(&self, index: usize) -> String {
        self.sequence
            .to_fasta(&format!("te_{}_freq:{}", index + 1, self.count))
    }
}

impl Ord for CountedRepeat {
    /// Longest (unambiguous bases) first, then most covered, then alphabetical
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .sequence
            .unambiguous_len()
            .cmp(&self.sequence.unambiguous_len())
            .then_with(|| other.count.cmp(&self.count))
            .then_with(|| self.sequence.first_word().cmp(other.sequence.first_word()))
    }
}

impl PartialOrd for CountedRepeat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-repeat record of the run summary
#[derive(Debug, Clone, Serialize)]
pub struct RepeatSummary {
    pub name: String,
    pub length: usize,
    pub count: KmerCount,
    pub is_loop: bool,
}

/// Ordered collection with soft removal
#[derive(Debug, Clone, Default)]
pub struct Repeats {
    repeats: Vec<CountedRepeat>,
}

impl Repeats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, repeat: CountedRepeat) {
        self.repeats.push(repeat);
    }

    pub fn extend(&mut self, other: Repeats) {
        self.repeats.extend(other.repeats);
    }

    pub fn len(&self) -> usize {
        self.repeats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repeats.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&CountedRepeat> {
        self.repeats.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CountedRepeat> {
        self.repeats.iter()
    }

    /// Clear a slot; indices stay valid until the next `sort`
    pub fn remove(&mut self, i: usize) {
        if let Some(repeat) = self.repeats.get_mut(i) {
            repeat.clear();
        }
    }

    pub fn is_removed(&self, i: usize) -> bool {
        self.repeats.get(i).map_or(true, |r| r.is_empty())
    }

    /// Drop removed and zero-count entries and order the rest
    pub fn sort(&mut self) {
        self.repeats.retain(|r| r.count > 0 && !r.is_empty());
        self.repeats.sort();
    }

    pub fn cut_to_threshold(&mut self, threshold: KmerCount) {
        self.repeats.retain(|r| r.count >= threshold);
    }

    /// Keep only the `n` longest repeats
    pub fn cut_to_n_longest(&mut self, n: usize) {
        if self.repeats.len() <= n {
            return;
        }
        self.repeats.sort_by(|a, b| b.len().cmp(&a.len()));
        self.repeats.truncate(n);
    }

    /// Soft-remove repeats whose length lies outside `[min_size, max_size]`
    pub fn remove_out_of_range(&mut self, min_size: usize, max_size: usize) -> usize {
        let mut removed = 0;
        for i in 0..self.repeats.len() {
            let size = self.repeats[i].len();
            if !self.is_removed(i) && (size < min_size || size > max_size) {
                self.remove(i);
                removed += 1;
            }
        }
        removed
    }

    pub fn into_vec(self) -> Vec<CountedRepeat> {
        self.repeats
    }

    pub fn summaries(&self) -> Vec<RepeatSummary> {
        self.repeats
            .iter()
            .enumerate()
            .map(|(i, r)| RepeatSummary {
                name: format!("te_{}_freq:{}", i + 1, r.count),
                length: r.len(),
                count: r.count,
                is_loop: r.is_loop,
            })
            .collect()
    }

    /// Write sorted repeats as FASTA
    pub fn write_fasta<W: Write>(&mut self, writer: &mut W) -> std::io::Result<()> {
        self.sort();
        for (i, repeat) in self.repeats.iter().enumerate() {
            writer.write_all(repeat.to_fasta(i).as_bytes())?;
        }
        Ok(())
    }
}

impl From<Vec<CountedRepeat>> for Repeats {
    fn from(repeats: Vec<CountedRepeat>) -> Self {
        Self { repeats }
    }
}
