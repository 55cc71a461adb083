//! Removal of repeats contained in longer ones
//!
//! Repeats are visited longest first. A repeat goes away when it aligns,
//! on either strand, inside a longer surviving repeat with an edit distance
//! under `max_identity` times its length. Pairs without a shared short
//! k-mer are never aligned.

use crate::core::data_structures::Direction;
use crate::core::kmer::{canonical_kmers, KmerCode};
use crate::core::repeats::Repeats;
use crate::utils::configuration::AssemblerConfig;
use ahash::AHashSet;
use colored::Colorize;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct InclusionRemover {
    /// Tolerated edit distance, as a fraction of the contained repeat's length
    max_identity: f64,
    short_kmer_size: usize,
    threads: usize,
}

/// Whether `pattern` aligns entirely inside `text` with fewer than
/// `max_distance` edits
pub fn is_contained(pattern: &[u8], text: &[u8], max_distance: usize) -> bool {
    let mut line: Vec<usize> = (0..=pattern.len()).collect();
    for &base in text {
        // Alignments may start anywhere in the text
        let mut diagonal = 0;
        for j in 1..=pattern.len() {
            let above = line[j];
            let substitution = if pattern[j - 1] == base { 0 } else { 1 };
            line[j] = (diagonal + substitution).min(line[j - 1] + 1).min(above + 1);
            diagonal = above;
        }
        if line[pattern.len()] < max_distance {
            return true;
        }
    }
    false
}

impl InclusionRemover {
    pub fn new(max_identity: f64, short_kmer_size: usize, threads: usize) -> Self {
        Self {
            max_identity,
            short_kmer_size,
            threads,
        }
    }

    pub fn from_config(config: &AssemblerConfig) -> Self {
        Self::new(config.max_identity, config.short_kmer_size, config.threads)
    }

    /// Drop contained repeats; returns how many were dropped
    pub fn remove_inclusions(&self, repeats: &mut Repeats) -> crate::Result<usize> {
        info!(
            "{}",
            format!("🔍 Removing duplicates ({} elements)...", repeats.len()).bright_cyan()
        );
        repeats.sort();
        let words: Vec<String> = repeats
            .iter()
            .map(|r| r.sequence.first_word().to_string())
            .collect();
        let kmer_sets: Vec<AHashSet<KmerCode>> = words
            .iter()
            .map(|w| canonical_kmers(w.as_bytes(), self.short_kmer_size).into_iter().collect())
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads.max(1))
            .build()?;
        let evaluated = AtomicUsize::new(0);
        let mut removed = vec![false; words.len()];
        let mut nb_inclusions = 0;
        for j in 1..words.len() {
            let survivors: Vec<usize> = (0..j).filter(|&i| !removed[i]).collect();
            let included = pool.install(|| {
                survivors.par_iter().any(|&i| {
                    let finished = evaluated.fetch_add(1, Ordering::Relaxed) + 1;
                    if finished % 100_000 == 0 {
                        info!("  📊 {} duplications evaluated", finished);
                    }
                    self.is_included(repeats, &kmer_sets, i, j)
                })
            });
            if included {
                removed[j] = true;
                nb_inclusions += 1;
            }
        }
        for i in (0..removed.len()).filter(|&i| removed[i]) {
            repeats.remove(i);
        }
        repeats.sort();
        info!(
            "✅ {} duplications evaluated, {} found",
            evaluated.load(Ordering::Relaxed),
            nb_inclusions
        );
        Ok(nb_inclusions)
    }

    /// Repeat `j` inside repeat `i`, on either strand
    fn is_included(&self, repeats: &Repeats, kmer_sets: &[AHashSet<KmerCode>], i: usize, j: usize) -> bool {
        let (Some(container), Some(candidate)) = (repeats.get(i), repeats.get(j)) else {
            return false;
        };
        if !kmer_sets[j].iter().any(|code| kmer_sets[i].contains(code)) {
            return false;
        }
        let text = container.sequence.first_word().as_bytes();
        let max_distance = (candidate.len() as f64 * self.max_identity) as usize;
        Direction::ALL.into_iter().any(|direction| {
            is_contained(candidate.sequence.word(direction).as_bytes(), text, max_distance)
        })
    }
}
