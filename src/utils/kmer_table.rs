//! K-mer Occurrence Table
//! ======================
//!
//! - Canonical `u128` codes counted in an `AHashMap`
//! - Parallel population: rayon workers count into local maps, merged under a mutex
//! - Count distribution, coverage peak and percentile thresholds
//! - The graph builder consumes the table through `OccurrenceTable`

use crate::core::data_structures::KmerCount;
use crate::core::kmer::{canonical_kmers, KmerCode, MAX_KMER_SIZE};
use crate::utils::configuration::{AssemblerConfig, AssemblerError};
use ahash::AHashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info};

/// What the graph builder needs from a k-mer counter
pub trait OccurrenceTable {
    /// Occurrences of a canonical code, 0 when absent
    fn count(&self, code: KmerCode) -> KmerCount;

    fn remove(&mut self, code: KmerCode);

    /// Any code seen at least `threshold` times.
    ///
    /// Callers drive this once per seed, so the table is expected to hold
    /// only codes above the threshold (see `KmerCountTable::remove_under`).
    fn random_above_threshold(&self, threshold: KmerCount) -> Option<KmerCode>;

    fn is_empty(&self) -> bool;

    fn len(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct KmerCountTable {
    k: usize,
    counts: AHashMap<KmerCode, KmerCount>,
    /// Sum of all counts
    total: u64,
}

impl KmerCountTable {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            counts: AHashMap::new(),
            total: 0,
        }
    }

    /// Count every canonical k-mer of `reads` with `threads` workers
    pub fn from_reads(k: usize, reads: &[Vec<u8>], threads: usize) -> crate::Result<Self> {
        let mut table = Self::new(k);
        table.add_reads_parallel(reads, threads)?;
        Ok(table)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn add(&mut self, code: KmerCode) {
        *self.counts.entry(code).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn add_read(&mut self, read: &[u8]) {
        for code in canonical_kmers(read, self.k) {
            self.add(code);
        }
    }

    pub fn add_reads_parallel(&mut self, reads: &[Vec<u8>], threads: usize) -> crate::Result<()> {
        if self.k == 0 || self.k > MAX_KMER_SIZE {
            return Err(AssemblerError::Validation {
                field: "kmer".to_string(),
                reason: format!("k-mer size must be in 1..={MAX_KMER_SIZE}, got {}", self.k),
            }
            .into());
        }
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        let chunk_size = (reads.len() / (threads * 4)).max(1);
        let k = self.k;
        let shared = Mutex::new(std::mem::take(&mut self.counts));
        let added = pool.install(|| {
            reads
                .par_chunks(chunk_size)
                .map(|chunk| {
                    let mut local: AHashMap<KmerCode, KmerCount> = AHashMap::new();
                    let mut seen = 0u64;
                    for read in chunk {
                        for code in canonical_kmers(read, k) {
                            *local.entry(code).or_insert(0) += 1;
                            seen += 1;
                        }
                    }
                    let mut counts = shared.lock();
                    for (code, count) in local {
                        *counts.entry(code).or_insert(0) += count;
                    }
                    seen
                })
                .sum::<u64>()
        });
        self.counts = shared.into_inner();
        self.total += added;
        debug!("Counted {} k-mers from {} reads", added, reads.len());
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (KmerCode, KmerCount)> + '_ {
        self.counts.iter().map(|(&code, &count)| (code, count))
    }

    pub fn max_count(&self) -> KmerCount {
        self.counts.values().copied().max().unwrap_or(0)
    }

    /// Number of distinct k-mers per count, indexed by count
    pub fn count_distribution(&self) -> Vec<u64> {
        let mut distribution = vec![0u64; self.max_count() as usize + 1];
        for &count in self.counts.values() {
            distribution[count as usize] += 1;
        }
        distribution
    }

    /// Most frequent count at or above `min_count`; 0 for an empty table
    pub fn peak_count(&self, min_count: KmerCount) -> KmerCount {
        let distribution = self.count_distribution();
        let mut peak = 0;
        let mut best = 0;
        for (count, &nb) in distribution.iter().enumerate().skip(min_count as usize) {
            if nb > best {
                peak = count as KmerCount;
                best = nb;
            }
        }
        peak
    }

    /// Count at which the k-mer mass cumulated from the top reaches `percent`% of the total
    pub fn threshold_for_percent(&self, percent: f64) -> KmerCount {
        let distribution = self.count_distribution();
        let target = self.total as f64 * percent / 100.0;
        let mut mass = 0u64;
        for count in (1..distribution.len()).rev() {
            mass += count as u64 * distribution[count];
            if mass as f64 >= target {
                return count as KmerCount;
            }
        }
        0
    }

    /// Drop every k-mer seen fewer than `threshold` times; returns how many were dropped
    pub fn remove_under(&mut self, threshold: KmerCount) -> usize {
        let before = self.counts.len();
        let mut dropped_mass = 0u64;
        self.counts.retain(|_, count| {
            if *count < threshold {
                dropped_mass += *count as u64;
                false
            } else {
                true
            }
        });
        self.total -= dropped_mass;
        before - self.counts.len()
    }

    /// Explicit value, then percentile, then `peak * nb_repetitions`; never below `min_count`
    pub fn choose_threshold(&self, config: &AssemblerConfig) -> Result<KmerCount, AssemblerError> {
        let peak = self.peak_count(config.min_count);
        info!(
            "📊 Coverage peak: {} (min: {}), max count: {}",
            peak,
            config.min_count,
            self.max_count()
        );
        let threshold = match (config.threshold, config.threshold_percent) {
            (Some(threshold), _) => threshold,
            (None, Some(percent)) => self.threshold_for_percent(percent),
            (None, None) => {
                if peak == config.min_count {
                    return Err(AssemblerError::Configuration {
                        message: "cannot determine the coverage peak of the k-mer distribution; \
                                  provide a threshold or a threshold percentage"
                            .to_string(),
                    });
                }
                peak.saturating_mul(config.nb_repetitions)
            }
        };
        if threshold < config.min_count {
            info!("Raising threshold {} to the minimum count {}", threshold, config.min_count);
            return Ok(config.min_count);
        }
        Ok(threshold)
    }
}

impl OccurrenceTable for KmerCountTable {
    fn count(&self, code: KmerCode) -> KmerCount {
        self.counts.get(&code).copied().unwrap_or(0)
    }

    fn remove(&mut self, code: KmerCode) {
        if let Some(count) = self.counts.remove(&code) {
            self.total -= count as u64;
        }
    }

    // Linear scan; constant time once `remove_under(threshold)` has run
    fn random_above_threshold(&self, threshold: KmerCount) -> Option<KmerCode> {
        self.counts
            .iter()
            .find(|(_, &count)| count >= threshold)
            .map(|(&code, _)| code)
    }

    fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn len(&self) -> usize {
        self.counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kmer::Kmer;

    #[test]
    fn test_counts_both_strands_together() {
        let mut table = KmerCountTable::new(3);
        table.add_read(b"ACG");
        table.add_read(b"CGT");
        let code = Kmer::from_word("ACG").unwrap().code();
        assert_eq!(table.count(code), 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.total(), 2);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut rng = fastrand::Rng::with_seed(7);
        let reads: Vec<Vec<u8>> = (0..200)
            .map(|_| (0..80).map(|_| b"ACGT"[rng.usize(0..4)]).collect())
            .collect();

        let mut sequential = KmerCountTable::new(11);
        for read in &reads {
            sequential.add_read(read);
        }
        let parallel = KmerCountTable::from_reads(11, &reads, 4).unwrap();

        assert_eq!(parallel.len(), sequential.len());
        assert_eq!(parallel.total(), sequential.total());
        for (code, count) in sequential.iter() {
            assert_eq!(parallel.count(code), count);
        }
    }

    #[test]
    fn test_distribution_and_peak() {
        let mut table = KmerCountTable::new(5);
        let codes = [(1u128, 1), (2, 4), (3, 4), (4, 4), (5, 9)];
        for (code, count) in codes {
            for _ in 0..count {
                table.add(code);
            }
        }
        let distribution = table.count_distribution();
        assert_eq!(distribution.len(), 10);
        assert_eq!(distribution[4], 3);
        assert_eq!(table.max_count(), 9);
        assert_eq!(table.peak_count(1), 4);
        assert_eq!(table.peak_count(5), 9);
        // total 22: the 9-count k-mer alone is 9/22, adding the 4s reaches 21/22
        assert_eq!(table.threshold_for_percent(40.0), 9);
        assert_eq!(table.threshold_for_percent(50.0), 4);
        assert_eq!(table.threshold_for_percent(100.0), 1);
    }

    #[test]
    fn test_remove_under_and_seed() {
        let mut table = KmerCountTable::new(5);
        for _ in 0..2 {
            table.add(10);
        }
        for _ in 0..6 {
            table.add(20);
        }
        assert_eq!(table.random_above_threshold(5), Some(20));
        assert_eq!(table.random_above_threshold(7), None);
        assert_eq!(table.remove_under(5), 1);
        assert_eq!(table.total(), 6);
        table.remove(20);
        assert!(table.is_empty());
        assert_eq!(table.total(), 0);
    }

    #[test]
    fn test_threshold_choice() {
        let mut table = KmerCountTable::new(5);
        for code in 0..10u128 {
            for _ in 0..8 {
                table.add(code);
            }
        }
        let mut config = AssemblerConfig::default();
        assert_eq!(table.choose_threshold(&config).unwrap(), 16);

        config.threshold_percent = Some(100.0);
        assert_eq!(table.choose_threshold(&config).unwrap(), 8);

        config.threshold = Some(1);
        assert_eq!(table.choose_threshold(&config).unwrap(), config.min_count);
    }

    #[test]
    fn test_flat_distribution_needs_explicit_threshold() {
        let mut table = KmerCountTable::new(5);
        for code in 0..10u128 {
            for _ in 0..3 {
                table.add(code);
            }
        }
        let mut config = AssemblerConfig::default();
        assert!(matches!(
            table.choose_threshold(&config),
            Err(AssemblerError::Configuration { .. })
        ));
        config.threshold = Some(3);
        assert_eq!(table.choose_threshold(&config).unwrap(), 3);
    }
}
