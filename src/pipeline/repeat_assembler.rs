//! Repeat Assembly Pipeline
//! ========================
//!
//! - Reads one or two read files (FASTQ or FASTA)
//! - Counts k-mers and chooses the frequency threshold
//! - Grows and solves one graph per seed k-mer
//! - Removes contained repeats, merges overlapping ones, filters by size
//! - Writes FASTA and an optional JSON run summary

use crate::assembly::inclusion::InclusionRemover;
use crate::assembly::merger::RepeatMerger;
use crate::assembly::repeat_finder::{FinderSettings, FinderStats, GraphRepeatFinder};
use crate::core::data_structures::KmerCount;
use crate::core::repeats::{RepeatSummary, Repeats};
use crate::utils::configuration::AssemblerConfig;
use crate::utils::fasta_io::{read_sequences, ReadFormat};
use crate::utils::kmer_table::{KmerCountTable, OccurrenceTable};
use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// What a run did, written as JSON next to the FASTA output
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub kmer_size: usize,
    pub nb_reads: usize,
    pub distinct_kmers: usize,
    pub threshold: KmerCount,
    pub graphs: FinderStats,
    pub repeats_discovered: usize,
    pub inclusions_removed: usize,
    pub out_of_range: usize,
    pub repeats: Vec<RepeatSummary>,
    pub elapsed_seconds: f64,
}

/// Final repeats of a run with the summary describing it
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub repeats: Repeats,
    pub summary: RunSummary,
}

impl AssemblyReport {
    /// Write the repeats as FASTA to `output`, and the summary to `summary` if given
    pub fn write(&mut self, output: &Path, summary: Option<&Path>) -> crate::Result<()> {
        let file = File::create(output)
            .with_context(|| format!("Failed to create output file {}", output.display()))?;
        let mut writer = BufWriter::new(file);
        self.repeats.write_fasta(&mut writer)?;
        writer.flush()?;
        info!("💾 {} repeats written to {}", self.repeats.len(), output.display());

        if let Some(path) = summary {
            let file = File::create(path)
                .with_context(|| format!("Failed to create summary file {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &self.summary)?;
            info!("💾 Run summary written to {}", path.display());
        }
        Ok(())
    }
}

pub struct RepeatAssembler {
    config: AssemblerConfig,
}

impl RepeatAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Repeats assembled from the reads of `inputs`
    pub fn run(&self, inputs: &[PathBuf]) -> crate::Result<Repeats> {
        Ok(self.assemble_files(inputs)?.repeats)
    }

    pub fn assemble_files(&self, inputs: &[PathBuf]) -> crate::Result<AssemblyReport> {
        let mut reads = Vec::new();
        for input in inputs {
            let format = ReadFormat::detect(input, self.config.fasta_input);
            reads.extend(read_sequences(input, format)?);
        }
        self.assemble_reads(&reads)
    }

    pub fn assemble_reads(&self, reads: &[Vec<u8>]) -> crate::Result<AssemblyReport> {
        let start = Instant::now();
        let config = &self.config;
        info!("{}", "🚀 Starting repeat assembly".bright_cyan());
        info!(
            "  📊 {} reads, k = {}, {} threads",
            reads.len(),
            config.kmer,
            config.threads
        );
        let mut summary = RunSummary {
            kmer_size: config.kmer,
            nb_reads: reads.len(),
            ..RunSummary::default()
        };

        let mut table = KmerCountTable::from_reads(config.kmer, reads, config.threads)
            .context("Failed to count k-mers")?;
        summary.distinct_kmers = table.len();
        let threshold = table.choose_threshold(config)?;
        let dropped = table.remove_under(threshold);
        summary.threshold = threshold;
        info!(
            "📊 Threshold {}: {} k-mers dropped, {} kept",
            threshold,
            dropped,
            table.len()
        );

        let mut repeats = {
            let mut finder =
                GraphRepeatFinder::new(&mut table, FinderSettings::from_config(config, threshold));
            let repeats = finder.find_repeats()?;
            summary.graphs = *finder.stats();
            repeats
        };
        summary.repeats_discovered = repeats.len();

        if repeats.is_empty() {
            warn!("No repeat found");
            summary.elapsed_seconds = start.elapsed().as_secs_f64();
            return Ok(AssemblyReport { repeats, summary });
        }

        if repeats.len() > 1 {
            summary.inclusions_removed =
                InclusionRemover::from_config(config).remove_inclusions(&mut repeats)?;
        }
        if config.merge && repeats.len() > 1 {
            repeats = RepeatMerger::from_config(config, threshold).merge(repeats)?;
        }
        summary.out_of_range = repeats.remove_out_of_range(config.min_te_size, config.max_te_size);
        repeats.sort();
        if repeats.is_empty() {
            warn!(
                "No repeat found between {} and {} bases",
                config.min_te_size, config.max_te_size
            );
        }

        summary.repeats = repeats.summaries();
        summary.elapsed_seconds = start.elapsed().as_secs_f64();
        info!(
            "✅ Assembly completed in {:.2}s: {} repeats",
            summary.elapsed_seconds,
            repeats.len()
        );
        Ok(AssemblyReport { repeats, summary })
    }
}
