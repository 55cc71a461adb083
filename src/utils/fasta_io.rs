//! Read input for k-mer counting
//!
//! FASTQ by default, FASTA when asked for or when the extension says so.
//! Any malformed record aborts with an `Input` error naming the file.

use crate::utils::configuration::AssemblerError;
use bio::io::{fasta, fastq};
use colored::Colorize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFormat {
    Fastq,
    Fasta,
}

impl ReadFormat {
    /// FASTA when forced or for `.fa`/`.fasta`/`.fna` files, FASTQ otherwise
    pub fn detect(path: &Path, force_fasta: bool) -> Self {
        if force_fasta {
            return ReadFormat::Fasta;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".fa") || name.ends_with(".fasta") || name.ends_with(".fna") {
            ReadFormat::Fasta
        } else {
            ReadFormat::Fastq
        }
    }
}

fn input_error(path: &Path, message: impl ToString) -> AssemblerError {
    AssemblerError::Input {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

/// Upper-cased sequences of every record in `path`
pub fn read_sequences(path: &Path, format: ReadFormat) -> Result<Vec<Vec<u8>>, AssemblerError> {
    info!("{}", format!("📖 Reading {}...", path.display()).bright_cyan());
    let mut reads = Vec::new();
    match format {
        ReadFormat::Fastq => {
            let reader = fastq::Reader::from_file(path).map_err(|e| input_error(path, e))?;
            for record in reader.records() {
                let record = record.map_err(|e| input_error(path, e))?;
                reads.push(record.seq().to_ascii_uppercase());
            }
        }
        ReadFormat::Fasta => {
            let reader = fasta::Reader::from_file(path).map_err(|e| input_error(path, e))?;
            for record in reader.records() {
                let record = record.map_err(|e| input_error(path, e))?;
                reads.push(record.seq().to_ascii_uppercase());
            }
        }
    }
    info!("  📊 Loaded {} reads from {}", reads.len(), path.display());
    Ok(reads)
}
