//! Integration tests for end-to-end pipeline functionality
//! Read files in, FASTA and JSON summary out, error handling for bad inputs

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use te_forge::assembly::RepeatMerger;
use te_forge::utils::ConfigurationManager;
use te_forge::{AssemblerConfig, AssemblerError, CountedRepeat, RepeatAssembler, Repeats};
use tempfile::tempdir;

fn write_fastq(path: &Path, reads: &[&str]) {
    let mut file = fs::File::create(path).unwrap();
    for (i, read) in reads.iter().enumerate() {
        writeln!(file, "@read_{i}\n{read}\n+\n{}", "I".repeat(read.len())).unwrap();
    }
}

fn small_config() -> AssemblerConfig {
    AssemblerConfig {
        kmer: 5,
        min_count: 2,
        threshold: Some(5),
        min_nb_nodes: 3,
        min_te_size: 5,
        threads: 2,
        ..AssemblerConfig::default()
    }
}

#[cfg(test)]
mod end_to_end_pipeline_tests {
    use super::*;

    #[test]
    fn test_fastq_to_fasta_and_summary() {
        let dir = tempdir().unwrap();
        let reads = dir.path().join("reads.fq");
        write_fastq(&reads, &["CAGATTTTC"; 10]);
        let output = dir.path().join("repeats.fa");
        let summary = dir.path().join("summary.json");

        let config = ConfigurationManager::from_config(small_config())
            .unwrap()
            .into_config();
        let mut report = RepeatAssembler::new(config)
            .assemble_files(&[reads])
            .unwrap();
        report.write(&output, Some(summary.as_path())).unwrap();

        let fasta = fs::read_to_string(&output).unwrap();
        assert_eq!(fasta, ">te_1_freq:10 (9)\nCAGATTTTC\n");

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
        assert_eq!(json["threshold"], 5);
        assert_eq!(json["graphs"]["solved_graphs"], 1);
        assert_eq!(json["repeats"].as_array().unwrap().len(), 1);
        assert_eq!(json["repeats"][0]["length"], 9);
    }

    #[test]
    fn test_two_read_files_are_pooled() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("r1.fq");
        let second = dir.path().join("r2.fq");
        write_fastq(&first, &["CAGATTTTC"; 5]);
        write_fastq(&second, &["CAGATTTTC"; 5]);

        let repeats = RepeatAssembler::new(small_config())
            .run(&[first, second])
            .unwrap();
        assert_eq!(repeats.len(), 1);
        assert_eq!(repeats.get(0).unwrap().count, 10);
    }

    #[test]
    fn test_fasta_input_by_extension() {
        let dir = tempdir().unwrap();
        let reads = dir.path().join("reads.fasta");
        let mut file = fs::File::create(&reads).unwrap();
        for i in 0..10 {
            writeln!(file, ">read_{i}\nCAGATTTTC").unwrap();
        }
        drop(file);

        let repeats = RepeatAssembler::new(small_config()).run(&[reads]).unwrap();
        assert_eq!(repeats.len(), 1);
        assert_eq!(repeats.get(0).unwrap().len(), 9);
    }

    #[test]
    fn test_no_repeat_writes_empty_output() {
        let dir = tempdir().unwrap();
        let reads = dir.path().join("reads.fq");
        write_fastq(&reads, &["ACGTTGCA", "TTGACCAT"]);
        let output = dir.path().join("repeats.fa");

        let mut report = RepeatAssembler::new(small_config())
            .assemble_files(&[reads])
            .unwrap();
        assert!(report.repeats.is_empty());
        report.write(&output, None).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "");
    }

    #[test]
    fn test_missing_input_is_reported() {
        let error = RepeatAssembler::new(small_config())
            .run(&[PathBuf::from("/nonexistent/reads.fq")])
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<AssemblerError>(),
            Some(AssemblerError::Input { .. })
        ));
    }

    #[test]
    fn test_malformed_fastq_is_reported() {
        let dir = tempdir().unwrap();
        let reads = dir.path().join("broken.fq");
        fs::write(&reads, "this is not fastq\n").unwrap();
        assert!(RepeatAssembler::new(small_config()).run(&[reads]).is_err());
    }

    #[test]
    fn test_merger_joins_overlapping_repeats() {
        let mut rng = fastrand::Rng::with_seed(23);
        let left: String = (0..150).map(|_| b"ACGT"[rng.usize(0..4)] as char).collect();
        let tail: String = (0..100).map(|_| b"ACGT"[rng.usize(0..4)] as char).collect();
        let right = format!("{}{}", &left[100..], tail);

        let repeats = Repeats::from(vec![
            CountedRepeat::from_word(&left, 30, false),
            CountedRepeat::from_word(&right, 30, false),
        ]);
        let config = AssemblerConfig {
            threads: 2,
            ..AssemblerConfig::default()
        };
        let merged = RepeatMerger::from_config(&config, 10).merge(repeats).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get(0).unwrap().len(), 250);
        assert_eq!(merged.get(0).unwrap().count, 30);
    }
}
