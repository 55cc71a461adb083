//! Command Line Interface
//! ======================
//!
//! `te-forge assemble` runs the repeat assembler on one or two read files;
//! `te-forge config` prints the effective configuration as TOML.

use crate::pipeline::RepeatAssembler;
use crate::utils::configuration::{AssemblerConfig, ConfigurationManager};
use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "te-forge")]
#[command(about = "De novo assembly of transposable elements from short reads")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble repeats from reads
    Assemble(AssembleArgs),

    /// Print the effective configuration
    Config {
        /// Start from a preset instead of the defaults
        #[arg(long, value_enum)]
        preset: Option<Preset>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Sensitive,
    Fast,
}

#[derive(Args)]
pub struct AssembleArgs {
    /// First read file
    #[arg(short = '1', long = "reads1", value_name = "FILE")]
    pub reads1: PathBuf,

    /// Second read file
    #[arg(short = '2', long = "reads2", value_name = "FILE")]
    pub reads2: Option<PathBuf>,

    /// Output FASTA file
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// K-mer size
    #[arg(short, long)]
    pub kmer: Option<usize>,

    /// K-mer frequency threshold
    #[arg(short, long)]
    pub threshold: Option<u32>,

    /// Threshold as a percentage of the k-mer mass
    #[arg(long)]
    pub threshold_percent: Option<f64>,

    /// Minimum repeat size
    #[arg(short = 'm', long)]
    pub min_size: Option<usize>,

    /// Maximum repeat size
    #[arg(short = 'M', long)]
    pub max_size: Option<usize>,

    /// Number of threads
    #[arg(short = 'p', long)]
    pub threads: Option<usize>,

    /// Reads are FASTA whatever their extension
    #[arg(long)]
    pub fasta: bool,

    /// Skip repeat merging
    #[arg(long)]
    pub no_merge: bool,

    /// JSON run summary
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,
}

impl AssembleArgs {
    /// Command-line values take precedence over the loaded configuration
    pub fn apply(&self, config: &mut AssemblerConfig) {
        if let Some(kmer) = self.kmer {
            config.kmer = kmer;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = Some(threshold);
        }
        if let Some(percent) = self.threshold_percent {
            config.threshold_percent = Some(percent);
        }
        if let Some(min_size) = self.min_size {
            config.min_te_size = min_size;
        }
        if let Some(max_size) = self.max_size {
            config.max_te_size = max_size;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.fasta {
            config.fasta_input = true;
        }
        if self.no_merge {
            config.merge = false;
        }
    }

    pub fn inputs(&self) -> Vec<PathBuf> {
        std::iter::once(self.reads1.clone())
            .chain(self.reads2.clone())
            .collect()
    }
}

impl Cli {
    /// Initialize logging
    pub fn init_logging(&self) -> Result<()> {
        let level = if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(
                EnvFilter::builder()
                    .with_default_directive(level.into())
                    .from_env_lossy(),
            )
            .init();

        Ok(())
    }

    fn load_config(&self) -> Result<ConfigurationManager> {
        let manager = match &self.config {
            Some(path) => ConfigurationManager::from_file(path)?,
            None => ConfigurationManager::new()?,
        };
        Ok(manager)
    }

    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.init_logging()?;

        match &self.command {
            Commands::Assemble(args) => self.assemble(args),
            Commands::Config { preset } => self.print_config(*preset),
        }
    }

    fn assemble(&self, args: &AssembleArgs) -> Result<()> {
        let mut config = self.load_config()?.into_config();
        args.apply(&mut config);
        // Overrides must pass the same checks as file values
        let config = ConfigurationManager::from_config(config)?.into_config();

        let assembler = RepeatAssembler::new(config);
        let mut report = assembler.assemble_files(&args.inputs())?;
        report.write(&args.output, args.summary.as_deref())?;

        println!("{}", "✅ Assembly completed successfully!".bright_cyan());
        println!("📊 Results:");
        println!("   Threshold: {}", report.summary.threshold);
        println!("   Repeats: {}", report.repeats.len());
        println!("   Output: {}", args.output.display());
        Ok(())
    }

    fn print_config(&self, preset: Option<Preset>) -> Result<()> {
        let manager = match preset {
            Some(Preset::Sensitive) => ConfigurationManager::from_config(AssemblerConfig::sensitive())?,
            Some(Preset::Fast) => ConfigurationManager::from_config(AssemblerConfig::fast())?,
            None => self.load_config()?,
        };
        if let Some(path) = manager.config_path() {
            info!("Configuration loaded from {}", path.display());
        }
        println!("{}", manager.to_toml()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assemble() {
        let cli = Cli::try_parse_from([
            "te-forge", "assemble", "-1", "r1.fq", "-2", "r2.fq", "-o", "out.fa", "-k", "31",
            "-t", "40", "-m", "300", "-M", "9000", "-p", "4", "--no-merge",
        ])
        .unwrap();
        let Commands::Assemble(args) = cli.command else {
            panic!("expected the assemble command");
        };
        assert_eq!(args.inputs().len(), 2);

        let mut config = AssemblerConfig::default();
        args.apply(&mut config);
        assert_eq!(config.kmer, 31);
        assert_eq!(config.threshold, Some(40));
        assert_eq!(config.min_te_size, 300);
        assert_eq!(config.max_te_size, 9000);
        assert_eq!(config.threads, 4);
        assert!(!config.merge);
        assert!(!config.fasta_input);
    }

    #[test]
    fn test_assemble_requires_reads_and_output() {
        assert!(Cli::try_parse_from(["te-forge", "assemble", "-o", "out.fa"]).is_err());
        assert!(Cli::try_parse_from(["te-forge", "assemble", "-1", "r1.fq"]).is_err());
    }

    #[test]
    fn test_parse_config_preset() {
        let cli = Cli::try_parse_from(["te-forge", "--verbose", "config", "--preset", "fast"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Config { preset: Some(Preset::Fast) }));
    }
}
