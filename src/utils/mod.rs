pub mod configuration;
pub mod fasta_io;
pub mod kmer_table;

pub use configuration::{AssemblerConfig, AssemblerError, BubblePolicy, ConfigurationManager};
pub use kmer_table::{KmerCountTable, OccurrenceTable};
