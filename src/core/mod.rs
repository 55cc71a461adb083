pub mod data_structures;
pub mod kmer;
pub mod rational;
pub mod repeats;

// Re-export key types for the graph engine
pub use data_structures::{
    exit_position, mirror, reverse_complement, Direction, KmerCount, Position, Sequence,
};
pub use kmer::{canonical_kmers, Kmer, KmerCode};
pub use rational::Rational;
pub use repeats::{CountedRepeat, Repeats};
