//! Assembly graph engine and its call sites
//!
//! **Engine**: `node`, `path`, `graph` and `trimmer` - bidirected graph,
//! walks, enumeration and simplification
//! **Call sites**: `repeat_finder` grows graphs from k-mers, `merger` from
//! overlapping repeats; `inclusion` drops contained repeats in between

pub mod comparator;
pub mod graph;
pub mod inclusion;
pub mod merger;
pub mod node;
pub mod path;
pub mod repeat_finder;
pub mod trimmer;

// Re-export the pieces the pipeline drives
pub use comparator::{Alignment, OverlapAligner, Penalties, SequenceComparator};
pub use graph::{AssemblyGraph, GraphSettings};
pub use inclusion::InclusionRemover;
pub use merger::{MergeSettings, RepeatMerger};
pub use node::{AssemblyNode, NodeId};
pub use path::{AssemblyPath, PathStep};
pub use repeat_finder::{FinderSettings, FinderStats, GraphOutcome, GraphRepeatFinder};
pub use trimmer::{GraphTrimmer, TrimReport, TrimSettings};
