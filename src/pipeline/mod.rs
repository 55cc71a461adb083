//! End-to-end repeat assembly from read files

pub mod repeat_assembler;

pub use repeat_assembler::{AssemblyReport, RepeatAssembler, RunSummary};
