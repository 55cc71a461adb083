//! # TE-Forge - Repeat Assembly from Short Reads
//!
//! De novo assembly of transposable elements and other high-copy repeats.
//! Frequent k-mers are grown into bidirected graphs, simplified, and solved
//! with an exact-rational linear program that splits coverage between the
//! candidate paths.

pub mod assembly;
pub mod cli;
pub mod core;
pub mod pipeline;
pub mod solver;
pub mod utils;

// Re-export commonly used types at crate level
pub use crate::core::repeats::{CountedRepeat, Repeats};
pub use crate::pipeline::{AssemblyReport, RepeatAssembler, RunSummary};
pub use crate::utils::configuration::{AssemblerConfig, AssemblerError, BubblePolicy};

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;

/// Error type used throughout the crate
pub type Error = anyhow::Error;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_result_type() -> Result<()> {
        let success: Result<i32> = Ok(42);
        let error: Result<i32> = Err(anyhow::anyhow!("test error"));

        assert!(success.is_ok());
        assert_eq!(success?, 42);

        assert!(error.is_err());
        assert!(error.unwrap_err().to_string().contains("test error"));
        Ok(())
    }

    #[test]
    fn test_typed_errors_convert() {
        fn failing() -> Result<()> {
            Err(AssemblerError::StitchFailure {
                message: "missing overlap".to_string(),
            })?;
            Ok(())
        }

        let error = failing().unwrap_err();
        assert!(error.to_string().contains("missing overlap"));
        assert!(matches!(
            error.downcast_ref::<AssemblerError>(),
            Some(AssemblerError::StitchFailure { .. })
        ));
    }

    #[test]
    fn test_anyhow_context() {
        use anyhow::Context;

        fn contextual_error() -> Result<()> {
            Err(anyhow::anyhow!("base error")).context("additional context")?;
            Ok(())
        }

        let error_string = format!("{:#}", contextual_error().unwrap_err());
        assert!(error_string.contains("additional context"));
        assert!(error_string.contains("base error"));
    }

    #[test]
    fn test_exports() {
        let repeat = CountedRepeat::from_word("ACGTTGCA", 7, false);
        let repeats = Repeats::from(vec![repeat]);
        assert_eq!(repeats.len(), 1);
        assert_eq!(AssemblerConfig::default().bubble_policy, BubblePolicy::DropWeakest);
    }
}
