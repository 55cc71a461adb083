use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Every tunable of the repeat assembler, passed explicitly to each stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// K-mer size (at most 63)
    pub kmer: usize,
    /// Minimum k-mer occurrence considered at all
    pub min_count: u32,
    /// Expected copy number multiplier applied to the coverage peak
    pub nb_repetitions: u32,
    /// Explicit k-mer frequency threshold, overrides everything else
    pub threshold: Option<u32>,
    /// Percentile of the k-mer mass used to derive the threshold
    pub threshold_percent: Option<f64>,
    /// Admissible coverage ratio between neighboring nodes
    pub frequency_difference: f64,

    // Graph classification
    pub min_nb_nodes: usize,
    pub max_nb_nodes: usize,
    pub max_paths: usize,
    /// Stop after this many consecutive small graphs (0 = never)
    pub nb_small_graphs: usize,
    pub bubble_size: usize,
    pub bubble_policy: BubblePolicy,

    // Output range
    pub min_te_size: usize,
    pub max_te_size: usize,

    // Repeat merger
    pub merge: bool,
    pub min_merge_size: usize,
    pub max_merge_size: usize,
    pub penalty_size: u32,
    pub penalty_mismatch: u32,
    pub penalty_indel: u32,
    pub max_penalty: u32,
    pub min_identity: f64,
    pub merge_max_nb: usize,
    pub merge_max_nodes: usize,

    // Duplicate removal
    pub short_kmer_size: usize,
    pub max_identity: f64,

    // Input / resources
    pub fasta_input: bool,
    pub threads: usize,
}

/// Which nodes of a detected bubble get unset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BubblePolicy {
    /// Drop the lowest-coverage branch node (first found on ties)
    #[default]
    DropWeakest,
    /// Keep only the highest-coverage node of the bubble walk (first found
    /// on ties). The walk spans both branches, so this also unsets the
    /// strong branch's other nodes and can split the graph in two.
    KeepStrongest,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            kmer: 61,
            min_count: 3,
            nb_repetitions: 2,
            threshold: None,
            threshold_percent: None,
            frequency_difference: 2.5,
            min_nb_nodes: 500,
            max_nb_nodes: 100_000,
            max_paths: 100,
            nb_small_graphs: 10_000,
            bubble_size: 1000,
            bubble_policy: BubblePolicy::default(),
            min_te_size: 500,
            max_te_size: 30_000,
            merge: true,
            min_merge_size: 20,
            max_merge_size: 500,
            penalty_size: 1,
            penalty_mismatch: 10,
            penalty_indel: 30,
            max_penalty: 500,
            min_identity: 0.8,
            merge_max_nb: 10_000,
            merge_max_nodes: 10,
            short_kmer_size: 15,
            max_identity: 0.3,
            fasta_input: false,
            threads: num_cpus::get(),
        }
    }
}

impl AssemblerConfig {
    /// Lower thresholds: keeps smaller graphs and enumerates more paths
    pub fn sensitive() -> Self {
        Self {
            min_count: 2,
            nb_repetitions: 1,
            min_nb_nodes: 100,
            max_paths: 500,
            min_te_size: 200,
            min_identity: 0.7,
            ..Default::default()
        }
    }

    /// Tighter caps for quick surveys of large read sets
    pub fn fast() -> Self {
        Self {
            max_nb_nodes: 20_000,
            max_paths: 50,
            nb_small_graphs: 1000,
            bubble_size: 500,
            merge_max_nb: 2000,
            ..Default::default()
        }
    }
}

/// Typed errors of the assembler
#[derive(Error, Debug)]
pub enum AssemblerError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {field} is invalid: {reason}")]
    Validation { field: String, reason: String },

    #[error("Input error in {path}: {message}")]
    Input { path: String, message: String },

    #[error("Stitching failure: {message}")]
    StitchFailure { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },
}

impl From<ConfigError> for AssemblerError {
    fn from(err: ConfigError) -> Self {
        AssemblerError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AssemblerError {
    fn from(err: std::io::Error) -> Self {
        AssemblerError::Io {
            message: err.to_string(),
        }
    }
}

const ENV_PREFIX: &str = "TEFORGE";

/// Configuration layered from defaults, an optional TOML file and the environment
pub struct ConfigurationManager {
    config: AssemblerConfig,
    config_path: Option<PathBuf>,
}

impl ConfigurationManager {
    /// Built-in defaults overridden by `TEFORGE__*` variables
    pub fn new() -> Result<Self, AssemblerError> {
        Self::load(None)
    }

    /// Pure defaults, ignoring the environment
    pub fn new_with_defaults() -> Result<Self, AssemblerError> {
        let manager = Self {
            config: AssemblerConfig::default(),
            config_path: None,
        };
        manager.validate()?;
        Ok(manager)
    }

    /// Defaults, then `config_path`, then the environment
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, AssemblerError> {
        Self::load(Some(config_path.as_ref()))
    }

    pub fn from_config(config: AssemblerConfig) -> Result<Self, AssemblerError> {
        let manager = Self {
            config,
            config_path: None,
        };
        manager.validate()?;
        Ok(manager)
    }

    fn load(path: Option<&Path>) -> Result<Self, AssemblerError> {
        let defaults = toml::to_string(&AssemblerConfig::default()).map_err(|e| {
            AssemblerError::Configuration {
                message: format!("Failed to serialize defaults: {e}"),
            }
        })?;
        let mut builder =
            Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));

        if let Some(path) = path {
            if !path.exists() {
                return Err(AssemblerError::Configuration {
                    message: format!("Configuration file not found: {}", path.display()),
                });
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        } else {
            info!("No configuration file given, using built-in defaults");
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        // An explicit file must parse; environment noise only falls back to defaults
        let config: AssemblerConfig = match builder.build().and_then(|c| c.try_deserialize()) {
            Ok(config) => config,
            Err(e) if path.is_some() => return Err(e.into()),
            Err(e) => {
                warn!("Failed to load configuration: {}, using built-in defaults", e);
                AssemblerConfig::default()
            }
        };

        let manager = Self {
            config,
            config_path: path.map(Path::to_path_buf),
        };
        manager.validate()?;
        Ok(manager)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), AssemblerError> {
        info!("🔍 Validating configuration...");
        let c = &self.config;

        if c.kmer < 3 || c.kmer > 63 {
            return Err(AssemblerError::Validation {
                field: "kmer".to_string(),
                reason: "must be between 3 and 63".to_string(),
            });
        }
        if c.kmer % 2 == 0 {
            warn!("Even k-mer size ({}) allows palindromic k-mers", c.kmer);
        }
        if c.frequency_difference <= 1.0 {
            return Err(AssemblerError::Validation {
                field: "frequency_difference".to_string(),
                reason: "must be greater than 1.0".to_string(),
            });
        }
        if let Some(p) = c.threshold_percent {
            if !(p > 0.0 && p <= 100.0) {
                return Err(AssemblerError::Validation {
                    field: "threshold_percent".to_string(),
                    reason: "must lie in (0, 100]".to_string(),
                });
            }
        }
        for (field, value) in [
            ("min_identity", c.min_identity),
            ("max_identity", c.max_identity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AssemblerError::Validation {
                    field: field.to_string(),
                    reason: "must lie in [0, 1]".to_string(),
                });
            }
        }
        if c.min_te_size > c.max_te_size {
            return Err(AssemblerError::Validation {
                field: "min_te_size".to_string(),
                reason: "must not exceed max_te_size".to_string(),
            });
        }
        if c.min_merge_size > c.max_merge_size {
            return Err(AssemblerError::Validation {
                field: "min_merge_size".to_string(),
                reason: "must not exceed max_merge_size".to_string(),
            });
        }
        if c.short_kmer_size == 0 || c.short_kmer_size > 63 {
            return Err(AssemblerError::Validation {
                field: "short_kmer_size".to_string(),
                reason: "must be between 1 and 63".to_string(),
            });
        }
        if c.threads == 0 {
            return Err(AssemblerError::Validation {
                field: "threads".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        let available_threads = num_cpus::get();
        if c.threads > available_threads * 2 {
            warn!(
                "Configured threads ({}) exceeds available cores ({})",
                c.threads, available_threads
            );
        }

        info!("✅ Configuration validation passed");
        Ok(())
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AssemblerConfig {
        &mut self.config
    }

    pub fn into_config(self) -> AssemblerConfig {
        self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, AssemblerError> {
        toml::to_string_pretty(&self.config).map_err(|e| AssemblerError::Configuration {
            message: format!("Failed to serialize configuration: {e}"),
        })
    }

    /// Save current configuration to file
    pub fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), AssemblerError> {
        std::fs::write(path.as_ref(), self.to_toml()?).map_err(|e| AssemblerError::Io {
            message: format!("Failed to write configuration file: {e}"),
        })?;
        info!("💾 Configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_validate() {
        let manager = ConfigurationManager::new_with_defaults().unwrap();
        assert_eq!(manager.config().kmer, 61);
        assert_eq!(manager.config().bubble_policy, BubblePolicy::DropWeakest);
        assert!(manager.config().threads > 0);
    }

    #[test]
    fn test_presets_validate() {
        assert!(ConfigurationManager::from_config(AssemblerConfig::sensitive()).is_ok());
        assert!(ConfigurationManager::from_config(AssemblerConfig::fast()).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = AssemblerConfig {
            kmer: 64,
            ..Default::default()
        };
        assert!(matches!(
            ConfigurationManager::from_config(config),
            Err(AssemblerError::Validation { .. })
        ));

        let config = AssemblerConfig {
            frequency_difference: 1.0,
            ..Default::default()
        };
        assert!(ConfigurationManager::from_config(config).is_err());

        let config = AssemblerConfig {
            min_te_size: 100,
            max_te_size: 50,
            ..Default::default()
        };
        assert!(ConfigurationManager::from_config(config).is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("teforge.toml");
        let config = AssemblerConfig {
            kmer: 31,
            bubble_policy: BubblePolicy::KeepStrongest,
            threshold: Some(12),
            ..Default::default()
        };
        let manager = ConfigurationManager::from_config(config).unwrap();
        manager.save_config(&config_path).unwrap();

        let loaded = ConfigurationManager::from_file(&config_path).unwrap();
        assert_eq!(loaded.config().kmer, 31);
        assert_eq!(loaded.config().threshold, Some(12));
        assert_eq!(loaded.config().bubble_policy, BubblePolicy::KeepStrongest);
        assert_eq!(loaded.config_path(), Some(config_path.as_path()));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(&config_path, "kmer = 25\nmax_paths = 7\n").unwrap();
        let loaded = ConfigurationManager::from_file(&config_path).unwrap();
        assert_eq!(loaded.config().kmer, 25);
        assert_eq!(loaded.config().max_paths, 7);
        assert_eq!(loaded.config().min_nb_nodes, 500);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ConfigurationManager::from_file("/nonexistent/teforge.toml").is_err());
    }
}
