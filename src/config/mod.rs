//! Configuration types.
//!
//! Supports a YAML file and environment variable overrides
//! (`PROCDEPLOY__DISTRIBUTION__MAX_RETRIES=3`).

use serde::Deserialize;

use crate::deployment::RetireStrategy;
use crate::protocol::{PartitionId, MAX_PARTITIONS};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "procdeploy.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "PROCDEPLOY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "PROCDEPLOY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub partition: PartitionConfig,
    pub engine: EngineConfig,
    pub distribution: DistributionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Partition that processes deployment commands.
    pub partition_id: PartitionId,
    /// Number of partitions in the cluster, numbered from 1.
    pub partitions_count: u16,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            partition_id: 1,
            partitions_count: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of each partition's command queue.
    pub command_queue_capacity: usize,
    pub retire_strategy: RetireStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: 64,
            retire_strategy: RetireStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Push deployments to the other partitions. Ignored with one partition.
    pub enabled: bool,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: usize,
    /// How long to wait for a partition to acknowledge a deployment.
    pub ack_timeout_ms: u64,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay_ms: 100,
            max_delay_ms: 5_000,
            max_retries: 10,
            ack_timeout_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `procdeploy.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `PROCDEPLOY_CONFIG` environment variable (if set)
    /// 4. Environment variables with `PROCDEPLOY__` prefix
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config: Config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let partition = &self.partition;
        if partition.partitions_count == 0 {
            return Err(ConfigError::Invalid(
                "partition.partitions_count must be at least 1".to_string(),
            ));
        }
        if partition.partitions_count > MAX_PARTITIONS {
            return Err(ConfigError::Invalid(format!(
                "partition.partitions_count must be at most {MAX_PARTITIONS}, got {}",
                partition.partitions_count
            )));
        }
        if partition.partition_id == 0 || partition.partition_id > partition.partitions_count {
            return Err(ConfigError::Invalid(format!(
                "partition.partition_id must be between 1 and {}, got {}",
                partition.partitions_count, partition.partition_id
            )));
        }
        if self.engine.command_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "engine.command_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.distribution.min_delay_ms > self.distribution.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "distribution.min_delay_ms ({}) must not exceed distribution.max_delay_ms ({})",
                self.distribution.min_delay_ms, self.distribution.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.distribution.min_delay_ms = 1;
        config.distribution.max_delay_ms = 10;
        config.distribution.max_retries = 3;
        config.distribution.ack_timeout_ms = 200;
        config
    }

    /// Test config for a cluster of `partitions_count` partitions.
    pub fn for_test_cluster(partitions_count: u16) -> Self {
        let mut config = Self::for_test();
        config.partition.partitions_count = partitions_count;
        config
    }
}
