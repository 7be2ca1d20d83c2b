//! Map tunables with validation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Smallest usable B-tree order: below two, a node cannot hold a single
/// separator between two children.
const MIN_ORDER: u32 = 2;

/// Configuration error types.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is out of range.
    #[snafu(display("Invalid configuration: {message}"))]
    Validation {
        /// Description of the violated rule.
        message: String,
    },
}

/// Tunables for a collaborative partial map.
///
/// # Validation Rules
///
/// - `order` must be >= 2
/// - `cache_size_hint` must be >= 1
/// - `flush_threshold` must be >= 1
///
/// # Example
///
/// ```no_run
/// # use hive_types::MapConfig;
/// let config = MapConfig::builder()
///     .order(16)
///     .flush_threshold(500)
///     .build()
///     .expect("valid map config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MapConfig {
    /// Upper bound (exclusive) on entries per B-tree node; a node reaching
    /// this many entries splits.
    #[serde(default = "default_order")]
    pub order: u32,

    /// Soft bound on the resident working set: cached sequenced entries plus
    /// materialized tree keys. Exceeding it triggers selective eviction.
    #[serde(default = "default_cache_size_hint")]
    pub cache_size_hint: usize,

    /// Number of unflushed acked changes above which the leader starts a
    /// flush.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
}

#[bon::bon]
impl MapConfig {
    /// Creates a new map configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if:
    /// - `order` < 2
    /// - `cache_size_hint` or `flush_threshold` is 0
    #[builder]
    pub fn new(
        #[builder(default = default_order())] order: u32,
        #[builder(default = default_cache_size_hint())] cache_size_hint: usize,
        #[builder(default = default_flush_threshold())] flush_threshold: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self { order, cache_size_hint, flush_threshold };
        config.validate()?;
        Ok(config)
    }
}

impl MapConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization to ensure values are within valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.order < MIN_ORDER {
            return Err(ConfigError::Validation {
                message: format!("order must be >= {MIN_ORDER}, got {}", self.order),
            });
        }
        if self.cache_size_hint == 0 {
            return Err(ConfigError::Validation {
                message: "cache_size_hint must be >= 1".to_string(),
            });
        }
        if self.flush_threshold == 0 {
            return Err(ConfigError::Validation {
                message: "flush_threshold must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            cache_size_hint: default_cache_size_hint(),
            flush_threshold: default_flush_threshold(),
        }
    }
}

fn default_order() -> u32 {
    32
}

fn default_cache_size_hint() -> usize {
    5000
}

fn default_flush_threshold() -> usize {
    1000
}
