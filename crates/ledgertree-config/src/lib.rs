//! Configuration management for ledgertree
//!
//! This module handles loading, validation, and management of
//! hierarchy engine configuration from YAML files.

pub mod error;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::ConfigError;

// ==================== Configuration Types ====================

/// Tree construction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Deepest level a node may occupy (roots are level 0)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Nodes at or above this level start expanded after a build
    #[serde(default = "default_expand_level")]
    pub default_expand_level: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            default_expand_level: default_expand_level(),
        }
    }
}

fn default_max_depth() -> usize {
    10
}

fn default_expand_level() -> usize {
    1
}

/// Field an account text search may look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    /// Account code (e.g. "1100")
    Code,
    /// Account display name
    Name,
    /// Free-form description
    Description,
}

impl SearchField {
    /// Every searchable field, in display order
    pub fn all() -> Vec<SearchField> {
        vec![SearchField::Code, SearchField::Name, SearchField::Description]
    }
}

impl std::str::FromStr for SearchField {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "code" => Ok(SearchField::Code),
            "name" => Ok(SearchField::Name),
            "description" => Ok(SearchField::Description),
            _ => Err(format!("Invalid search field: {}", s)),
        }
    }
}

impl std::fmt::Display for SearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchField::Code => write!(f, "code"),
            SearchField::Name => write!(f, "name"),
            SearchField::Description => write!(f, "description"),
        }
    }
}

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Fields used when a search does not name its own
    #[serde(default = "SearchField::all")]
    pub default_fields: Vec<SearchField>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_fields: SearchField::all(),
        }
    }
}

/// Statistics aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Try the bulk aggregate query before falling back to per-account queries
    #[serde(default = "default_true")]
    pub use_bulk_strategy: bool,
    /// Entry limit passed to each per-account query
    #[serde(default = "default_fallback_entry_limit")]
    pub fallback_entry_limit: usize,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            use_bulk_strategy: true,
            fallback_entry_limit: default_fallback_entry_limit(),
        }
    }
}

fn default_fallback_entry_limit() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Tree construction settings
    #[serde(default)]
    pub tree: TreeConfig,
    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,
    /// Statistics settings
    #[serde(default)]
    pub statistics: StatisticsConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::IoError)?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|_| ConfigError::InvalidYaml)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tree.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tree.max_depth".to_string(),
                reason: "Maximum depth must be at least 1".to_string(),
            });
        }

        if self.tree.default_expand_level > self.tree.max_depth {
            return Err(ConfigError::InvalidValue {
                field: "tree.default_expand_level".to_string(),
                reason: format!(
                    "Default expand level must not exceed max_depth ({})",
                    self.tree.max_depth
                ),
            });
        }

        if self.search.default_fields.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "search.default_fields".to_string(),
                reason: "At least one search field is required".to_string(),
            });
        }

        if self.statistics.fallback_entry_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "statistics.fallback_entry_limit".to_string(),
                reason: "Entry limit must be greater than 0".to_string(),
            });
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "logging.level".to_string(),
                    reason: format!("Unknown log level '{}'", other),
                });
            }
        }

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default() -> &'static str {
        include_str!("../templates/default_config.yaml")
    }
}

// ==================== Tests ====================
