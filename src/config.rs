//! Configuration System
//!
//! Hierarchical configuration for resolver search behavior, aggregation defaults,
//! and logging. Sources are layered (defaults, global file, workspace files,
//! environment) through the `config` crate.

use crate::aggregate::{DuplicateNamePolicy, IndexBy};
use crate::error::CollectionError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreantsConfig {
    /// Member resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Aggregation defaults
    #[serde(default)]
    pub aggregate: AggregateConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how the filesystem resolver searches for members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Directories searched when a member is not at its recorded location
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,

    /// Maximum depth below each search root (None = unlimited)
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Whether to follow symbolic links while searching
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Directory names never descended into
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

fn default_ignore_patterns() -> Vec<String> {
    vec![".git".to_string(), "target".to_string(), "node_modules".to_string()]
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_roots: Vec::new(),
            max_depth: None,
            follow_symlinks: false,
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

/// Defaults applied by dataset aggregation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Outer index of aggregated datasets
    #[serde(default)]
    pub index_by: IndexBy,

    /// What to do when indexing by name and names repeat
    #[serde(default)]
    pub duplicate_names: DuplicateNamePolicy,
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Resolver(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Resolver(msg) => write!(f, "Resolver: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.search_roots.iter().any(|r| r.as_os_str().is_empty()) {
            return Err("Search root cannot be empty".to_string());
        }
        if self.max_depth == Some(0) {
            return Err("max_depth must be at least 1".to_string());
        }
        Ok(())
    }
}

impl TreantsConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.resolver.validate() {
            errors.push(ValidationError::Resolver(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding all problems into one error
    pub(crate) fn ensure_valid(self) -> Result<Self, CollectionError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            CollectionError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}
