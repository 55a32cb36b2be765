//! Configuration loader: assembles sources in precedence order and deserializes.

use super::merge::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::TreantsConfig;
use crate::error::CollectionError;
use config::File;
use std::path::Path;
use tracing::debug;

/// Loads [`TreantsConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{TREANTS_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<TreantsConfig, CollectionError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: TreantsConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        config.ensure_valid()
    }

    /// Load configuration from a single file on top of the defaults
    pub fn load_from_file(path: &Path) -> Result<TreantsConfig, CollectionError> {
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        let config: TreantsConfig = builder.build()?.try_deserialize()?;
        config.ensure_valid()
    }
}
