//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources override earlier ones key by key; tables merge, scalars replace.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("resolver.follow_symlinks", false)?
        .set_default("aggregate.index_by", "uuid")?
        .set_default("aggregate.duplicate_names", "fail")?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")
}
