//! Environment source: TREANTS_<SECTION>__<KEY>, e.g. TREANTS_RESOLVER__MAX_DEPTH=3

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("TREANTS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("resolver.search_roots")
            .with_list_parse_key("resolver.ignore_patterns"),
    )
}
