//! Configuration loading, target validation and application onto CLI
//! arguments.
mod apply;
mod loader;
mod parse;
mod targets;
pub mod types;

#[cfg(test)]
mod tests;

pub use apply::apply_config;
pub use loader::{DEFAULT_CONFIG_FILES, load_config};
pub use targets::build_target_config;

#[cfg(test)]
pub(crate) use loader::load_config_file;
pub(crate) use parse::parse_duration_value;
#[cfg(test)]
pub(crate) use parse::parse_hex;
