use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::ValidationError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Config file must have .toml or .json extension.")]
    MissingExtension,
    #[error("Target '{name}': {reason}")]
    InvalidTarget { name: String, reason: String },
    #[error("Target '{name}' has invalid hex '{value}' in '{field}'.")]
    InvalidHex {
        name: String,
        field: &'static str,
        value: String,
    },
    #[error("Target names must be unique, '{name}' appears more than once.")]
    DuplicateTarget { name: String },
    #[error("Cyclic connection '{name}': {reason}")]
    InvalidIoConnection { name: String, reason: String },
    #[error("jitter_min ({min:?}) must not exceed jitter_max ({max:?}).")]
    InvalidJitter { min: Duration, max: Duration },
    #[error("Invalid '{field}': {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: ValidationError,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
