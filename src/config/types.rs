use std::time::Duration;

use serde::Deserialize;

use crate::domain::IoTransport;
use crate::error::ValidationError;
use crate::metrics::ExpectedOutcome;

/// On-disk configuration. Every field is optional; CLI flags given
/// explicitly win over file values.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub scenario: Option<String>,
    pub duration: Option<DurationValue>,
    pub interval: Option<DurationValue>,
    pub target_type: Option<String>,
    pub profile: Option<String>,
    pub reconnect_attempts: Option<u32>,
    pub reconnect_delay: Option<DurationValue>,
    pub jitter_min: Option<DurationValue>,
    pub jitter_max: Option<DurationValue>,
    pub metrics_csv: Option<String>,
    pub metrics_json: Option<String>,
    pub metrics_db: Option<String>,
    pub distribution_csv: Option<String>,
    pub summary: Option<bool>,
    pub no_color: Option<bool>,
    pub emulator: Option<EmulatorConfig>,
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
    pub io: Option<IoSection>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EmulatorConfig {
    pub latency_ms: Option<u64>,
    pub fail_rate: Option<f64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    #[default]
    Read,
    Write,
    Custom,
    Edge,
}

/// Raw `[[targets]]` entry, validated into a `TargetDescriptor` by
/// [`super::build_target_config`].
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TargetEntry {
    #[serde(default)]
    pub kind: TargetKind,
    pub name: String,
    pub service: Option<CodeValue>,
    pub class: Option<u16>,
    pub instance: Option<u16>,
    pub attribute: Option<u16>,
    pub pattern: Option<String>,
    /// Hex template for writes; its length is the encoded width.
    pub value: Option<String>,
    pub width: Option<usize>,
    /// Hex request body for custom and edge targets.
    pub payload: Option<String>,
    pub expected_outcome: Option<ExpectedOutcome>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CodeValue {
    Number(u8),
    Text(String),
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct IoSection {
    #[serde(default)]
    pub connections: Vec<IoConnectionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IoConnectionEntry {
    pub name: String,
    pub rpi: DurationValue,
    pub o_to_t_size: usize,
    pub t_to_o_size: usize,
    #[serde(default)]
    pub transport: IoTransport,
    pub class: Option<u16>,
    pub instance: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ValidationError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => super::parse_duration_value(text),
        }
    }
}
