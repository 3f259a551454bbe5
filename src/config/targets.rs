use std::collections::BTreeSet;

use crate::domain::{
    CipPath, CustomTarget, EdgeTarget, IoConfig, IoConnectionConfig, ReadTarget, ServiceCode,
    TargetConfig, TargetDescriptor, WritePattern, WriteTarget,
};
use crate::error::ConfigError;
use crate::metrics::ExpectedOutcome;

use super::parse::{parse_hex, parse_service_code};
use super::types::{CodeValue, ConfigFile, IoConnectionEntry, IoSection, TargetEntry, TargetKind};

/// Width used by counter and toggle writes without a `value` or `width`.
const DEFAULT_WRITE_WIDTH: usize = 2;
/// Assembly object, the usual connection point of cyclic connections.
const ASSEMBLY_CLASS: u16 = 0x04;
/// First assembly instance handed out to connections without one.
const FIRST_ASSEMBLY_INSTANCE: u16 = 100;

/// Validates every raw target and cyclic connection into the closed
/// descriptor family scenarios consume.
///
/// # Errors
///
/// Returns the first invalid entry: a missing class, bad hex, a write
/// without a pattern, a custom target without a service, a duplicate name or
/// a malformed cyclic connection.
pub fn build_target_config(config: &ConfigFile) -> Result<TargetConfig, ConfigError> {
    let mut seen = BTreeSet::new();
    let mut targets = Vec::with_capacity(config.targets.len());
    for entry in &config.targets {
        let descriptor = build_target(entry)?;
        if !seen.insert(descriptor.name().to_owned()) {
            return Err(ConfigError::DuplicateTarget {
                name: descriptor.name().to_owned(),
            });
        }
        targets.push(descriptor);
    }
    let io = config.io.as_ref().map(build_io).transpose()?;
    Ok(TargetConfig { targets, io })
}

fn invalid(entry: &TargetEntry, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidTarget {
        name: entry.name.clone(),
        reason: reason.into(),
    }
}

fn hex_field(entry: &TargetEntry, field: &'static str, value: &str) -> Result<Vec<u8>, ConfigError> {
    parse_hex(value).ok_or_else(|| ConfigError::InvalidHex {
        name: entry.name.clone(),
        field,
        value: value.to_owned(),
    })
}

fn service(entry: &TargetEntry) -> Result<Option<ServiceCode>, ConfigError> {
    match &entry.service {
        None => Ok(None),
        Some(CodeValue::Number(code)) => Ok(Some(ServiceCode(*code))),
        Some(CodeValue::Text(text)) => parse_service_code(text)
            .map(|code| Some(ServiceCode(code)))
            .ok_or_else(|| invalid(entry, format!("invalid service code '{}'", text))),
    }
}

/// Big-endian reading of a hex template, as the user wrote it.
fn template_value(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0_u64, |acc, byte| acc.wrapping_shl(8) | u64::from(*byte))
}

fn build_target(entry: &TargetEntry) -> Result<TargetDescriptor, ConfigError> {
    let name = entry.name.trim();
    if name.is_empty() {
        return Err(ConfigError::InvalidTarget {
            name: "<unnamed>".to_owned(),
            reason: "name must not be empty".to_owned(),
        });
    }
    let class = entry
        .class
        .ok_or_else(|| invalid(entry, "missing 'class'"))?;
    let path = CipPath::new(class, entry.instance.unwrap_or(1), entry.attribute);
    let payload = entry
        .payload
        .as_deref()
        .map(|text| hex_field(entry, "payload", text))
        .transpose()?
        .unwrap_or_default();

    match entry.kind {
        TargetKind::Read => {
            let service = service(entry)?.unwrap_or(ServiceCode::GET_ATTRIBUTE_SINGLE);
            if service == ServiceCode::GET_ATTRIBUTE_SINGLE && entry.attribute.is_none() {
                return Err(invalid(entry, "Get_Attribute_Single reads need an 'attribute'"));
            }
            Ok(TargetDescriptor::Read(ReadTarget {
                name: name.to_owned(),
                service,
                path,
            }))
        }
        TargetKind::Write => {
            let service = service(entry)?.unwrap_or(ServiceCode::SET_ATTRIBUTE_SINGLE);
            let template = entry
                .value
                .as_deref()
                .map(|text| hex_field(entry, "value", text))
                .transpose()?;
            let pattern_name = entry
                .pattern
                .as_deref()
                .ok_or_else(|| invalid(entry, "write targets need a 'pattern'"))?;
            let pattern = match pattern_name.trim().to_ascii_lowercase().as_str() {
                "increment" | "counter" => WritePattern::Increment,
                "toggle" => WritePattern::Toggle,
                "constant" => WritePattern::Constant(
                    template
                        .clone()
                        .ok_or_else(|| invalid(entry, "constant writes need a 'value'"))?,
                ),
                other => {
                    return Err(invalid(
                        entry,
                        format!("unknown pattern '{}', use increment, toggle or constant", other),
                    ));
                }
            };
            let width = entry
                .width
                .or_else(|| template.as_ref().map(Vec::len))
                .unwrap_or(DEFAULT_WRITE_WIDTH);
            if width == 0 {
                return Err(invalid(entry, "write width must be > 0"));
            }
            Ok(TargetDescriptor::Write(WriteTarget {
                name: name.to_owned(),
                service,
                path,
                pattern,
                width,
                initial: template.as_deref().map_or(0, template_value),
            }))
        }
        TargetKind::Custom => {
            let service = service(entry)?
                .ok_or_else(|| invalid(entry, "custom targets need a 'service'"))?;
            Ok(TargetDescriptor::Custom(CustomTarget {
                name: name.to_owned(),
                service,
                path,
                payload,
            }))
        }
        TargetKind::Edge => {
            let service = service(entry)?.unwrap_or(ServiceCode::GET_ATTRIBUTE_SINGLE);
            Ok(TargetDescriptor::Edge(EdgeTarget {
                name: name.to_owned(),
                service,
                path,
                payload,
                expected_outcome: entry.expected_outcome.unwrap_or(ExpectedOutcome::Any),
                tags: entry
                    .tags
                    .iter()
                    .map(|tag| tag.trim().to_ascii_lowercase())
                    .filter(|tag| !tag.is_empty())
                    .collect(),
                note: entry.note.clone(),
            }))
        }
    }
}

fn build_io(section: &IoSection) -> Result<IoConfig, ConfigError> {
    let mut seen = BTreeSet::new();
    let mut next_instance = FIRST_ASSEMBLY_INSTANCE;
    let mut connections = Vec::with_capacity(section.connections.len());
    for entry in &section.connections {
        let connection = build_connection(entry, next_instance)?;
        if !seen.insert(connection.name.clone()) {
            return Err(ConfigError::InvalidIoConnection {
                name: connection.name,
                reason: "name appears more than once".to_owned(),
            });
        }
        next_instance = next_instance.saturating_add(1);
        connections.push(connection);
    }
    Ok(IoConfig { connections })
}

fn build_connection(
    entry: &IoConnectionEntry,
    default_instance: u16,
) -> Result<IoConnectionConfig, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidIoConnection {
        name: entry.name.clone(),
        reason,
    };
    let name = entry.name.trim();
    if name.is_empty() {
        return Err(invalid("name must not be empty".to_owned()));
    }
    let rpi = entry
        .rpi
        .to_duration()
        .map_err(|err| invalid(format!("invalid rpi: {}", err)))?;
    if entry.o_to_t_size == 0 || entry.t_to_o_size == 0 {
        return Err(invalid("payload sizes must be > 0".to_owned()));
    }
    Ok(IoConnectionConfig {
        name: name.to_owned(),
        rpi,
        o_to_t_size: entry.o_to_t_size,
        t_to_o_size: entry.t_to_o_size,
        transport: entry.transport,
        connection_point: CipPath::object(
            entry.class.unwrap_or(ASSEMBLY_CLASS),
            entry.instance.unwrap_or(default_instance),
        ),
    })
}
