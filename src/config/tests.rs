use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use tempfile::tempdir;

use super::types::{ConfigFile, TargetEntry, TargetKind};
use super::{apply_config, build_target_config, load_config_file, parse_duration_value, parse_hex};
use crate::args::{Cli, Command, RunArgs};
use crate::domain::{
    CipPath, IoTransport, ProtocolProfile, ServiceCode, TargetDescriptor, WritePattern,
};
use crate::error::{AppError, AppResult, ConfigError};
use crate::metrics::ExpectedOutcome;

const SAMPLE_TOML: &str = r#"
host = "192.168.1.10"
port = 2222
scenario = "dpi_explicit"
duration = "90s"
interval = "250ms"
profile = "big_endian_vendor"

[emulator]
latency_ms = 7
fail_rate = 0.25

[[targets]]
kind = "read"
name = "identity_vendor"
service = "0x0E"
class = 1
instance = 1
attribute = 1

[[targets]]
kind = "write"
name = "setpoint"
class = 0x04
instance = 101
attribute = 3
pattern = "increment"
value = "0000000A"

[[targets]]
kind = "edge"
name = "vendor_reserved_class"
service = 14
class = 0x64
instance = 1
attribute = 1
expected_outcome = "error"
tags = ["Moxa", " "]

[io]
[[io.connections]]
name = "assembly_100"
rpi = "20ms"
o_to_t_size = 32
t_to_o_size = 32

[[io.connections]]
name = "explicit_class3"
rpi = 2
o_to_t_size = 500
t_to_o_size = 500
transport = "class3"
class = 2
instance = 1
"#;

fn write_config(name: &str, content: &str) -> AppResult<(tempfile::TempDir, ConfigFile)> {
    let dir = tempdir()?;
    let path = dir.path().join(name);
    std::fs::write(&path, content)?;
    let config = load_config_file(&path)?;
    Ok((dir, config))
}

fn parse_run(argv: &[&str]) -> AppResult<(RunArgs, clap::ArgMatches)> {
    let matches = Cli::command().try_get_matches_from(argv)?;
    let cli = Cli::from_arg_matches(&matches)?;
    let run_matches = matches
        .subcommand_matches("run")
        .cloned()
        .ok_or_else(|| AppError::validation("Expected run subcommand matches"))?;
    match cli.command {
        Command::Run(args) => Ok((args, run_matches)),
        Command::List => Err(AppError::validation("Expected run subcommand")),
    }
}

fn entry(kind: TargetKind, name: &str) -> TargetEntry {
    TargetEntry {
        kind,
        name: name.to_owned(),
        class: Some(1),
        instance: Some(1),
        attribute: Some(1),
        ..TargetEntry::default()
    }
}

#[test]
fn toml_targets_validate_into_descriptors() -> AppResult<()> {
    let (_dir, config) = write_config("cipstress.toml", SAMPLE_TOML)?;
    let targets = build_target_config(&config)?;

    let names: Vec<&str> = targets.targets.iter().map(TargetDescriptor::name).collect();
    if names != ["identity_vendor", "setpoint", "vendor_reserved_class"] {
        return Err(AppError::validation(format!("Unexpected targets {:?}", names)));
    }
    match targets.targets.get(1) {
        Some(TargetDescriptor::Write(write)) => {
            if write.pattern != WritePattern::Increment || write.width != 4 || write.initial != 10 {
                return Err(AppError::validation(format!("Unexpected write {:?}", write)));
            }
            if write.path != CipPath::attribute(0x04, 101, 3) {
                return Err(AppError::validation("Unexpected write path"));
            }
        }
        other => return Err(AppError::validation(format!("Expected write, got {:?}", other))),
    }
    match targets.targets.get(2) {
        Some(TargetDescriptor::Edge(edge)) => {
            if edge.expected_outcome != ExpectedOutcome::Error || edge.tags != ["moxa"] {
                return Err(AppError::validation(format!("Unexpected edge {:?}", edge)));
            }
            if edge.service != ServiceCode::GET_ATTRIBUTE_SINGLE {
                return Err(AppError::validation("Numeric service code not honored"));
            }
        }
        other => return Err(AppError::validation(format!("Expected edge, got {:?}", other))),
    }

    let io = targets.io.ok_or_else(|| AppError::validation("Missing io section"))?;
    let [first, second] = io.connections.as_slice() else {
        return Err(AppError::validation("Expected two cyclic connections"));
    };
    if first.rpi != Duration::from_millis(20)
        || first.transport != IoTransport::Class1
        || first.connection_point != CipPath::object(0x04, 100)
    {
        return Err(AppError::validation(format!("Unexpected class-1 entry {:?}", first)));
    }
    if second.rpi != Duration::from_secs(2)
        || second.transport != IoTransport::Class3
        || second.connection_point != CipPath::object(2, 1)
    {
        return Err(AppError::validation(format!("Unexpected class-3 entry {:?}", second)));
    }
    Ok(())
}

#[test]
fn json_config_parses_the_same_fields() -> AppResult<()> {
    let content = r#"{
        "host": "10.1.1.1",
        "duration": 30,
        "targets": [
            { "kind": "custom", "name": "vendor_service", "service": "0x4B", "class": 100, "payload": "01 02" }
        ]
    }"#;
    let (_dir, config) = write_config("cipstress.json", content)?;
    if config.host.as_deref() != Some("10.1.1.1") {
        return Err(AppError::validation("Unexpected host"));
    }
    let targets = build_target_config(&config)?;
    match targets.targets.first() {
        Some(TargetDescriptor::Custom(custom)) => {
            if custom.service != ServiceCode(0x4B) || custom.payload != [0x01, 0x02] {
                return Err(AppError::validation(format!("Unexpected custom {:?}", custom)));
            }
            Ok(())
        }
        other => Err(AppError::validation(format!("Expected custom, got {:?}", other))),
    }
}

#[test]
fn unsupported_extension_is_rejected() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("cipstress.yaml");
    std::fs::write(&path, "host: x")?;
    match load_config_file(&path) {
        Err(AppError::Config(ConfigError::UnsupportedExtension { ext })) if ext == "yaml" => Ok(()),
        other => Err(AppError::validation(format!("Expected extension error, got {:?}", other))),
    }
}

#[test]
fn invalid_targets_are_reported_by_name() -> AppResult<()> {
    let mut missing_class = entry(TargetKind::Read, "no_class");
    missing_class.class = None;
    let mut bad_hex = entry(TargetKind::Custom, "bad_payload");
    bad_hex.service = Some(super::types::CodeValue::Text("0x4B".to_owned()));
    bad_hex.payload = Some("0xZZ".to_owned());
    let mut no_pattern = entry(TargetKind::Write, "no_pattern");
    no_pattern.value = Some("01".to_owned());
    let mut no_service = entry(TargetKind::Custom, "no_service");
    no_service.payload = Some("01".to_owned());
    let mut no_attribute = entry(TargetKind::Read, "no_attribute");
    no_attribute.attribute = None;

    for bad in [missing_class, bad_hex, no_pattern, no_service, no_attribute] {
        let name = bad.name.clone();
        let config = ConfigFile {
            targets: vec![bad],
            ..ConfigFile::default()
        };
        match build_target_config(&config) {
            Err(ConfigError::InvalidTarget { name: reported, .. })
            | Err(ConfigError::InvalidHex { name: reported, .. })
                if reported == name => {}
            other => {
                return Err(AppError::validation(format!(
                    "{} should be rejected, got {:?}",
                    name, other
                )));
            }
        }
    }
    Ok(())
}

#[test]
fn duplicate_target_names_are_rejected() -> AppResult<()> {
    let config = ConfigFile {
        targets: vec![entry(TargetKind::Read, "twice"), entry(TargetKind::Edge, "twice")],
        ..ConfigFile::default()
    };
    match build_target_config(&config) {
        Err(ConfigError::DuplicateTarget { name }) if name == "twice" => Ok(()),
        other => Err(AppError::validation(format!("Expected duplicate error, got {:?}", other))),
    }
}

#[test]
fn cli_flags_win_over_config_values() -> AppResult<()> {
    let (_dir, config) = write_config("cipstress.toml", SAMPLE_TOML)?;
    let (mut args, matches) = parse_run(&["cipstress", "run", "--scenario", "baseline", "--port", "44818"])?;
    apply_config(&mut args, &matches, &config)?;

    if args.scenario != "baseline" || args.port != 44818 {
        return Err(AppError::validation("CLI values were overwritten"));
    }
    if args.host != "192.168.1.10" || args.duration != Duration::from_secs(90) {
        return Err(AppError::validation(format!(
            "Config values not applied: {} {:?}",
            args.host, args.duration
        )));
    }
    if args.interval != Duration::from_millis(250) || args.profile != ProtocolProfile::BigEndianVendor {
        return Err(AppError::validation("Interval or profile not applied"));
    }
    if args.emulate_latency_ms != 7 || (args.emulate_fail_rate - 0.25).abs() > f64::EPSILON {
        return Err(AppError::validation("Emulator section not applied"));
    }
    Ok(())
}

#[test]
fn inverted_jitter_bounds_are_rejected() -> AppResult<()> {
    let (mut args, matches) = parse_run(&[
        "cipstress",
        "run",
        "--jitter-min",
        "100ms",
        "--jitter-max",
        "5ms",
    ])?;
    match apply_config(&mut args, &matches, &ConfigFile::default()) {
        Err(AppError::Config(ConfigError::InvalidJitter { .. })) => Ok(()),
        other => Err(AppError::validation(format!("Expected jitter error, got {:?}", other))),
    }
}

#[test]
fn durations_accept_unit_suffixes() -> AppResult<()> {
    let cases = [
        ("250ms", Duration::from_millis(250)),
        ("15", Duration::from_secs(15)),
        ("2m", Duration::from_secs(120)),
        ("1h", Duration::from_secs(3600)),
    ];
    for (text, expected) in cases {
        let parsed = parse_duration_value(text)?;
        if parsed != expected {
            return Err(AppError::validation(format!("{} parsed as {:?}", text, parsed)));
        }
    }
    for bad in ["", "ms", "0s", "5d"] {
        if parse_duration_value(bad).is_ok() {
            return Err(AppError::validation(format!("'{}' should be rejected", bad)));
        }
    }
    Ok(())
}

#[test]
fn hex_accepts_prefix_and_separators() -> AppResult<()> {
    if parse_hex("0x0A 0b_ff") != Some(vec![0x0A, 0x0B, 0xFF]) {
        return Err(AppError::validation("Separators not ignored"));
    }
    if parse_hex("abc").is_some() || parse_hex("zz").is_some() {
        return Err(AppError::validation("Malformed hex accepted"));
    }
    Ok(())
}
