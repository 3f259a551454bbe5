use std::time::Duration;

use clap::Parser;

use super::{Cli, Command, RunArgs};
use crate::domain::{ProtocolProfile, TargetType};
use crate::error::{AppError, AppResult};

fn parse_run(argv: &[&str]) -> AppResult<RunArgs> {
    match Cli::try_parse_from(argv)?.command {
        Command::Run(args) => Ok(args),
        Command::List => Err(AppError::validation("Expected run subcommand")),
    }
}

#[test]
fn run_defaults_are_applied() -> AppResult<()> {
    let args = parse_run(&["cipstress", "run"])?;
    if args.host != "127.0.0.1" || args.port != crate::scenarios::DEFAULT_PORT {
        return Err(AppError::validation("Unexpected default endpoint"));
    }
    if args.scenario != "baseline" {
        return Err(AppError::validation("Unexpected default scenario"));
    }
    if args.duration != Duration::from_secs(60) || args.interval != Duration::from_secs(1) {
        return Err(AppError::validation("Unexpected default timing"));
    }
    if args.target_type != TargetType::EmulatedAdapter || args.profile != ProtocolProfile::Standard
    {
        return Err(AppError::validation("Unexpected default target type or profile"));
    }
    if args.jitter_min != Duration::from_millis(10) || args.jitter_max != Duration::from_millis(50)
    {
        return Err(AppError::validation("Unexpected default jitter"));
    }
    if args.metrics_csv.is_some() || args.metrics_db.is_some() || args.summary {
        return Err(AppError::validation("Outputs should be off by default"));
    }
    Ok(())
}

#[test]
fn run_flags_are_parsed() -> AppResult<()> {
    let args = parse_run(&[
        "cipstress",
        "run",
        "--host",
        "10.0.0.7",
        "-s",
        "firewall_moxa",
        "-d",
        "2m",
        "-i",
        "250ms",
        "--target-type",
        "plc",
        "--profile",
        "big_endian_vendor",
        "--metrics-csv",
        "out.csv",
        "--emulate-fail-rate",
        "0.1",
        "--emulate-seed",
        "7",
        "--summary",
    ])?;
    if args.host != "10.0.0.7" || args.scenario != "firewall_moxa" {
        return Err(AppError::validation("Endpoint or scenario not parsed"));
    }
    if args.duration != Duration::from_secs(120) || args.interval != Duration::from_millis(250) {
        return Err(AppError::validation("Duration suffixes not honored"));
    }
    if args.target_type != TargetType::EmulatedPlc
        || args.profile != ProtocolProfile::BigEndianVendor
    {
        return Err(AppError::validation("Target type or profile not parsed"));
    }
    if args.metrics_csv.as_deref() != Some("out.csv") || !args.summary {
        return Err(AppError::validation("Output flags not parsed"));
    }
    if (args.emulate_fail_rate - 0.1).abs() > f64::EPSILON || args.emulate_seed != Some(7) {
        return Err(AppError::validation("Emulator flags not parsed"));
    }
    Ok(())
}

#[test]
fn list_subcommand_is_recognized() -> AppResult<()> {
    match Cli::try_parse_from(["cipstress", "list"])?.command {
        Command::List => Ok(()),
        Command::Run(_) => Err(AppError::validation("Expected list subcommand")),
    }
}

#[test]
fn invalid_values_are_rejected() -> AppResult<()> {
    let cases: [&[&str]; 5] = [
        &["cipstress", "run", "--emulate-fail-rate", "1.5"],
        &["cipstress", "run", "--emulate-fail-rate", "often"],
        &["cipstress", "run", "--duration", "0s"],
        &["cipstress", "run", "--interval", "3days"],
        &["cipstress", "run", "--target-type", "toaster"],
    ];
    for argv in cases {
        if Cli::try_parse_from(argv).is_ok() {
            return Err(AppError::validation(format!("{:?} should be rejected", argv)));
        }
    }
    Ok(())
}

#[test]
fn subcommand_is_required() -> AppResult<()> {
    if Cli::try_parse_from(["cipstress"]).is_ok() {
        return Err(AppError::validation("Missing subcommand should be rejected"));
    }
    Ok(())
}
