use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::RunArgs;
use crate::args::parsers::check_probability;
use crate::domain::{ProtocolProfile, TargetType};
use crate::error::{AppError, AppResult, ConfigError, ValidationError};

use super::types::{ConfigFile, DurationValue};

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn duration_field(
    value: &DurationValue,
    field: &'static str,
) -> AppResult<std::time::Duration> {
    value
        .to_duration()
        .map_err(|source| AppError::config(ConfigError::InvalidField { field, source }))
}

fn field_error(field: &'static str, source: ValidationError) -> AppError {
    AppError::config(ConfigError::InvalidField { field, source })
}

/// Applies configuration values to the `run` arguments. Flags given on the
/// command line keep their value.
///
/// # Errors
///
/// Returns an error when a config value is malformed.
pub fn apply_config(
    args: &mut RunArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if !is_cli(matches, "host")
        && let Some(host) = config.host.clone()
    {
        args.host = host;
    }

    if !is_cli(matches, "port")
        && let Some(port) = config.port
    {
        args.port = port;
    }

    if !is_cli(matches, "scenario")
        && let Some(scenario) = config.scenario.clone()
    {
        args.scenario = scenario;
    }

    if !is_cli(matches, "duration")
        && let Some(duration) = config.duration.as_ref()
    {
        args.duration = duration_field(duration, "duration")?;
    }

    if !is_cli(matches, "interval")
        && let Some(interval) = config.interval.as_ref()
    {
        args.interval = duration_field(interval, "interval")?;
    }

    if !is_cli(matches, "target_type")
        && let Some(target_type) = config.target_type.as_deref()
    {
        args.target_type = target_type
            .parse::<TargetType>()
            .map_err(|err| field_error("target_type", err))?;
    }

    if !is_cli(matches, "profile")
        && let Some(profile) = config.profile.as_deref()
    {
        args.profile = profile
            .parse::<ProtocolProfile>()
            .map_err(|err| field_error("profile", err))?;
    }

    if !is_cli(matches, "reconnect_attempts")
        && let Some(attempts) = config.reconnect_attempts
    {
        args.reconnect_attempts = attempts;
    }

    if !is_cli(matches, "reconnect_delay")
        && let Some(delay) = config.reconnect_delay.as_ref()
    {
        args.reconnect_delay = duration_field(delay, "reconnect_delay")?;
    }

    if !is_cli(matches, "jitter_min")
        && let Some(jitter) = config.jitter_min.as_ref()
    {
        args.jitter_min = duration_field(jitter, "jitter_min")?;
    }

    if !is_cli(matches, "jitter_max")
        && let Some(jitter) = config.jitter_max.as_ref()
    {
        args.jitter_max = duration_field(jitter, "jitter_max")?;
    }

    if !is_cli(matches, "metrics_csv")
        && let Some(path) = config.metrics_csv.clone()
    {
        args.metrics_csv = Some(path);
    }

    if !is_cli(matches, "metrics_json")
        && let Some(path) = config.metrics_json.clone()
    {
        args.metrics_json = Some(path);
    }

    if !is_cli(matches, "metrics_db")
        && let Some(path) = config.metrics_db.clone()
    {
        args.metrics_db = Some(path);
    }

    if !is_cli(matches, "distribution_csv")
        && let Some(path) = config.distribution_csv.clone()
    {
        args.distribution_csv = Some(path);
    }

    if !is_cli(matches, "summary")
        && let Some(summary) = config.summary
    {
        args.summary = summary;
    }

    if !is_cli(matches, "no_color")
        && let Some(no_color) = config.no_color
    {
        args.no_color = no_color;
    }

    if let Some(emulator) = config.emulator.as_ref() {
        if !is_cli(matches, "emulate_latency_ms")
            && let Some(latency) = emulator.latency_ms
        {
            args.emulate_latency_ms = latency;
        }
        if !is_cli(matches, "emulate_fail_rate")
            && let Some(rate) = emulator.fail_rate
        {
            args.emulate_fail_rate =
                check_probability(rate).map_err(|err| field_error("emulator.fail_rate", err))?;
        }
        if !is_cli(matches, "emulate_seed")
            && let Some(seed) = emulator.seed
        {
            args.emulate_seed = Some(seed);
        }
    }

    if args.jitter_min > args.jitter_max {
        return Err(AppError::config(ConfigError::InvalidJitter {
            min: args.jitter_min,
            max: args.jitter_max,
        }));
    }

    Ok(())
}
