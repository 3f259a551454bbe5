use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use crate::domain::{ProtocolProfile, TargetType};

use super::parsers::{parse_duration_arg, parse_probability};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "CIP / EtherNet-IP traffic generator: drives named scenarios against an adapter and records per-operation metrics."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run one scenario and write its metrics
    Run(RunArgs),
    /// List registered scenarios
    List,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Target adapter address
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// EtherNet/IP explicit messaging port
    #[arg(long, default_value_t = crate::scenarios::DEFAULT_PORT)]
    pub port: u16,

    /// Scenario to run (see `cipstress list`)
    #[arg(long, short = 's', default_value = "baseline")]
    pub scenario: String,

    /// Total run duration (supports ms/s/m/h)
    #[arg(long, short = 'd', default_value = "60s", value_parser = parse_duration_arg)]
    pub duration: Duration,

    /// Cycle interval (supports ms/s/m/h)
    #[arg(long, short = 'i', default_value = "1s", value_parser = parse_duration_arg)]
    pub interval: Duration,

    /// Device class stamped on every metric
    #[arg(long = "target-type", default_value = "emulated_adapter")]
    pub target_type: TargetType,

    /// Vendor byte-order profile for written values
    #[arg(long, default_value = "standard")]
    pub profile: ProtocolProfile,

    /// Path to a .toml or .json config (defaults to ./cipstress.toml)
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Reconnect attempts after a dropped connection
    #[arg(long = "reconnect-attempts", default_value_t = crate::scenarios::DEFAULT_RECONNECT_ATTEMPTS)]
    pub reconnect_attempts: u32,

    /// Pause between reconnect attempts (supports ms/s/m/h)
    #[arg(long = "reconnect-delay", default_value = "1s", value_parser = parse_duration_arg)]
    pub reconnect_delay: Duration,

    /// Lower bound of the randomized pause between operations
    #[arg(long = "jitter-min", default_value = "10ms", value_parser = parse_duration_arg)]
    pub jitter_min: Duration,

    /// Upper bound of the randomized pause between operations
    #[arg(long = "jitter-max", default_value = "50ms", value_parser = parse_duration_arg)]
    pub jitter_max: Duration,

    /// Stream every metric to this CSV file
    #[arg(long = "metrics-csv")]
    pub metrics_csv: Option<String>,

    /// Stream every metric to this JSON-lines file
    #[arg(long = "metrics-json")]
    pub metrics_json: Option<String>,

    /// Export every metric into this SQLite database when the run ends
    #[arg(long = "metrics-db")]
    pub metrics_db: Option<String>,

    /// Write the latency distribution table to this CSV file
    #[arg(long = "distribution-csv")]
    pub distribution_csv: Option<String>,

    /// Print the text summary to stdout when the run ends
    #[arg(long)]
    pub summary: bool,

    /// Base latency of the emulated adapter in milliseconds
    #[arg(long = "emulate-latency-ms", default_value_t = 2)]
    pub emulate_latency_ms: u64,

    /// Probability in [0, 1] that an emulated exchange times out
    #[arg(long = "emulate-fail-rate", default_value = "0", value_parser = parse_probability)]
    pub emulate_fail_rate: f64,

    /// Seed for the emulated adapter's random source
    #[arg(long = "emulate-seed")]
    pub emulate_seed: Option<u64>,

    /// Debug-level logging for this crate
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,
}
