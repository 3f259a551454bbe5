use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn};

use crate::args::{Cli, Command, RunArgs};
use crate::client::{EmulatedClient, EmulatorSettings};
use crate::config::{DEFAULT_CONFIG_FILES, apply_config, build_target_config, load_config};
use crate::domain::TargetConfig;
use crate::error::{AppError, AppResult, SinkError, ValidationError};
use crate::metrics::{MetricsSink, StreamingSink, distribution_table, render_summary};
use crate::scenarios::{JitterBounds, ReconnectPolicy, ScenarioParams, scenario_registry};
use crate::shutdown::{ShutdownSignal, shutdown_channel};
use crate::shutdown_handlers::{setup_keyboard_shutdown_handler, setup_signal_shutdown_handler};
use crate::sinks::{
    ForwardingSink, StreamOutputs, export_sqlite, spawn_metric_writer, write_distribution_csv,
};

/// Subcommand run when the binary is started without arguments next to a
/// default config file.
const IMPLICIT_SUBCOMMAND: &str = "run";

/// A validated `run` invocation: CLI merged with the config file, targets
/// resolved into descriptors.
struct RunPlan {
    args: RunArgs,
    targets: TargetConfig,
}

impl RunPlan {
    fn build(mut args: RunArgs, matches: &ArgMatches) -> AppResult<Self> {
        let config = load_config(args.config.as_deref())?.unwrap_or_default();
        apply_config(&mut args, matches, &config)?;
        let targets = build_target_config(&config)?;
        Ok(Self { args, targets })
    }
}

pub(crate) fn run() -> AppResult<()> {
    let (cli, matches) = match parse_args()? {
        Some(parsed) => parsed,
        None => return Ok(()),
    };

    match cli.command {
        Command::List => {
            print_scenarios();
            Ok(())
        }
        Command::Run(args) => {
            let run_matches = matches
                .subcommand_matches(IMPLICIT_SUBCOMMAND)
                .ok_or_else(|| AppError::validation(ValidationError::MissingSubcommand))?;
            let plan = RunPlan::build(args, run_matches)?;

            crate::logger::init_logging(plan.args.verbose, plan.args.no_color);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_scenario(plan))
        }
    }
}

fn parse_args() -> AppResult<Option<(Cli, ArgMatches)>> {
    let mut cmd = Cli::command();
    let mut raw_args: Vec<OsString> = std::env::args_os().collect();

    if is_bare_invocation(&raw_args) {
        if !has_default_config() {
            cmd.print_help()?;
            println!();
            return Ok(None);
        }
        raw_args.truncate(1);
        raw_args.push(OsString::from(IMPLICIT_SUBCOMMAND));
    }

    let matches = cmd.get_matches_from(raw_args);
    let cli = Cli::from_arg_matches(&matches)?;

    Ok(Some((cli, matches)))
}

fn is_bare_invocation(raw_args: &[OsString]) -> bool {
    matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--")
}

fn has_default_config() -> bool {
    DEFAULT_CONFIG_FILES
        .iter()
        .any(|path| Path::new(path).exists())
}

fn print_scenarios() {
    let registry = scenario_registry();
    let width = registry
        .names()
        .iter()
        .map(|name| name.len())
        .max()
        .unwrap_or_default();
    for (name, description) in registry.entries() {
        println!("{:<width$}  {}", name, description, width = width);
    }
}

fn emulator_settings(args: &RunArgs) -> EmulatorSettings {
    EmulatorSettings {
        latency: Duration::from_millis(args.emulate_latency_ms),
        failure_rate: args.emulate_fail_rate,
        seed: args.emulate_seed,
        ..EmulatorSettings::default()
    }
}

fn stream_outputs(args: &RunArgs) -> StreamOutputs {
    StreamOutputs {
        csv: args.metrics_csv.as_deref().map(PathBuf::from),
        json: args.metrics_json.as_deref().map(PathBuf::from),
    }
}

type WriterHandle = JoinHandle<Result<u64, SinkError>>;

/// The sink scenarios record into, plus the streaming writer task when
/// `--metrics-csv` or `--metrics-json` is set.
fn recorder(
    sink: &Arc<StreamingSink>,
    outputs: StreamOutputs,
) -> (Arc<dyn MetricsSink>, Option<WriterHandle>) {
    if outputs.is_empty() {
        return (sink.clone(), None);
    }
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = spawn_metric_writer(outputs, rx);
    (Arc::new(ForwardingSink::new(sink.clone(), tx)), Some(handle))
}

async fn run_scenario(plan: RunPlan) -> AppResult<()> {
    let RunPlan { args, targets } = plan;
    let scenario = scenario_registry().create(&args.scenario)?;

    let sink = Arc::new(StreamingSink::new());
    let (recording, writer) = recorder(&sink, stream_outputs(&args));
    let endpoint = format!("{}:{}", args.host, args.port);
    let span = info_span!("scenario", name = scenario.name(), target = %endpoint);
    let params = ScenarioParams::builder(recording)
        .target(args.host.clone(), args.port)
        .interval(args.interval)
        .duration(args.duration)
        .target_type(args.target_type)
        .profile(args.profile)
        .span(span)
        .reconnect(ReconnectPolicy::new(
            args.reconnect_attempts,
            args.reconnect_delay,
        ))
        .jitter(JitterBounds::new(args.jitter_min, args.jitter_max))
        .build();
    let mut client = EmulatedClient::new(emulator_settings(&args));

    let (shutdown_tx, _) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);
    let keyboard_handle = std::io::stdin()
        .is_terminal()
        .then(|| setup_keyboard_shutdown_handler(&shutdown_tx));

    info!(
        "Running {} against {} for {:?} (interval {:?}, {} targets)",
        scenario.name(),
        endpoint,
        args.duration,
        args.interval,
        targets.targets.len()
    );
    let started = Instant::now();
    let outcome = scenario
        .run(
            ShutdownSignal::from_sender(&shutdown_tx),
            &mut client,
            &targets,
            &params,
        )
        .await;
    let elapsed = started.elapsed();

    drop(shutdown_tx.send(()));
    signal_handle.abort();
    if let Some(handle) = keyboard_handle {
        handle.await?;
    }
    // Closes the stream so the writer task can finish.
    drop(params);
    if let Some(handle) = writer {
        let streamed = handle.await??;
        debug!("Streamed {} metrics", streamed);
    }

    if let Err(err) = &outcome {
        warn!("{} stopped early: {}", scenario.name(), err);
    }
    info!("{} finished after {:?}", scenario.name(), elapsed);
    write_report(&args, &sink).await?;
    outcome.map_err(AppError::from)
}

async fn write_report(args: &RunArgs, sink: &StreamingSink) -> AppResult<()> {
    let summary = sink.summary();
    let report = render_summary(&summary);
    if args.summary {
        println!("{}", report);
    } else {
        for line in report.lines() {
            info!("{}", line);
        }
    }

    if let Some(path) = args.distribution_csv.as_deref() {
        let rows = distribution_table(&sink.metrics(), &summary);
        write_distribution_csv(Path::new(path), &rows).await?;
        info!("Wrote distribution table to {}", path);
    }
    if let Some(path) = args.metrics_db.as_deref() {
        let inserted = export_sqlite(Path::new(path), sink.metrics()).await?;
        info!("Exported {} metrics to {}", inserted, path);
    }
    Ok(())
}
