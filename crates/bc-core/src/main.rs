//! bc-core: capture wearable motion data into batched files.
//!
//! Logs go to stderr; command results go to stdout in the selected
//! `--format`. Exit codes are documented in [`bc_core::exit_codes`].

use bc_common::{Channel, Error, OutputFormat, Result, SampleRate, SCHEMA_VERSION};
use bc_config::{
    get_preset, list_presets, load_config_file, resolve_config, resolve_output_dir, validate,
    CaptureConfig, ConfigPaths, OverflowPolicy, PresetName, SinkKind,
};
use bc_core::exit_codes::ExitCode;
use bc_core::session::{CaptureSession, SessionSummary};
use bc_core::sink::{open_sink, session_dir};
use bc_core::source::{CsvReplaySource, SensorSource, SyntheticSource};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bc-core", version, about = "Batched wearable motion capture")]
struct Cli {
    /// Config directory (overrides BAND_CAPTURE_CONFIG and XDG lookup)
    #[arg(long, global = true, value_name = "DIR")]
    config: Option<PathBuf>,

    /// Result format on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Log format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture from the synthetic band simulator
    Capture(CaptureArgs),
    /// Replay a `timestamp,ax,ay,az,gx,gy,gz` file through a session
    Replay(ReplayArgs),
    /// Inspect and validate configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct SessionOverrides {
    /// Samples per batch, per channel
    #[arg(long)]
    capacity: Option<usize>,

    /// Sink that receives batches
    #[arg(long, value_enum)]
    sink: Option<SinkArg>,

    /// Output root directory
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Enabled channel (repeatable)
    #[arg(long = "channel", value_enum)]
    channels: Vec<Channel>,

    /// What to do when the dispatch queue is full
    #[arg(long, value_enum)]
    overflow: Option<OverflowArg>,
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Number of readings to generate
    #[arg(long, default_value = "1024")]
    samples: u64,

    /// Sampling period
    #[arg(long, value_enum)]
    rate: Option<SampleRate>,

    /// RNG seed for the simulator
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Start from a named preset instead of the config file
    #[arg(long)]
    preset: Option<String>,

    /// Pace readings at the sampling period
    #[arg(long)]
    realtime: bool,

    #[command(flatten)]
    overrides: SessionOverrides,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Capture file to replay
    file: PathBuf,

    #[command(flatten)]
    overrides: SessionOverrides,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration and where it came from
    Show,
    /// Validate a config file
    Validate {
        /// Path to capture.json
        file: PathBuf,
    },
    /// List built-in presets
    Presets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkArg {
    Csv,
    Jsonl,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::Csv => SinkKind::Csv,
            SinkArg::Jsonl => SinkKind::Jsonl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OverflowArg {
    Block,
    DropNewest,
}

impl From<OverflowArg> for OverflowPolicy {
    fn from(arg: OverflowArg) -> Self {
        match arg {
            OverflowArg::Block => OverflowPolicy::Block,
            OverflowArg::DropNewest => OverflowPolicy::DropNewest,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    let result = match &cli.command {
        Commands::Capture(args) => run_capture(&cli, args),
        Commands::Replay(args) => run_replay(&cli, args),
        Commands::Config(args) => run_config(&cli, args),
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => report_error(cli.format, &err),
    };
    std::process::exit(code.as_i32());
}

fn init_logging(format: LogFormat, verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn report_error(format: OutputFormat, err: &Error) -> ExitCode {
    let code = ExitCode::for_error(err);
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "error": {
                    "code": err.code(),
                    "message": err.to_string(),
                },
                "exit_code": code.as_i32(),
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        }
        OutputFormat::Human => eprintln!("bc-core: {err}"),
    }
    code
}

// ============================================================================
// capture / replay
// ============================================================================

/// Config file (or preset) with command-line overrides applied.
fn session_config(
    config_dir: Option<&Path>,
    preset: Option<&str>,
    overrides: &SessionOverrides,
) -> Result<CaptureConfig> {
    let mut config = match preset {
        Some(name) => get_preset(name.parse::<PresetName>()?),
        None => {
            let resolved = resolve_config(config_dir)?;
            for warning in &resolved.warnings {
                warn!(warning = %warning, "config warning");
            }
            resolved.config
        }
    };

    if let Some(capacity) = overrides.capacity {
        config.buffer_capacity = capacity;
    }
    if let Some(sink) = overrides.sink {
        config.sink = sink.into();
    }
    if let Some(overflow) = overrides.overflow {
        config.overflow = overflow.into();
    }
    if !overrides.channels.is_empty() {
        config.channels = overrides.channels.clone();
    }
    validate(&config).into_result().map_err(Error::Config)?;
    Ok(config)
}

#[derive(Serialize)]
struct CaptureOutput<'a> {
    #[serde(flatten)]
    summary: &'a SessionSummary,
    output_dir: PathBuf,
}

/// Run `source` through a fresh session and print the summary.
fn capture_from(
    format: OutputFormat,
    config: &CaptureConfig,
    out: Option<&Path>,
    source: &mut dyn SensorSource,
) -> Result<ExitCode> {
    let root = resolve_output_dir(out, config)?;
    let mut session = CaptureSession::new(config, open_sink(config.sink, &root))?;
    let output_dir = session_dir(&root, session.id());
    info!(session_id = %session.id(), output_dir = %output_dir.display(), "capture starting");

    // Always finish so queued batches reach the sink, even after a failed run.
    let run = session.run(source);
    let summary = session.finish()?;
    run?;

    let code = if summary.is_clean() {
        ExitCode::Clean
    } else {
        ExitCode::PartialFail
    };

    match format {
        OutputFormat::Json => {
            let output = CaptureOutput {
                summary: &summary,
                output_dir,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => print_summary(&summary, &output_dir),
    }
    Ok(code)
}

fn print_summary(summary: &SessionSummary, output_dir: &Path) {
    println!("Session {}", summary.session_id);
    if let Some(source) = &summary.source {
        println!("  source:    {source}");
    }
    println!(
        "  rate:      {} ({} ms), {} samples per batch",
        summary.sample_rate,
        summary.sample_rate.period_ms(),
        summary.buffer_capacity
    );
    println!("  readings:  {}", summary.readings);
    for channel in &summary.channels {
        println!(
            "  {:<14} {} samples, {} batches, {} dropped, {} discarded",
            channel.channel.name(),
            channel.samples,
            channel.batches,
            channel.dropped_batches,
            channel.discarded
        );
    }
    let dispatch = &summary.dispatch;
    println!(
        "  sink:      {} ({} delivered, {} failed, {} dropped)",
        dispatch.sink, dispatch.delivered, dispatch.failed, dispatch.dropped
    );
    if let Some(err) = &dispatch.last_error {
        println!("  last error: {err}");
    }
    println!("  output:    {}", output_dir.display());
}

fn run_capture(cli: &Cli, args: &CaptureArgs) -> Result<ExitCode> {
    let mut config = session_config(
        cli.config.as_deref(),
        args.preset.as_deref(),
        &args.overrides,
    )?;
    if let Some(rate) = args.rate {
        config.sample_rate = rate;
    }

    let mut source =
        SyntheticSource::new(config.sample_rate, args.samples, args.seed).realtime(args.realtime);
    capture_from(cli.format, &config, args.overrides.out.as_deref(), &mut source)
}

fn run_replay(cli: &Cli, args: &ReplayArgs) -> Result<ExitCode> {
    let config = session_config(cli.config.as_deref(), None, &args.overrides)?;
    let mut source = CsvReplaySource::new(&args.file);
    capture_from(cli.format, &config, args.overrides.out.as_deref(), &mut source)
}

// ============================================================================
// config
// ============================================================================

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<ExitCode> {
    match &args.command {
        ConfigCommands::Show => run_config_show(cli),
        ConfigCommands::Validate { file } => run_config_validate(cli.format, file),
        ConfigCommands::Presets => run_config_presets(cli.format),
    }
}

fn run_config_show(cli: &Cli) -> Result<ExitCode> {
    let paths = ConfigPaths::discover(cli.config.as_deref());
    let resolved = resolve_config(cli.config.as_deref())?;

    match cli.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "paths": paths,
                "resolved": resolved,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => {
            match &resolved.source {
                Some(path) => println!("Config: {}", path.display()),
                None => println!("Config: built-in defaults"),
            }
            let config = &resolved.config;
            println!("  buffer_capacity: {}", config.buffer_capacity);
            println!("  sample_rate:     {}", config.sample_rate);
            let channels: Vec<&str> = config.channels.iter().map(|c| c.name()).collect();
            println!("  channels:        {}", channels.join(", "));
            println!("  sink:            {}", config.sink);
            println!("  queue_depth:     {}", config.queue_depth);
            println!("  overflow:        {}", config.overflow);
            if let Some(dir) = &config.output_dir {
                println!("  output_dir:      {}", dir.display());
            }
            for warning in &resolved.warnings {
                println!("  warning: {warning}");
            }
        }
    }
    Ok(ExitCode::Clean)
}

fn run_config_validate(format: OutputFormat, file: &Path) -> Result<ExitCode> {
    let config = load_config_file(file)?;
    let result = validate(&config);
    let code = if result.is_ok() {
        ExitCode::Clean
    } else {
        ExitCode::ConfigError
    };

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "file": file,
                "valid": result.is_ok(),
                "errors": result.errors,
                "warnings": result.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => {
            if result.is_ok() {
                println!("{}: valid", file.display());
            } else {
                println!("{}: invalid", file.display());
                for err in &result.errors {
                    println!("  error: {err}");
                }
            }
            for warning in &result.warnings {
                println!("  warning: {warning}");
            }
        }
    }
    Ok(code)
}

fn run_config_presets(format: OutputFormat) -> Result<ExitCode> {
    let presets = list_presets();
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "presets": presets,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => {
            for preset in &presets {
                println!("{:<16} {}", preset.name, preset.description);
            }
        }
    }
    Ok(ExitCode::Clean)
}
