use std::fs;
use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;

use crate::duration::HandleTime;
use crate::error::{Error, Result};
use crate::models::SimConfig;

#[derive(Parser, Debug)]
#[command(
    name = "dispatch-sim",
    version,
    about = "Simulate a dispatch center pulling calls from a shared queue",
    args_conflicts_with_subcommands = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation (the default)
    Run(RunArgs),
    /// Print the effective configuration without running
    ShowConfig(RunArgs),
    /// List the accepted handle-time settings
    ListHandleTimes,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// TOML or JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Previously saved config; unreadable or malformed files fall back to defaults
    #[arg(long, conflicts_with = "config")]
    pub saved_config: Option<PathBuf>,
    #[arg(long)]
    pub dispatchers: Option<usize>,
    #[arg(long)]
    pub incoming_calls: Option<usize>,
    #[arg(long, value_parser = parse_handle_time)]
    pub handle_time: Option<HandleTime>,
    /// Dispatchers already on a call at start
    #[arg(long)]
    pub initial_busy: Option<usize>,
    #[arg(long, value_parser = parse_handle_time)]
    pub initial_busy_handle_time: Option<HandleTime>,
    /// Simulated run length
    #[arg(long)]
    pub duration_secs: Option<u64>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub delete_latency_ms: Option<u64>,
    #[arg(long)]
    pub delete_failure_rate: Option<f64>,
    #[arg(long, value_enum, default_value_t = FormatArg::Human)]
    pub format: FormatArg,
    /// Shorthand for --format summary
    #[arg(long)]
    pub summary: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FormatArg {
    #[default]
    Human,
    Summary,
    Json,
}

/// What the binary should do after parsing.
#[derive(Debug)]
pub enum Invocation {
    Run { config: SimConfig, format: FormatArg },
    ShowConfig { config: SimConfig },
    ListHandleTimes,
}

pub fn parse_args() -> Result<Args> {
    Args::try_parse().map_err(|err| match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
        _ => Error::Cli(err.to_string()),
    })
}

pub fn build_invocation(args: Args) -> Result<Invocation> {
    match args.command {
        None => run_invocation(&args.run),
        Some(Command::Run(run)) => run_invocation(&run),
        Some(Command::ShowConfig(run)) => Ok(Invocation::ShowConfig {
            config: build_config(&run)?,
        }),
        Some(Command::ListHandleTimes) => Ok(Invocation::ListHandleTimes),
    }
}

fn run_invocation(run: &RunArgs) -> Result<Invocation> {
    let format = if run.summary {
        FormatArg::Summary
    } else {
        run.format
    };
    Ok(Invocation::Run {
        config: build_config(run)?,
        format,
    })
}

/// File (if any) first, then command-line overrides, then validation.
pub fn build_config(run: &RunArgs) -> Result<SimConfig> {
    let mut config = match (&run.config, &run.saved_config) {
        (Some(path), _) => load_config(path)?,
        (None, Some(path)) => load_config_or_default(path),
        (None, None) => SimConfig::default(),
    };

    if let Some(dispatchers) = run.dispatchers {
        config.dispatchers = dispatchers;
    }
    if let Some(incoming) = run.incoming_calls {
        config.incoming_calls = incoming;
    }
    if let Some(handle_time) = run.handle_time {
        config.handle_time = handle_time;
    }
    if let Some(busy) = run.initial_busy {
        config.initial_busy_dispatchers = busy;
    }
    if let Some(handle_time) = run.initial_busy_handle_time {
        config.initial_busy_handle_time = handle_time;
    }
    if let Some(secs) = run.duration_secs {
        config.duration_ms = secs.saturating_mul(1000);
    }
    if run.seed.is_some() {
        config.seed = run.seed;
    }
    if let Some(latency) = run.delete_latency_ms {
        config.remote.delete_latency_ms = latency;
    }
    if let Some(rate) = run.delete_failure_rate {
        config.remote.delete_failure_rate = rate;
    }

    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<SimConfig> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::ConfigIo(format!(
            "failed to read config '{}': {}",
            path.display(),
            err
        ))
    })?;
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("");

    match ext {
        "toml" => toml::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse TOML: {}", err))),
        "json" => serde_json::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse JSON: {}", err))),
        "" => Err(Error::UnsupportedConfigFormat("unknown".to_string())),
        _ => Err(Error::UnsupportedConfigFormat(ext.to_string())),
    }
}

/// Loads a saved config, falling back to defaults when it cannot be read,
/// parsed or validated.
pub fn load_config_or_default(path: &Path) -> SimConfig {
    match load_config(path).and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "saved config unusable, using defaults");
            SimConfig::default()
        }
    }
}

fn parse_handle_time(raw: &str) -> std::result::Result<HandleTime, String> {
    let wanted = raw.trim().to_lowercase();
    HandleTime::ALL
        .iter()
        .copied()
        .find(|handle_time| handle_time.as_setting() == wanted)
        .ok_or_else(|| format!("expected one of 1, 3, 5, random (got '{}')", raw))
}
