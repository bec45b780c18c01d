use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use canfuse_core::{BusConfig, Registry};

use crate::exit::{core_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
#[cfg(target_os = "linux")]
pub mod monitor;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a candump log and print the resulting actuator and IMU state.
    Replay(ReplayArgs),
    /// Print the command frames one control tick would send.
    Encode(EncodeArgs),
    /// Decode live telemetry from a SocketCAN interface.
    #[cfg(target_os = "linux")]
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Replay(args) => replay::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        #[cfg(target_os = "linux")]
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Bus configuration (JSON).
    pub config: PathBuf,
    /// candump log to decode (`candump -L` format).
    pub log: PathBuf,
    /// Only decode records captured on this interface.
    #[arg(long)]
    pub interface: Option<String>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Bus configuration (JSON).
    pub config: PathBuf,
    /// Commands by actuator name, inline JSON or `@path`.
    /// Example: '{"wheel": {"effort": 1.5}}'.
    #[arg(long, default_value = "{}")]
    pub commands: String,
    /// candump log decoded first, so temperatures and positions are current.
    #[arg(long, value_name = "LOG")]
    pub telemetry: Option<PathBuf>,
    /// Interface name printed in candump output. Defaults to the configured bus name.
    #[arg(long)]
    pub interface: Option<String>,
}

#[cfg(target_os = "linux")]
#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Bus configuration (JSON).
    pub config: PathBuf,
    /// SocketCAN interface. Defaults to the configured bus name.
    #[arg(long)]
    pub interface: Option<String>,
    /// Exit after decoding N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Print state this often (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Wait between attempts to open the interface.
    #[arg(long, default_value = "500ms")]
    pub retry_interval: String,
    /// Give up after this many failed open attempts. Default: retry until interrupted.
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Load a bus configuration and populate its registry.
pub(crate) fn load_bus(path: &Path) -> CliResult<(BusConfig, Registry)> {
    let config = BusConfig::from_path(path).map_err(|err| core_error("config load failed", err))?;
    let registry = config
        .build_registry()
        .map_err(|err| core_error("invalid bus configuration", err))?;
    Ok((config, registry))
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
