use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod monitor;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the device side against simulated sensors.
    Simulate(SimulateArgs),
    /// Act as the host: start streaming and verify envelopes.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to bind as the host link.
    pub path: PathBuf,
    /// Image width in pixels.
    #[arg(long, env = "SENSORLINK_WIDTH", default_value_t = 320)]
    pub width: usize,
    /// Image height in pixels.
    #[arg(long, env = "SENSORLINK_HEIGHT", default_value_t = 240)]
    pub height: usize,
    /// Bytes per pixel.
    #[arg(long, env = "SENSORLINK_BYTES_PER_PIXEL", default_value_t = 2)]
    pub bytes_per_pixel: usize,
    /// Line-complete events per frame.
    #[arg(long, env = "SENSORLINK_LINES_PER_FRAME", default_value_t = 480)]
    pub lines_per_frame: usize,
    /// Samples per radar burst.
    #[arg(long, env = "SENSORLINK_RADAR_SAMPLES", default_value_t = 2048)]
    pub radar_samples: usize,
    /// Camera frame rate.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub fps: u32,
    /// Radar burst rate.
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub radar_hz: u32,
    /// Drop one line from every Nth frame to exercise malformed-frame handling.
    #[arg(long, value_name = "N")]
    pub malformed_every: Option<u64>,
    /// Bound on each envelope transmit (e.g. 100ms, 1s).
    #[arg(long, env = "SENSORLINK_WRITE_TIMEOUT", default_value = "100ms")]
    pub write_timeout: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Socket path of the device to attach to.
    pub path: PathBuf,
    /// Exit after receiving N envelopes.
    #[arg(long)]
    pub count: Option<u64>,
    /// Give up when no data arrives for this long (e.g. 5s, 500ms).
    #[arg(long, env = "SENSORLINK_READ_TIMEOUT", default_value = "5s")]
    pub timeout: String,
    /// Payload size that identifies an image frame.
    #[arg(long, env = "SENSORLINK_IMAGE_BYTES", default_value_t = 153_600)]
    pub image_bytes: usize,
    /// Samples per radar burst; a burst payload is twice this in bytes.
    #[arg(long, env = "SENSORLINK_RADAR_SAMPLES", default_value_t = 2048)]
    pub radar_samples: usize,
    /// On a corrupt envelope, send stop, flush and send start again.
    #[arg(long)]
    pub restart_on_error: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

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

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
