use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sensorlink_capture::SAMPLE_WIDTH;
use sensorlink_frame::{EnvelopeConfig, EnvelopeReader, FrameError, HostCommand, SequenceTracker};
use sensorlink_transport::{HostStream, UnixDomainSocket};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, MonitorArgs};
use crate::exit::{frame_error, io_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_envelope, print_summary, OutputFormat, Summary};

/// Quiet period that ends a flush after stop.
const SETTLE_IDLE: Duration = Duration::from_millis(100);
/// Upper bound on a flush, in case the device ignores stop.
const SETTLE_LIMIT: Duration = Duration::from_secs(2);

/// What a payload is, judged by its length alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    Image,
    Radar,
    Unknown,
}

impl PayloadKind {
    fn name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Radar => "radar",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Classifier {
    image_bytes: usize,
    radar_bytes: usize,
}

impl Classifier {
    fn classify(&self, len: usize) -> PayloadKind {
        if len == self.image_bytes {
            PayloadKind::Image
        } else if len == self.radar_bytes {
            PayloadKind::Radar
        } else {
            PayloadKind::Unknown
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct MonitorSummary {
    received: u64,
    images: u64,
    radar: u64,
    unknown: u64,
    lost: u64,
    corrupt: u64,
    resyncs: u64,
    restarts: u64,
}

impl MonitorSummary {
    fn record(&mut self, kind: PayloadKind, lost_before: u8) {
        self.received += 1;
        self.lost += u64::from(lost_before);
        match kind {
            PayloadKind::Image => self.images += 1,
            PayloadKind::Radar => self.radar += 1,
            PayloadKind::Unknown => self.unknown += 1,
        }
    }
}

impl Summary for MonitorSummary {
    const TITLE: &'static str = "host";

    fn rows(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("received", self.received),
            ("images", self.images),
            ("radar", self.radar),
            ("unknown", self.unknown),
            ("lost", self.lost),
            ("corrupt", self.corrupt),
            ("resyncs", self.resyncs),
            ("restarts", self.restarts),
        ]
    }
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let read_timeout = parse_duration(&args.timeout)?;
    let stream =
        UnixDomainSocket::connect(&args.path).map_err(|err| transport_error("connect failed", err))?;
    let mut control = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", err))?;
    let config = EnvelopeConfig {
        read_timeout: Some(read_timeout),
        ..EnvelopeConfig::default()
    };
    let mut reader = EnvelopeReader::with_config_host(stream, config)
        .map_err(|err| frame_error("connect failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    // Whatever a previous host left streaming is flushed first.
    let mut tracker = SequenceTracker::new();
    restart(&mut control, &mut reader, &mut tracker)?;
    info!(path = ?args.path, "streaming requested");

    let classifier = Classifier {
        image_bytes: args.image_bytes,
        radar_bytes: args.radar_samples.saturating_mul(SAMPLE_WIDTH),
    };
    let mut summary = MonitorSummary::default();

    let result = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(());
        }
        if args.count.is_some_and(|count| summary.received >= count) {
            break Ok(());
        }

        match reader.read_envelope() {
            Ok(envelope) => {
                let lost = tracker.observe(envelope.sequence);
                if lost > 0 {
                    warn!(sequence = envelope.sequence, lost, "sequence gap");
                }
                let kind = classifier.classify(envelope.payload.len());
                summary.record(kind, lost);
                print_envelope(&envelope, kind.name(), lost, format);
            }
            Err(FrameError::InvalidSync) | Err(FrameError::PayloadTooLarge { .. }) => {
                summary.resyncs += 1;
                let skipped = reader.resync();
                debug!(skipped, "lost envelope sync");
            }
            Err(err @ FrameError::ChecksumMismatch { .. }) => {
                summary.corrupt += 1;
                warn!(error = %err, "corrupt envelope dropped");
                if args.restart_on_error {
                    if let Err(err) = restart(&mut control, &mut reader, &mut tracker) {
                        break Err(err);
                    }
                    summary.restarts += 1;
                }
            }
            Err(FrameError::ConnectionClosed) => {
                info!("device closed the link");
                break Ok(());
            }
            Err(err) => break Err(frame_error("receive failed", err)),
        }
    };

    // The device may already be gone.
    let _ = send_command(&mut control, HostCommand::Stop);
    print_summary(&summary, format);
    result.map(|()| SUCCESS)
}

fn send_command(control: &mut HostStream, command: HostCommand) -> CliResult<()> {
    control
        .write_all(&[command.byte()])
        .and_then(|()| control.flush())
        .map_err(|err| io_error(&format!("sending {} failed", command.name()), err))
}

/// Stop, flush everything the device already sent, and start again from
/// sequence zero.
fn restart(
    control: &mut HostStream,
    reader: &mut EnvelopeReader<HostStream>,
    tracker: &mut SequenceTracker,
) -> CliResult<()> {
    send_command(control, HostCommand::Stop)?;
    let dropped = reader
        .drain_until_idle(SETTLE_IDLE, SETTLE_LIMIT)
        .map_err(|err| frame_error("flush failed", err))?;
    tracker.reset();
    send_command(control, HostCommand::Start)?;
    debug!(dropped, "stream restarted");
    Ok(())
}
