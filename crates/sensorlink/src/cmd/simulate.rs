use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sensorlink_capture::{
    CaptureSnapshot, CaptureStateMachine, FrameBufferPair, ImageGeometry, RadarAdapter,
    SAMPLE_WIDTH,
};
use sensorlink_stream::{StreamConfig, StreamError, StreamMultiplexer, StreamStats};
use sensorlink_transport::{TransportError, UnixDomainSocket};
use serde::Serialize;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, SimulateArgs};
use crate::exit::{
    capture_error, io_error, stream_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS,
};
use crate::output::{print_summary, OutputFormat, Summary};
use crate::sim::{spawn_camera, spawn_radar_clock, CameraConfig, SimulatedRadar};

/// Counters printed when the simulated device shuts down.
#[derive(Debug, Serialize)]
struct SimulateSummary {
    frames_generated: u64,
    frames_completed: u64,
    frames_malformed: u64,
    frames_overwritten: u64,
    frames_deferred: u64,
    iterations: u64,
    commands: u64,
    images_sent: u64,
    radar_sent: u64,
    not_streaming: u64,
    transmit_failures: u64,
    drain_failures: u64,
}

impl SimulateSummary {
    fn new(generated: u64, capture: CaptureSnapshot, stream: StreamStats) -> Self {
        Self {
            frames_generated: generated,
            frames_completed: capture.completed,
            frames_malformed: capture.malformed,
            frames_overwritten: capture.overwritten,
            frames_deferred: capture.deferred,
            iterations: stream.iterations,
            commands: stream.commands,
            images_sent: stream.images_sent,
            radar_sent: stream.radar_sent,
            not_streaming: stream.not_streaming,
            transmit_failures: stream.transmit_failures,
            drain_failures: stream.drain_failures,
        }
    }
}

impl Summary for SimulateSummary {
    const TITLE: &'static str = "device";

    fn rows(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("frames_generated", self.frames_generated),
            ("frames_completed", self.frames_completed),
            ("frames_malformed", self.frames_malformed),
            ("frames_overwritten", self.frames_overwritten),
            ("frames_deferred", self.frames_deferred),
            ("iterations", self.iterations),
            ("commands", self.commands),
            ("images_sent", self.images_sent),
            ("radar_sent", self.radar_sent),
            ("not_streaming", self.not_streaming),
            ("transmit_failures", self.transmit_failures),
            ("drain_failures", self.drain_failures),
        ]
    }
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let geometry = ImageGeometry {
        width: args.width,
        height: args.height,
        bytes_per_pixel: args.bytes_per_pixel,
        lines_per_frame: args.lines_per_frame,
    };
    geometry
        .validate()
        .map_err(|err| capture_error("invalid geometry", err))?;
    let write_timeout = parse_duration(&args.write_timeout)?;

    let config = StreamConfig {
        write_timeout,
        max_payload_size: geometry
            .frame_size()
            .max(args.radar_samples.saturating_mul(SAMPLE_WIDTH)),
        radar_samples_per_frame: args.radar_samples,
        idle_backoff: Duration::from_millis(1),
    };

    let (producer, frames) = FrameBufferPair::new(geometry.frame_size()).split();
    let machine = CaptureStateMachine::new(producer, geometry)
        .map_err(|err| capture_error("capture setup failed", err))?;
    let capture_stats = machine.stats();
    let radar = SimulatedRadar::new(args.radar_samples);
    let radar_latch = radar.latch();

    let endpoint =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let link = endpoint
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    let mut mux = StreamMultiplexer::new(link, frames, RadarAdapter::new(radar), config)
        .map_err(|err| stream_error("main loop setup failed", err))?;

    info!(
        frame_size = geometry.frame_size(),
        lines = geometry.lines_per_frame,
        radar_samples = args.radar_samples,
        fps = args.fps,
        radar_hz = args.radar_hz,
        "simulated sensors starting"
    );
    let camera = spawn_camera(
        machine,
        CameraConfig {
            frame_interval: Duration::from_secs(1) / args.fps,
            malformed_every: args.malformed_every,
        },
        Arc::clone(&running),
    )
    .map_err(|err| io_error("camera thread failed", err))?;
    let radar_clock = spawn_radar_clock(
        radar_latch,
        Duration::from_secs(1) / args.radar_hz,
        Arc::clone(&running),
    )
    .map_err(|err| io_error("radar thread failed", err))?;

    let outcome = mux.run(&running);
    running.store(false, Ordering::SeqCst);

    let generated = camera
        .join()
        .map_err(|_| CliError::new(INTERNAL, "camera thread panicked"))?;
    radar_clock
        .join()
        .map_err(|_| CliError::new(INTERNAL, "radar thread panicked"))?;

    let stream_stats = match outcome {
        Ok(stats) => stats,
        Err(StreamError::Transport(TransportError::Closed)) => {
            info!("host detached");
            mux.stats()
        }
        Err(err) => return Err(stream_error("main loop failed", err)),
    };

    print_summary(
        &SimulateSummary::new(generated, capture_stats.snapshot(), stream_stats),
        format,
    );
    Ok(SUCCESS)
}
