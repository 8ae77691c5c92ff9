#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/sensorlink-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

// The simulator serves a single host, so readiness is judged by the socket
// file rather than by a test connection.
fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        assert!(
            start.elapsed() < timeout,
            "socket {} never appeared",
            path.display()
        );
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("child status should be readable") {
            return status;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            panic!("child did not exit within {timeout:?}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_simulator(sock_path: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_sensorlink"))
        .args(["--log-level", "error", "--format", "json", "simulate"])
        .arg(sock_path)
        .args([
            "--width",
            "32",
            "--height",
            "8",
            "--lines-per-frame",
            "16",
            "--radar-samples",
            "64",
            "--fps",
            "50",
            "--radar-hz",
            "50",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("simulate command should start")
}

#[test]
fn monitor_receives_images_and_radar_from_simulator() {
    let dir = unique_temp_dir("stream");
    let sock_path = dir.join("device.sock");

    let mut device = spawn_simulator(&sock_path);
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let monitor = Command::new(env!("CARGO_BIN_EXE_sensorlink"))
        .args(["--log-level", "error", "--format", "json", "monitor"])
        .arg(&sock_path)
        .args([
            "--count",
            "10",
            "--timeout",
            "3s",
            "--image-bytes",
            "512",
            "--radar-samples",
            "64",
        ])
        .output()
        .expect("monitor command should run");

    let stdout = String::from_utf8_lossy(&monitor.stdout);
    assert!(
        monitor.status.success(),
        "monitor failed: {}",
        String::from_utf8_lossy(&monitor.stderr)
    );
    assert!(stdout.contains(r#""kind":"image""#), "stdout: {stdout}");
    assert!(stdout.contains(r#""kind":"radar""#), "stdout: {stdout}");
    assert!(!stdout.contains(r#""kind":"unknown""#), "stdout: {stdout}");

    let summary = stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find(|value| value.get("received").is_some())
        .expect("monitor should print a summary");
    assert_eq!(summary["received"], 10);
    assert_eq!(summary["corrupt"], 0);

    let status = wait_for_exit(&mut device, Duration::from_secs(5));
    assert!(status.success(), "simulator should exit cleanly on detach");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn first_envelope_after_start_has_sequence_zero() {
    let dir = unique_temp_dir("seq");
    let sock_path = dir.join("device.sock");

    let mut device = spawn_simulator(&sock_path);
    wait_for_socket(&sock_path, Duration::from_secs(3));

    let monitor = Command::new(env!("CARGO_BIN_EXE_sensorlink"))
        .args(["--log-level", "error", "--format", "json", "monitor"])
        .arg(&sock_path)
        .args(["--count", "1", "--image-bytes", "512", "--radar-samples", "64"])
        .output()
        .expect("monitor command should run");
    assert!(monitor.status.success());

    let stdout = String::from_utf8_lossy(&monitor.stdout);
    let first = stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find(|value| value.get("sequence").is_some())
        .expect("monitor should print an envelope");
    assert_eq!(first["sequence"], 0);
    assert_eq!(first["lost_before"], 0);

    wait_for_exit(&mut device, Duration::from_secs(5));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn monitor_without_device_is_transport_error() {
    let dir = unique_temp_dir("missing");
    let output = Command::new(env!("CARGO_BIN_EXE_sensorlink"))
        .args(["--log-level", "error", "monitor"])
        .arg(dir.join("absent.sock"))
        .output()
        .expect("monitor command should run");

    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn simulate_rejects_uneven_line_split() {
    let dir = unique_temp_dir("geometry");
    let sock_path = dir.join("device.sock");
    let output = Command::new(env!("CARGO_BIN_EXE_sensorlink"))
        .args(["--log-level", "error", "simulate"])
        .arg(&sock_path)
        .args([
            "--width",
            "3",
            "--height",
            "3",
            "--bytes-per-pixel",
            "1",
            "--lines-per-frame",
            "2",
        ])
        .output()
        .expect("simulate command should run");

    assert_eq!(output.status.code(), Some(64));
    assert!(!sock_path.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn simulate_rejects_overflowing_geometry() {
    let dir = unique_temp_dir("overflow");
    let width = usize::MAX.to_string();
    let output = Command::new(env!("CARGO_BIN_EXE_sensorlink"))
        .args(["--log-level", "error", "simulate"])
        .arg(dir.join("device.sock"))
        .args(["--width", width.as_str(), "--height", "2"])
        .output()
        .expect("simulate command should run");

    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_sensorlink"))
        .arg("version")
        .output()
        .expect("version command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("sensorlink {}", env!("CARGO_PKG_VERSION"))
    );
}
