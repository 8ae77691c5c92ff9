use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sensorlink_frame::Envelope;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EnvelopeOutput<'a> {
    sequence: u8,
    kind: &'a str,
    payload_size: usize,
    checksum: String,
    lost_before: u8,
    timestamp: String,
}

pub fn print_envelope(envelope: &Envelope, kind: &str, lost_before: u8, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EnvelopeOutput {
                sequence: envelope.sequence,
                kind,
                payload_size: envelope.payload.len(),
                checksum: format!("{:#04x}", envelope.checksum),
                lost_before,
                timestamp: now_unix_millis(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "KIND", "SIZE", "CRC", "LOST"])
                .add_row(vec![
                    envelope.sequence.to_string(),
                    kind.to_string(),
                    envelope.payload.len().to_string(),
                    format!("{:#04x}", envelope.checksum),
                    lost_before.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "seq={} kind={} size={} crc={:#04x} lost={}",
                envelope.sequence,
                kind,
                envelope.payload.len(),
                envelope.checksum,
                lost_before
            );
        }
        OutputFormat::Raw => {
            print_raw(envelope.payload.as_ref());
        }
    }
}

/// A run summary made of named counters.
pub trait Summary: Serialize {
    const TITLE: &'static str;

    fn rows(&self) -> Vec<(&'static str, u64)>;
}

/// Print a summary as one record. `Raw` prints nothing, so raw payload
/// output stays clean.
pub fn print_summary<S: Summary>(summary: &S, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![S::TITLE.to_uppercase(), "COUNT".to_string()]);
            for (name, value) in summary.rows() {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = summary
                .rows()
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{}: {}", S::TITLE, fields.join(" "));
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
