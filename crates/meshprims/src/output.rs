use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use meshprims_transport::{InboundFrame, Transport};
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
struct FrameOutput<'a> {
    interface: &'a str,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_frame(frame: &InboundFrame, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                interface: &frame.interface,
                payload_size: frame.payload.len(),
                payload: payload_preview(frame.payload.as_ref()),
                timestamp: now_unix_seconds(),
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
                .set_header(vec!["INTERFACE", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    frame.interface.clone(),
                    frame.payload.len().to_string(),
                    payload_preview(frame.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "interface={} size={} payload={}",
                frame.interface,
                frame.payload.len(),
                payload_preview(frame.payload.as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(frame.payload.as_ref());
        }
    }
}

#[derive(Serialize)]
struct InterfaceOutput<'a> {
    name: &'a str,
    kind: meshprims_transport::InterfaceKind,
    online: bool,
    mtu: usize,
    bitrate: u64,
    rx_bytes: u64,
    tx_bytes: u64,
}

/// Print a status summary of every interface.
pub fn print_interfaces(interfaces: &[Box<dyn Transport>], format: OutputFormat) {
    let rows: Vec<InterfaceOutput<'_>> = interfaces
        .iter()
        .map(|iface| {
            let state = iface.state();
            let stats = iface.stats();
            InterfaceOutput {
                name: state.name(),
                kind: state.kind(),
                online: state.is_online(),
                mtu: state.mtu(),
                bitrate: state.bitrate(),
                rx_bytes: stats.rx_bytes,
                tx_bytes: stats.tx_bytes,
            }
        })
        .collect();

    match format {
        OutputFormat::Json => {
            for row in &rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "KIND", "ONLINE", "RX", "TX"]);
            for row in &rows {
                table.add_row(vec![
                    row.name.to_string(),
                    row.kind.as_str().to_string(),
                    row.online.to_string(),
                    row.rx_bytes.to_string(),
                    row.tx_bytes.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                println!(
                    "{} kind={} online={} rx={} tx={}",
                    row.name,
                    row.kind.as_str(),
                    row.online,
                    row.rx_bytes,
                    row.tx_bytes
                );
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
