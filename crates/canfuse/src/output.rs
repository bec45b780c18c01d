use std::io::IsTerminal;

use canfuse_core::{ActuatorSnapshot, ImuState, Registry};
use canfuse_frame::candump::format_frame;
use canfuse_frame::ids::id_name;
use canfuse_frame::BusFrame;
use canfuse_session::ReceiveStats;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
pub struct StateReport<'a> {
    pub bus: &'a str,
    pub actuators: Vec<ActuatorSnapshot>,
    pub imus: Vec<ImuReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsReport>,
}

#[derive(Serialize)]
pub struct ImuReport {
    pub name: String,
    pub base_id: u32,
    #[serde(flatten)]
    pub state: ImuState,
}

#[derive(Serialize)]
pub struct StatsReport {
    pub frames: u64,
    pub applied: u64,
    pub implausible: u64,
    pub unrecognized: u64,
    pub rejected: u64,
}

impl From<ReceiveStats> for StatsReport {
    fn from(stats: ReceiveStats) -> Self {
        Self {
            frames: stats.frames,
            applied: stats.applied,
            implausible: stats.implausible,
            unrecognized: stats.unrecognized,
            rejected: stats.rejected,
        }
    }
}

impl<'a> StateReport<'a> {
    pub fn capture(bus: &'a str, registry: &Registry, stats: Option<ReceiveStats>) -> Self {
        Self {
            bus,
            actuators: registry.snapshot(),
            imus: registry
                .imus()
                .map(|imu| ImuReport {
                    name: imu.name().to_string(),
                    base_id: imu.base_id(),
                    state: imu.state(),
                })
                .collect(),
            stats: stats.map(StatsReport::from),
        }
    }
}

pub fn print_state(report: &StateReport<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            if !report.actuators.is_empty() {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec![
                        "ACTUATOR", "ADDRESS", "TYPE", "POS", "VEL", "EFFORT", "TEMP", "TURNS",
                        "SAMPLES",
                    ]);
                for actuator in &report.actuators {
                    table.add_row(vec![
                        actuator.name.clone(),
                        format!("{:#05x}", actuator.address),
                        actuator.type_name.clone(),
                        format!("{:.4}", actuator.pos),
                        format!("{:.4}", actuator.vel),
                        format!("{:.4}", actuator.effort),
                        format!("{:.0}", actuator.temp),
                        actuator.revolution_count.to_string(),
                        actuator.sample_seq.to_string(),
                    ]);
                }
                println!("{table}");
            }
            if !report.imus.is_empty() {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec![
                        "IMU",
                        "BASE",
                        "LINEAR ACC",
                        "ANGULAR VEL",
                        "ORIENTATION (w,x,y,z)",
                        "SAMPLES",
                    ]);
                for imu in &report.imus {
                    table.add_row(vec![
                        imu.name.clone(),
                        format!("{:#05x}", imu.base_id),
                        vector(&imu.state.linear_acc),
                        vector(&imu.state.angular_vel),
                        vector(&imu.state.orientation),
                        imu.state.samples.to_string(),
                    ]);
                }
                println!("{table}");
            }
            if let Some(stats) = &report.stats {
                println!("{}", stats_line(stats));
            }
        }
        OutputFormat::Pretty => {
            for actuator in &report.actuators {
                println!(
                    "{} addr={:#05x} type={} pos={:.4} vel={:.4} effort={:.4} temp={:.0}",
                    actuator.name,
                    actuator.address,
                    actuator.type_name,
                    actuator.pos,
                    actuator.vel,
                    actuator.effort,
                    actuator.temp
                );
            }
            for imu in &report.imus {
                println!(
                    "{} base={:#05x} acc={} gyro={} ori={} samples={}",
                    imu.name,
                    imu.base_id,
                    vector(&imu.state.linear_acc),
                    vector(&imu.state.angular_vel),
                    vector(&imu.state.orientation),
                    imu.state.samples
                );
            }
            if let Some(stats) = &report.stats {
                println!("{}", stats_line(stats));
            }
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    id: String,
    id_name: &'a str,
    data: String,
}

#[derive(Serialize)]
struct FramesOutput<'a> {
    interface: &'a str,
    frames: Vec<FrameOutput<'a>>,
}

pub fn print_frames(interface: &str, frames: &[BusFrame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FramesOutput {
                interface,
                frames: frames
                    .iter()
                    .map(|frame| FrameOutput {
                        id: format!("{:#05x}", frame.id),
                        id_name: id_name(frame.id),
                        data: hex(&frame.data),
                    })
                    .collect(),
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
                .set_header(vec!["ID", "NAME", "DATA"]);
            for frame in frames {
                table.add_row(vec![
                    format!("{:#05x}", frame.id),
                    id_name(frame.id).to_string(),
                    hex(&frame.data),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                println!("{}", format_frame(interface, frame, None));
            }
        }
    }
}

fn stats_line(stats: &StatsReport) -> String {
    format!(
        "frames={} applied={} implausible={} unrecognized={} rejected={}",
        stats.frames, stats.applied, stats.implausible, stats.unrecognized, stats.rejected
    )
}

fn vector(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|value| format!("{value:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|byte| format!("{byte:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_uppercase_without_separators() {
        assert_eq!(hex(&[0x00, 0xAB, 0x1F]), "00AB1F");
    }

    #[test]
    fn vector_formatting() {
        assert_eq!(vector(&[1.0, -0.5]), "[1.0000, -0.5000]");
    }
}
