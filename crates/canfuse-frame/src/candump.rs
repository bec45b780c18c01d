//! candump log format (`candump -L`).
//!
//! ```text
//! (1436509052.249713) can0 201#1FFF00C8FF9C2800
//! (1436509052.250001) can0 00001234#0102
//! ```
//!
//! Identifiers with three hex digits are standard, eight digits extended.
//! Remote (`#R`) and CAN FD (`##`) records are rejected.

use std::fmt::Write as _;
use std::io::BufRead;
use std::time::Duration;

use crate::codec::{BusFrame, PAYLOAD_LEN};
use crate::error::{FrameError, Result};
use crate::ids::{is_extended, EXTENDED_ID_MASK, STANDARD_ID_MAX};

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandumpRecord {
    /// Capture time since the epoch, when present.
    pub timestamp: Option<Duration>,
    /// Interface the frame was captured on.
    pub interface: String,
    pub frame: BusFrame,
}

/// Parse a single log line. `line_no` is only used for error messages.
pub fn parse_line(line: &str, line_no: usize) -> Result<CandumpRecord> {
    let err = |reason: &str| FrameError::Parse {
        line: line_no,
        reason: reason.to_string(),
    };

    let mut fields = line.split_whitespace();
    let mut field = fields.next().ok_or_else(|| err("empty line"))?;

    let timestamp = if let Some(stamp) = field.strip_prefix('(') {
        let stamp = stamp
            .strip_suffix(')')
            .ok_or_else(|| err("unterminated timestamp"))?;
        field = fields.next().ok_or_else(|| err("missing interface"))?;
        Some(parse_timestamp(stamp).ok_or_else(|| err("invalid timestamp"))?)
    } else {
        None
    };

    let interface = field.to_string();
    let record = fields.next().ok_or_else(|| err("missing frame"))?;
    if fields.next().is_some() {
        return Err(err("trailing fields"));
    }

    let (id_hex, data_hex) = record
        .split_once('#')
        .ok_or_else(|| err("frame has no '#' separator"))?;
    if data_hex.starts_with('#') {
        return Err(err("CAN FD frames are not supported"));
    }
    if data_hex.starts_with('R') || data_hex.starts_with('r') {
        return Err(err("remote frames are not supported"));
    }

    let id = match id_hex.len() {
        3 => u32::from_str_radix(id_hex, 16)
            .ok()
            .filter(|id| *id <= STANDARD_ID_MAX),
        8 => u32::from_str_radix(id_hex, 16)
            .ok()
            .filter(|id| *id <= EXTENDED_ID_MASK),
        _ => None,
    }
    .ok_or_else(|| err("invalid identifier"))?;

    let payload = parse_hex(data_hex).ok_or_else(|| err("invalid payload hex"))?;
    let frame = BusFrame::from_slice(id, &payload).map_err(|_| err("payload exceeds 8 bytes"))?;

    Ok(CandumpRecord {
        timestamp,
        interface,
        frame,
    })
}

/// Parse every non-blank, non-comment (`#`) line of a log.
pub fn parse_log<R: BufRead>(reader: R) -> Result<Vec<CandumpRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        records.push(parse_line(trimmed, idx + 1)?);
    }
    Ok(records)
}

/// Format a frame as a log line, always with the full 8-byte payload.
pub fn format_frame(interface: &str, frame: &BusFrame, timestamp: Option<Duration>) -> String {
    let mut out = String::with_capacity(48);
    if let Some(ts) = timestamp {
        let _ = write!(out, "({}.{:06}) ", ts.as_secs(), ts.subsec_micros());
    }
    out.push_str(interface);
    out.push(' ');
    if is_extended(frame.id) {
        let _ = write!(out, "{:08X}#", frame.id & EXTENDED_ID_MASK);
    } else {
        let _ = write!(out, "{:03X}#", frame.id);
    }
    for byte in frame.data {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

fn parse_timestamp(stamp: &str) -> Option<Duration> {
    let (secs, frac) = stamp.split_once('.').unwrap_or((stamp, ""));
    let secs: u64 = secs.parse().ok()?;
    if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos = if frac.is_empty() {
        0
    } else {
        frac.parse::<u32>().ok()? * 10u32.pow(9 - frac.len() as u32)
    };
    Some(Duration::new(secs, nanos))
}

fn parse_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || hex.len() > PAYLOAD_LEN * 2 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}
