//! Decoding of `sadf -d` output into typed samples.
//!
//! `sadf -d` prints one `;`-separated record per line. Lines starting with `#`
//! are headers naming the columns of the records that follow; a single dump
//! may switch layouts several times (e.g. `-n SOCK,SOCK6`).

use std::collections::HashMap;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::clock::ReportZone;
use crate::metric::{
    CpuMode, Direction, IoDirection, IpFamily, LoadSpan, MemoryClass, MetricKind, Sample,
};

const KIB_PER_MIB: f64 = 1024.0;
const KB_PER_MEGABIT: f64 = 125.0;
const KB_PER_MB: f64 = 1000.0;
const SECTOR_BYTES: f64 = 512.0;
const BYTES_PER_MB: f64 = 1_000_000.0;

const RESTART_MARKER: &str = "LINUX-RESTART";
const COMMENT_MARKER: &str = "COM";
/// Interval field of restart and comment records.
const MARKER_INTERVAL: &str = "-1";
const INTERVAL_INDEX: usize = 1;
const MARKER_INDEX: usize = 3;
const DEFAULT_TIMESTAMP_INDEX: usize = 2;
const TEXT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors decoding a single record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("record before any header line")]
    MissingHeader,

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid timestamp {value:?}")]
    InvalidTimestamp { value: String },

    #[error("column {column}: invalid number {value:?}")]
    InvalidNumber { column: String, value: String },
}

/// Result of decoding one activity dump.
#[derive(Debug, Default)]
pub struct Decoded {
    pub samples: Vec<Sample>,
    pub corrupt_records: usize,
    /// First record-level error, kept for diagnostics.
    pub first_error: Option<ParseError>,
}

impl Decoded {
    fn record_error(&mut self, err: ParseError) {
        self.corrupt_records += 1;
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }
}

/// Activity recognised from a header's column set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Load,
    Cpu,
    Memory,
    Swap,
    Network,
    Disk,
    Sockets(IpFamily),
    Tcp,
    Filesystem,
    Unknown,
}

#[derive(Debug)]
struct Layout {
    activity: Activity,
    width: usize,
    timestamp: usize,
    columns: HashMap<String, usize>,
}

impl Layout {
    fn from_header(line: &str) -> Self {
        let names: Vec<&str> = line
            .trim_start_matches('#')
            .trim()
            .split(';')
            .map(str::trim)
            .collect();
        let columns: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| ((*name).to_string(), idx))
            .collect();

        let has = |name: &str| columns.contains_key(name);
        let activity = if has("ldavg-5") {
            Activity::Load
        } else if has("%user") && has("CPU") {
            Activity::Cpu
        } else if has("kbmemused") {
            Activity::Memory
        } else if has("kbswpused") {
            Activity::Swap
        } else if has("IFACE") && has("rxkB/s") {
            Activity::Network
        } else if has("DEV") && (has("rkB/s") || has("rd_sec/s")) {
            Activity::Disk
        } else if has("totsck") {
            Activity::Sockets(IpFamily::V4)
        } else if has("tcp6sck") {
            Activity::Sockets(IpFamily::V6)
        } else if has("active/s") {
            Activity::Tcp
        } else if has("%fsused") && (has("MOUNTPOINT") || has("FILESYSTEM")) {
            Activity::Filesystem
        } else {
            Activity::Unknown
        };

        Self {
            activity,
            width: names.len(),
            timestamp: columns
                .get("timestamp")
                .copied()
                .unwrap_or(DEFAULT_TIMESTAMP_INDEX),
            columns,
        }
    }

    fn index(&self, column: &str) -> Option<usize> {
        self.columns.get(column).copied()
    }
}

/// One data record bound to the layout it was printed under.
struct Record<'a> {
    layout: &'a Layout,
    fields: Vec<&'a str>,
}

impl Record<'_> {
    fn text(&self, column: &str) -> Option<&str> {
        self.layout.index(column).map(|idx| self.fields[idx])
    }

    /// Numeric value of `column`; `Ok(None)` when the column is absent.
    fn number(&self, column: &str) -> Result<Option<f64>, ParseError> {
        match self.text(column) {
            Some(raw) => parse_number(column, raw).map(Some),
            None => Ok(None),
        }
    }

    /// All of `columns` as a vector, or `None` if any is absent.
    fn numbers(&self, columns: &[&str]) -> Result<Option<Vec<f64>>, ParseError> {
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            match self.number(column)? {
                Some(value) => values.push(value),
                None => return Ok(None),
            }
        }
        Ok(Some(values))
    }
}

/// Decode `sadf -d` output, converting every timestamp into `zone`.
///
/// Malformed records are skipped and counted; they never abort decoding.
pub fn decode(text: &str, zone: &ReportZone) -> Decoded {
    let mut decoded = Decoded::default();
    let mut layout: Option<Layout> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with('#') {
            layout = Some(Layout::from_header(line));
            continue;
        }

        let fields: Vec<&str> = line.split(';').map(str::trim).collect();

        let is_marker_record = fields.get(INTERVAL_INDEX) == Some(&MARKER_INTERVAL);
        if let Some(marker) = fields.get(MARKER_INDEX).filter(|_| is_marker_record) {
            if marker.starts_with(RESTART_MARKER) {
                let ts_idx = layout
                    .as_ref()
                    .map_or(DEFAULT_TIMESTAMP_INDEX, |l| l.timestamp);
                match fields
                    .get(ts_idx)
                    .ok_or(ParseError::FieldCount {
                        expected: ts_idx + 1,
                        found: fields.len(),
                    })
                    .and_then(|raw| parse_timestamp(raw, zone))
                {
                    Ok(ts) => decoded
                        .samples
                        .push(Sample::scalar(ts, MetricKind::RebootEvent, 1.0)),
                    Err(e) => decoded.record_error(e),
                }
                continue;
            }
            if marker.starts_with(COMMENT_MARKER) {
                continue;
            }
        }

        let Some(layout) = layout.as_ref() else {
            decoded.record_error(ParseError::MissingHeader);
            continue;
        };

        if layout.activity == Activity::Unknown {
            continue;
        }

        if fields.len() != layout.width {
            decoded.record_error(ParseError::FieldCount {
                expected: layout.width,
                found: fields.len(),
            });
            continue;
        }

        let record = Record { layout, fields };
        match decode_record(&record, zone) {
            Ok(samples) => decoded.samples.extend(samples),
            Err(e) => decoded.record_error(e),
        }
    }

    decoded
}

fn decode_record(record: &Record<'_>, zone: &ReportZone) -> Result<Vec<Sample>, ParseError> {
    let raw_ts = record
        .fields
        .get(record.layout.timestamp)
        .ok_or(ParseError::FieldCount {
            expected: record.layout.timestamp + 1,
            found: record.fields.len(),
        })?;
    let ts = parse_timestamp(raw_ts, zone)?;
    let mut samples = Vec::new();

    match record.layout.activity {
        Activity::Load => {
            for span in LoadSpan::all() {
                if let Some(value) = record.number(span.as_str())? {
                    samples.push(Sample::scalar(ts, MetricKind::LoadAverage(*span), value));
                }
            }
        }
        Activity::Cpu => {
            // Only the all-CPU aggregate row is graphed.
            if !matches!(record.text("CPU"), Some("-1" | "all")) {
                return Ok(samples);
            }
            for mode in CpuMode::all() {
                if let Some(value) = record.number(mode.column())? {
                    samples.push(Sample::scalar(ts, MetricKind::CpuUsage(*mode), value));
                }
            }
        }
        Activity::Memory => {
            for class in MemoryClass::all() {
                if let Some(kb) = record.number(class.column())? {
                    samples.push(Sample::scalar(
                        ts,
                        MetricKind::MemoryUsed(*class),
                        kb / KIB_PER_MIB,
                    ));
                }
            }
        }
        Activity::Swap => {
            if let Some(kb) = record.number("kbswpused")? {
                samples.push(Sample::scalar(ts, MetricKind::SwapUsed, kb / KIB_PER_MIB));
            }
        }
        Activity::Network => {
            let interface = record.text("IFACE").unwrap_or_default().to_string();
            for (column, direction) in [("rxkB/s", Direction::Rx), ("txkB/s", Direction::Tx)] {
                if let Some(kbps) = record.number(column)? {
                    samples.push(Sample::scalar(
                        ts,
                        MetricKind::NetworkIo {
                            interface: interface.clone(),
                            direction,
                        },
                        kbps / KB_PER_MEGABIT,
                    ));
                }
            }
        }
        Activity::Disk => {
            let device = record.text("DEV").unwrap_or_default().to_string();
            let columns = [
                ("rkB/s", "rd_sec/s", IoDirection::Read),
                ("wkB/s", "wr_sec/s", IoDirection::Write),
            ];
            for (kb_column, sector_column, direction) in columns {
                let value = match record.number(kb_column)? {
                    Some(kbps) => Some(kbps / KB_PER_MB),
                    None => record
                        .number(sector_column)?
                        .map(|sectors| sectors * SECTOR_BYTES / BYTES_PER_MB),
                };
                if let Some(mbps) = value {
                    samples.push(Sample::scalar(
                        ts,
                        MetricKind::DiskIo {
                            device: device.clone(),
                            direction,
                        },
                        mbps,
                    ));
                }
            }
        }
        Activity::Sockets(family) => {
            let columns: &[&str] = match family {
                IpFamily::V4 => &["tcpsck", "udpsck", "rawsck"],
                IpFamily::V6 => &["tcp6sck", "udp6sck", "raw6sck"],
            };
            if let Some(values) = record.numbers(columns)? {
                samples.push(Sample::vector(ts, MetricKind::SocketCount(family), values));
            }
        }
        Activity::Tcp => {
            if let Some(values) = record.numbers(&["active/s", "passive/s"])? {
                samples.push(Sample::vector(ts, MetricKind::TcpStateTransition, values));
            }
        }
        Activity::Filesystem => {
            let mount = record
                .text("MOUNTPOINT")
                .or_else(|| record.text("FILESYSTEM"))
                .unwrap_or_default()
                .to_string();
            if let Some(pct) = record.number("%fsused")? {
                samples.push(Sample::scalar(
                    ts,
                    MetricKind::FilesystemUsage { mount },
                    pct,
                ));
            }
        }
        Activity::Unknown => {}
    }

    Ok(samples)
}

fn parse_number(column: &str, raw: &str) -> Result<f64, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        column: column.to_string(),
        value: raw.to_string(),
    };
    let value: f64 = raw.replace(',', ".").parse().map_err(|_| invalid())?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid())
    }
}

fn parse_timestamp(
    raw: &str,
    zone: &ReportZone,
) -> Result<chrono::DateTime<chrono::FixedOffset>, ParseError> {
    let invalid = || ParseError::InvalidTimestamp {
        value: raw.to_string(),
    };
    let raw = raw.trim();

    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = raw.parse().map_err(|_| invalid())?;
        return zone.from_epoch(secs).ok_or_else(invalid);
    }

    let text = raw.strip_suffix("UTC").map(str::trim_end).unwrap_or(raw);
    let naive = NaiveDateTime::parse_from_str(text, TEXT_TIMESTAMP_FORMAT).map_err(|_| invalid())?;
    Ok(zone.from_utc(&naive))
}
