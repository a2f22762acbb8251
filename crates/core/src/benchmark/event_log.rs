//! Line formats of the benchmark logs.
//!
//! Stage logs hold `<id>;<unixMillis>` lines; the summary log holds
//! `<parentId>;<captureTs>;<detectTs>;<recogniseTs>` lines. Capture and
//! detect lines are keyed by frame id, recognise lines by face id, and the
//! lineage log maps each face back to its frame with `<faceId>;<parentId>`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const SUMMARY_LOG: &str = "summary.log";
pub const LINEAGE_LOG: &str = "lineage.log";

#[derive(Error, Debug, PartialEq)]
#[error("malformed benchmark line `{line}`: {reason}")]
pub struct LineError {
    pub line: String,
    pub reason: String,
}

fn line_error(line: &str, reason: impl Into<String>) -> LineError {
    LineError {
        line: line.to_string(),
        reason: reason.into(),
    }
}

/// Stage boundary that writes an event log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BenchmarkStage {
    Capture,
    Detect,
    Recognise,
}

impl BenchmarkStage {
    pub const ALL: [BenchmarkStage; 3] = [
        BenchmarkStage::Capture,
        BenchmarkStage::Detect,
        BenchmarkStage::Recognise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BenchmarkStage::Capture => "capture",
            BenchmarkStage::Detect => "detect",
            BenchmarkStage::Recognise => "recognise",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            BenchmarkStage::Capture => "capture.log",
            BenchmarkStage::Detect => "detect.log",
            BenchmarkStage::Recognise => "recognise.log",
        }
    }
}

impl fmt::Display for BenchmarkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventLine {
    pub id: String,
    pub timestamp: u64,
}

impl EventLine {
    pub fn new(id: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }
}

impl fmt::Display for EventLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.id, self.timestamp)
    }
}

impl FromStr for EventLine {
    type Err = LineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split(';').collect();
        let [id, ts] = fields[..] else {
            return Err(line_error(line, format!("expected 2 fields, got {}", fields.len())));
        };
        if id.is_empty() {
            return Err(line_error(line, "empty id"));
        }
        let timestamp = ts
            .parse()
            .map_err(|e| line_error(line, format!("bad timestamp: {e}")))?;
        Ok(Self::new(id, timestamp))
    }
}

/// Links a derived record to the record it was cut from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineageLine {
    pub record_id: String,
    pub parent_id: String,
}

impl LineageLine {
    pub fn new(record_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            parent_id: parent_id.into(),
        }
    }
}

impl fmt::Display for LineageLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.record_id, self.parent_id)
    }
}

impl FromStr for LineageLine {
    type Err = LineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split(';').collect();
        let [record, parent] = fields[..] else {
            return Err(line_error(line, format!("expected 2 fields, got {}", fields.len())));
        };
        if record.is_empty() || parent.is_empty() {
            return Err(line_error(line, "empty id"));
        }
        Ok(Self::new(record, parent))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryLine {
    pub parent_id: String,
    pub capture_ts: u64,
    pub detect_ts: u64,
    pub recognise_ts: u64,
}

impl SummaryLine {
    /// Capture to recognition, saturating at zero on clock skew.
    pub fn end_to_end_latency(&self) -> u64 {
        self.recognise_ts.saturating_sub(self.capture_ts)
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{}",
            self.parent_id, self.capture_ts, self.detect_ts, self.recognise_ts
        )
    }
}

impl FromStr for SummaryLine {
    type Err = LineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split(';').collect();
        let [parent, capture, detect, recognise] = fields[..] else {
            return Err(line_error(line, format!("expected 4 fields, got {}", fields.len())));
        };
        if parent.is_empty() {
            return Err(line_error(line, "empty parent id"));
        }
        let ts = |field: &str, name: &str| {
            field
                .parse::<u64>()
                .map_err(|e| line_error(line, format!("bad {name} timestamp: {e}")))
        };
        Ok(Self {
            parent_id: parent.to_string(),
            capture_ts: ts(capture, "capture")?,
            detect_ts: ts(detect, "detect")?,
            recognise_ts: ts(recognise, "recognise")?,
        })
    }
}
