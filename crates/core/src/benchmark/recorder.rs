use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use thiserror::Error;

use crate::benchmark::event_log::{
    BenchmarkStage, EventLine, LineageLine, SummaryLine, LINEAGE_LOG, SUMMARY_LOG,
};

/// Lines queued per log before `record` blocks on a slow disk.
pub const WRITER_QUEUE_CAPACITY: usize = 1024;

#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("cannot open benchmark log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for stage timestamp events.
///
/// Recording is best effort: implementations log failures and never hand
/// them back to the stage.
pub trait BenchmarkSink: Send + Sync {
    fn record(&self, stage: BenchmarkStage, line: EventLine);

    fn record_summary(&self, line: SummaryLine);

    fn record_lineage(&self, line: LineageLine);
}

/// Discards every event.
pub struct NullBenchmarkSink;

impl BenchmarkSink for NullBenchmarkSink {
    fn record(&self, _stage: BenchmarkStage, _line: EventLine) {}
    fn record_summary(&self, _line: SummaryLine) {}
    fn record_lineage(&self, _line: LineageLine) {}
}

/// Keeps events in memory, in arrival order.
#[derive(Default)]
pub struct MemoryBenchmarkSink {
    events: Mutex<Vec<(BenchmarkStage, EventLine)>>,
    summaries: Mutex<Vec<SummaryLine>>,
    lineage: Mutex<Vec<LineageLine>>,
}

impl MemoryBenchmarkSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self, stage: BenchmarkStage) -> Vec<EventLine> {
        self.events
            .lock()
            .map(|events| {
                events
                    .iter()
                    .filter(|(s, _)| *s == stage)
                    .map(|(_, line)| line.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn summaries(&self) -> Vec<SummaryLine> {
        self.summaries
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn lineage(&self) -> Vec<LineageLine> {
        self.lineage.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl BenchmarkSink for MemoryBenchmarkSink {
    fn record(&self, stage: BenchmarkStage, line: EventLine) {
        if let Ok(mut events) = self.events.lock() {
            events.push((stage, line));
        }
    }

    fn record_summary(&self, line: SummaryLine) {
        if let Ok(mut summaries) = self.summaries.lock() {
            summaries.push(line);
        }
    }

    fn record_lineage(&self, line: LineageLine) {
        if let Ok(mut lineage) = self.lineage.lock() {
            lineage.push(line);
        }
    }
}

/// Append-only log file owned by a single writer thread.
struct LogWriter {
    tx: Option<Sender<String>>,
    handle: Option<JoinHandle<()>>,
}

impl LogWriter {
    fn spawn(path: PathBuf) -> Result<Self, BenchmarkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BenchmarkError::Open {
                path: path.clone(),
                source: e,
            })?;
        let (tx, rx) = bounded::<String>(WRITER_QUEUE_CAPACITY);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let handle = thread::Builder::new()
            .name(format!("bench-{name}"))
            .spawn(move || write_lines(file, &path, rx.iter()))
            .map_err(|e| BenchmarkError::Open {
                path: PathBuf::from(&name),
                source: e,
            })?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    fn send(&self, line: String) {
        if let Some(tx) = &self.tx {
            if tx.send(line).is_err() {
                log::error!("Benchmark writer thread has stopped, dropping line");
            }
        }
    }
}

fn write_lines(mut file: File, path: &Path, lines: impl Iterator<Item = String>) {
    for line in lines {
        let result = writeln!(file, "{line}").and_then(|_| file.flush());
        if let Err(e) = result {
            log::error!("Failed to write benchmark line to {}: {e}", path.display());
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        // closing the channel ends the writer loop once it has drained
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Writes the three stage logs plus `summary.log` and `lineage.log` under
/// one directory, one writer thread per file.
///
/// Dropping the recorder flushes every queued line.
pub struct FileBenchmarkRecorder {
    dir: PathBuf,
    stages: HashMap<BenchmarkStage, LogWriter>,
    summary: LogWriter,
    lineage: LogWriter,
}

impl FileBenchmarkRecorder {
    pub fn create(dir: &Path) -> Result<Self, BenchmarkError> {
        fs::create_dir_all(dir).map_err(|e| BenchmarkError::Open {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let mut stages = HashMap::new();
        for stage in BenchmarkStage::ALL {
            stages.insert(stage, LogWriter::spawn(dir.join(stage.file_name()))?);
        }
        let summary = LogWriter::spawn(dir.join(SUMMARY_LOG))?;
        let lineage = LogWriter::spawn(dir.join(LINEAGE_LOG))?;
        log::info!("Benchmark logs in {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            stages,
            summary,
            lineage,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BenchmarkSink for FileBenchmarkRecorder {
    fn record(&self, stage: BenchmarkStage, line: EventLine) {
        if let Some(writer) = self.stages.get(&stage) {
            writer.send(line.to_string());
        }
    }

    fn record_summary(&self, line: SummaryLine) {
        self.summary.send(line.to_string());
    }

    fn record_lineage(&self, line: LineageLine) {
        self.lineage.send(line.to_string());
    }
}
