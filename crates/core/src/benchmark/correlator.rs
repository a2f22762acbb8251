//! Offline join of the stage logs into per-record latencies.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::benchmark::event_log::{
    BenchmarkStage, EventLine, LineError, LineageLine, SummaryLine, LINEAGE_LOG, SUMMARY_LOG,
};

#[derive(Error, Debug)]
pub enum CorrelateError {
    #[error("need the capture log and at least one downstream log, got {0:?}")]
    TooFewLogs(Vec<BenchmarkStage>),
    #[error("{0} log given more than once")]
    RepeatedLog(BenchmarkStage),
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line_no}: {source}")]
    Malformed {
        path: PathBuf,
        line_no: usize,
        #[source]
        source: LineError,
    },
    #[error("id {id} appears more than once in the {stage} log")]
    Duplicate { stage: BenchmarkStage, id: String },
    #[error("record {id} has more than one lineage line")]
    DuplicateLineage { id: String },
}

/// What to do when one log holds the same id twice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    #[default]
    FirstWins,
    LastWins,
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-wins" => Ok(DuplicatePolicy::FirstWins),
            "last-wins" => Ok(DuplicatePolicy::LastWins),
            "reject" => Ok(DuplicatePolicy::Reject),
            other => Err(format!(
                "unknown duplicate policy `{other}` (expected first-wins, last-wins or reject)"
            )),
        }
    }
}

/// Joined timestamps of one record lineage.
///
/// `record_id` is the recognised face and `parent_id` the frame it was cut
/// from. Entries for frame-keyed logs carry the frame id in both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkEntry {
    pub record_id: String,
    pub parent_id: String,
    pub capture_ts: u64,
    pub detect_ts: Option<u64>,
    pub recognise_ts: Option<u64>,
}

impl BenchmarkEntry {
    pub fn detect_latency(&self) -> Option<u64> {
        self.detect_ts.map(|d| d - self.capture_ts)
    }

    pub fn recognise_latency(&self) -> Option<u64> {
        Some(self.recognise_ts? - self.detect_ts?)
    }

    pub fn end_to_end_latency(&self) -> Option<u64> {
        self.recognise_ts
            .or(self.detect_ts)
            .map(|last| last - self.capture_ts)
    }

    /// Summary line when all three stages are present.
    pub fn to_summary(&self) -> Option<SummaryLine> {
        Some(SummaryLine {
            parent_id: self.parent_id.clone(),
            capture_ts: self.capture_ts,
            detect_ts: self.detect_ts?,
            recognise_ts: self.recognise_ts?,
        })
    }
}

/// An id whose later stage is stamped before its earlier one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkewedEntry {
    pub id: String,
    pub earlier: BenchmarkStage,
    pub later: BenchmarkStage,
    pub earlier_ts: u64,
    pub later_ts: u64,
}

impl fmt::Display for SkewedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} at {} precedes {} at {}",
            self.id, self.later, self.later_ts, self.earlier, self.earlier_ts
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LatencyStats {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

impl LatencyStats {
    pub fn from_values(values: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut stats: Option<Self> = None;
        let mut total = 0u128;
        for v in values {
            total += v as u128;
            let s = stats.get_or_insert(Self {
                count: 0,
                min: v,
                max: v,
                mean: 0.0,
            });
            s.count += 1;
            s.min = s.min.min(v);
            s.max = s.max.max(v);
        }
        stats.map(|mut s| {
            s.mean = total as f64 / s.count as f64;
            s
        })
    }
}

/// Outcome of one correlation run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Correlation {
    /// Complete entries ordered by `(capture_ts, id)`.
    pub entries: Vec<BenchmarkEntry>,
    /// Ids missing from at least one of the given logs, sorted.
    pub incomplete: Vec<String>,
    /// Ids excluded because their timestamps run backwards.
    pub skewed: Vec<SkewedEntry>,
}

impl Correlation {
    pub fn detect_stats(&self) -> Option<LatencyStats> {
        LatencyStats::from_values(self.entries.iter().filter_map(|e| e.detect_latency()))
    }

    pub fn recognise_stats(&self) -> Option<LatencyStats> {
        LatencyStats::from_values(self.entries.iter().filter_map(|e| e.recognise_latency()))
    }

    pub fn end_to_end_stats(&self) -> Option<LatencyStats> {
        LatencyStats::from_values(self.entries.iter().filter_map(|e| e.end_to_end_latency()))
    }
}

pub struct Correlator {
    policy: DuplicatePolicy,
}

impl Correlator {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Joins in-memory logs whose records are all keyed by frame id. The
    /// capture log is required, plus at least one of detect and recognise.
    pub fn correlate(
        &self,
        logs: &[(BenchmarkStage, Vec<EventLine>)],
    ) -> Result<Correlation, CorrelateError> {
        self.correlate_with_lineage(logs, &[])
    }

    /// Joins logs where recognise lines may be keyed by child records.
    ///
    /// Each recognise id is resolved to its frame through `lineage` (ids
    /// without a lineage line are taken as frame ids) and yields one entry.
    /// Without a recognise log there is one entry per frame. Frames that no
    /// entry refers to are reported as incomplete.
    pub fn correlate_with_lineage(
        &self,
        logs: &[(BenchmarkStage, Vec<EventLine>)],
        lineage: &[LineageLine],
    ) -> Result<Correlation, CorrelateError> {
        let mut tables: BTreeMap<BenchmarkStage, HashMap<&str, u64>> = BTreeMap::new();
        for (stage, lines) in logs {
            if tables.contains_key(stage) {
                return Err(CorrelateError::RepeatedLog(*stage));
            }
            tables.insert(*stage, self.index(*stage, lines)?);
        }
        let given: Vec<BenchmarkStage> = tables.keys().copied().collect();
        let Some(capture) = tables.get(&BenchmarkStage::Capture) else {
            return Err(CorrelateError::TooFewLogs(given));
        };
        if tables.len() < 2 {
            return Err(CorrelateError::TooFewLogs(given));
        }
        let detect = tables.get(&BenchmarkStage::Detect);
        let recognise = tables.get(&BenchmarkStage::Recognise);
        let parents = self.index_lineage(lineage)?;

        let records: BTreeSet<&str> = match recognise {
            Some(table) => table.keys().copied().collect(),
            None => tables.values().flat_map(|t| t.keys().copied()).collect(),
        };
        let mut referenced: HashSet<&str> = HashSet::new();
        let mut incomplete: BTreeSet<&str> = BTreeSet::new();
        let mut result = Correlation::default();

        for record in records {
            let parent = parents.get(record).copied().unwrap_or(record);
            referenced.insert(parent);

            let detect_ts = match detect {
                Some(t) => match t.get(parent) {
                    Some(&ts) => Some(ts),
                    None => {
                        incomplete.insert(record);
                        continue;
                    }
                },
                None => None,
            };
            let Some(&capture_ts) = capture.get(parent) else {
                incomplete.insert(record);
                continue;
            };
            let recognise_ts = recognise.and_then(|t| t.get(record).copied());

            let chain = [
                (BenchmarkStage::Capture, Some(capture_ts)),
                (BenchmarkStage::Detect, detect_ts),
                (BenchmarkStage::Recognise, recognise_ts),
            ];
            let present: Vec<(BenchmarkStage, u64)> = chain
                .into_iter()
                .filter_map(|(stage, ts)| ts.map(|t| (stage, t)))
                .collect();
            if let Some(pair) = present.windows(2).find(|p| p[1].1 < p[0].1) {
                result.skewed.push(SkewedEntry {
                    id: record.to_string(),
                    earlier: pair[0].0,
                    later: pair[1].0,
                    earlier_ts: pair[0].1,
                    later_ts: pair[1].1,
                });
                continue;
            }

            result.entries.push(BenchmarkEntry {
                record_id: record.to_string(),
                parent_id: parent.to_string(),
                capture_ts,
                detect_ts,
                recognise_ts,
            });
        }

        // frames that never reached a downstream record
        for table in tables.values() {
            incomplete.extend(
                table
                    .keys()
                    .copied()
                    .filter(|id| !referenced.contains(id) && !parents.contains_key(id)),
            );
        }
        result.incomplete = incomplete.into_iter().map(str::to_string).collect();

        result
            .entries
            .sort_by(|a, b| (a.capture_ts, &a.record_id).cmp(&(b.capture_ts, &b.record_id)));
        for skew in &result.skewed {
            log::warn!("Clock skew, excluding {skew}");
        }
        if !result.incomplete.is_empty() {
            log::info!("{} ids missing from at least one log", result.incomplete.len());
        }
        Ok(result)
    }

    /// Reads the named log files and joins them, resolving face ids through
    /// the lineage file when one is given.
    pub fn correlate_files(
        &self,
        files: &[(BenchmarkStage, PathBuf)],
        lineage: Option<&Path>,
    ) -> Result<Correlation, CorrelateError> {
        let logs = files
            .iter()
            .map(|(stage, path)| Ok((*stage, read_event_log(path)?)))
            .collect::<Result<Vec<_>, CorrelateError>>()?;
        let lineage = match lineage {
            Some(path) => read_lineage_log(path)?,
            None => Vec::new(),
        };
        self.correlate_with_lineage(&logs, &lineage)
    }

    /// Joins whichever stage logs exist in `dir`, plus `lineage.log` if
    /// present.
    pub fn correlate_dir(&self, dir: &Path) -> Result<Correlation, CorrelateError> {
        let files: Vec<(BenchmarkStage, PathBuf)> = BenchmarkStage::ALL
            .into_iter()
            .map(|stage| (stage, dir.join(stage.file_name())))
            .filter(|(_, path)| path.is_file())
            .collect();
        let lineage = dir.join(LINEAGE_LOG);
        self.correlate_files(&files, lineage.is_file().then_some(lineage.as_path()))
    }

    fn index<'a>(
        &self,
        stage: BenchmarkStage,
        lines: &'a [EventLine],
    ) -> Result<HashMap<&'a str, u64>, CorrelateError> {
        let mut table = HashMap::with_capacity(lines.len());
        for line in lines {
            let id = line.id.as_str();
            match self.policy {
                DuplicatePolicy::FirstWins => {
                    table.entry(id).or_insert(line.timestamp);
                }
                DuplicatePolicy::LastWins => {
                    table.insert(id, line.timestamp);
                }
                DuplicatePolicy::Reject => {
                    if table.insert(id, line.timestamp).is_some() {
                        return Err(CorrelateError::Duplicate {
                            stage,
                            id: id.to_string(),
                        });
                    }
                }
            }
        }
        Ok(table)
    }

    /// A replayed lineage line is harmless; a face claimed by two frames is
    /// resolved by the duplicate policy.
    fn index_lineage<'a>(
        &self,
        lines: &'a [LineageLine],
    ) -> Result<HashMap<&'a str, &'a str>, CorrelateError> {
        let mut table: HashMap<&str, &str> = HashMap::with_capacity(lines.len());
        for line in lines {
            let (id, parent) = (line.record_id.as_str(), line.parent_id.as_str());
            let known = table.get(id).copied();
            match (self.policy, known) {
                (_, Some(known)) if known == parent => {}
                (_, None) | (DuplicatePolicy::LastWins, Some(_)) => {
                    table.insert(id, parent);
                }
                (DuplicatePolicy::FirstWins, Some(_)) => {}
                (DuplicatePolicy::Reject, Some(_)) => {
                    return Err(CorrelateError::DuplicateLineage { id: id.to_string() });
                }
            }
        }
        Ok(table)
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

fn read_lines<T>(path: &Path) -> Result<Vec<T>, CorrelateError>
where
    T: FromStr<Err = LineError>,
{
    let text = fs::read_to_string(path).map_err(|e| CorrelateError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            line.parse().map_err(|e| CorrelateError::Malformed {
                path: path.to_path_buf(),
                line_no: i + 1,
                source: e,
            })
        })
        .collect()
}

/// Parses a `<id>;<millis>` log. Blank lines are ignored.
pub fn read_event_log(path: &Path) -> Result<Vec<EventLine>, CorrelateError> {
    read_lines(path)
}

/// Parses a `<recordId>;<parentId>` lineage log.
pub fn read_lineage_log(path: &Path) -> Result<Vec<LineageLine>, CorrelateError> {
    read_lines(path)
}

/// Parses a summary log written by the recognition stage.
pub fn parse_summary_log(path: &Path) -> Result<Vec<SummaryLine>, CorrelateError> {
    read_lines(path)
}

/// Parses `summary.log` in `dir`.
pub fn read_summary_dir(dir: &Path) -> Result<Vec<SummaryLine>, CorrelateError> {
    parse_summary_log(&dir.join(SUMMARY_LOG))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ev(id: &str, ts: u64) -> EventLine {
        EventLine::new(id, ts)
    }

    fn three_logs() -> Vec<(BenchmarkStage, Vec<EventLine>)> {
        vec![
            (BenchmarkStage::Capture, vec![ev("A", 1000), ev("B", 900), ev("C", 950)]),
            (BenchmarkStage::Detect, vec![ev("A", 1450), ev("B", 1000), ev("C", 990)]),
            (BenchmarkStage::Recognise, vec![ev("A", 2100), ev("B", 1200)]),
        ]
    }

    #[test]
    fn test_latencies_for_single_record() {
        let logs = vec![
            (BenchmarkStage::Capture, vec![ev("A", 1000)]),
            (BenchmarkStage::Detect, vec![ev("A", 1450)]),
            (BenchmarkStage::Recognise, vec![ev("A", 2100)]),
        ];
        let c = Correlator::default().correlate(&logs).unwrap();
        assert_eq!(c.entries.len(), 1);
        let e = &c.entries[0];
        assert_eq!(e.detect_latency(), Some(450));
        assert_eq!(e.recognise_latency(), Some(650));
        assert_eq!(e.end_to_end_latency(), Some(1100));
        assert_eq!(e.record_id, e.parent_id);
    }

    #[test]
    fn test_entries_sorted_by_capture_and_incomplete_reported() {
        let c = Correlator::default().correlate(&three_logs()).unwrap();
        let ids: Vec<_> = c.entries.iter().map(|e| e.record_id.as_str()).collect();
        assert_eq!(ids, ["B", "A"]);
        assert_eq!(c.incomplete, ["C"]);
        assert!(c.skewed.is_empty());
    }

    #[test]
    fn test_two_logs_leave_missing_stage_empty() {
        let logs = vec![
            (BenchmarkStage::Capture, vec![ev("A", 1000)]),
            (BenchmarkStage::Recognise, vec![ev("A", 2100)]),
        ];
        let c = Correlator::default().correlate(&logs).unwrap();
        let e = &c.entries[0];
        assert_eq!(e.detect_ts, None);
        assert_eq!(e.recognise_latency(), None);
        assert_eq!(e.end_to_end_latency(), Some(1100));
        assert!(e.to_summary().is_none());
    }

    #[test]
    fn test_downstream_id_without_capture_is_incomplete() {
        let logs = vec![
            (BenchmarkStage::Capture, vec![ev("A", 1000)]),
            (BenchmarkStage::Detect, vec![ev("A", 1100), ev("Z", 1200)]),
        ];
        let c = Correlator::default().correlate(&logs).unwrap();
        assert_eq!(c.incomplete, ["Z"]);
    }

    #[test]
    fn test_clock_skew_excluded_and_reported() {
        let logs = vec![
            (BenchmarkStage::Capture, vec![ev("A", 1000), ev("B", 1000)]),
            (BenchmarkStage::Detect, vec![ev("A", 990), ev("B", 1010)]),
        ];
        let c = Correlator::default().correlate(&logs).unwrap();
        assert_eq!(c.entries.len(), 1);
        assert_eq!(c.skewed.len(), 1);
        assert_eq!(c.skewed[0].id, "A");
        assert_eq!(c.skewed[0].later, BenchmarkStage::Detect);
    }

    #[rstest]
    #[case(DuplicatePolicy::FirstWins, Some(450))]
    #[case(DuplicatePolicy::LastWins, Some(500))]
    #[case(DuplicatePolicy::Reject, None)]
    fn test_duplicate_policies(#[case] policy: DuplicatePolicy, #[case] expected: Option<u64>) {
        let logs = vec![
            (BenchmarkStage::Capture, vec![ev("A", 1000)]),
            (BenchmarkStage::Detect, vec![ev("A", 1450), ev("A", 1500)]),
        ];
        let result = Correlator::new(policy).correlate(&logs);
        match expected {
            Some(latency) => {
                assert_eq!(result.unwrap().entries[0].detect_latency(), Some(latency));
            }
            None => assert!(matches!(result, Err(CorrelateError::Duplicate { .. }))),
        }
    }

    #[test]
    fn test_needs_capture_and_one_more_log() {
        let only_capture = vec![(BenchmarkStage::Capture, vec![ev("A", 1)])];
        assert!(matches!(
            Correlator::default().correlate(&only_capture),
            Err(CorrelateError::TooFewLogs(_))
        ));
        let no_capture = vec![
            (BenchmarkStage::Detect, vec![ev("A", 1)]),
            (BenchmarkStage::Recognise, vec![ev("A", 2)]),
        ];
        assert!(matches!(
            Correlator::default().correlate(&no_capture),
            Err(CorrelateError::TooFewLogs(_))
        ));
    }

    #[test]
    fn test_rerun_is_identical() {
        let correlator = Correlator::default();
        let first = correlator.correlate(&three_logs()).unwrap();
        let second = correlator.correlate(&three_logs()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stats() {
        let c = Correlator::default().correlate(&three_logs()).unwrap();
        let detect = c.detect_stats().unwrap();
        assert_eq!((detect.count, detect.min, detect.max), (2, 100, 450));
        assert!((detect.mean - 275.0).abs() < 1e-9);
        assert!(LatencyStats::from_values(Vec::new()).is_none());
    }

    #[test]
    fn test_correlate_dir_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("capture.log"), "A;1000\n\nB;1100\n").unwrap();
        fs::write(dir.path().join("recognise.log"), "A;2100\nB;2000\n").unwrap();
        let c = Correlator::default().correlate_dir(dir.path()).unwrap();
        assert_eq!(c.entries.len(), 2);
        assert_eq!(c.entries[1].end_to_end_latency(), Some(900));
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.log");
        fs::write(&path, "A;1000\nB;later\n").unwrap();
        let err = read_event_log(&path).unwrap_err();
        assert!(matches!(err, CorrelateError::Malformed { line_no: 2, .. }));
    }

    #[test]
    fn test_parse_summary_log() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SUMMARY_LOG), "A;1000;1450;2100\n").unwrap();
        let lines = read_summary_dir(dir.path()).unwrap();
        assert_eq!(lines[0].end_to_end_latency(), 1100);
    }

    fn two_faces_one_frame() -> (Vec<(BenchmarkStage, Vec<EventLine>)>, Vec<LineageLine>) {
        let logs = vec![
            (BenchmarkStage::Capture, vec![ev("F1", 1000), ev("F2", 2000)]),
            (BenchmarkStage::Detect, vec![ev("F1", 1450), ev("F2", 2400)]),
            (
                BenchmarkStage::Recognise,
                vec![ev("a", 2100), ev("b", 2150), ev("c", 2900)],
            ),
        ];
        let lineage = vec![
            LineageLine::new("a", "F1"),
            LineageLine::new("b", "F1"),
            LineageLine::new("c", "F2"),
        ];
        (logs, lineage)
    }

    #[rstest]
    #[case(DuplicatePolicy::FirstWins)]
    #[case(DuplicatePolicy::LastWins)]
    #[case(DuplicatePolicy::Reject)]
    fn test_one_entry_per_face(#[case] policy: DuplicatePolicy) {
        let (logs, lineage) = two_faces_one_frame();
        let c = Correlator::new(policy)
            .correlate_with_lineage(&logs, &lineage)
            .unwrap();

        let rows: Vec<_> = c
            .entries
            .iter()
            .map(|e| (e.record_id.as_str(), e.parent_id.as_str(), e.recognise_latency()))
            .collect();
        assert_eq!(
            rows,
            [("a", "F1", Some(650)), ("b", "F1", Some(700)), ("c", "F2", Some(500))]
        );
        assert!(c.incomplete.is_empty());
    }

    #[test]
    fn test_frame_without_faces_is_incomplete() {
        let (mut logs, lineage) = two_faces_one_frame();
        logs[0].1.push(ev("F3", 3000));
        logs[1].1.push(ev("F3", 3300));
        let c = Correlator::default()
            .correlate_with_lineage(&logs, &lineage)
            .unwrap();
        assert_eq!(c.entries.len(), 3);
        assert_eq!(c.incomplete, ["F3"]);
    }

    #[test]
    fn test_face_claimed_by_two_frames() {
        let (logs, mut lineage) = two_faces_one_frame();
        lineage.push(LineageLine::new("a", "F2"));
        lineage.push(LineageLine::new("a", "F1"));

        let first = Correlator::new(DuplicatePolicy::FirstWins)
            .correlate_with_lineage(&logs, &lineage)
            .unwrap();
        assert_eq!(first.entries[0].parent_id, "F1");
        assert!(matches!(
            Correlator::new(DuplicatePolicy::Reject).correlate_with_lineage(&logs, &lineage),
            Err(CorrelateError::DuplicateLineage { .. })
        ));
    }

    #[test]
    fn test_correlate_dir_uses_lineage_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("capture.log"), "F1;1000\n").unwrap();
        fs::write(dir.path().join("detect.log"), "F1;1450\n").unwrap();
        fs::write(dir.path().join("recognise.log"), "a;2100\nb;2150\n").unwrap();
        fs::write(dir.path().join(LINEAGE_LOG), "a;F1\nb;F1\n").unwrap();

        let c = Correlator::new(DuplicatePolicy::Reject)
            .correlate_dir(dir.path())
            .unwrap();
        let ids: Vec<_> = c.entries.iter().map(|e| e.record_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(c.entries.iter().all(|e| e.parent_id == "F1"));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("last-wins".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::LastWins));
        assert!("newest".parse::<DuplicatePolicy>().is_err());
    }
}
