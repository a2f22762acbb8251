use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for runner events: progress, per-stage timings and metrics.
///
/// Benchmark lines are written by the stages themselves; this is the
/// operator-facing view of the same run.
pub trait PipelineLogger: Send {
    /// Report frame-level progress. `total` is 0 for an unbounded run.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took for one record.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-run report. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Keeps every sample for an end-of-run report and logs progress every
/// `throttle_frames` frames through `log`.
pub struct ReportingPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<String, Vec<f64>>,
    started: Instant,
    frames: usize,
    messages: Vec<String>,
}

impl ReportingPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames: 0,
            messages: Vec::new(),
        }
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(Vec::as_slice)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(Vec::as_slice)
    }

    /// Multi-line report, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!("Run summary ({} frames, {elapsed:.1}s):", self.frames)];
        for (stage, samples) in &self.timings {
            let max_ms = samples.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:10} n={:<5} avg {:7.1}ms  max {max_ms:7.1}ms",
                samples.len(),
                mean(samples)
            ));
        }
        for (name, samples) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1} over {}", mean(samples), samples.len()));
        }
        if self.frames > 0 && elapsed > 0.0 {
            lines.push(format!("  Throughput: {:.2} fps", self.frames as f64 / elapsed));
        }
        Some(lines.join("\n"))
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

impl Default for ReportingPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for ReportingPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames = current;
        if current % self.throttle_frames != 0 && current != total {
            return;
        }
        if total == 0 {
            log::info!("Processed {current} frames");
        } else {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processed {current}/{total} frames ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.entry(stage.to_owned()).or_default().push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_owned()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
        self.messages.push(message.to_owned());
    }

    fn summary(&self) {
        if let Some(report) = self.summary_string() {
            log::info!("\n{report}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 0);
        logger.timing("detect", 5.0);
        logger.metric("faces_per_frame", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = ReportingPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("recognise", 5.0);

        assert_eq!(logger.timings_for("detect").unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.timings_for("recognise").unwrap(), &[5.0]);
        assert!(logger.timings_for("capture").is_none());
    }

    #[test]
    fn test_metric_average_in_summary() {
        let mut logger = ReportingPipelineLogger::new(10);
        logger.progress(5, 0);
        logger.metric("faces_per_frame", 3.0);
        logger.metric("faces_per_frame", 4.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("faces_per_frame"));
        assert!(summary.contains("avg 3.5"));
    }

    #[test]
    fn test_summary_lists_stages() {
        let mut logger = ReportingPipelineLogger::new(10);
        logger.progress(10, 10);
        logger.timing("normalize", 2.0);
        logger.timing("detect", 20.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Run summary (10 frames"));
        let detect = summary.find("detect").unwrap();
        let normalize = summary.find("normalize").unwrap();
        assert!(detect < normalize);
        assert!(summary.contains("fps"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        let logger = ReportingPipelineLogger::new(10);
        assert!(logger.summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_frames_for_unbounded_runs() {
        let mut logger = ReportingPipelineLogger::new(10);
        for i in 1..=23 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.frames, 23);
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = ReportingPipelineLogger::new(10);
        logger.info("classifier ready");
        assert_eq!(logger.messages, vec!["classifier ready".to_string()]);
    }

    #[test]
    fn test_zero_throttle_is_clamped() {
        assert_eq!(ReportingPipelineLogger::new(0).throttle_frames, 1);
        assert_eq!(ReportingPipelineLogger::default().throttle_frames, 10);
    }
}
