use std::collections::BTreeMap;

/// Cross-cutting logger for video job events.
///
/// Keeps the orchestration code independent of where progress and timing
/// end up (log records, a test recorder, nothing at all).
pub trait JobLogger: Send {
    /// Report scan progress in sampled frames.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Add to a counter (e.g. faces matched in a frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-job summary. Default: no-op.
    fn summary(&self) {}
}

/// Logger that discards all events.
pub struct NullJobLogger;

impl JobLogger for NullJobLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Accumulated time spent in one job stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTime {
    pub calls: usize,
    pub total_ms: f64,
}

/// Logger that forwards to the `log` crate tagged with the job id.
///
/// Progress is logged once per tenth of the sampled frames. At completion
/// it writes a single line with the frames examined, the counters and the
/// time spent in each stage (fetch, match, merge).
pub struct LogJobLogger {
    job_id: String,
    stages: BTreeMap<String, StageTime>,
    counters: BTreeMap<String, f64>,
    examined: usize,
    sampled: usize,
    last_tenth: usize,
    messages: Vec<String>,
}

impl LogJobLogger {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            stages: BTreeMap::new(),
            counters: BTreeMap::new(),
            examined: 0,
            sampled: 0,
            last_tenth: 0,
            messages: Vec::new(),
        }
    }

    pub fn stage(&self, name: &str) -> Option<StageTime> {
        self.stages.get(name).copied()
    }

    pub fn counter(&self, name: &str) -> Option<f64> {
        self.counters.get(name).copied()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// One-line job summary, e.g.
    /// `Job j1: examined 3/5 frames, faces 2; fetch 12ms, match 3x avg 1.5ms`.
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "Job {}: examined {}/{} frames",
            self.job_id, self.examined, self.sampled
        );
        for (name, value) in &self.counters {
            line.push_str(&format!(", {name} {value}"));
        }
        let stages: Vec<String> = self
            .stages
            .iter()
            .map(|(name, time)| match time.calls {
                1 => format!("{name} {:.0}ms", time.total_ms),
                n => format!("{name} {n}x avg {:.1}ms", time.total_ms / n as f64),
            })
            .collect();
        if !stages.is_empty() {
            line.push_str("; ");
            line.push_str(&stages.join(", "));
        }
        line
    }
}

impl JobLogger for LogJobLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.examined = current;
        self.sampled = total;
        if total == 0 {
            return;
        }
        let tenth = current * 10 / total;
        if tenth > self.last_tenth {
            self.last_tenth = tenth;
            log::info!("Job {}: scanned {current}/{total} frames", self.job_id);
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        let time = self.stages.entry(stage.to_string()).or_default();
        time.calls += 1;
        time.total_ms += duration_ms;
    }

    fn metric(&mut self, name: &str, value: f64) {
        *self.counters.entry(name.to_string()).or_default() += value;
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("Job {}: {message}", self.job_id);
    }

    fn summary(&self) {
        log::info!("{}", self.summary_line());
    }
}
