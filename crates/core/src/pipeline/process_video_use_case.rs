use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{FixedOffset, Offset, Utc};
use tempfile::NamedTempFile;

use crate::attendance::domain::attendance_date::civil_today;
use crate::attendance::domain::ledger::{LedgerBackend, LedgerKey};
use crate::attendance::domain::ledger_merger::{AttendanceLedgerMerger, MergeOutcome};
use crate::attendance::infrastructure::ledger_locks::LedgerLocks;
use crate::jobs::domain::media_store::MediaStore;
use crate::jobs::domain::record_store::RecordStore;
use crate::jobs::domain::video_job::VideoJob;
use crate::pipeline::job_logger::JobLogger;
use crate::pipeline::processing_stats::ProcessingStats;
use crate::pipeline::scan_executor::{ScanExecutor, ScanSummary};
use crate::recognition::domain::detection_aggregator::DetectionAggregator;
use crate::recognition::domain::embedding_gallery::EmbeddingGallery;
use crate::recognition::domain::face_matcher::FaceMatcher;
use crate::sampling::frame_sampler::FrameSampler;
use crate::shared::config::{ConfigError, ServiceConfig};
use crate::shared::constants::{DEFAULT_SCAN_BUDGET_SECS, DEFAULT_UTC_OFFSET_MINUTES};
use crate::video::domain::frame_source::FrameSource;

/// Builds a fresh, unopened frame source for each job.
pub type FrameSourceFactory = Arc<dyn Fn() -> Box<dyn FrameSource> + Send + Sync>;

/// The stores and shared state every job touches.
#[derive(Clone)]
pub struct JobServices {
    pub records: Arc<dyn RecordStore>,
    pub media: Arc<dyn MediaStore>,
    pub ledgers: Arc<dyn LedgerBackend>,
    pub locks: Arc<LedgerLocks>,
    pub stats: Arc<ProcessingStats>,
}

#[derive(Clone, Debug)]
pub struct ScanSettings {
    pub sampler: FrameSampler,
    pub budget: Duration,
    /// Civil timezone the attendance date is taken in.
    pub timezone: FixedOffset,
}

impl ScanSettings {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            sampler: config.sampler(),
            budget: config.scan_budget(),
            timezone: config.timezone()?,
        })
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            sampler: FrameSampler::default(),
            budget: Duration::from_secs(DEFAULT_SCAN_BUDGET_SECS),
            timezone: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// Milestones a job passed, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStage {
    Fetched,
    Sampled,
    Matched,
    Merged,
    Cleaned,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MergeStatus {
    Merged(MergeOutcome),
    /// Nobody in the batch has an enrolled embedding, so nothing was scanned.
    SkippedEmptyGallery,
    /// The batch's enrollments could not be read.
    Skipped(String),
    Failed(String),
}

/// What happened to one job.
#[derive(Clone, Debug)]
pub struct JobReport {
    pub job_id: String,
    pub ledger: LedgerKey,
    /// Date the detections were merged under, if a merge was attempted.
    pub date: Option<String>,
    pub detected: BTreeSet<String>,
    pub stages: Vec<JobStage>,
    pub scan: Option<ScanSummary>,
    /// Fetch or open failure that cut the scan short before it began.
    pub processing_error: Option<String>,
    pub merge: MergeStatus,
    pub cleanup_failures: Vec<String>,
    pub elapsed: Duration,
}

impl JobReport {
    fn new(job: &VideoJob) -> Self {
        Self {
            job_id: job.id.clone(),
            ledger: job.ledger_key(),
            date: None,
            detected: BTreeSet::new(),
            stages: Vec::new(),
            scan: None,
            processing_error: None,
            merge: MergeStatus::SkippedEmptyGallery,
            cleanup_failures: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Report for a job whose processing panicked. The job's cleanup has
    /// already run while unwinding.
    pub fn panicked(job: &VideoJob, message: &str) -> Self {
        let mut report = Self::new(job);
        report.processing_error = Some(format!("processing panicked: {message}"));
        report.merge = MergeStatus::Failed(format!("processing panicked: {message}"));
        report
    }

    pub fn reached(&self, stage: JobStage) -> bool {
        self.stages.contains(&stage)
    }

    /// True when attendance was recorded (or there was nothing to record)
    /// and every cleanup step succeeded.
    pub fn is_clean(&self) -> bool {
        matches!(
            self.merge,
            MergeStatus::Merged(_) | MergeStatus::SkippedEmptyGallery
        ) && self.processing_error.is_none()
            && !matches!(&self.scan, Some(scan) if scan.stop.is_failure())
            && self.cleanup_failures.is_empty()
    }
}

/// Turns one claimed video job into attendance marks.
///
/// Fetch → sample → match → merge → cleanup. A failure while fetching or
/// scanning still merges whatever was detected before it; cleanup of the
/// remote media and the job record runs whatever happened before it.
pub struct ProcessVideoUseCase {
    services: JobServices,
    settings: ScanSettings,
    frame_sources: FrameSourceFactory,
    executor: Box<dyn ScanExecutor>,
    merger: AttendanceLedgerMerger,
}

impl ProcessVideoUseCase {
    pub fn new(
        services: JobServices,
        settings: ScanSettings,
        frame_sources: FrameSourceFactory,
        executor: Box<dyn ScanExecutor>,
    ) -> Self {
        Self {
            services,
            settings,
            frame_sources,
            executor,
            merger: AttendanceLedgerMerger::new(),
        }
    }

    pub fn services(&self) -> &JobServices {
        &self.services
    }

    /// Processes `job`, recording attendance under today's civil date.
    pub fn execute(
        &self,
        job: &VideoJob,
        matcher: &mut FaceMatcher,
        logger: &mut dyn JobLogger,
    ) -> JobReport {
        self.run(job, None, matcher, logger)
    }

    /// Processes `job`, recording attendance under `date`.
    pub fn execute_for_date(
        &self,
        job: &VideoJob,
        date: &str,
        matcher: &mut FaceMatcher,
        logger: &mut dyn JobLogger,
    ) -> JobReport {
        self.run(job, Some(date), matcher, logger)
    }

    /// Merges `detected` into the ledger for `key` while holding that
    /// ledger's lock.
    pub fn merge_detections(
        &self,
        key: &LedgerKey,
        date: &str,
        detected: &BTreeSet<String>,
    ) -> MergeStatus {
        let lock = self.services.locks.lock_for(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let result = self
            .services
            .ledgers
            .open_sheet(key)
            .and_then(|mut sheet| self.merger.merge(sheet.as_mut(), date, detected));

        match result {
            Ok(outcome) => {
                log::info!(
                    "Recorded {date} for {key}: {} present, {} absent, {} new rolls",
                    outcome.present,
                    outcome.absent,
                    outcome.appended_rolls.len()
                );
                MergeStatus::Merged(outcome)
            }
            Err(e) => {
                log::error!("Failed to record {date} for {key}: {e}");
                MergeStatus::Failed(e.to_string())
            }
        }
    }

    fn run(
        &self,
        job: &VideoJob,
        date: Option<&str>,
        matcher: &mut FaceMatcher,
        logger: &mut dyn JobLogger,
    ) -> JobReport {
        let started = Instant::now();
        let mut report = JobReport::new(job);
        let mut cleanup = JobCleanup::new(&*self.services.media, &*self.services.records, job);

        match self.services.records.find_students(&job.batch) {
            Err(e) => {
                log::error!("Could not load enrollments for batch {}: {e}", job.batch);
                report.merge = MergeStatus::Skipped(e.to_string());
            }
            Ok(students) => {
                let gallery = EmbeddingGallery::from_students(&students);
                if gallery.is_empty() {
                    logger.info(&format!(
                        "No enrolled faces for batch {}, nothing to scan",
                        job.batch
                    ));
                    report.merge = MergeStatus::SkippedEmptyGallery;
                } else {
                    logger.info(&format!(
                        "Scanning for {} students ({} embeddings)",
                        gallery.identity_count(),
                        gallery.len()
                    ));
                    let detected =
                        self.scan(job, matcher, &gallery, logger, &mut report, &mut cleanup);
                    report.detected = detected;

                    let date = date
                        .map(str::to_string)
                        .unwrap_or_else(|| civil_today(self.settings.timezone));
                    let merge_started = Instant::now();
                    let merge = self.merge_detections(&report.ledger, &date, &report.detected);
                    report.merge = merge;
                    logger.timing("merge", merge_started.elapsed().as_secs_f64() * 1000.0);
                    report.date = Some(date);
                    if let MergeStatus::Merged(_) = report.merge {
                        report.stages.push(JobStage::Merged);
                    } else {
                        self.services.stats.record_merge_failure();
                    }
                }
            }
        }

        report.cleanup_failures = cleanup.finish();
        for _ in &report.cleanup_failures {
            self.services.stats.record_cleanup_failure();
        }
        report.stages.push(JobStage::Cleaned);

        report.elapsed = started.elapsed();
        self.services.stats.record_job(report.elapsed);
        logger.summary();
        report
    }

    fn scan(
        &self,
        job: &VideoJob,
        matcher: &mut FaceMatcher,
        gallery: &EmbeddingGallery,
        logger: &mut dyn JobLogger,
        report: &mut JobReport,
        cleanup: &mut JobCleanup<'_>,
    ) -> BTreeSet<String> {
        let mut aggregator = DetectionAggregator::new();

        let fetch_started = Instant::now();
        let local_path = match self.fetch_local_copy(job) {
            Ok(local) => {
                let path = local.path().to_path_buf();
                cleanup.hold_local_copy(local);
                path
            }
            Err(e) => {
                log::error!("Job {}: could not fetch {}: {e}", job.id, job.media_ref);
                report.processing_error = Some(e);
                return aggregator.into_set();
            }
        };
        logger.timing("fetch", fetch_started.elapsed().as_secs_f64() * 1000.0);
        report.stages.push(JobStage::Fetched);

        let Some((source, plan)) = self.open_and_plan(job, local_path, logger, report) else {
            return aggregator.into_set();
        };
        report.stages.push(JobStage::Sampled);

        let summary = self.executor.execute(
            source,
            plan,
            matcher,
            gallery,
            &mut aggregator,
            self.settings.budget,
            logger,
        );
        logger.info(&format!(
            "Examined {}/{} sampled frames ({:?}), {} students detected",
            summary.frames_examined,
            summary.frames_planned,
            summary.stop,
            aggregator.len()
        ));
        report.stages.push(JobStage::Matched);
        report.scan = Some(summary);
        aggregator.into_set()
    }

    fn fetch_local_copy(&self, job: &VideoJob) -> Result<NamedTempFile, String> {
        let bytes = self
            .services
            .media
            .fetch(&job.media_ref)
            .map_err(|e| e.to_string())?;
        let mut local = tempfile::Builder::new()
            .prefix("clara-")
            .suffix(".mp4")
            .tempfile()
            .map_err(|e| format!("cannot create local copy: {e}"))?;
        local
            .write_all(&bytes)
            .and_then(|()| local.flush())
            .map_err(|e| format!("cannot write local copy: {e}"))?;
        Ok(local)
    }

    fn open_and_plan(
        &self,
        job: &VideoJob,
        path: PathBuf,
        logger: &mut dyn JobLogger,
        report: &mut JobReport,
    ) -> Option<(Box<dyn FrameSource>, Vec<usize>)> {
        let mut source = (self.frame_sources)();
        let metadata = match source.open(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                log::error!("Job {}: could not open video: {e}", job.id);
                report.processing_error = Some(format!("cannot open video: {e}"));
                source.close();
                return None;
            }
        };
        let plan = self
            .settings
            .sampler
            .plan(metadata.total_frames, metadata.fps);
        logger.info(&format!(
            "{} frames at {:.2} fps ({:.0}s), sampling {}",
            metadata.total_frames,
            metadata.fps,
            metadata.duration_secs(),
            plan.len()
        ));
        Some((source, plan))
    }
}

/// Deletes the job's local copy, remote media and record exactly once.
///
/// Runs from [`JobCleanup::finish`] on the normal path, and from `Drop`
/// if processing unwinds before reaching it. Each step runs even when an
/// earlier one fails.
struct JobCleanup<'a> {
    media: &'a dyn MediaStore,
    records: &'a dyn RecordStore,
    job_id: String,
    media_ref: String,
    local_copy: Option<NamedTempFile>,
    done: bool,
}

impl<'a> JobCleanup<'a> {
    fn new(media: &'a dyn MediaStore, records: &'a dyn RecordStore, job: &VideoJob) -> Self {
        Self {
            media,
            records,
            job_id: job.id.clone(),
            media_ref: job.media_ref.clone(),
            local_copy: None,
            done: false,
        }
    }

    fn hold_local_copy(&mut self, local: NamedTempFile) {
        self.local_copy = Some(local);
    }

    fn finish(mut self) -> Vec<String> {
        self.done = true;
        self.run()
    }

    fn run(&mut self) -> Vec<String> {
        let mut failures = Vec::new();
        if let Some(local) = self.local_copy.take() {
            if let Err(e) = local.close() {
                failures.push(format!("local copy: {e}"));
            }
        }
        if let Err(e) = self.media.delete(&self.media_ref) {
            failures.push(format!("media {}: {e}", self.media_ref));
        }
        if let Err(e) = self.records.delete_job(&self.job_id) {
            failures.push(format!("job record: {e}"));
        }
        for failure in &failures {
            log::warn!("Cleanup of job {} incomplete: {failure}", self.job_id);
        }
        failures
    }
}

impl Drop for JobCleanup<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            self.run();
        }
    }
}
