use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::jobs::domain::store_error::StoreError;
use crate::jobs::domain::video_job::VideoJob;
use crate::pipeline::job_logger::LogJobLogger;
use crate::pipeline::process_video_use_case::{JobReport, ProcessVideoUseCase};
use crate::recognition::domain::face_matcher::FaceMatcher;

/// Builds one matcher (detector and encoder sessions) per worker.
pub type MatcherFactory =
    Arc<dyn Fn() -> Result<FaceMatcher, Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to claim pending jobs: {0}")]
    Claim(#[from] StoreError),
    #[error("failed to build face matcher: {0}")]
    Matcher(String),
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Claims every claimable job and processes them on a fixed worker pool.
///
/// Layout: `main [claim/feed] → workers [process]`
///
/// Each worker owns its matcher, so oracle sessions are never shared.
/// Jobs for different ledgers run fully in parallel; merges into the same
/// ledger are serialised by the use case's ledger locks.
///
/// A worker renews a job's lease when it takes the job off the queue and
/// skips jobs another run has claimed since. A job that panics is reported
/// as failed; its cleanup has run during unwinding and the worker moves on
/// to the next job.
pub struct ThreadedJobDispatcher {
    use_case: Arc<ProcessVideoUseCase>,
    matchers: MatcherFactory,
    workers: usize,
    lease: Duration,
}

impl ThreadedJobDispatcher {
    pub fn new(
        use_case: Arc<ProcessVideoUseCase>,
        matchers: MatcherFactory,
        workers: usize,
        lease: Duration,
    ) -> Self {
        Self {
            use_case,
            matchers,
            workers: workers.max(1),
            lease,
        }
    }

    /// Processes every job claimable now and returns their reports, in
    /// completion order.
    ///
    /// Jobs claimed by a worker that dies stay leased and become claimable
    /// again once the lease expires.
    pub fn run_pending(&self) -> Result<Vec<JobReport>, DispatchError> {
        let jobs = self
            .use_case
            .services()
            .records
            .claim_pending_jobs(Utc::now(), self.lease)?;
        if jobs.is_empty() {
            log::info!("No pending jobs");
            return Ok(Vec::new());
        }

        let workers = self.workers.min(jobs.len());
        log::info!("Claimed {} jobs, starting {workers} workers", jobs.len());
        let matchers = (0..workers)
            .map(|_| (self.matchers)().map_err(|e| DispatchError::Matcher(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let (job_tx, job_rx) = crossbeam_channel::bounded::<VideoJob>(workers * 2);
        let (report_tx, report_rx) = crossbeam_channel::unbounded::<JobReport>();

        let mut handles = Vec::with_capacity(workers);
        for (worker, mut matcher) in matchers.into_iter().enumerate() {
            let job_rx = job_rx.clone();
            let report_tx = report_tx.clone();
            let use_case = Arc::clone(&self.use_case);
            let lease = self.lease;
            let handle = std::thread::Builder::new()
                .name(format!("job-worker-{worker}"))
                .spawn(move || {
                    for job in job_rx {
                        let Some(job) = renew(&use_case, &job, lease) else {
                            continue;
                        };
                        let mut logger = LogJobLogger::new(&job.id);
                        let report = panic::catch_unwind(AssertUnwindSafe(|| {
                            use_case.execute(&job, &mut matcher, &mut logger)
                        }))
                        .unwrap_or_else(|payload| {
                            let message = panic_message(payload.as_ref());
                            log::error!("Job {} panicked: {message}", job.id);
                            JobReport::panicked(&job, &message)
                        });
                        if report_tx.send(report).is_err() {
                            break;
                        }
                    }
                })?;
            handles.push(handle);
        }
        drop(job_rx);
        drop(report_tx);

        for job in jobs {
            if job_tx.send(job).is_err() {
                log::error!("All workers exited before every job was dispatched");
                break;
            }
        }
        drop(job_tx);

        for (worker, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                log::error!("Worker {worker} died; its job will be retried after the lease");
            }
        }

        Ok(report_rx.iter().collect())
    }
}

/// Re-leases `job` from now. `None` if the job is gone or was claimed
/// again after its lease ran out while it sat in the queue.
fn renew(use_case: &ProcessVideoUseCase, job: &VideoJob, lease: Duration) -> Option<VideoJob> {
    match use_case
        .services()
        .records
        .renew_lease(job, Utc::now(), lease)
    {
        Ok(Some(job)) => Some(job),
        Ok(None) => {
            log::warn!("Job {} was claimed elsewhere while queued, skipping", job.id);
            None
        }
        Err(e) => {
            log::error!("Could not renew the lease of job {}: {e}", job.id);
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
