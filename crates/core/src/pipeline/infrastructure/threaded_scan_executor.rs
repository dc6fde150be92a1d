use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::pipeline::job_logger::JobLogger;
use crate::pipeline::scan_executor::{ScanExecutor, ScanStop, ScanSummary};
use crate::recognition::domain::detection_aggregator::DetectionAggregator;
use crate::recognition::domain::embedding_gallery::EmbeddingGallery;
use crate::recognition::domain::face_matcher::FaceMatcher;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

const DEFAULT_CHANNEL_CAPACITY: usize = 4;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Decodes on a dedicated reader thread while the calling thread matches.
///
/// Layout: `reader → main [match/aggregate]`
///
/// The bounded channel caps how many decoded frames wait in memory. The
/// reader stops at its first decode error, when cancelled, or when the
/// main loop hangs up.
pub struct ThreadedScanExecutor {
    channel_capacity: usize,
}

impl ThreadedScanExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }
}

impl Default for ThreadedScanExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanExecutor for ThreadedScanExecutor {
    fn execute(
        &self,
        source: Box<dyn FrameSource>,
        plan: Vec<usize>,
        matcher: &mut FaceMatcher,
        gallery: &EmbeddingGallery,
        aggregator: &mut DetectionAggregator,
        budget: Duration,
        logger: &mut dyn JobLogger,
    ) -> ScanSummary {
        let frames_planned = plan.len();
        let deadline = Instant::now().checked_add(budget);
        let cancelled = Arc::new(AtomicBool::new(false));

        let (frame_tx, frame_rx) =
            crossbeam_channel::bounded::<Result<Frame, SendError>>(self.channel_capacity);
        let reader_handle = spawn_reader(source, plan, frame_tx, cancelled.clone());

        let (frames_examined, mut stop) = run_scan_loop(
            &frame_rx,
            matcher,
            gallery,
            aggregator,
            deadline,
            frames_planned,
            logger,
        );

        cancelled.store(true, Ordering::Relaxed);
        drop(frame_rx);

        if stop == ScanStop::BudgetExceeded {
            // The reader may be stuck in a long decode; it exits on its next send.
            log::warn!("Scan budget of {budget:?} exhausted, detaching frame reader");
        } else if reader_handle.join().is_err() && stop == ScanStop::Exhausted {
            stop = ScanStop::DecodeFailed("frame reader thread panicked".to_string());
        }

        ScanSummary {
            frames_planned,
            frames_examined,
            stop,
        }
    }
}

fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    plan: Vec<usize>,
    frame_tx: Sender<Result<Frame, SendError>>,
    cancelled: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for frame_result in source.frames_at(&plan) {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let failed = frame_result.is_err();
            let mapped = frame_result.map_err(|e| -> SendError { e.to_string().into() });
            if frame_tx.send(mapped).is_err() || failed {
                break;
            }
        }
        source.close();
    })
}

/// Receives decoded frames and matches them until the plan runs out, every
/// identity is found, or something fails. Returns the examined frame count
/// with the stop reason.
fn run_scan_loop(
    frame_rx: &Receiver<Result<Frame, SendError>>,
    matcher: &mut FaceMatcher,
    gallery: &EmbeddingGallery,
    aggregator: &mut DetectionAggregator,
    deadline: Option<Instant>,
    total: usize,
    logger: &mut dyn JobLogger,
) -> (usize, ScanStop) {
    let mut examined = 0;

    loop {
        if aggregator.is_complete(gallery) {
            return (examined, ScanStop::AllIdentitiesFound);
        }

        let received = match deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return (examined, ScanStop::BudgetExceeded);
                }
                match frame_rx.recv_deadline(deadline) {
                    Ok(received) => received,
                    Err(RecvTimeoutError::Timeout) => {
                        return (examined, ScanStop::BudgetExceeded)
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return (examined, ScanStop::Exhausted)
                    }
                }
            }
            None => match frame_rx.recv() {
                Ok(received) => received,
                Err(_) => return (examined, ScanStop::Exhausted),
            },
        };

        let frame = match received {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Stopping scan after {examined} frames: {e}");
                return (examined, ScanStop::DecodeFailed(e.to_string()));
            }
        };

        let started = Instant::now();
        let result = matcher.match_frame(&frame, gallery, aggregator);
        logger.timing("match", started.elapsed().as_secs_f64() * 1000.0);
        examined += 1;
        logger.progress(examined, total);

        match result {
            Ok(matches) => logger.metric("faces", matches.len() as f64),
            Err(e) => {
                log::warn!("Face analysis failed on frame {}: {e}", frame.index());
                return (examined, ScanStop::OracleFailed(e.to_string()));
            }
        }
    }
}
