use std::time::Duration;

use crate::pipeline::job_logger::JobLogger;
use crate::recognition::domain::detection_aggregator::DetectionAggregator;
use crate::recognition::domain::embedding_gallery::EmbeddingGallery;
use crate::recognition::domain::face_matcher::FaceMatcher;
use crate::video::domain::frame_source::FrameSource;

/// Why a scan stopped consuming frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanStop {
    /// Every planned frame was examined.
    Exhausted,
    /// Every gallery identity was detected before the plan ran out.
    AllIdentitiesFound,
    /// A planned frame could not be decoded; later frames were not read.
    DecodeFailed(String),
    /// The detector or encoder failed on a frame.
    OracleFailed(String),
    /// The wall-clock budget ran out.
    BudgetExceeded,
}

impl ScanStop {
    /// True when the scan stopped because something went wrong.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::DecodeFailed(_) | Self::OracleFailed(_) | Self::BudgetExceeded
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanSummary {
    pub frames_planned: usize,
    pub frames_examined: usize,
    pub stop: ScanStop,
}

/// Runs the sample-and-match loop over one opened video.
///
/// Identities found before the scan stops stay in `aggregator` whatever
/// the stop reason, so a partial scan still yields a partial attendance.
pub trait ScanExecutor: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        source: Box<dyn FrameSource>,
        plan: Vec<usize>,
        matcher: &mut FaceMatcher,
        gallery: &EmbeddingGallery,
        aggregator: &mut DetectionAggregator,
        budget: Duration,
        logger: &mut dyn JobLogger,
    ) -> ScanSummary;
}
