use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Decodes selected frames from a video file.
///
/// Implementations handle container and codec details and normalize every
/// yielded frame to the working resolution, so the matcher sees a constant
/// per-frame cost regardless of the source.
pub trait FrameSource: Send {
    /// Opens a video file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Yields one frame per entry of `plan` (a non-decreasing list of frame
    /// indices), in plan order. A repeated index yields the same frame again.
    ///
    /// An `Err` item means the planned frame could not be decoded; callers
    /// stop consuming at the first error.
    fn frames_at(
        &mut self,
        plan: &[usize],
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases any resources held by the source.
    fn close(&mut self);
}
