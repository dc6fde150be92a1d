use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for locating faces in a frame.
///
/// Implementations may hold mutable inference state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>>;
}
