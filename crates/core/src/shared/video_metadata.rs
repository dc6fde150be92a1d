use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
    /// Clockwise rotation needed to display the video upright: 0, 90, 180
    /// or 270.
    pub rotation: i32,
}

impl VideoMetadata {
    /// Nominal duration in seconds, or 0 when fps is unknown.
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 && self.fps.is_finite() {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn metadata(fps: f64, total_frames: usize) -> VideoMetadata {
        VideoMetadata {
            width: 1920,
            height: 1080,
            fps,
            total_frames,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/lecture.mp4")),
            rotation: 0,
        }
    }

    #[test]
    fn test_duration_from_fps() {
        assert_relative_eq!(metadata(30.0, 600).duration_secs(), 20.0);
    }

    #[test]
    fn test_duration_zero_when_fps_unknown() {
        assert_eq!(metadata(0.0, 600).duration_secs(), 0.0);
        assert_eq!(metadata(f64::NAN, 600).duration_secs(), 0.0);
    }
}
