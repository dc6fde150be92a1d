use crate::shared::constants::{DEFAULT_SAMPLE_FLOOR, DEFAULT_SAMPLE_RATE, MIN_EFFECTIVE_FPS};

/// Chooses which frames of a video get examined.
///
/// Takes roughly `target_rate` evenly spaced samples per nominal second,
/// never fewer than `floor` (and never more than the video has frames).
/// Reported fps below 30 is treated as 30 so that bogus or missing metadata
/// cannot inflate the sample count.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSampler {
    target_rate: f64,
    floor: usize,
}

impl FrameSampler {
    pub fn new(target_rate: f64, floor: usize) -> Self {
        Self { target_rate, floor }
    }

    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    pub fn floor(&self) -> usize {
        self.floor
    }

    /// The sample budget (`max_frames`) for a video; the spacing divisor.
    pub fn budget(&self, total_frames: usize, fps: f64) -> usize {
        let effective_fps = if fps.is_finite() {
            fps.max(MIN_EFFECTIVE_FPS)
        } else {
            MIN_EFFECTIVE_FPS
        };
        let by_rate = ((total_frames as f64 / effective_fps) * self.target_rate).floor();
        let by_rate = if by_rate.is_finite() && by_rate > 0.0 {
            by_rate as usize
        } else {
            0
        };
        by_rate.max(self.floor)
    }

    /// Frame indices to decode, non-decreasing and within `[0, total_frames)`.
    pub fn plan(&self, total_frames: usize, fps: f64) -> Vec<usize> {
        if total_frames == 0 {
            return Vec::new();
        }
        let max_frames = self.budget(total_frames, fps);
        if max_frames == 0 {
            return Vec::new();
        }
        let samples = max_frames.min(total_frames);
        (0..samples)
            .map(|i| (total_frames as u128 * i as u128 / max_frames as u128) as usize)
            .collect()
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_SAMPLE_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn expected_len(total_frames: usize, fps: f64) -> usize {
        let by_rate = ((total_frames as f64 / fps.max(30.0)) * 2.0).floor() as usize;
        by_rate.max(10).min(total_frames)
    }

    #[test]
    fn test_empty_video_yields_empty_plan() {
        assert!(FrameSampler::default().plan(0, 30.0).is_empty());
    }

    #[test]
    fn test_twenty_second_clip_at_30fps() {
        let plan = FrameSampler::default().plan(600, 30.0);
        assert_eq!(plan.len(), 40);
        assert_eq!(&plan[..4], &[0, 15, 30, 45]);
        assert_eq!(*plan.last().unwrap(), 585);
    }

    #[test]
    fn test_floor_applies_to_short_clips() {
        // 60 frames at 30 fps would give 4 samples by rate; floor raises it to 10.
        let plan = FrameSampler::default().plan(60, 30.0);
        assert_eq!(plan, vec![0, 6, 12, 18, 24, 30, 36, 42, 48, 54]);
    }

    #[test]
    fn test_fewer_frames_than_floor_repeats_indices() {
        // max_frames stays 10 as the spacing divisor, samples = 5.
        let plan = FrameSampler::default().plan(5, 30.0);
        assert_eq!(plan, vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_high_fps_reduces_samples() {
        // 60 fps: 1200 frames is 20 seconds, so 40 samples.
        assert_eq!(FrameSampler::default().plan(1200, 60.0).len(), 40);
    }

    #[rstest]
    #[case::zero_fps(900, 0.0)]
    #[case::low_fps(900, 10.0)]
    #[case::negative_fps(900, -5.0)]
    fn test_low_fps_treated_as_30(#[case] total_frames: usize, #[case] fps: f64) {
        let plan = FrameSampler::default().plan(total_frames, fps);
        assert_eq!(plan.len(), 60);
    }

    #[test]
    fn test_nan_fps_treated_as_30() {
        assert_eq!(FrameSampler::default().plan(900, f64::NAN).len(), 60);
    }

    #[rstest]
    #[case(1, 30.0)]
    #[case(9, 25.0)]
    #[case(10, 30.0)]
    #[case(299, 29.97)]
    #[case(601, 30.0)]
    #[case(7200, 24.0)]
    #[case(54_000, 59.94)]
    fn test_plan_properties(#[case] total_frames: usize, #[case] fps: f64) {
        let plan = FrameSampler::default().plan(total_frames, fps);
        assert_eq!(plan.len(), expected_len(total_frames, fps));
        assert!(plan.windows(2).all(|w| w[0] <= w[1]));
        assert!(plan.iter().all(|&i| i < total_frames));
        assert_eq!(plan[0], 0);
    }

    #[test]
    fn test_custom_rate_and_floor() {
        let sampler = FrameSampler::new(1.0, 3);
        assert_eq!(sampler.budget(300, 30.0), 10);
        assert_eq!(sampler.budget(30, 30.0), 3);
        assert_eq!(sampler.plan(30, 30.0), vec![0, 10, 20]);
    }

    #[test]
    fn test_zero_floor_with_tiny_video_is_empty() {
        assert!(FrameSampler::new(2.0, 0).plan(5, 30.0).is_empty());
    }
}
