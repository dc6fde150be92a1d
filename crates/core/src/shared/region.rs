/// An axis-aligned face bounding box in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
}

impl Region {
    /// Builds a region from corner coordinates, clamped to the frame.
    pub fn from_corners(
        (x1, y1, x2, y2): (f64, f64, f64, f64),
        frame_width: u32,
        frame_height: u32,
        confidence: f64,
    ) -> Self {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let left = x1.clamp(0.0, fw).round() as i32;
        let top = y1.clamp(0.0, fh).round() as i32;
        let right = x2.clamp(0.0, fw).round() as i32;
        let bottom = y2.clamp(0.0, fh).round() as i32;
        Self {
            x: left,
            y: top,
            width: (right - left).max(0),
            height: (bottom - top).max(0),
            confidence,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn iou(&self, other: &Region) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        inter / (self.area() as f64 + other.area() as f64 - inter)
    }

    /// Grows the box by `ratio` of its size on each side.
    ///
    /// Embedding models expect some context around the face; the detector
    /// box is usually tight.
    pub fn expanded(&self, ratio: f64) -> Region {
        let dx = (self.width as f64 * ratio).round() as i32;
        let dy = (self.height as f64 * ratio).round() as i32;
        Region {
            x: self.x - dx,
            y: self.y - dy,
            width: self.width + 2 * dx,
            height: self.height + 2 * dy,
            confidence: self.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn region(x: i32, y: i32, w: i32, h: i32) -> Region {
        Region {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_from_corners_clamps_to_frame() {
        let r = Region::from_corners((-10.0, 5.0, 120.0, 40.0), 100, 50, 0.8);
        assert_eq!(r, Region { x: 0, y: 5, width: 100, height: 35, confidence: 0.8 });
    }

    #[test]
    fn test_from_corners_inverted_box_is_empty() {
        let r = Region::from_corners((50.0, 50.0, 10.0, 10.0), 100, 100, 0.5);
        assert!(r.is_empty());
    }

    #[test]
    fn test_iou_identical() {
        let r = region(0, 0, 10, 10);
        assert_relative_eq!(r.iou(&r), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = region(0, 0, 10, 10);
        let b = region(5, 5, 10, 10);
        assert_relative_eq!(a.iou(&b), 25.0 / 175.0);
    }

    #[rstest]
    #[case::disjoint(region(0, 0, 10, 10), region(20, 20, 5, 5), 0.0)]
    #[case::zero_width(region(0, 0, 0, 100), region(0, 0, 50, 50), 0.0)]
    #[case::zero_height(region(0, 0, 100, 0), region(0, 0, 50, 50), 0.0)]
    fn test_iou_no_overlap(#[case] a: Region, #[case] b: Region, #[case] expected: f64) {
        assert_relative_eq!(a.iou(&b), expected);
    }

    #[test]
    fn test_expanded_grows_each_side() {
        let r = region(20, 20, 10, 20).expanded(0.2);
        assert_eq!((r.x, r.y, r.width, r.height), (18, 16, 14, 28));
    }
}
