use ndarray::ArrayView3;

use crate::shared::region::Region;

/// A single decoded frame: contiguous RGB bytes in row-major order.
///
/// `index` is the frame's position in the source video (0 for still images).
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels under `region`, clamped to the frame bounds.
    ///
    /// Returns `None` when the clamped region has no area.
    pub fn crop(&self, region: &Region) -> Option<Frame> {
        let x1 = region.x.clamp(0, self.width as i32) as usize;
        let y1 = region.y.clamp(0, self.height as i32) as usize;
        let x2 = (region.x + region.width).clamp(0, self.width as i32) as usize;
        let y2 = (region.y + region.height).clamp(0, self.height as i32) as usize;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let channels = self.channels as usize;
        let stride = self.width as usize * channels;
        let mut data = Vec::with_capacity((x2 - x1) * (y2 - y1) * channels);
        for row in y1..y2 {
            let start = row * stride + x1 * channels;
            data.extend_from_slice(&self.data[start..start + (x2 - x1) * channels]);
        }

        Some(Frame::new(
            data,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            self.channels,
            self.index,
        ))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: i32, y: i32, width: i32, height: i32) -> Region {
        Region {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    /// 4x3 RGB frame where every pixel's R channel is `row * 10 + col`.
    fn gradient_frame() -> Frame {
        let mut data = Vec::new();
        for row in 0..3u8 {
            for col in 0..4u8 {
                data.extend_from_slice(&[row * 10 + col, 0, 0]);
            }
        }
        Frame::new(data, 4, 3, 3, 7)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12];
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        let frame = gradient_frame();
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[3, 4, 3]);
        assert_eq!(arr[[2, 1, 0]], 21);
    }

    #[test]
    fn test_from_rgb_image() {
        let image = image::RgbImage::from_pixel(5, 4, image::Rgb([1, 2, 3]));
        let frame = Frame::from_rgb_image(image, 0);
        assert_eq!(frame.width(), 5);
        assert_eq!(frame.height(), 4);
        assert_eq!(&frame.data()[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_crop_copies_region_pixels() {
        let crop = gradient_frame().crop(&region(1, 1, 2, 2)).unwrap();
        assert_eq!(crop.width(), 2);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.index(), 7);
        let arr = crop.as_ndarray();
        assert_eq!(arr[[0, 0, 0]], 11);
        assert_eq!(arr[[1, 1, 0]], 22);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let crop = gradient_frame().crop(&region(-2, 2, 10, 10)).unwrap();
        assert_eq!(crop.width(), 4);
        assert_eq!(crop.height(), 1);
    }

    #[test]
    fn test_crop_outside_frame_is_none() {
        assert!(gradient_frame().crop(&region(10, 10, 5, 5)).is_none());
        assert!(gradient_frame().crop(&region(1, 1, 0, 2)).is_none());
    }
}
