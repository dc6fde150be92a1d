/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing.
/// Keypoint columns emitted by pose variants of the model are ignored.
use std::path::Path;

use crate::recognition::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::execution_provider::load_session;
use super::math::nms;

/// Fallback input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Loads a YOLO ONNX model.
    ///
    /// The input resolution is read from the model's NCHW input shape,
    /// falling back to 640 if the shape is dynamic.
    pub fn new(
        model_path: &Path,
        confidence: f64,
        workers: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path, workers)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::debug!(
            "Loaded detector {} (input {input_size}px, confidence {confidence})",
            model_path.display()
        );
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let candidates = decode_rows(data, &shape, self.confidence, scale, pad_x, pad_y);
        let kept = nms(&candidates, NMS_IOU_THRESH);

        let regions = kept
            .into_iter()
            .map(|i| {
                let ([x1, y1, x2, y2], score) = candidates[i];
                Region::from_corners((x1, y1, x2, y2), frame.width(), frame.height(), score)
            })
            .filter(|r| !r.is_empty())
            .collect();
        Ok(regions)
    }
}

/// Parses raw YOLO rows into frame-space boxes above `confidence`.
///
/// Output is `[1, features, detections]` or `[1, detections, features]`;
/// the smaller of the two trailing dims is the feature axis.
fn decode_rows(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
) -> Vec<([f64; 4], f64)> {
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 {
        return Vec::new();
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut out = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let unpad = |v: f64, pad: u32| (v - pad as f64) / scale;
        out.push((
            [
                unpad(cx - w / 2.0, pad_x),
                unpad(cy - h / 2.0, pad_y),
                unpad(cx + w / 2.0, pad_x),
                unpad(cy + h / 2.0, pad_y),
            ],
            conf,
        ));
    }
    out
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // 114 gray padding, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_letterbox_working_resolution() {
        // 960x540 → 640: scale 2/3, new 640x360, pad_y 140
        let frame = Frame::new(vec![128u8; 960 * 540 * 3], 960, 540, 3, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(scale, 640.0 / 960.0);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 140);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, _, pad_x, pad_y) = letterbox(&frame, 640);

        let y = pad_y as usize + 1;
        let x = pad_x as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, x]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0, epsilon = 0.01);
    }

    #[test]
    fn test_decode_rows_row_major() {
        // [1, 2 detections, 5 features]
        let data = vec![
            100.0, 100.0, 20.0, 40.0, 0.9, //
            50.0, 50.0, 10.0, 10.0, 0.1,
        ];
        let rows = decode_rows(&data, &[1, 2, 5], 0.5, 1.0, 0, 0);

        assert_eq!(rows.len(), 1);
        let (bbox, score) = rows[0];
        assert_eq!(bbox, [90.0, 80.0, 110.0, 120.0]);
        assert_relative_eq!(score, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_rows_transposed_undoes_letterbox() {
        // [1, 5 features, 2 detections], scale 2, pad_y 10
        let data = vec![
            40.0, 0.0, //
            50.0, 0.0, //
            20.0, 0.0, //
            20.0, 0.0, //
            0.8, 0.1,
        ];
        let rows = decode_rows(&data, &[1, 5, 2], 0.5, 2.0, 0, 10);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, [15.0, 15.0, 25.0, 25.0]);
    }

    #[test]
    fn test_decode_rows_too_few_features() {
        assert!(decode_rows(&[1.0; 8], &[1, 2, 4], 0.0, 1.0, 0, 0).is_empty());
    }
}
