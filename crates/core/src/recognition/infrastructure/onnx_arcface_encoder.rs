/// ArcFace face encoder using ONNX Runtime.
///
/// Crops each detected face with a small margin, resizes it to 112x112 and
/// returns the L2-normalized embedding. Embeddings are compared by cosine
/// distance `1 - a·b` in `[0, 2]`, so a tolerance of 0.4 accepts pairs with
/// cosine similarity of at least 0.6.
use std::path::Path;

use crate::recognition::domain::face_encoder::{Embedding, FaceEncoder};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::execution_provider::load_session;
use super::math::{cosine_distance, l2_normalize};

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// Margin added around the detector box before cropping.
const CROP_MARGIN: f64 = 0.1;

pub struct OnnxArcfaceEncoder {
    session: ort::session::Session,
}

impl OnnxArcfaceEncoder {
    pub fn new(model_path: &Path, workers: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path, workers)?;
        log::debug!("Loaded encoder {}", model_path.display());
        Ok(Self { session })
    }

    fn embed(&mut self, crop: &Frame) -> Result<Embedding, Box<dyn std::error::Error>> {
        let tensor = preprocess(crop.data(), crop.width(), crop.height(), crop.channels());
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl FaceEncoder for OnnxArcfaceEncoder {
    fn encode(
        &mut self,
        frame: &Frame,
        regions: &[Region],
    ) -> Result<Vec<Embedding>, Box<dyn std::error::Error>> {
        let mut embeddings = Vec::with_capacity(regions.len());
        for region in regions {
            let crop = frame
                .crop(&region.expanded(CROP_MARGIN))
                .ok_or_else(|| format!("Face region {region:?} lies outside the frame"))?;
            embeddings.push(self.embed(&crop)?);
        }
        Ok(embeddings)
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        cosine_distance(a, b)
    }
}

/// Resize crop to 112x112, normalize, NCHW layout.
fn preprocess(data: &[u8], width: u32, height: u32, channels: u8) -> ndarray::Array4<f32> {
    let src_w = width as usize;
    let src_h = height as usize;
    let channels = channels as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    if src_w == 0 || src_h == 0 || channels < 3 {
        return tensor;
    }

    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            let offset = (src_y * src_w + src_x) * channels;
            if offset + 2 < data.len() {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (data[offset + c] as f32 - NORM_MEAN) / NORM_STD;
                }
            }
        }
    }

    tensor
}
