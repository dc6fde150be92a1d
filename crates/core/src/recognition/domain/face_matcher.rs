use serde::{Deserialize, Serialize};

use crate::recognition::domain::detection_aggregator::DetectionAggregator;
use crate::recognition::domain::embedding_gallery::EmbeddingGallery;
use crate::recognition::domain::face_detector::FaceDetector;
use crate::recognition::domain::face_encoder::FaceEncoder;
use crate::shared::constants::DEFAULT_TOLERANCE;
use crate::shared::frame::Frame;

/// How a candidate embedding is resolved against the gallery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// The first gallery entry within tolerance wins, even if a later entry
    /// is closer. Compatible with attendance recorded by earlier versions,
    /// but can misattribute a face when enrollments overlap.
    #[default]
    FirstWithinTolerance,
    /// The closest gallery entry wins, provided it is within tolerance.
    Nearest,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FaceMatch {
    Known { roll: String, distance: f64 },
    Unknown,
}

/// Matches the faces of a frame against an [`EmbeddingGallery`].
///
/// Detection and embedding are delegated to the oracle ports; this type
/// owns only the matching policy and the early-exit rule.
pub struct FaceMatcher {
    detector: Box<dyn FaceDetector>,
    encoder: Box<dyn FaceEncoder>,
    tolerance: f64,
    policy: MatchPolicy,
}

impl FaceMatcher {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        encoder: Box<dyn FaceEncoder>,
        tolerance: Option<f64>,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            detector,
            encoder,
            tolerance: tolerance.unwrap_or(DEFAULT_TOLERANCE),
            policy,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Matches every face in `frame`, recording known identities into
    /// `aggregator`.
    ///
    /// Stops as soon as the aggregator holds every gallery identity, before
    /// running the detector if that is already the case on entry. Unknown
    /// faces are returned but never recorded. Oracle errors are returned
    /// as-is; identities recorded before the error stay recorded.
    pub fn match_frame(
        &mut self,
        frame: &Frame,
        gallery: &EmbeddingGallery,
        aggregator: &mut DetectionAggregator,
    ) -> Result<Vec<FaceMatch>, Box<dyn std::error::Error>> {
        if aggregator.is_complete(gallery) {
            return Ok(Vec::new());
        }

        let regions = self.detector.detect(frame)?;
        if regions.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.encoder.encode(frame, &regions)?;

        let mut matches = Vec::with_capacity(embeddings.len());
        for embedding in &embeddings {
            if aggregator.is_complete(gallery) {
                break;
            }
            let result = self.identify(embedding, gallery);
            if let FaceMatch::Known { roll, distance } = &result {
                if aggregator.add(roll) {
                    log::debug!(
                        "{roll} detected in frame {} (distance {distance:.3})",
                        frame.index()
                    );
                }
            }
            matches.push(result);
        }
        Ok(matches)
    }

    /// Resolves a single candidate embedding according to the policy.
    pub fn identify(&self, candidate: &[f32], gallery: &EmbeddingGallery) -> FaceMatch {
        match self.policy {
            MatchPolicy::FirstWithinTolerance => gallery
                .entries()
                .find_map(|(roll, embedding)| {
                    let distance = self.encoder.distance(candidate, embedding);
                    (distance <= self.tolerance).then(|| FaceMatch::Known {
                        roll: roll.to_string(),
                        distance,
                    })
                })
                .unwrap_or(FaceMatch::Unknown),
            MatchPolicy::Nearest => gallery
                .entries()
                .map(|(roll, embedding)| (roll, self.encoder.distance(candidate, embedding)))
                .filter(|(_, distance)| *distance <= self.tolerance)
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(roll, distance)| FaceMatch::Known {
                    roll: roll.to_string(),
                    distance,
                })
                .unwrap_or(FaceMatch::Unknown),
        }
    }
}
