//! Scripted oracle and video stubs shared by unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::recognition::domain::face_detector::FaceDetector;
use crate::recognition::domain::face_encoder::{Embedding, FaceEncoder};
use crate::recognition::domain::face_matcher::{FaceMatcher, MatchPolicy};
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::FrameSource;

/// Faces per frame index, shared by a scripted detector/encoder pair.
#[derive(Clone, Default)]
pub(crate) struct FaceScript {
    faces: Arc<HashMap<usize, Vec<Embedding>>>,
    fail: bool,
    panic_on_call: Option<usize>,
    detect_calls: Arc<AtomicUsize>,
    encode_calls: Arc<AtomicUsize>,
}

impl FaceScript {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_faces(mut self, frame_index: usize, embeddings: Vec<Embedding>) -> Self {
        Arc::make_mut(&mut self.faces).insert(frame_index, embeddings);
        self
    }

    /// Every detector call fails.
    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// The `call`-th detector call (0-based) panics.
    pub(crate) fn panicking_on(mut self, call: usize) -> Self {
        self.panic_on_call = Some(call);
        self
    }

    pub(crate) fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn encode_calls(&self) -> usize {
        self.encode_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn matcher(&self, policy: MatchPolicy) -> FaceMatcher {
        FaceMatcher::new(
            Box::new(ScriptedDetector(self.clone())),
            Box::new(ScriptedEncoder(self.clone())),
            None,
            policy,
        )
    }

    pub(crate) fn matcher_with_tolerance(&self, policy: MatchPolicy, tolerance: f64) -> FaceMatcher {
        FaceMatcher::new(
            Box::new(ScriptedDetector(self.clone())),
            Box::new(ScriptedEncoder(self.clone())),
            Some(tolerance),
            policy,
        )
    }
}

pub(crate) struct ScriptedDetector(pub(crate) FaceScript);

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let call = self.0.detect_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.panic_on_call == Some(call) {
            panic!("detector crashed on frame {}", frame.index());
        }
        if self.0.fail {
            return Err("detector backend unavailable".into());
        }
        let count = self.0.faces.get(&frame.index()).map_or(0, Vec::len);
        Ok((0..count)
            .map(|i| Region {
                x: i as i32 * 10,
                y: 0,
                width: 10,
                height: 10,
                confidence: 0.9,
            })
            .collect())
    }
}

pub(crate) struct ScriptedEncoder(pub(crate) FaceScript);

impl FaceEncoder for ScriptedEncoder {
    fn encode(
        &mut self,
        frame: &Frame,
        regions: &[Region],
    ) -> Result<Vec<Embedding>, Box<dyn std::error::Error>> {
        self.0.encode_calls.fetch_add(1, Ordering::SeqCst);
        let faces = self.0.faces.get(&frame.index()).cloned().unwrap_or_default();
        Ok(faces.into_iter().take(regions.len()).collect())
    }
}

/// Frame source producing 1x1 frames for a video of `total_frames`.
pub(crate) struct StubFrameSource {
    pub(crate) total_frames: usize,
    pub(crate) fps: f64,
    /// Decoding this frame index (or any later one) fails.
    pub(crate) fail_from: Option<usize>,
    pub(crate) decoded: Arc<AtomicUsize>,
}

impl StubFrameSource {
    pub(crate) fn new(total_frames: usize, fps: f64) -> Self {
        Self {
            total_frames,
            fps,
            fail_from: None,
            decoded: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FrameSource for StubFrameSource {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Err(format!("no such file: {}", path.display()).into());
        }
        Ok(VideoMetadata {
            width: 1,
            height: 1,
            fps: self.fps,
            total_frames: self.total_frames,
            codec: "stub".to_string(),
            source_path: Some(path.to_path_buf()),
            rotation: 0,
        })
    }

    fn frames_at(
        &mut self,
        plan: &[usize],
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let fail_from = self.fail_from;
        let decoded = self.decoded.clone();
        Box::new(plan.to_vec().into_iter().map(move |index| {
            if fail_from.is_some_and(|f| index >= f) {
                return Err(format!("corrupt packet at frame {index}").into());
            }
            decoded.fetch_add(1, Ordering::SeqCst);
            Ok(Frame::new(vec![0u8; 3], 1, 1, 3, index))
        }))
    }

    fn close(&mut self) {}
}
