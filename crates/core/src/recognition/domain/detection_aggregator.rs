use std::collections::BTreeSet;

use crate::recognition::domain::embedding_gallery::EmbeddingGallery;

/// Set of rolls positively identified in one video.
///
/// Grows monotonically: there is no way to remove an identity once added.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionAggregator {
    detected: BTreeSet<String>,
}

impl DetectionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `roll` was not already present.
    pub fn add(&mut self, roll: &str) -> bool {
        if self.detected.contains(roll) {
            return false;
        }
        self.detected.insert(roll.to_string())
    }

    pub fn contains(&self, roll: &str) -> bool {
        self.detected.contains(roll)
    }

    pub fn len(&self) -> usize {
        self.detected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detected.is_empty()
    }

    /// True once every distinct identity in `gallery` has been seen.
    pub fn is_complete(&self, gallery: &EmbeddingGallery) -> bool {
        self.detected.len() == gallery.identity_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.detected.iter().map(String::as_str)
    }

    pub fn into_set(self) -> BTreeSet<String> {
        self.detected
    }
}
