use crate::jobs::domain::student::StudentRecord;
use crate::recognition::domain::face_encoder::Embedding;

/// Enrolled embeddings for one batch, in construction order.
///
/// Order matters: the first-within-tolerance matching policy picks the
/// earliest entry, so students keep their record-store order and each
/// student's embeddings keep their enrollment order.
///
/// All embeddings share the dimension of the first one accepted. Empty
/// embeddings and embeddings of another dimension are refused.
#[derive(Clone, Debug, Default)]
pub struct EmbeddingGallery {
    entries: Vec<(String, Embedding)>,
    identities: Vec<String>,
}

impl EmbeddingGallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_students(students: &[StudentRecord]) -> Self {
        let mut gallery = Self::new();
        for student in students {
            for embedding in &student.embeddings {
                if !gallery.push(&student.roll, embedding.clone()) {
                    log::warn!(
                        "Ignoring a {}-dimensional embedding of {} (gallery uses {})",
                        embedding.len(),
                        student.roll,
                        gallery.dimension().unwrap_or(0)
                    );
                }
            }
        }
        gallery
    }

    /// Adds an embedding for `roll`. Returns `false` and leaves the gallery
    /// unchanged when the embedding is empty or of the wrong dimension.
    pub fn push(&mut self, roll: &str, embedding: Embedding) -> bool {
        if embedding.is_empty() || self.dimension().is_some_and(|d| d != embedding.len()) {
            return false;
        }
        if !self.identities.iter().any(|r| r == roll) {
            self.identities.push(roll.to_string());
        }
        self.entries.push((roll.to_string(), embedding));
        true
    }

    /// Length of every embedding in the gallery, once one has been added.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|(_, embedding)| embedding.len())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entries
            .iter()
            .map(|(roll, embedding)| (roll.as_str(), embedding.as_slice()))
    }

    /// Number of embeddings (not identities).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct rolls in first-appearance order.
    pub fn identities(&self) -> &[String] {
        &self.identities
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn contains_identity(&self, roll: &str) -> bool {
        self.identities.iter().any(|r| r == roll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(roll: &str, embeddings: Vec<Embedding>) -> StudentRecord {
        StudentRecord {
            roll: roll.to_string(),
            batch: "10ea".to_string(),
            embeddings,
        }
    }

    #[test]
    fn test_from_students_preserves_order() {
        let gallery = EmbeddingGallery::from_students(&[
            student("10e01", vec![vec![0.1], vec![0.2], vec![0.3]]),
            student("10e02", vec![vec![0.9]]),
        ]);

        let rolls: Vec<&str> = gallery.entries().map(|(roll, _)| roll).collect();
        assert_eq!(rolls, vec!["10e01", "10e01", "10e01", "10e02"]);
        let first: Vec<f32> = gallery.entries().map(|(_, e)| e[0]).collect();
        assert_eq!(first, vec![0.1, 0.2, 0.3, 0.9]);
    }

    #[test]
    fn test_identity_count_counts_distinct_rolls() {
        let gallery = EmbeddingGallery::from_students(&[
            student("10e01", vec![vec![0.1], vec![0.2]]),
            student("10e02", vec![vec![0.9]]),
        ]);
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.identity_count(), 2);
        assert_eq!(gallery.identities(), &["10e01".to_string(), "10e02".to_string()]);
    }

    #[test]
    fn test_students_without_embeddings_are_skipped() {
        let gallery = EmbeddingGallery::from_students(&[
            student("10e01", vec![]),
            student("10e02", vec![vec![0.5]]),
        ]);
        assert_eq!(gallery.identity_count(), 1);
        assert!(!gallery.contains_identity("10e01"));
        assert!(gallery.contains_identity("10e02"));
    }

    #[test]
    fn test_empty_and_mismatched_embeddings_are_refused() {
        let gallery = EmbeddingGallery::from_students(&[
            student("10e01", vec![vec![]]),
            student("10e02", vec![vec![9.0, 9.0, 9.0]]),
            student("10e03", vec![vec![9.0]]),
        ]);

        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.dimension(), Some(3));
        assert_eq!(gallery.identities(), &["10e02".to_string()]);
    }

    #[test]
    fn test_empty_gallery() {
        let gallery = EmbeddingGallery::from_students(&[student("10e01", vec![])]);
        assert!(gallery.is_empty());
        assert_eq!(gallery.identity_count(), 0);
        assert!(gallery.identities().is_empty());
    }
}
