use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// A face embedding vector.
pub type Embedding = Vec<f32>;

/// Domain interface for turning detected faces into embeddings.
///
/// `encode` returns one embedding per region, in region order. `distance`
/// is the metric the matching tolerance is expressed in; Euclidean unless an
/// implementation says otherwise.
pub trait FaceEncoder: Send {
    fn encode(
        &mut self,
        frame: &Frame,
        regions: &[Region],
    ) -> Result<Vec<Embedding>, Box<dyn std::error::Error>>;

    fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        euclidean_distance(a, b)
    }
}

/// Euclidean distance between `a` and `b`.
///
/// Vectors of different or zero length never match: the distance is
/// infinite.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_euclidean_distance_identical_is_zero() {
        let v = [0.1, 0.2, 0.3];
        assert_eq!(euclidean_distance(&v, &v), 0.0);
    }

    #[test]
    fn test_euclidean_distance_3_4_5() {
        assert_relative_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
    }

    #[test]
    fn test_euclidean_distance_is_symmetric() {
        let a = [1.0, -2.0, 0.5];
        let b = [0.0, 2.0, 1.5];
        assert_relative_eq!(euclidean_distance(&a, &b), euclidean_distance(&b, &a));
    }

    #[test]
    fn test_euclidean_distance_length_mismatch_is_infinite() {
        assert_eq!(euclidean_distance(&[], &[9.0, 9.0, 9.0]), f64::INFINITY);
        assert_eq!(euclidean_distance(&[9.0], &[9.0, 9.0, 9.0]), f64::INFINITY);
        assert_eq!(euclidean_distance(&[], &[]), f64::INFINITY);
    }
}
