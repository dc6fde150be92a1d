pub mod detection_aggregator;
pub mod embedding_gallery;
pub mod face_detector;
pub mod face_encoder;
pub mod face_matcher;
