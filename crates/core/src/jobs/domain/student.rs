use serde::{Deserialize, Serialize};

use crate::recognition::domain::face_encoder::Embedding;

/// An enrolled student and the face embeddings computed at enrollment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub roll: String,
    pub batch: String,
    #[serde(default)]
    pub embeddings: Vec<Embedding>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeacherRecord {
    pub teacher_id: String,
    pub name: String,
}
