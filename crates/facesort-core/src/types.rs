use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel label for faces no trained person is confident enough about.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Bounding box of a detected face in pixel offsets from the image origin.
///
/// Field order follows the extractor convention: (top, right, bottom, left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl BoundingBox {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self { top, right, bottom, left }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Grow the box by `padding` on every side, clamped to an image of
    /// `image_width` x `image_height`.
    pub fn padded(&self, padding: u32, image_width: u32, image_height: u32) -> BoundingBox {
        BoundingBox {
            top: self.top.saturating_sub(padding),
            left: self.left.saturating_sub(padding),
            right: self.right.saturating_add(padding).min(image_width),
            bottom: self.bottom.saturating_add(padding).min(image_height),
        }
    }
}

/// Face embedding vector (128-dimensional for the dlib-style extractor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Extractor that produced this embedding, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Cosine of the angle between the two vectors, in [-1, 1].
    /// A zero vector is similar to nothing (0.0).
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let (dot, self_sq, other_sq) = self
            .values
            .iter()
            .zip(&other.values)
            .fold((0.0f32, 0.0f32, 0.0f32), |(dot, a, b), (x, y)| {
                (dot + x * y, a + x * x, b + y * y)
            });
        let norms = (self_sq * other_sq).sqrt();
        if norms > 0.0 {
            dot / norms
        } else {
            0.0
        }
    }
}

/// One detected face within one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub embedding: Embedding,
    pub bounding_box: BoundingBox,
    /// Identifies the image this face was detected in.
    pub source_image: String,
}

/// Person label attached to a classified face.
///
/// Serialized as a plain string; the string `"Unknown"` is the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Label {
    Person(String),
    Unknown,
}

impl Label {
    /// True for the sentinel, including a person whose name is "Unknown".
    pub fn is_unknown(&self) -> bool {
        self.as_str() == UNKNOWN_LABEL
    }

    pub fn as_str(&self) -> &str {
        match self {
            Label::Person(name) => name,
            Label::Unknown => UNKNOWN_LABEL,
        }
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        if name == UNKNOWN_LABEL {
            Label::Unknown
        } else {
            Label::Person(name)
        }
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Label::from(name.to_string())
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        match label {
            Label::Person(name) => name,
            Label::Unknown => UNKNOWN_LABEL.to_string(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Decision for one face: a label and the raw peak class probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Maximum class probability returned by the model, in [0, 1].
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(label: impl Into<Label>, confidence: f32) -> Self {
        Self { label: label.into(), confidence }
    }

    pub fn unknown(confidence: f32) -> Self {
        Self { label: Label::Unknown, confidence }
    }

    pub fn is_unknown(&self) -> bool {
        self.label.is_unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_similarity_ignores_magnitude() {
        let a = Embedding::new(vec![3.0, 4.0]);
        let b = Embedding::new(vec![0.6, 0.8]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
        let c = Embedding::new(vec![-3.0, -4.0]);
        assert!((a.similarity(&c) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_padded_box_clamps_to_image() {
        let face = BoundingBox::new(20, 120, 110, 30);
        let padded = face.padded(50, 150, 140);
        assert_eq!(padded, BoundingBox::new(0, 150, 140, 0));
    }

    #[test]
    fn test_padded_box_inside_image() {
        let face = BoundingBox::new(100, 300, 200, 200);
        let padded = face.padded(50, 1000, 1000);
        assert_eq!(padded, BoundingBox::new(50, 350, 250, 150));
        assert_eq!(padded.width(), 200);
        assert_eq!(padded.height(), 200);
    }

    #[test]
    fn test_label_sentinel_roundtrip() {
        assert_eq!(Label::from("Unknown"), Label::Unknown);
        assert_eq!(Label::from("Alice"), Label::Person("Alice".into()));
        assert_eq!(Label::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_person_named_unknown_is_unknown() {
        let label = Label::Person(UNKNOWN_LABEL.to_string());
        assert!(label.is_unknown());
        assert!(ClassificationResult { label, confidence: 0.9 }.is_unknown());
        assert!(!Label::Person("Unknowns".into()).is_unknown());
    }

    #[test]
    fn test_label_serializes_as_string() {
        let result = ClassificationResult::new("Alice", 0.9);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"label":"Alice","confidence":0.9}"#);

        let back: ClassificationResult =
            serde_json::from_str(r#"{"label":"Unknown","confidence":0.5}"#).unwrap();
        assert!(back.is_unknown());
    }
}
