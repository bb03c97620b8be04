//! Per-image identification session.
//!
//! An [`Identifier`] borrows a loaded model for the lifetime of a session and
//! threads one configured threshold through classification and same-image
//! resolution.

use crate::classifier::{classify, ClassifyError, TrainedModel};
use crate::disambiguator::resolve;
use crate::extractor::FaceExtractor;
use crate::names::NameMap;
use crate::types::{BoundingBox, ClassificationResult, Embedding, FaceObservation};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A face with its final (post-resolution) decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifiedFace {
    pub bounding_box: BoundingBox,
    #[serde(flatten)]
    pub result: ClassificationResult,
}

/// What identification produced for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    Faces { faces: Vec<IdentifiedFace> },
    NoFace,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: ImageOutcome,
}

pub struct Identifier<'m, M: TrainedModel + ?Sized> {
    model: &'m M,
    threshold: f32,
    names: Option<&'m NameMap>,
}

impl<'m, M: TrainedModel + ?Sized> Identifier<'m, M> {
    pub fn new(model: &'m M, threshold: f32) -> Self {
        Self { model, threshold, names: None }
    }

    pub fn with_names(mut self, names: &'m NameMap) -> Self {
        self.names = Some(names);
        self
    }

    /// Classify one embedding and apply display names.
    pub fn classify(&self, embedding: &Embedding) -> Result<ClassificationResult, ClassifyError> {
        let mut result = classify(embedding, self.model, self.threshold)?;
        if let Some(names) = self.names {
            result.label = names.display(result.label);
        }
        Ok(result)
    }

    /// Classify every face of one image, then resolve duplicate labels.
    /// Output order matches `faces`.
    pub fn identify(&self, faces: &[FaceObservation]) -> Result<Vec<IdentifiedFace>, ClassifyError> {
        let raw = faces
            .iter()
            .map(|face| self.classify(&face.embedding))
            .collect::<Result<Vec<_>, _>>()?;

        let resolved = resolve(&raw, self.threshold);

        Ok(faces
            .iter()
            .zip(resolved)
            .map(|(face, result)| IdentifiedFace {
                bounding_box: face.bounding_box,
                result,
            })
            .collect())
    }
}

/// Extract and identify one image. Failures are reported in the outcome
/// rather than returned, so a batch can continue past a bad file.
pub fn identify_image<M, E>(
    identifier: &Identifier<'_, M>,
    extractor: &mut E,
    path: &Path,
) -> ImageReport
where
    M: TrainedModel + ?Sized,
    E: FaceExtractor + ?Sized,
{
    let outcome = match extractor.extract(path) {
        Ok(faces) if faces.is_empty() => ImageOutcome::NoFace,
        Ok(faces) => match identifier.identify(&faces) {
            Ok(faces) => ImageOutcome::Faces { faces },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "classification failed");
                ImageOutcome::Failed { reason: e.to_string() }
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "extraction failed");
            ImageOutcome::Failed { reason: e.to_string() }
        }
    };

    if let ImageOutcome::Faces { faces } = &outcome {
        tracing::debug!(
            path = %path.display(),
            faces = faces.len(),
            named = faces.iter().filter(|f| !f.result.is_unknown()).count(),
            "identified image"
        );
    }

    ImageReport { path: path.to_path_buf(), outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::FixedModel;
    use crate::extractor::ExtractError;
    use crate::types::Label;
    use std::collections::HashMap;

    /// Model whose distribution is the embedding itself.
    struct EchoModel {
        names: Vec<String>,
    }

    impl TrainedModel for EchoModel {
        fn predict_probabilities(&self, embedding: &Embedding) -> Result<Vec<f32>, ClassifyError> {
            if embedding.dimension() != self.names.len() {
                return Err(ClassifyError::DimensionMismatch {
                    expected: self.names.len(),
                    actual: embedding.dimension(),
                });
            }
            Ok(embedding.values.clone())
        }

        fn class_name(&self, index: usize) -> Option<&str> {
            self.names.get(index).map(String::as_str)
        }

        fn class_count(&self) -> usize {
            self.names.len()
        }
    }

    fn echo() -> EchoModel {
        EchoModel { names: vec!["Alice".into(), "Bob".into()] }
    }

    fn obs(values: &[f32], left: u32) -> FaceObservation {
        FaceObservation {
            embedding: Embedding::new(values.to_vec()),
            bounding_box: BoundingBox::new(0, left + 10, 10, left),
            source_image: "group.jpg".into(),
        }
    }

    struct MapExtractor(HashMap<PathBuf, Result<Vec<FaceObservation>, String>>);

    impl FaceExtractor for MapExtractor {
        fn extract(&mut self, image: &Path) -> Result<Vec<FaceObservation>, ExtractError> {
            match self.0.get(image) {
                Some(Ok(faces)) => Ok(faces.clone()),
                Some(Err(reason)) => Err(ExtractError::Failed {
                    path: image.display().to_string(),
                    reason: reason.clone(),
                }),
                None => Err(ExtractError::NotInManifest(image.display().to_string())),
            }
        }
    }

    #[test]
    fn test_identify_resolves_same_image_duplicates() {
        let model = echo();
        let identifier = Identifier::new(&model, 0.70);
        let faces = vec![obs(&[0.92, 0.08], 0), obs(&[0.81, 0.19], 20), obs(&[0.05, 0.95], 40)];
        let identified = identifier.identify(&faces).unwrap();

        let labels: Vec<String> = identified.iter().map(|f| f.result.label.to_string()).collect();
        assert_eq!(labels, vec!["Alice", "Unknown", "Bob"]);
        assert!((identified[1].result.confidence - 0.81).abs() < 1e-6);
        assert_eq!(identified[2].bounding_box.left, 40);
    }

    #[test]
    fn test_identify_propagates_model_error() {
        let model = echo();
        let identifier = Identifier::new(&model, 0.70);
        let faces = vec![obs(&[0.9, 0.1], 0), obs(&[1.0], 20)];
        assert!(matches!(
            identifier.identify(&faces),
            Err(ClassifyError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_names_applied_before_resolution() {
        let model = FixedModel::new(&["taro", "jiro"], &[0.9, 0.1]);
        let names = NameMap::new(HashMap::from([("taro".to_string(), "Taro".to_string())]));
        let identifier = Identifier::new(&model, 0.70).with_names(&names);
        let faces = vec![obs(&[0.0], 0), obs(&[0.0], 20)];
        let identified = identifier.identify(&faces).unwrap();
        assert_eq!(identified[0].result.label, Label::from("Taro"));
        assert!(identified[1].result.is_unknown());
    }

    #[test]
    fn test_identify_image_outcomes() {
        let model = echo();
        let identifier = Identifier::new(&model, 0.70);
        let mut extractor = MapExtractor(HashMap::from([
            (PathBuf::from("one.jpg"), Ok(vec![obs(&[0.1, 0.9], 0)])),
            (PathBuf::from("none.jpg"), Ok(vec![])),
            (PathBuf::from("bad.jpg"), Err("truncated".to_string())),
            (PathBuf::from("odd.jpg"), Ok(vec![obs(&[1.0, 0.0, 0.0], 0)])),
        ]));

        let report = identify_image(&identifier, &mut extractor, Path::new("one.jpg"));
        match report.outcome {
            ImageOutcome::Faces { faces } => {
                assert_eq!(faces.len(), 1);
                assert_eq!(faces[0].result.label, Label::from("Bob"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let report = identify_image(&identifier, &mut extractor, Path::new("none.jpg"));
        assert_eq!(report.outcome, ImageOutcome::NoFace);
        assert_eq!(report.path, PathBuf::from("none.jpg"));

        for path in ["bad.jpg", "odd.jpg", "missing.jpg"] {
            let report = identify_image(&identifier, &mut extractor, Path::new(path));
            assert!(matches!(report.outcome, ImageOutcome::Failed { .. }), "{path}");
        }
    }

    #[test]
    fn test_report_serializes_with_status_tag() {
        let report = ImageReport {
            path: PathBuf::from("a.jpg"),
            outcome: ImageOutcome::Faces {
                faces: vec![IdentifiedFace {
                    bounding_box: BoundingBox::new(1, 2, 3, 4),
                    result: ClassificationResult::new("Alice", 0.5),
                }],
            },
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "faces");
        assert_eq!(value["faces"][0]["label"], "Alice");
        assert_eq!(value["faces"][0]["bounding_box"]["left"], 4);

        let none = ImageReport { path: PathBuf::from("b.jpg"), outcome: ImageOutcome::NoFace };
        assert_eq!(serde_json::to_value(&none).unwrap()["status"], "no_face");
    }
}
