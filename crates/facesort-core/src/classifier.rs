//! Threshold classification of a single face embedding.
//!
//! Queries a trained model for its per-class probability distribution and
//! floors low-confidence predictions to [`Label::Unknown`].

use crate::types::{ClassificationResult, Embedding, Label};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("embedding has {actual} dimensions, model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("model returned an empty probability distribution")]
    EmptyDistribution,
    #[error("model has no class at index {0}")]
    UnknownClass(usize),
    #[error("model error: {0}")]
    Model(String),
}

/// A trained embedding classifier, read-only for the lifetime of a session.
pub trait TrainedModel {
    /// Probability for every trained class, indexed by class.
    fn predict_probabilities(&self, embedding: &Embedding) -> Result<Vec<f32>, ClassifyError>;

    /// Person name for a class index.
    fn class_name(&self, index: usize) -> Option<&str>;

    fn class_count(&self) -> usize;
}

/// Classify one embedding.
///
/// The label is the argmax class name when its probability is at least
/// `threshold`, otherwise `Unknown`. Confidence is always the raw maximum.
pub fn classify<M: TrainedModel + ?Sized>(
    embedding: &Embedding,
    model: &M,
    threshold: f32,
) -> Result<ClassificationResult, ClassifyError> {
    let probabilities = model.predict_probabilities(embedding)?;
    let (argmax, max_proba) = argmax(&probabilities).ok_or(ClassifyError::EmptyDistribution)?;

    if max_proba >= threshold {
        let name = model
            .class_name(argmax)
            .ok_or(ClassifyError::UnknownClass(argmax))?;
        Ok(ClassificationResult::new(Label::from(name), max_proba))
    } else {
        Ok(ClassificationResult::unknown(max_proba))
    }
}

/// Index and value of the largest probability. The first index wins on
/// exact ties; NaN entries are skipped.
fn argmax(probabilities: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probabilities.iter().enumerate() {
        if p.is_nan() {
            continue;
        }
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((i, p)),
        }
    }
    best
}
