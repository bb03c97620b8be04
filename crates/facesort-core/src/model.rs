//! Nearest-centroid face classifier with JSON persistence.
//!
//! One mean embedding per person; probabilities are a temperature-scaled
//! softmax over cosine similarity to each centroid. The whole model is
//! stored as a single JSON blob.

use crate::classifier::{ClassifyError, TrainedModel};
use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Softmax temperature applied to cosine similarities.
pub const DEFAULT_TEMPERATURE: f32 = 0.05;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0}; run `facesort train` first")]
    NotFound(String),
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("sample for {label} has {actual} dimensions, expected {expected}")]
    InconsistentDimension {
        label: String,
        expected: usize,
        actual: usize,
    },
    #[error("temperature must be positive, got {0}")]
    InvalidTemperature(f32),
    #[error("model has no classes")]
    NoClasses,
    #[error("centroid for {label} has {actual} dimensions, model declares {expected}")]
    CorruptCentroid {
        label: String,
        expected: usize,
        actual: usize,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("model format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Centroid and sample count for one trained person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassCentroid {
    pub name: String,
    pub centroid: Embedding,
    pub samples: usize,
}

/// A trained nearest-centroid model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidModel {
    pub id: String,
    pub created_at: String,
    pub dimension: usize,
    pub temperature: f32,
    /// Extractor version of the training embeddings, if they agreed on one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Sorted by name, so class indices are stable across retraining.
    pub classes: Vec<ClassCentroid>,
}

impl CentroidModel {
    /// Train from `(person, embedding)` samples.
    pub fn train(samples: &[(String, Embedding)], temperature: f32) -> Result<Self, ModelError> {
        if !(temperature > 0.0) {
            return Err(ModelError::InvalidTemperature(temperature));
        }
        let (_, first) = samples.first().ok_or(ModelError::EmptyTrainingSet)?;
        let dimension = first.dimension();

        let mut sums: BTreeMap<&str, (Vec<f32>, usize)> = BTreeMap::new();
        for (label, embedding) in samples {
            if embedding.dimension() != dimension {
                return Err(ModelError::InconsistentDimension {
                    label: label.clone(),
                    expected: dimension,
                    actual: embedding.dimension(),
                });
            }
            let (sum, count) = sums
                .entry(label.as_str())
                .or_insert_with(|| (vec![0.0; dimension], 0));
            for (acc, v) in sum.iter_mut().zip(embedding.values.iter()) {
                *acc += v;
            }
            *count += 1;
        }

        let classes: Vec<ClassCentroid> = sums
            .into_iter()
            .map(|(name, (sum, count))| ClassCentroid {
                name: name.to_string(),
                centroid: Embedding::new(sum.into_iter().map(|v| v / count as f32).collect()),
                samples: count,
            })
            .collect();

        let model_version = first.model_version.clone().filter(|version| {
            samples
                .iter()
                .all(|(_, e)| e.model_version.as_deref() == Some(version.as_str()))
        });

        tracing::info!(
            classes = classes.len(),
            samples = samples.len(),
            dimension,
            "trained centroid model"
        );

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            dimension,
            temperature,
            model_version,
            classes,
        })
    }

    /// Load a model previously written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&raw)?;
        model.validate()?;
        tracing::info!(
            path = %path.display(),
            id = %model.id,
            classes = model.classes.len(),
            "loaded model"
        );
        Ok(model)
    }

    /// Check the invariants `train` guarantees, for blobs read from disk.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.temperature > 0.0 && self.temperature.is_finite()) {
            return Err(ModelError::InvalidTemperature(self.temperature));
        }
        if self.classes.is_empty() {
            return Err(ModelError::NoClasses);
        }
        if let Some(class) = self
            .classes
            .iter()
            .find(|c| c.centroid.dimension() != self.dimension)
        {
            return Err(ModelError::CorruptCentroid {
                label: class.name.clone(),
                expected: self.dimension,
                actual: class.centroid.dimension(),
            });
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        tracing::info!(path = %path.display(), id = %self.id, "saved model");
        Ok(())
    }
}

impl TrainedModel for CentroidModel {
    fn predict_probabilities(&self, embedding: &Embedding) -> Result<Vec<f32>, ClassifyError> {
        if embedding.dimension() != self.dimension {
            return Err(ClassifyError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.dimension(),
            });
        }
        if self.classes.is_empty() {
            return Err(ClassifyError::EmptyDistribution);
        }

        let logits: Vec<f32> = self
            .classes
            .iter()
            .map(|c| embedding.similarity(&c.centroid) / self.temperature)
            .collect();

        // Subtract the max logit for numerical stability.
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exps.iter().sum();
        if !(total > 0.0) {
            return Err(ClassifyError::Model(format!(
                "degenerate softmax over {} classes",
                self.classes.len()
            )));
        }

        Ok(exps.into_iter().map(|e| e / total).collect())
    }

    fn class_name(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(|c| c.name.as_str())
    }

    fn class_count(&self) -> usize {
        self.classes.len()
    }
}
