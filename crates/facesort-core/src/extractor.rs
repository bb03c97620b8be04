//! Face detection + embedding extraction seam.
//!
//! The extractor is a black box: an image path in, a list of detected faces
//! with their embeddings out. [`ManifestExtractor`] serves detections that
//! were computed ahead of time and stored in a JSON manifest.

use crate::types::{BoundingBox, Embedding, FaceObservation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions accepted as input images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("image not in manifest: {0}")]
    NotInManifest(String),
    #[error("extraction failed for {path}: {reason}")]
    Failed { path: String, reason: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Detects faces in an image and computes one embedding per face.
pub trait FaceExtractor {
    fn extract(&mut self, image: &Path) -> Result<Vec<FaceObservation>, ExtractError>;
}

/// One face entry of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFace {
    pub bounding_box: BoundingBox,
    pub embedding: Vec<f32>,
}

/// Detections for one image. `error` records an extraction failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestImage {
    pub path: PathBuf,
    #[serde(default)]
    pub faces: Vec<ManifestFace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Extractor that produced the embeddings (e.g. "dlib-128").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    pub images: Vec<ManifestImage>,
}

/// Extractor backed by a precomputed [`Manifest`].
///
/// Lookup is by full path first, then by file name when that name is unique
/// in the manifest.
pub struct ManifestExtractor {
    model_version: Option<String>,
    images: Vec<ManifestImage>,
    by_path: HashMap<PathBuf, usize>,
    /// `None` marks a file name shared by several entries.
    by_name: HashMap<OsString, Option<usize>>,
}

impl ManifestExtractor {
    /// Build from a manifest; relative entry paths are resolved against `base_dir`.
    pub fn new(manifest: Manifest, base_dir: &Path) -> Self {
        let mut by_path = HashMap::new();
        let mut by_name: HashMap<OsString, Option<usize>> = HashMap::new();
        let mut images = manifest.images;

        for (idx, image) in images.iter_mut().enumerate() {
            if image.path.is_relative() {
                image.path = base_dir.join(&image.path);
            }
            by_path.insert(image.path.clone(), idx);
            if let Some(name) = image.path.file_name() {
                by_name
                    .entry(name.to_os_string())
                    .and_modify(|slot| *slot = None)
                    .or_insert(Some(idx));
            }
        }

        Self {
            model_version: manifest.model_version,
            images,
            by_path,
            by_name,
        }
    }

    /// Load a manifest file; relative paths inside it are resolved against
    /// the manifest's own directory.
    pub fn load(path: &Path) -> Result<Self, ExtractError> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&raw)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        tracing::info!(
            path = %path.display(),
            images = manifest.images.len(),
            "loaded embedding manifest"
        );
        Ok(Self::new(manifest, base_dir))
    }

    fn lookup(&self, image: &Path) -> Option<&ManifestImage> {
        let idx = self.by_path.get(image).copied().or_else(|| {
            image
                .file_name()
                .and_then(|name| self.by_name.get(name).copied().flatten())
        })?;
        self.images.get(idx)
    }
}

impl FaceExtractor for ManifestExtractor {
    fn extract(&mut self, image: &Path) -> Result<Vec<FaceObservation>, ExtractError> {
        let entry = self
            .lookup(image)
            .ok_or_else(|| ExtractError::NotInManifest(image.display().to_string()))?;

        if let Some(reason) = &entry.error {
            return Err(ExtractError::Failed {
                path: image.display().to_string(),
                reason: reason.clone(),
            });
        }

        let source_image = image.display().to_string();
        Ok(entry
            .faces
            .iter()
            .map(|face| FaceObservation {
                embedding: Embedding {
                    values: face.embedding.clone(),
                    model_version: self.model_version.clone(),
                },
                bounding_box: face.bounding_box,
                source_image: source_image.clone(),
            })
            .collect())
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Supported image files directly inside `dir`, sorted by path.
pub fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}
