//! Training-set collection from a `<train_dir>/<person>/<image>` layout.

use crate::extractor::{list_images, FaceExtractor};
use crate::types::Embedding;
use std::path::{Path, PathBuf};

/// Labeled embeddings plus counters describing how they were gathered.
#[derive(Debug, Default)]
pub struct TrainingSet {
    pub samples: Vec<(String, Embedding)>,
    pub images_scanned: usize,
    pub images_without_face: usize,
    /// Images whose extraction failed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl TrainingSet {
    /// Distinct person names, sorted.
    pub fn people(&self) -> Vec<&str> {
        let mut people: Vec<&str> = self.samples.iter().map(|(name, _)| name.as_str()).collect();
        people.sort_unstable();
        people.dedup();
        people
    }
}

/// Walk every non-hidden subdirectory of `train_dir` as one person and take
/// the first detected face of each image as a sample.
pub fn collect_training_set<E: FaceExtractor + ?Sized>(
    train_dir: &Path,
    extractor: &mut E,
) -> std::io::Result<TrainingSet> {
    let mut people: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(train_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || !path.is_dir() {
            continue;
        }
        people.push((name.to_string(), path.clone()));
    }
    people.sort();

    let mut set = TrainingSet::default();
    for (person, dir) in people {
        let images = list_images(&dir)?;
        tracing::info!(person = %person, images = images.len(), "collecting samples");

        for image in images {
            set.images_scanned += 1;
            match extractor.extract(&image) {
                Ok(faces) => match faces.into_iter().next() {
                    Some(face) => set.samples.push((person.clone(), face.embedding)),
                    None => {
                        tracing::debug!(path = %image.display(), "no face in training image");
                        set.images_without_face += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %image.display(), error = %e, "skipping training image");
                    set.failures.push((image, e.to_string()));
                }
            }
        }
    }

    Ok(set)
}
