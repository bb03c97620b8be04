//! File images into one folder per identified person.

use crate::identify::{ImageOutcome, ImageReport};
use crate::types::UNKNOWN_LABEL;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bucket for images in which no face was detected.
pub const NO_FACE_BUCKET: &str = "Unknown (No Face)";
/// Bucket for images that could not be processed.
pub const ERROR_BUCKET: &str = "Unknown (Error)";

#[derive(Error, Debug)]
pub enum SortError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: String,
        to: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortEntry {
    pub path: PathBuf,
    pub confidence: f32,
}

/// Bucket name and confidence for one image.
///
/// An image with faces goes to its most confident named face (first wins on
/// ties); if every face is `Unknown` it goes to `Unknown` at 0.0.
pub fn bucket_for(outcome: &ImageOutcome) -> (String, f32) {
    match outcome {
        ImageOutcome::Faces { faces } => {
            let mut best: Option<(&str, f32)> = None;
            for face in faces.iter().filter(|f| !f.result.is_unknown()) {
                match best {
                    Some((_, confidence)) if face.result.confidence <= confidence => {}
                    _ => best = Some((face.result.label.as_str(), face.result.confidence)),
                }
            }
            match best {
                Some((label, confidence)) => (label.to_string(), confidence),
                None => (UNKNOWN_LABEL.to_string(), 0.0),
            }
        }
        ImageOutcome::NoFace => (NO_FACE_BUCKET.to_string(), 0.0),
        ImageOutcome::Failed { .. } => (ERROR_BUCKET.to_string(), 0.0),
    }
}

/// Folder name for a bucket; path separators are replaced.
fn folder_name(bucket: &str) -> String {
    let name: String = bucket
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    match name.as_str() {
        "" | "." | ".." => format!("_{name}"),
        _ => name,
    }
}

/// Images grouped by bucket, in bucket-name order.
#[derive(Debug, Default)]
pub struct SortPlan {
    pub buckets: BTreeMap<String, Vec<SortEntry>>,
}

impl SortPlan {
    pub fn from_reports<'a, I>(reports: I) -> Self
    where
        I: IntoIterator<Item = &'a ImageReport>,
    {
        let mut plan = SortPlan::default();
        for report in reports {
            let (bucket, confidence) = bucket_for(&report.outcome);
            plan.buckets.entry(bucket).or_default().push(SortEntry {
                path: report.path.clone(),
                confidence,
            });
        }
        plan
    }

    pub fn total_images(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Copy every image into `<output_dir>/<bucket>/`. Returns the number of
    /// files copied per bucket.
    pub fn apply(&self, output_dir: &Path) -> Result<BTreeMap<String, usize>, SortError> {
        let mut copied = BTreeMap::new();

        for (bucket, entries) in &self.buckets {
            let folder = output_dir.join(folder_name(bucket));
            std::fs::create_dir_all(&folder).map_err(|source| SortError::CreateDir {
                path: folder.display().to_string(),
                source,
            })?;
            tracing::info!(bucket = %bucket, images = entries.len(), "filing images");

            for entry in entries {
                let Some(file_name) = entry.path.file_name() else {
                    tracing::warn!(path = %entry.path.display(), "skipping path without file name");
                    continue;
                };
                let dest = folder.join(file_name);
                std::fs::copy(&entry.path, &dest).map_err(|source| SortError::Copy {
                    from: entry.path.display().to_string(),
                    to: dest.display().to_string(),
                    source,
                })?;
                *copied.entry(bucket.clone()).or_insert(0) += 1;
            }
        }

        Ok(copied)
    }
}
