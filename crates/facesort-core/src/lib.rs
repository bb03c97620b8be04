//! facesort-core — Face identification and photo sorting engine.
//!
//! Classifies face embeddings against a trained model with a confidence
//! threshold, resolves same-image duplicate identities, and files or crops
//! images by identified person. Detection and embedding extraction happen
//! behind the [`FaceExtractor`] seam.

pub mod classifier;
pub mod crop;
pub mod disambiguator;
pub mod extractor;
pub mod identify;
pub mod model;
pub mod names;
pub mod sorter;
pub mod training;
pub mod types;

pub use classifier::{classify, ClassifyError, TrainedModel};
pub use disambiguator::resolve;
pub use extractor::{FaceExtractor, ManifestExtractor};
pub use identify::{identify_image, IdentifiedFace, Identifier, ImageOutcome, ImageReport};
pub use model::CentroidModel;
pub use names::NameMap;
pub use types::{BoundingBox, ClassificationResult, Embedding, FaceObservation, Label};
