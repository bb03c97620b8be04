//! Padded face crops for building a training set.

use crate::types::BoundingBox;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Pixels added around each detected face before cropping.
pub const DEFAULT_PADDING: u32 = 50;

#[derive(Error, Debug)]
pub enum CropError {
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("face box {0:?} lies outside the image")]
    EmptyCrop(BoundingBox),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Crop one face, padded on every side and clamped to the image.
pub fn crop_face(
    image: &DynamicImage,
    face: &BoundingBox,
    padding: u32,
) -> Result<DynamicImage, CropError> {
    let area = face.padded(padding, image.width(), image.height());
    if area.width() == 0 || area.height() == 0 {
        return Err(CropError::EmptyCrop(*face));
    }
    Ok(image.crop_imm(area.left, area.top, area.width(), area.height()))
}

/// Output path `<output_dir>/<stem>_face_<n>.<ext>`, `n` counted from 1.
pub fn crop_path(image_path: &Path, index: usize, output_dir: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let file_name = match image_path.extension() {
        Some(ext) => format!("{stem}_face_{}.{}", index + 1, ext.to_string_lossy()),
        None => format!("{stem}_face_{}", index + 1),
    };
    output_dir.join(file_name)
}

/// Crop every face of one image and save the crops into `output_dir`.
/// Returns the written paths in face order.
pub fn crop_faces(
    image_path: &Path,
    faces: &[BoundingBox],
    padding: u32,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, CropError> {
    if faces.is_empty() {
        return Ok(Vec::new());
    }

    let image = image::open(image_path)?;
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(faces.len());
    for (i, face) in faces.iter().enumerate() {
        let crop = crop_face(&image, face, padding)?;
        let dest = crop_path(image_path, i, output_dir);
        crop.save(&dest)?;
        written.push(dest);
    }

    tracing::debug!(path = %image_path.display(), crops = written.len(), "saved face crops");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn canvas(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([x as u8, y as u8, 0])
        }))
    }

    #[test]
    fn test_crop_face_with_padding() {
        let image = canvas(200, 200);
        let crop = crop_face(&image, &BoundingBox::new(80, 120, 120, 80), 10).unwrap();
        assert_eq!((crop.width(), crop.height()), (60, 60));
        assert_eq!(crop.to_rgb8().get_pixel(0, 0), &Rgb([70, 70, 0]));
    }

    #[test]
    fn test_crop_face_clamped_at_edges() {
        let image = canvas(100, 80);
        let crop = crop_face(&image, &BoundingBox::new(10, 95, 70, 20), DEFAULT_PADDING).unwrap();
        assert_eq!((crop.width(), crop.height()), (100, 80));
    }

    #[test]
    fn test_crop_face_outside_image() {
        let image = canvas(50, 50);
        let err = crop_face(&image, &BoundingBox::new(100, 140, 140, 100), 0).unwrap_err();
        assert!(matches!(err, CropError::EmptyCrop(_)));
    }

    #[test]
    fn test_crop_path_naming() {
        let path = crop_path(Path::new("/in/holiday.jpg"), 1, Path::new("/out"));
        assert_eq!(path, PathBuf::from("/out/holiday_face_2.jpg"));
    }

    #[test]
    fn test_crop_faces_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("group.png");
        canvas(120, 120).save(&source).unwrap();

        let out = dir.path().join("crops");
        let faces = [BoundingBox::new(10, 40, 40, 10), BoundingBox::new(60, 110, 110, 60)];
        let written = crop_faces(&source, &faces, 15, &out).unwrap();

        assert_eq!(written, vec![out.join("group_face_1.png"), out.join("group_face_2.png")]);
        let first = image::open(&written[0]).unwrap();
        assert_eq!((first.width(), first.height()), (55, 55));
        // Second face is clamped at the bottom-right corner.
        let second = image::open(&written[1]).unwrap();
        assert_eq!((second.width(), second.height()), (75, 75));
    }

    #[test]
    fn test_crop_faces_no_faces_skips_decode() {
        let dir = tempfile::tempdir().unwrap();
        let written = crop_faces(&dir.path().join("missing.jpg"), &[], 5, dir.path()).unwrap();
        assert!(written.is_empty());
    }
}
