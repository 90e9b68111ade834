mod parse;
mod preprocess;
mod tesseract;

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::geometry::Rect;

pub use tesseract::{TesseractDetector, list_tesseract_languages};

/// One OCR fragment (usually a word) and where it sits in the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub text: String,
    pub bbox: Rect,
    pub conf: f32,
}

impl TextBox {
    pub fn new(text: impl Into<String>, bbox: Rect, conf: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            conf,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<TextBox>,
}

/// Produces text fragments with their bounding boxes.
pub trait Detector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBox>>;
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let image = image::open(path).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image)
}

/// Runs `detector` over an already decoded image. Boxes are clamped to the
/// image and degenerate ones dropped; an empty result means no text.
pub fn detect_image(
    detector: &dyn Detector,
    image: &DynamicImage,
    source: &Path,
) -> Result<Detection> {
    let (width, height) = image.dimensions();
    let raw = detector.detect(image)?;
    let raw_count = raw.len();
    let boxes = raw
        .into_iter()
        .filter_map(|mut text_box| {
            text_box.bbox = text_box.bbox.clamp_to(width, height);
            let text = text_box.text.trim();
            if text.is_empty() || text_box.bbox.is_empty() {
                return None;
            }
            text_box.text = text.to_string();
            Some(text_box)
        })
        .collect::<Vec<_>>();
    if boxes.len() != raw_count {
        debug!("dropped {} empty or out-of-bounds boxes", raw_count - boxes.len());
    }
    info!(
        "detected {} text fragment(s) in {}",
        boxes.len(),
        source.display()
    );
    Ok(Detection {
        image: source.to_string_lossy().to_string(),
        width,
        height,
        boxes,
    })
}

pub fn detect_path(detector: &dyn Detector, path: &Path) -> Result<Detection> {
    let image = load_image(path)?;
    detect_image(detector, &image, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector(Vec<TextBox>);

    impl Detector for FixedDetector {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<TextBox>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn detect_image_clamps_and_drops_boxes() {
        let image = DynamicImage::new_rgba8(100, 50);
        let detector = FixedDetector(vec![
            TextBox::new(" Hola ", Rect::new(90, 40, 30, 30), 90.0),
            TextBox::new("fuera", Rect::new(200, 10, 10, 10), 90.0),
            TextBox::new("   ", Rect::new(0, 0, 10, 10), 90.0),
        ]);
        let detection =
            detect_image(&detector, &image, Path::new("bubble.png")).expect("detect");
        assert_eq!(detection.width, 100);
        assert_eq!(detection.height, 50);
        assert_eq!(
            detection.boxes,
            vec![TextBox::new("Hola", Rect::new(90, 40, 10, 10), 90.0)]
        );
    }

    #[test]
    fn undecodable_file_is_a_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").expect("write");
        let err = load_image(&path).expect_err("decode should fail");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Decode { .. })
        ));
    }
}
