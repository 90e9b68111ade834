use anyhow::Result;
use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::artifacts::write_json;
use crate::clean::Inpaint;
use crate::compose::{Composer, FontMetrics};
use crate::error::PipelineError;
use crate::ocr::{Detection, Detector, detect_image, load_image};
use crate::paths::WorkLayout;
use crate::refine::{RefinedRegion, RegionSet, Refiner, write_overlay};
use crate::settings::TranslationUnit;
use crate::svg::save_image;
use crate::translate::{Translate, TranslationResult, normalize_lang, translate_texts};

/// What a full run leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineArtifact {
    pub output: PathBuf,
    pub target_lang: String,
    pub regions: usize,
}

/// Every collaborator of a full run, each behind its trait.
pub struct Pipeline {
    pub detector: Box<dyn Detector>,
    pub refiner: Refiner,
    pub translator: Box<dyn Translate>,
    pub cleaner: Box<dyn Inpaint>,
    pub composer: Composer,
    pub unit: TranslationUnit,
    pub debug_overlay: bool,
}

impl Pipeline {
    /// Runs every stage on `input`, writing each stage's file on the way.
    pub async fn run(
        &self,
        input: &Path,
        layout: &WorkLayout,
        target_lang: &str,
    ) -> Result<PipelineArtifact> {
        let image = load_image(input)?;
        let detection = detect_stage(self.detector.as_ref(), &image, input, layout)?;
        if detection.boxes.is_empty() {
            return Err(PipelineError::NoTextFound {
                path: input.to_path_buf(),
            }
            .into());
        }

        let overlay = self
            .debug_overlay
            .then_some((&image, self.composer.font()));
        let regions = refine_stage(&self.refiner, &detection, layout, overlay)?;
        let translation = translate_stage(
            self.translator.as_ref(),
            &regions,
            self.unit,
            target_lang,
            layout,
        )
        .await?;
        let blank = clean_stage(self.cleaner.as_ref(), &image, &regions, layout)?;
        let output = compose_stage(
            &self.composer,
            &blank,
            &regions,
            &translation,
            self.unit,
            layout,
        )?;

        Ok(PipelineArtifact {
            output,
            target_lang: translation.target_lang,
            regions: regions.regions.len(),
        })
    }
}

pub fn detect_stage(
    detector: &dyn Detector,
    image: &DynamicImage,
    input: &Path,
    layout: &WorkLayout,
) -> Result<Detection> {
    let detection = detect_image(detector, image, input)?;
    write_json(&layout.detections_path(), &detection)?;
    Ok(detection)
}

/// Refines the detection and stores the regions; draws the debug overlay
/// when a source image and label font are given.
pub fn refine_stage(
    refiner: &Refiner,
    detection: &Detection,
    layout: &WorkLayout,
    overlay: Option<(&DynamicImage, &FontMetrics)>,
) -> Result<RegionSet> {
    let regions = RegionSet {
        image: detection.image.clone(),
        width: detection.width,
        height: detection.height,
        regions: refiner.refine(&detection.boxes, detection.width, detection.height),
    };
    write_json(&layout.regions_path(), &regions)?;
    if let Some((image, font)) = overlay {
        write_overlay(image, &regions.regions, &layout.overlay_path(), font)?;
    }
    Ok(regions)
}

pub async fn translate_stage(
    translator: &dyn Translate,
    regions: &RegionSet,
    unit: TranslationUnit,
    target_lang: &str,
    layout: &WorkLayout,
) -> Result<TranslationResult> {
    if regions.regions.is_empty() {
        return Err(PipelineError::NoTextFound {
            path: PathBuf::from(&regions.image),
        }
        .into());
    }
    let texts = source_texts(&regions.regions, unit);
    let translation = translate_texts(translator, &texts, target_lang).await?;
    write_json(&layout.translation_path(&translation.target_lang), &translation)?;
    Ok(translation)
}

pub fn clean_stage(
    cleaner: &dyn Inpaint,
    image: &DynamicImage,
    regions: &RegionSet,
    layout: &WorkLayout,
) -> Result<DynamicImage> {
    let blank = cleaner.clean(image, &regions.regions)?;
    let path = layout.blank_path();
    save_image(&blank, &path)?;
    info!("wrote cleaned image: {}", path.display());
    Ok(blank)
}

pub fn compose_stage(
    composer: &Composer,
    blank: &DynamicImage,
    regions: &RegionSet,
    translation: &TranslationResult,
    unit: TranslationUnit,
    layout: &WorkLayout,
) -> Result<PathBuf> {
    let texts = translated_texts(&regions.regions, translation, unit)?;
    let composed = composer.compose(blank, &texts)?;
    let path = layout.output_path(&normalize_lang(&translation.target_lang));
    save_image(&DynamicImage::ImageRgba8(composed), &path)?;
    info!("wrote translated image: {}", path.display());
    Ok(path)
}

/// Texts sent to the translator, in region then reading order.
fn source_texts(regions: &[RefinedRegion], unit: TranslationUnit) -> Vec<String> {
    match unit {
        TranslationUnit::Fragment => regions
            .iter()
            .flat_map(|region| region.fragments.iter().map(|fragment| fragment.text.clone()))
            .collect(),
        TranslationUnit::Region => regions.iter().map(|region| region.text.clone()).collect(),
    }
}

fn translated_texts<'a>(
    regions: &'a [RefinedRegion],
    translation: &TranslationResult,
    unit: TranslationUnit,
) -> Result<Vec<(&'a RefinedRegion, String)>> {
    let lookup = |original: &str| -> Result<String> {
        translation
            .get(original)
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::Translation(format!("no translation stored for '{}'", original))
                    .into()
            })
    };
    regions
        .iter()
        .map(|region| {
            let text = match unit {
                TranslationUnit::Fragment => region
                    .fragments
                    .iter()
                    .map(|fragment| lookup(&fragment.text))
                    .collect::<Result<Vec<_>>>()?
                    .join(" "),
                TranslationUnit::Region => lookup(&region.text)?,
            };
            Ok((region, text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::ocr::TextBox;
    use crate::translate::TranslationEntry;

    fn regions() -> Vec<RefinedRegion> {
        let fragments = vec![
            TextBox::new("¡Hola", Rect::new(10, 10, 40, 20), 90.0),
            TextBox::new("amigo!", Rect::new(54, 10, 50, 20), 90.0),
        ];
        vec![RefinedRegion {
            index: 1,
            bounds: Rect::new(0, 0, 114, 40),
            union: Rect::new(10, 10, 94, 20),
            text: "¡Hola amigo!".to_string(),
            fragments,
        }]
    }

    fn translation(pairs: &[(&str, &str)]) -> TranslationResult {
        TranslationResult {
            target_lang: "EN-US".to_string(),
            entries: pairs
                .iter()
                .map(|(original, translated)| TranslationEntry {
                    original: original.to_string(),
                    translated: translated.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn fragment_unit_joins_translated_fragments() {
        let regions = regions();
        assert_eq!(
            source_texts(&regions, TranslationUnit::Fragment),
            vec!["¡Hola", "amigo!"]
        );
        let texts = translated_texts(
            &regions,
            &translation(&[("¡Hola", "Hi"), ("amigo!", "friend!")]),
            TranslationUnit::Fragment,
        )
        .expect("texts");
        assert_eq!(texts[0].1, "Hi friend!");
    }

    #[test]
    fn region_unit_translates_whole_bubbles() {
        let regions = regions();
        assert_eq!(
            source_texts(&regions, TranslationUnit::Region),
            vec!["¡Hola amigo!"]
        );
        let texts = translated_texts(
            &regions,
            &translation(&[("¡Hola amigo!", "Hi friend!")]),
            TranslationUnit::Region,
        )
        .expect("texts");
        assert_eq!(texts[0].1, "Hi friend!");
    }

    #[test]
    fn stale_translation_file_is_reported() {
        let err = translated_texts(
            &regions(),
            &translation(&[("otra cosa", "something else")]),
            TranslationUnit::Region,
        )
        .expect_err("missing");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Translation(_))
        ));
    }
}
