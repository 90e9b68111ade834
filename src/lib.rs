use anyhow::Result;
use std::path::{Path, PathBuf};

pub mod artifacts;
pub mod bubble;
pub mod clean;
pub mod compose;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod refine;
pub mod settings;
pub mod svg;
pub mod translate;

pub use bubble::BubbleMask;
pub use clean::{FillCleaner, Inpaint};
pub use compose::Composer;
pub use error::PipelineError;
pub use geometry::Rect;
pub use ocr::{Detection, Detector, TesseractDetector, TextBox};
pub use pipeline::{Pipeline, PipelineArtifact};
pub use refine::{RefinedRegion, RegionSet, Refiner};
pub use settings::Settings;
pub use translate::{DeepL, Translate, TranslationResult};

use paths::WorkLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detect,
    Refine,
    Translate,
    Clean,
    Compose,
    Run,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub stage: Stage,
    pub input: PathBuf,
    pub lang: String,
    pub key: Option<String>,
    pub settings_path: Option<String>,
    pub work_dir: Option<String>,
    pub output_dir: Option<String>,
    pub no_overlay: bool,
}

/// Runs one stage (or the whole pipeline) and returns a one-line summary.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if let Some(dir) = config.work_dir.as_deref() {
        settings.work_dir = PathBuf::from(dir);
    }
    if let Some(dir) = config.output_dir.as_deref() {
        settings.output_dir = PathBuf::from(dir);
    }
    if config.no_overlay {
        settings.refine.debug_overlay = false;
    }

    let layout = WorkLayout::new(&settings.work_dir, &settings.output_dir, &config.input);
    let lang = translate::normalize_lang(&config.lang);

    match config.stage {
        Stage::Detect => {
            let detector = TesseractDetector::new(&settings.ocr)?;
            let image = ocr::load_image(&config.input)?;
            let detection = pipeline::detect_stage(&detector, &image, &config.input, &layout)?;
            Ok(format!(
                "{} text fragment(s) -> {}",
                detection.boxes.len(),
                layout.detections_path().display()
            ))
        }
        Stage::Refine => {
            let detection: Detection =
                artifacts::read_json(&layout.detections_path(), "detections")?;
            let overlay = if settings.refine.debug_overlay {
                let font = compose::resolve_font(
                    settings.compose.font_path.as_deref().map(Path::new),
                    settings.compose.font_family.as_deref(),
                )?;
                Some((ocr::load_image(&config.input)?, font))
            } else {
                None
            };
            let refiner = Refiner::new(&settings.refine);
            let regions = pipeline::refine_stage(
                &refiner,
                &detection,
                &layout,
                overlay.as_ref().map(|(image, font)| (image, font)),
            )?;
            Ok(format!(
                "{} region(s) -> {}",
                regions.regions.len(),
                layout.regions_path().display()
            ))
        }
        Stage::Translate => {
            let regions: RegionSet = artifacts::read_json(&layout.regions_path(), "regions")?;
            let translator = DeepL::from_settings(&settings.translate, config.key.as_deref())?;
            let translation = pipeline::translate_stage(
                &translator,
                &regions,
                settings.translate.unit,
                &lang,
                &layout,
            )
            .await?;
            Ok(format!(
                "{} text(s) translated -> {}",
                translation.len(),
                layout.translation_path(&translation.target_lang).display()
            ))
        }
        Stage::Clean => {
            let regions: RegionSet = artifacts::read_json(&layout.regions_path(), "regions")?;
            let image = ocr::load_image(&config.input)?;
            let cleaner = FillCleaner::new(&settings.clean)?;
            pipeline::clean_stage(&cleaner, &image, &regions, &layout)?;
            Ok(format!("cleaned image -> {}", layout.blank_path().display()))
        }
        Stage::Compose => {
            let regions: RegionSet = artifacts::read_json(&layout.regions_path(), "regions")?;
            let translation: TranslationResult =
                artifacts::read_json(&layout.translation_path(&lang), "translation")?;
            let blank = artifacts::read_image(&layout.blank_path(), "blank")?;
            let composer = Composer::new(&settings.compose)?;
            let output = pipeline::compose_stage(
                &composer,
                &blank,
                &regions,
                &translation,
                settings.translate.unit,
                &layout,
            )?;
            Ok(output.display().to_string())
        }
        Stage::Run => {
            let pipeline = Pipeline {
                detector: Box::new(TesseractDetector::new(&settings.ocr)?),
                refiner: Refiner::new(&settings.refine),
                translator: Box::new(DeepL::from_settings(
                    &settings.translate,
                    config.key.as_deref(),
                )?),
                cleaner: Box::new(FillCleaner::new(&settings.clean)?),
                composer: Composer::new(&settings.compose)?,
                unit: settings.translate.unit,
                debug_overlay: settings.refine.debug_overlay,
            };
            let artifact = pipeline.run(&config.input, &layout, &lang).await?;
            Ok(format!(
                "{} region(s) translated to {} -> {}",
                artifact.regions,
                artifact.target_lang,
                artifact.output.display()
            ))
        }
    }
}
