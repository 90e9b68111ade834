use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, GrayImage};
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::geometry::Rect;
use crate::settings::OcrSettings;

use super::parse::parse_tsv_words;
use super::preprocess::{ocr_scale, prepare_for_ocr};
use super::{Detector, TextBox};

const FALLBACK_CONFIDENCE: f32 = 70.0;

/// Detector backed by the `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractDetector {
    languages: String,
    oem: u32,
    psm_modes: Vec<u32>,
    fallback_psm: u32,
    min_confidence: f32,
    pattern: Option<Regex>,
    fallback_margin: f32,
    max_scale: u32,
}

impl TesseractDetector {
    pub fn new(settings: &OcrSettings) -> Result<Self> {
        let pattern = settings
            .text_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| "invalid ocr.text_pattern")?;
        Ok(Self {
            languages: normalize_ocr_languages(&settings.languages)?,
            oem: settings.oem,
            psm_modes: settings.psm_modes.clone(),
            fallback_psm: settings.fallback_psm,
            min_confidence: settings.min_confidence,
            pattern,
            fallback_margin: settings.fallback_margin,
            max_scale: settings.max_scale,
        })
    }

    fn accepts(&self, text: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(text),
            None => true,
        }
    }

    fn whole_image_box(&self, text: String, width: u32, height: u32) -> TextBox {
        let margin = (width.min(height) as f32 * self.fallback_margin) as u32;
        TextBox {
            text,
            bbox: Rect::new(
                margin,
                margin,
                width.saturating_sub(margin * 2),
                height.saturating_sub(margin * 2),
            ),
            conf: FALLBACK_CONFIDENCE,
        }
    }
}

impl Detector for TesseractDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBox>> {
        let (width, height) = image.dimensions();
        let scale = ocr_scale(width, self.max_scale);
        let prepared = prepare_for_ocr(image, scale);

        let tmp = write_ocr_input(prepared)?;

        for psm in &self.psm_modes {
            let tsv = run_tesseract(tmp.path(), &self.languages, self.oem, *psm, Some("tsv"))?;
            let mut boxes = Vec::new();
            for word in parse_tsv_words(&tsv, self.min_confidence) {
                if !self.accepts(&word.text) {
                    debug!("filtered out text not matching pattern: '{}'", word.text);
                    continue;
                }
                debug!("found text '{}' (confidence {:.0})", word.text, word.conf);
                boxes.push(TextBox {
                    bbox: word.bbox.scale_down(scale as f32),
                    ..word
                });
            }
            if !boxes.is_empty() {
                debug!("psm {} produced {} box(es)", psm, boxes.len());
                return Ok(boxes);
            }
        }

        let text = run_tesseract(tmp.path(), &self.languages, self.oem, self.fallback_psm, None)?;
        let text = text.trim();
        if !text.is_empty() && self.accepts(text) {
            info!("found text using whole-image OCR: '{}'", text);
            return Ok(vec![self.whole_image_box(text.to_string(), width, height)]);
        }
        Ok(Vec::new())
    }
}

/// Stores the prepared image as a PNG tesseract can read; the file lives as
/// long as the returned handle.
fn write_ocr_input(prepared: GrayImage) -> Result<NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .with_context(|| "failed to create temp file for OCR")?;
    DynamicImage::ImageLuma8(prepared)
        .write_to(&mut tmp, image::ImageFormat::Png)
        .with_context(|| "failed to write temp image for OCR")?;
    tmp.flush()
        .with_context(|| format!("failed to flush temp image for OCR: {}", tmp.path().display()))?;
    Ok(tmp)
}

pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new("tesseract")
        .arg("--list-langs")
        .output()
        .map_err(|err| PipelineError::Ocr(format!("failed to run tesseract --list-langs: {}", err)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(
            PipelineError::Ocr(format!("tesseract --list-langs failed: {}", stderr.trim())).into(),
        );
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_language_list(&stdout))
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_ocr_languages(requested: &str) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Ocr("ocr languages is empty".to_string()).into());
    }

    let available = match list_tesseract_languages() {
        Ok(list) => list,
        Err(_) => return Ok(trimmed.to_string()),
    };
    choose_languages(trimmed, &available)
}

fn choose_languages(requested: &str, available: &[String]) -> Result<String> {
    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in requested.split(['+', ',', ' ']) {
        let lang = raw.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(PipelineError::Ocr(format!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ))
        .into());
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }

    Ok(chosen.join("+"))
}

fn run_tesseract(
    path: &Path,
    languages: &str,
    oem: u32,
    psm: u32,
    config: Option<&str>,
) -> Result<String> {
    let mut command = Command::new("tesseract");
    command
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--oem")
        .arg(oem.to_string())
        .arg("--psm")
        .arg(psm.to_string());
    if let Some(config) = config {
        command.arg(config);
    }
    let output = command.output().map_err(|err| {
        PipelineError::Ocr(format!("failed to run tesseract (is it installed?): {}", err))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::Ocr(format!("tesseract failed: {}", stderr.trim())).into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
