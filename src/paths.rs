use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where every stage reads and writes its files for one input image.
#[derive(Debug, Clone)]
pub struct WorkLayout {
    work_dir: PathBuf,
    output_dir: PathBuf,
    stem: String,
    extension: String,
}

impl WorkLayout {
    pub fn new(work_dir: &Path, output_dir: &Path, input: &Path) -> Self {
        let stem = input
            .file_stem()
            .and_then(|value| value.to_str())
            .map(sanitize_filename_component)
            .unwrap_or_else(|| "input".to_string());
        let extension = input
            .extension()
            .and_then(|value| value.to_str())
            .filter(|value| image::ImageFormat::from_extension(value).is_some())
            .unwrap_or("png")
            .to_ascii_lowercase();
        Self {
            work_dir: normalize_path(work_dir),
            output_dir: normalize_path(output_dir),
            stem,
            extension,
        }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn detections_path(&self) -> PathBuf {
        self.work_dir
            .join("bounds")
            .join(format!("{}_bounds.json", self.stem))
    }

    pub fn regions_path(&self) -> PathBuf {
        self.work_dir
            .join("bounds")
            .join(format!("{}_final.json", self.stem))
    }

    pub fn overlay_path(&self) -> PathBuf {
        self.work_dir
            .join("visualized")
            .join(format!("vis_bubbles_{}.png", self.stem))
    }

    pub fn translation_path(&self, lang: &str) -> PathBuf {
        self.work_dir
            .join("translated")
            .join(lang_dir(lang))
            .join(format!("{}.json", self.stem))
    }

    pub fn blank_path(&self) -> PathBuf {
        self.work_dir
            .join("blanks")
            .join(format!("{}_blank.{}", self.stem, self.extension))
    }

    pub fn output_path(&self, lang: &str) -> PathBuf {
        let lang = lang_dir(lang);
        self.output_dir
            .join(&lang)
            .join(format!("{}-{}.{}", self.stem, lang, self.extension))
    }
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn lang_dir(lang: &str) -> String {
    let cleaned = sanitize_filename_component(lang.trim());
    cleaned.to_ascii_uppercase()
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        normalized.push(component.as_os_str());
    }
    normalized
}

fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else if ch.is_whitespace() {
            out.push('_');
        }
    }
    if out.is_empty() {
        "input".to_string()
    } else {
        out
    }
}
