use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanMode {
    Surrounding,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    Fail,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationUnit {
    Fragment,
    Region,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ocr: OcrSettings,
    pub refine: RefineSettings,
    pub translate: TranslateSettings,
    pub clean: CleanSettings,
    pub compose: ComposeSettings,
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub languages: String,
    pub oem: u32,
    pub psm_modes: Vec<u32>,
    pub fallback_psm: u32,
    pub min_confidence: f32,
    pub text_pattern: Option<String>,
    pub fallback_margin: f32,
    pub max_scale: u32,
}

#[derive(Debug, Clone)]
pub struct RefineSettings {
    pub padding: u32,
    pub cluster_distance: Option<f32>,
    pub vertical_weight: f32,
    pub horizontal_weight: f32,
    pub max_regions: Option<usize>,
    pub debug_overlay: bool,
}

#[derive(Debug, Clone)]
pub struct TranslateSettings {
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub source_lang: Option<String>,
    pub unit: TranslationUnit,
}

#[derive(Debug, Clone)]
pub struct CleanSettings {
    pub mode: CleanMode,
    pub fill_color: String,
    pub ring: u32,
    pub bubble_border: u32,
}

#[derive(Debug, Clone)]
pub struct ComposeSettings {
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub max_font_size: f32,
    pub min_font_size: f32,
    pub line_height: f32,
    pub width_ratio: f32,
    pub height_ratio: f32,
    pub text_color: String,
    pub overflow: Overflow,
    pub fit_to_bubble: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("media"),
            output_dir: PathBuf::from("media/final"),
            ocr: OcrSettings::default(),
            refine: RefineSettings::default(),
            translate: TranslateSettings::default(),
            clean: CleanSettings::default(),
            compose: ComposeSettings::default(),
        }
    }
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            languages: "spa".to_string(),
            oem: 3,
            psm_modes: vec![11, 6, 3],
            fallback_psm: 4,
            min_confidence: 40.0,
            text_pattern: None,
            fallback_margin: 0.1,
            max_scale: 3,
        }
    }
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            padding: 10,
            cluster_distance: None,
            vertical_weight: 1.5,
            horizontal_weight: 0.75,
            max_regions: None,
            debug_overlay: true,
        }
    }
}

impl Default for TranslateSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: "DEEPL_API_KEY".to_string(),
            source_lang: None,
            unit: TranslationUnit::Fragment,
        }
    }
}

impl Default for CleanSettings {
    fn default() -> Self {
        Self {
            mode: CleanMode::Surrounding,
            fill_color: "#ffffff".to_string(),
            ring: 3,
            bubble_border: 5,
        }
    }
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            font_path: None,
            font_family: None,
            max_font_size: 32.0,
            min_font_size: 12.0,
            line_height: 1.2,
            width_ratio: 0.95,
            height_ratio: 0.95,
            text_color: "#000000".to_string(),
            overflow: Overflow::Fail,
            fit_to_bubble: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    paths: Option<PathsFile>,
    ocr: Option<OcrFile>,
    refine: Option<RefineFile>,
    translate: Option<TranslateFile>,
    clean: Option<CleanFile>,
    compose: Option<ComposeFile>,
}

#[derive(Debug, Default, Deserialize)]
struct PathsFile {
    work_dir: Option<String>,
    output_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrFile {
    languages: Option<String>,
    oem: Option<u32>,
    psm_modes: Option<Vec<u32>>,
    fallback_psm: Option<u32>,
    min_confidence: Option<f32>,
    text_pattern: Option<String>,
    fallback_margin: Option<f32>,
    max_scale: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RefineFile {
    padding: Option<u32>,
    cluster_distance: Option<f32>,
    vertical_weight: Option<f32>,
    horizontal_weight: Option<f32>,
    max_regions: Option<usize>,
    debug_overlay: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateFile {
    base_url: Option<String>,
    api_key_env: Option<String>,
    source_lang: Option<String>,
    unit: Option<TranslationUnit>,
}

#[derive(Debug, Default, Deserialize)]
struct CleanFile {
    mode: Option<CleanMode>,
    fill_color: Option<String>,
    ring: Option<u32>,
    bubble_border: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ComposeFile {
    font_path: Option<String>,
    font_family: Option<String>,
    max_font_size: Option<f32>,
    min_font_size: Option<f32>,
    line_height: Option<f32>,
    width_ratio: Option<f32>,
    height_ratio: Option<f32>,
    text_color: Option<String>,
    overflow: Option<Overflow>,
    fit_to_bubble: Option<bool>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let mut ordered_paths = vec![
        PathBuf::from("bubble-translator.toml"),
        PathBuf::from("bubble-translator.local.toml"),
    ];

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_toml(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let compose = &self.compose;
        if compose.min_font_size <= 0.0 || compose.max_font_size < compose.min_font_size {
            return Err(anyhow!(
                "invalid font sizes: min {} / max {}",
                compose.min_font_size,
                compose.max_font_size
            ));
        }
        for ratio in [compose.width_ratio, compose.height_ratio] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(anyhow!("fit ratios must be in (0, 1], got {}", ratio));
            }
        }
        if self.ocr.psm_modes.is_empty() {
            return Err(anyhow!("ocr.psm_modes is empty"));
        }
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(paths) = incoming.paths {
            if let Some(dir) = non_empty(paths.work_dir) {
                self.work_dir = PathBuf::from(dir);
            }
            if let Some(dir) = non_empty(paths.output_dir) {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = non_empty(ocr.languages) {
                self.ocr.languages = languages;
            }
            if let Some(oem) = ocr.oem {
                self.ocr.oem = oem;
            }
            if let Some(modes) = ocr.psm_modes {
                self.ocr.psm_modes = modes;
            }
            if let Some(psm) = ocr.fallback_psm {
                self.ocr.fallback_psm = psm;
            }
            if let Some(conf) = ocr.min_confidence {
                self.ocr.min_confidence = conf;
            }
            if let Some(pattern) = non_empty(ocr.text_pattern) {
                self.ocr.text_pattern = Some(pattern);
            }
            if let Some(margin) = ocr.fallback_margin {
                self.ocr.fallback_margin = margin.clamp(0.0, 0.45);
            }
            if let Some(scale) = ocr.max_scale {
                self.ocr.max_scale = scale.max(1);
            }
        }
        if let Some(refine) = incoming.refine {
            if let Some(padding) = refine.padding {
                self.refine.padding = padding;
            }
            if let Some(distance) = refine.cluster_distance {
                self.refine.cluster_distance = (distance > 0.0).then_some(distance);
            }
            if let Some(weight) = refine.vertical_weight {
                self.refine.vertical_weight = weight;
            }
            if let Some(weight) = refine.horizontal_weight {
                self.refine.horizontal_weight = weight;
            }
            if let Some(limit) = refine.max_regions {
                self.refine.max_regions = (limit > 0).then_some(limit);
            }
            if let Some(overlay) = refine.debug_overlay {
                self.refine.debug_overlay = overlay;
            }
        }
        if let Some(translate) = incoming.translate {
            if let Some(url) = non_empty(translate.base_url) {
                self.translate.base_url = Some(url);
            }
            if let Some(env) = non_empty(translate.api_key_env) {
                self.translate.api_key_env = env;
            }
            if let Some(lang) = non_empty(translate.source_lang) {
                self.translate.source_lang = Some(lang);
            }
            if let Some(unit) = translate.unit {
                self.translate.unit = unit;
            }
        }
        if let Some(clean) = incoming.clean {
            if let Some(mode) = clean.mode {
                self.clean.mode = mode;
            }
            if let Some(color) = non_empty(clean.fill_color) {
                self.clean.fill_color = color;
            }
            if let Some(ring) = clean.ring {
                self.clean.ring = ring.max(1);
            }
            if let Some(border) = clean.bubble_border {
                self.clean.bubble_border = border;
            }
        }
        if let Some(compose) = incoming.compose {
            if let Some(path) = non_empty(compose.font_path) {
                self.compose.font_path = Some(path);
            }
            if let Some(family) = non_empty(compose.font_family) {
                self.compose.font_family = Some(family);
            }
            if let Some(size) = compose.max_font_size {
                self.compose.max_font_size = size;
            }
            if let Some(size) = compose.min_font_size {
                self.compose.min_font_size = size;
            }
            if let Some(height) = compose.line_height {
                if height > 0.0 {
                    self.compose.line_height = height;
                }
            }
            if let Some(ratio) = compose.width_ratio {
                self.compose.width_ratio = ratio;
            }
            if let Some(ratio) = compose.height_ratio {
                self.compose.height_ratio = ratio;
            }
            if let Some(color) = non_empty(compose.text_color) {
                self.compose.text_color = color;
            }
            if let Some(overflow) = compose.overflow {
                self.compose.overflow = overflow;
            }
            if let Some(fit) = compose.fit_to_bubble {
                self.compose.fit_to_bubble = fit;
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.ocr.psm_modes, vec![11, 6, 3]);
        assert_eq!(settings.ocr.min_confidence, 40.0);
        assert_eq!(settings.compose.max_font_size, 32.0);
        assert_eq!(settings.compose.min_font_size, 12.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn merge_overrides_only_given_fields() {
        let mut settings = Settings::default();
        settings
            .merge_toml(
                r##"
[paths]
work_dir = "scratch"

[refine]
padding = 4
max_regions = 2

[compose]
overflow = "truncate"
font_family = "  "
fit_to_bubble = false

[clean]
bubble_border = 2

[translate]
unit = "region"
"##,
            )
            .expect("merge");
        assert_eq!(settings.work_dir, PathBuf::from("scratch"));
        assert_eq!(settings.output_dir, PathBuf::from("media/final"));
        assert_eq!(settings.refine.padding, 4);
        assert_eq!(settings.refine.max_regions, Some(2));
        assert_eq!(settings.compose.overflow, Overflow::Truncate);
        assert_eq!(settings.compose.font_family, None);
        assert!(!settings.compose.fit_to_bubble);
        assert_eq!(settings.clean.bubble_border, 2);
        assert_eq!(settings.clean.ring, 3);
        assert_eq!(settings.translate.unit, TranslationUnit::Region);
    }

    #[test]
    fn validate_rejects_inverted_font_sizes() {
        let mut settings = Settings::default();
        settings.compose.min_font_size = 40.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        assert!(load_settings(Some(&missing)).is_err());
    }
}
