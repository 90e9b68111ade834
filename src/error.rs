use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds a single pipeline run can end with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode image: {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no text found in image: {}", path.display())]
    NoTextFound { path: PathBuf },

    #[error("ocr failed: {0}")]
    Ocr(String),

    #[error("text #{index} is empty; nothing to translate")]
    EmptyText { index: usize },

    #[error("unsupported target language '{0}'")]
    UnsupportedLanguage(String),

    #[error("translation API rejected the key (HTTP {status})")]
    Auth { status: u16 },

    #[error("translation failed: {0}")]
    Translation(String),

    #[error(
        "text does not fit region {region} ({width}x{height}) even at font size {min_font_size}"
    )]
    TextDoesNotFit {
        region: usize,
        width: u32,
        height: u32,
        min_font_size: f32,
    },

    #[error("no usable font (tried {tried}); set compose.font_path or compose.font_family")]
    FontUnavailable { tried: String },

    #[error("missing {kind} artifact: {} (run the previous stage first)", path.display())]
    MissingArtifact { kind: &'static str, path: PathBuf },
}
