use anyhow::{Context, Result};
use image::DynamicImage;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

use crate::error::PipelineError;
use crate::ocr::load_image;
use crate::paths::ensure_parent;

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Reads a previous stage's JSON output; a missing file is reported as
/// [`PipelineError::MissingArtifact`].
pub fn read_json<T: DeserializeOwned>(path: &Path, kind: &'static str) -> Result<T> {
    require(path, kind)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {} file: {}", kind, path.display()))?;
    Ok(value)
}

pub fn read_image(path: &Path, kind: &'static str) -> Result<DynamicImage> {
    require(path, kind)?;
    load_image(path)
}

fn require(path: &Path, kind: &'static str) -> Result<()> {
    if !path.is_file() {
        return Err(PipelineError::MissingArtifact {
            kind,
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn json_round_trip_creates_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bounds/deep/rects.json");
        let rects = vec![Rect::new(1, 2, 3, 4)];
        write_json(&path, &rects).expect("write");
        let loaded: Vec<Rect> = read_json(&path, "bounds").expect("read");
        assert_eq!(loaded, rects);
    }

    #[test]
    fn missing_file_names_the_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing_final.json");
        let err = read_json::<Vec<Rect>>(&path, "regions").expect_err("missing");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingArtifact { kind: "regions", .. })
        ));
        assert!(read_image(&dir.path().join("blank.png"), "blank").is_err());
    }
}
