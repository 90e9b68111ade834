use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use ttf_parser::{Face, name_id};
use usvg::fontdb;

use crate::error::PipelineError;

const FALLBACK_FAMILIES: &[&str] = &["sans-serif", "DejaVu Sans", "Arial", "Liberation Sans"];

/// Horizontal metrics of one loaded face, plus the raw data handed to the
/// rasterizer.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontMetrics {
    fn from_face(data: Arc<Vec<u8>>, face_index: u32) -> Option<Self> {
        let face = Face::parse(&data, face_index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = glyph_advance(&face, ' ').unwrap_or(units_per_em / 2);
        let family = family_name(&face);
        Some(Self {
            data,
            face_index,
            units_per_em,
            space_advance,
            family,
        })
    }

    fn from_bytes(data: Vec<u8>) -> Option<Self> {
        let data = Arc::new(data);
        let faces = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        (0..faces).find_map(|index| Self::from_face(data.clone(), index))
    }

    /// Looks a family up in `db`, keeping the exact face fontdb matched.
    fn from_database(db: &fontdb::Database, family: fontdb::Family<'_>) -> Option<Self> {
        let query = fontdb::Query {
            families: &[family],
            ..Default::default()
        };
        let id = db.query(&query)?;
        let (data, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
        Self::from_face(Arc::new(data), index)
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Advance of `text` in font units; unknown glyphs count as a space.
    fn advance_units(&self, text: &str) -> Option<u32> {
        let face = Face::parse(&self.data, self.face_index).ok()?;
        Some(text.chars().fold(0u32, |total, ch| {
            let advance = match ch {
                ' ' => self.space_advance,
                _ => glyph_advance(&face, ch).unwrap_or(self.space_advance),
            };
            total.saturating_add(advance as u32)
        }))
    }
}

fn glyph_advance(face: &Face<'_>, ch: char) -> Option<u16> {
    face.glyph_index(ch).and_then(|glyph| face.glyph_hor_advance(glyph))
}

/// Typographic family when the face has one, the legacy family otherwise.
fn family_name(face: &Face<'_>) -> Option<String> {
    let named = |id: u16| {
        face.names()
            .into_iter()
            .filter(|name| name.name_id == id)
            .find_map(|name| name.to_string())
    };
    named(name_id::TYPOGRAPHIC_FAMILY).or_else(|| named(name_id::FAMILY))
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    FontMetrics::from_bytes(data).ok_or_else(|| anyhow!("failed to parse font: {}", path.display()))
}

/// Picks the composing font: an explicit file, then a named family, then the
/// fallback families, then any installed face. Rendering never proceeds
/// without a font.
pub fn resolve_font(font_path: Option<&Path>, font_family: Option<&str>) -> Result<FontMetrics> {
    if let Some(path) = font_path {
        return load_font_metrics(path);
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        return FontMetrics::from_database(&db, as_family(family))
            .ok_or_else(|| anyhow!("font not found: {}", family));
    }

    let fallback = FALLBACK_FAMILIES
        .iter()
        .find_map(|&family| FontMetrics::from_database(&db, as_family(family)))
        .or_else(|| {
            db.faces().find_map(|face| {
                let (data, index) =
                    db.with_face_data(face.id, |data, index| (data.to_vec(), index))?;
                FontMetrics::from_face(Arc::new(data), index)
            })
        });
    match fallback {
        Some(font) => {
            debug!("using fallback font {:?}", font.family());
            Ok(font)
        }
        None => Err(PipelineError::FontUnavailable {
            tried: FALLBACK_FAMILIES.join(", "),
        }
        .into()),
    }
}

fn as_family(name: &str) -> fontdb::Family<'_> {
    if name.eq_ignore_ascii_case("sans-serif") {
        fontdb::Family::SansSerif
    } else {
        fontdb::Family::Name(name)
    }
}

/// Width of `text` at `font_size`. Without a font the width is estimated
/// from character classes.
pub fn measure_text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    match font.and_then(|font| Some((font, font.advance_units(text)?))) {
        Some((font, units)) => units as f32 * font_size / font.units_per_em as f32,
        None => text.chars().map(estimate_char_units).sum::<f32>() * font_size,
    }
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_scales_with_font_size() {
        let small = measure_text_width_px("Hola", 10.0, None);
        let large = measure_text_width_px("Hola", 20.0, None);
        assert!((small - 22.0).abs() < 1e-3);
        assert!((large - small * 2.0).abs() < 1e-3);
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(resolve_font(Some(&dir.path().join("none.ttf")), None).is_err());
    }

    #[test]
    fn unknown_family_is_an_error() {
        assert!(resolve_font(None, Some("No Such Family 7f3c")).is_err());
    }

    #[test]
    fn garbage_font_data_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").expect("write");
        assert!(load_font_metrics(&path).is_err());
    }

    #[test]
    fn system_font_measures_real_glyphs() {
        let font = resolve_font(None, None).expect("system font");
        assert!(font.family().is_some());
        let narrow = measure_text_width_px("iiii", 20.0, Some(&font));
        let wide = measure_text_width_px("MMMM", 20.0, Some(&font));
        assert!(narrow > 0.0 && wide > narrow);
    }
}
