use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::render;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::debug;
use usvg::{Options, Tree, fontdb};

use crate::paths::ensure_parent;

/// Opens an SVG document of the image's size with the image as background.
pub fn open_document(image: &DynamicImage) -> Result<String> {
    let (width, height) = (image.width(), image.height());
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .with_context(|| "failed to encode background image")?;
    let data_uri = format!("data:image/png;base64,{}", BASE64.encode(&png));

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));
    Ok(svg)
}

/// Builds the font database for one render. The generic `sans-serif` family
/// always resolves to a loaded face: the supplied font when there is one,
/// otherwise the first system face.
fn font_database(font_data: Option<&[u8]>) -> fontdb::Database {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let supplied = font_data.and_then(|data| {
        let ids = db.load_font_source(fontdb::Source::Binary(Arc::new(data.to_vec())));
        let id = ids.first().copied()?;
        db.face(id)?.families.first().map(|(name, _)| name.clone())
    });
    let generic = fontdb::Query {
        families: &[fontdb::Family::SansSerif],
        ..Default::default()
    };
    let family = supplied.or_else(|| {
        db.query(&generic)
            .is_none()
            .then(|| db.faces().find_map(|face| face.families.first()))
            .flatten()
            .map(|(name, _)| name.clone())
    });
    if let Some(family) = family {
        debug!("sans-serif renders as {}", family);
        db.set_sans_serif_family(family);
    }
    db
}

pub fn rasterize(svg: &str, font_data: Option<&[u8]>) -> Result<RgbaImage> {
    let options = Options {
        fontdb: Arc::new(font_database(font_data)),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    // tiny-skia keeps premultiplied alpha
    let data = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue(), color.alpha()]
        })
        .collect::<Vec<u8>>();
    RgbaImage::from_raw(size.width(), size.height(), data)
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
}

pub fn image_format_from_path(path: &Path) -> Option<ImageFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
}

/// Encodes by the path's extension; formats without an alpha channel get the
/// image flattened to RGB first.
pub fn save_image(image: &DynamicImage, path: &Path) -> Result<()> {
    let format = image_format_from_path(path)
        .ok_or_else(|| anyhow!("unsupported output image format: {}", path.display()))?;
    ensure_parent(path)?;
    let result = match format {
        ImageFormat::Jpeg | ImageFormat::Bmp => {
            DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(path, format)
        }
        _ => image.save_with_format(path, format),
    };
    result.with_context(|| format!("failed to write image: {}", path.display()))
}

pub fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
