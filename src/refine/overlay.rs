use anyhow::Result;
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use tracing::info;

use crate::compose::FontMetrics;
use crate::svg::{escape_xml, open_document, rasterize, save_image};

use super::RefinedRegion;

const COLORS: [&str; 3] = ["#ff0000", "#00ff00", "#0000ff"];
const LABEL_SIZE: f32 = 16.0;

/// Draws every region's bounds over the image with a `Bubble N: text` label
/// set in `font`.
pub fn render_overlay(
    image: &DynamicImage,
    regions: &[RefinedRegion],
    font: &FontMetrics,
) -> Result<RgbaImage> {
    let family = escape_xml(font.family().unwrap_or("sans-serif"));
    let mut svg = open_document(image)?;
    for (slot, region) in regions.iter().enumerate() {
        let color = COLORS[slot % COLORS.len()];
        let bounds = region.bounds;
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{color}" stroke-width="2"/>"#,
            x = bounds.x,
            y = bounds.y,
            w = bounds.w,
            h = bounds.h,
            color = color
        ));
        let label_y = if bounds.y as f32 >= LABEL_SIZE + 4.0 {
            bounds.y as f32 - 6.0
        } else {
            bounds.y as f32 + LABEL_SIZE + 2.0
        };
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" fill="{color}">{label}</text>"#,
            x = bounds.x,
            y = label_y,
            size = LABEL_SIZE,
            family = family,
            color = color,
            label = escape_xml(&format!("Bubble {}: {}", region.index, region.text))
        ));
    }
    svg.push_str("</svg>");
    rasterize(&svg, Some(font.data()))
}

pub fn write_overlay(
    image: &DynamicImage,
    regions: &[RefinedRegion],
    path: &Path,
    font: &FontMetrics,
) -> Result<()> {
    let overlay = render_overlay(image, regions, font)?;
    save_image(&DynamicImage::ImageRgba8(overlay), path)?;
    info!("wrote region overlay: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::resolve_font;
    use crate::geometry::Rect;
    use image::Rgba;

    fn region(index: usize, bounds: Rect, text: &str) -> RefinedRegion {
        RefinedRegion {
            index,
            bounds,
            union: bounds,
            text: text.to_string(),
            fragments: Vec::new(),
        }
    }

    #[test]
    fn outlines_regions_in_cycling_colors() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(120, 80, Rgba([255, 255, 255, 255])));
        let regions = vec![
            region(1, Rect::new(10, 30, 40, 40), ""),
            region(2, Rect::new(70, 30, 40, 40), ""),
        ];
        let font = resolve_font(None, None).expect("system font");
        let overlay = render_overlay(&image, &regions, &font).expect("overlay");
        assert_eq!(overlay.dimensions(), (120, 80));
        let left = overlay.get_pixel(10, 50).0;
        let right = overlay.get_pixel(70, 50).0;
        assert!(left[0] > 200 && left[1] < 80, "left edge is red: {:?}", left);
        assert!(right[1] > 200 && right[0] < 80, "right edge is green: {:?}", right);
        assert_eq!(overlay.get_pixel(30, 50).0, [255, 255, 255, 255]);
    }

    #[test]
    fn labels_are_drawn_above_their_region() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(240, 100, Rgba([255; 4])));
        let regions = vec![region(1, Rect::new(10, 40, 200, 50), "Hola")];
        let font = resolve_font(None, None).expect("system font");
        let overlay = render_overlay(&image, &regions, &font).expect("overlay");

        let label_ink = (0..38)
            .flat_map(|y| (0..240).map(move |x| (x, y)))
            .filter(|&(x, y)| {
                let [r, g, b, _] = overlay.get_pixel(x, y).0;
                r > 150 && g < 120 && b < 120
            })
            .count();
        assert!(label_ink > 20, "label ink pixels: {}", label_ink);
    }
}
