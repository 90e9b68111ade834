use anyhow::Result;
use image::DynamicImage;

use crate::geometry::Rect;
use crate::svg::{escape_xml, open_document};

use super::layout::TextLayout;

/// Share of the font size that sits above the baseline.
const ASCENT: f32 = 0.8;

pub(super) struct TextStyle<'a> {
    pub color: &'a str,
    pub family: &'a str,
}

/// Builds the composed document: the cleaned image with every block of text
/// centred in, and clipped to, its region bounds.
pub(super) fn render_text_svg(
    image: &DynamicImage,
    blocks: &[(Rect, TextLayout)],
    style: &TextStyle<'_>,
) -> Result<String> {
    let mut svg = open_document(image)?;

    for (idx, (bounds, layout)) in blocks.iter().enumerate() {
        if layout.lines.is_empty() {
            continue;
        }
        let clip_id = format!("clip-{}", idx);
        svg.push_str(&format!(
            r#"<clipPath id="{id}"><rect x="{x}" y="{y}" width="{w}" height="{h}"/></clipPath>"#,
            id = clip_id,
            x = bounds.x,
            y = bounds.y,
            w = bounds.w,
            h = bounds.h
        ));

        let center_x = bounds.x as f32 + bounds.w as f32 * 0.5;
        let top = bounds.y as f32 + (bounds.h as f32 - layout.block_height()) * 0.5;
        let first_baseline =
            top + (layout.line_height - layout.font_size) * 0.5 + layout.font_size * ASCENT;

        svg.push_str(&format!(
            r#"<g clip-path="url(#{clip})" font-size="{size}" font-family="{family}" fill="{color}" text-anchor="middle">"#,
            clip = clip_id,
            size = layout.font_size,
            family = escape_xml(style.family),
            color = escape_xml(style.color)
        ));
        for (line_idx, line) in layout.lines.iter().enumerate() {
            svg.push_str(&format!(
                r#"<text x="{x}" y="{y}" xml:space="preserve">{text}</text>"#,
                x = center_x,
                y = first_baseline + line_idx as f32 * layout.line_height,
                text = escape_xml(line)
            ));
        }
        svg.push_str("</g>");
    }

    svg.push_str("</svg>");
    Ok(svg)
}
