mod font;
mod layout;
mod render;

use anyhow::Result;
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::bubble::BubbleMask;
use crate::clean::parse_hex_color;
use crate::error::PipelineError;
use crate::geometry::Rect;
use crate::refine::RefinedRegion;
use crate::settings::ComposeSettings;

pub use font::{FontMetrics, load_font_metrics, measure_text_width_px, resolve_font};
pub use layout::{FitParams, TextLayout, fit_text};

use render::{TextStyle, render_text_svg};

/// Lays translated text into refined regions and renders the result.
#[derive(Debug, Clone)]
pub struct Composer {
    params: FitParams,
    text_color: String,
    font: FontMetrics,
    family: String,
    fit_to_bubble: bool,
}

impl Composer {
    /// Resolves the configured font; see [`resolve_font`].
    pub fn new(settings: &ComposeSettings) -> Result<Self> {
        let font = resolve_font(
            settings.font_path.as_deref().map(Path::new),
            settings.font_family.as_deref(),
        )?;
        Self::with_font(settings, font)
    }

    pub fn with_font(settings: &ComposeSettings, font: FontMetrics) -> Result<Self> {
        let [r, g, b] = parse_hex_color(&settings.text_color)?;
        let family = font
            .family()
            .or(settings.font_family.as_deref())
            .unwrap_or("sans-serif")
            .to_string();
        Ok(Self {
            params: FitParams::from(settings),
            text_color: format!("#{:02x}{:02x}{:02x}", r, g, b),
            font,
            family,
            fit_to_bubble: settings.fit_to_bubble,
        })
    }

    pub fn font(&self) -> &FontMetrics {
        &self.font
    }

    /// Box the text of `region` is fitted into: the region bounds, kept off
    /// the transparent margin around the bubble when one is known.
    fn placement(&self, region: &RefinedRegion, bubble: Option<&BubbleMask>) -> Rect {
        let Some(bubble) = bubble.filter(|_| self.fit_to_bubble) else {
            return region.bounds;
        };
        region
            .bounds
            .intersection(&bubble.bounds())
            .unwrap_or_else(|| bubble.inner_bounds())
    }

    /// Fits every text into its region, failing on the first one that
    /// cannot be placed.
    pub fn layout(
        &self,
        texts: &[(&RefinedRegion, String)],
        bubble: Option<&BubbleMask>,
    ) -> Result<Vec<(Rect, TextLayout)>> {
        let mut blocks = Vec::with_capacity(texts.len());
        for (region, text) in texts {
            let bounds = self.placement(region, bubble);
            let layout = fit_text(text, bounds.w, bounds.h, &self.params, Some(&self.font))
                .ok_or(PipelineError::TextDoesNotFit {
                    region: region.index,
                    width: bounds.w,
                    height: bounds.h,
                    min_font_size: self.params.min_font_size,
                })?;
            if layout.truncated {
                warn!(
                    "bubble {}: text truncated to {} line(s) at size {}",
                    region.index,
                    layout.lines.len(),
                    layout.font_size
                );
            } else {
                debug!(
                    "bubble {}: {} line(s) at size {}",
                    region.index,
                    layout.lines.len(),
                    layout.font_size
                );
            }
            blocks.push((bounds, layout));
        }
        Ok(blocks)
    }

    pub fn compose(
        &self,
        image: &DynamicImage,
        texts: &[(&RefinedRegion, String)],
    ) -> Result<RgbaImage> {
        let bubble = BubbleMask::find(image);
        let blocks = self.layout(texts, bubble.as_ref())?;
        let style = TextStyle {
            color: &self.text_color,
            family: &self.family,
        };
        let svg = render_text_svg(image, &blocks, &style)?;
        let composed = crate::svg::rasterize(&svg, Some(self.font.data()))?;
        info!("composed {} region(s)", blocks.len());
        Ok(composed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Overflow;
    use image::{GenericImageView, Rgba};

    fn region(index: usize, bounds: Rect) -> RefinedRegion {
        RefinedRegion {
            index,
            bounds,
            union: bounds,
            text: String::new(),
            fragments: Vec::new(),
        }
    }

    fn composer(settings: &ComposeSettings) -> Composer {
        let font = resolve_font(None, None).expect("system font");
        Composer::with_font(settings, font).expect("composer")
    }

    /// Pixels dark enough to be glyph ink on a light background.
    fn ink(image: &RgbaImage) -> Vec<(u32, u32)> {
        image
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel[3] > 0 && pixel.0[..3].iter().all(|&c| c < 128))
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn text_that_cannot_fit_reports_the_region() {
        let composer = composer(&ComposeSettings::default());
        let small = region(2, Rect::new(0, 0, 20, 10));
        let err = composer
            .layout(&[(&small, "demasiado texto".to_string())], None)
            .expect_err("overflow");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::TextDoesNotFit { region: 2, width: 20, height: 10, .. })
        ));
    }

    #[test]
    fn truncation_is_opt_in() {
        let settings = ComposeSettings {
            overflow: Overflow::Truncate,
            ..ComposeSettings::default()
        };
        let bubble = region(1, Rect::new(0, 0, 100, 30));
        let text = "uno dos tres cuatro cinco seis siete ocho nueve diez".to_string();
        let blocks = composer(&settings)
            .layout(&[(&bubble, text.clone())], None)
            .expect("layout");
        assert!(blocks[0].1.truncated);
        assert!(composer(&ComposeSettings::default()).layout(&[(&bubble, text)], None).is_err());
    }

    #[test]
    fn composed_text_is_drawn_inside_its_region() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(160, 90, Rgba([255; 4])));
        let bubble = region(1, Rect::new(20, 20, 120, 50));
        let composed = composer(&ComposeSettings::default())
            .compose(&image, &[(&bubble, "Hola mundo".to_string())])
            .expect("compose");

        assert_eq!(composed.dimensions(), image.dimensions());
        let ink = ink(&composed);
        assert!(ink.len() > 50, "only {} ink pixels", ink.len());
        assert!(
            ink.iter()
                .all(|&(x, y)| x >= 20 && x < 140 && y >= 20 && y < 70)
        );
        assert_eq!(composed.get_pixel(5, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn text_stays_off_the_transparent_margin() {
        let mut canvas = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 0]));
        for y in 10..90 {
            for x in 40..160 {
                canvas.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let image = DynamicImage::ImageRgba8(canvas);
        let spilled = region(1, Rect::new(0, 20, 200, 60));

        let fitted = composer(&ComposeSettings::default());
        let blocks = fitted
            .layout(&[(&spilled, "Hola".to_string())], BubbleMask::find(&image).as_ref())
            .expect("layout");
        assert_eq!(blocks[0].0, Rect::new(40, 20, 120, 60));
        let composed = fitted
            .compose(&image, &[(&spilled, "Hola".to_string())])
            .expect("compose");
        assert!(ink(&composed).iter().all(|&(x, _)| (40..160).contains(&x)));

        let loose = composer(&ComposeSettings {
            fit_to_bubble: false,
            ..ComposeSettings::default()
        });
        let blocks = loose
            .layout(&[(&spilled, "Hola".to_string())], BubbleMask::find(&image).as_ref())
            .expect("layout");
        assert_eq!(blocks[0].0, spilled.bounds);
    }

    #[test]
    fn bad_text_colour_is_rejected() {
        let settings = ComposeSettings {
            text_color: "black".to_string(),
            ..ComposeSettings::default()
        };
        let font = resolve_font(None, None).expect("system font");
        assert!(Composer::with_font(&settings, font).is_err());
    }
}
