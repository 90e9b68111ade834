use anyhow::{Result, anyhow};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use tracing::debug;

use crate::bubble::BubbleMask;
use crate::geometry::Rect;
use crate::refine::RefinedRegion;
use crate::settings::{CleanMode, CleanSettings};

const WHITE: [u8; 3] = [255, 255, 255];

/// Erases text regions from an image, returning a new image.
pub trait Inpaint {
    fn clean(&self, image: &DynamicImage, regions: &[RefinedRegion]) -> Result<DynamicImage>;
}

/// Paints every region's bounds with one flat colour.
#[derive(Debug, Clone)]
pub struct FillCleaner {
    mode: CleanMode,
    fill: [u8; 3],
    ring: u32,
    border: u32,
}

impl FillCleaner {
    pub fn new(settings: &CleanSettings) -> Result<Self> {
        Ok(Self {
            mode: settings.mode,
            fill: parse_hex_color(&settings.fill_color)?,
            ring: settings.ring.max(1),
            border: settings.bubble_border,
        })
    }

    /// With no text regions to go on, blanks the whole bubble found in the
    /// alpha channel and leaves its outline band of `border` pixels intact.
    fn blank_bubble(&self, image: &DynamicImage) -> DynamicImage {
        let Some(interior) = BubbleMask::find(image).and_then(|mask| mask.eroded(self.border))
        else {
            debug!("no regions and no bubble outline; image left as is");
            return image.clone();
        };
        let mut cleaned = image.to_rgba8();
        let bounds = interior.bounds();
        let interior = &interior;
        let covered = move || {
            (bounds.y..bounds.bottom())
                .flat_map(move |y| (bounds.x..bounds.right()).map(move |x| (x, y)))
                .filter(move |&(x, y)| interior.contains(x, y))
        };
        let [r, g, b] = match self.mode {
            CleanMode::Solid => self.fill,
            CleanMode::Surrounding => {
                median_rgb(covered().map(|(x, y)| *cleaned.get_pixel(x, y))).unwrap_or(WHITE)
            }
        };
        debug!("blanking bubble interior {:?}", bounds);
        for (x, y) in covered() {
            let alpha = cleaned.get_pixel(x, y)[3];
            cleaned.put_pixel(x, y, Rgba([r, g, b, alpha]));
        }
        DynamicImage::ImageRgba8(cleaned)
    }

    fn fill_for(&self, image: &RgbaImage, bounds: Rect) -> [u8; 3] {
        match self.mode {
            CleanMode::Solid => self.fill,
            CleanMode::Surrounding => surrounding_median(image, bounds, self.ring).unwrap_or(WHITE),
        }
    }
}

impl Inpaint for FillCleaner {
    fn clean(&self, image: &DynamicImage, regions: &[RefinedRegion]) -> Result<DynamicImage> {
        if regions.is_empty() {
            return Ok(self.blank_bubble(image));
        }
        let source = image.to_rgba8();
        let mut cleaned = source.clone();
        let (width, height) = image.dimensions();
        for region in regions {
            let bounds = region.bounds.clamp_to(width, height);
            if bounds.is_empty() {
                continue;
            }
            let [r, g, b] = self.fill_for(&source, bounds);
            debug!(
                "filling bubble {} at {:?} with #{:02x}{:02x}{:02x}",
                region.index, bounds, r, g, b
            );
            for y in bounds.y..bounds.bottom() {
                for x in bounds.x..bounds.right() {
                    let alpha = cleaned.get_pixel(x, y)[3];
                    cleaned.put_pixel(x, y, Rgba([r, g, b, alpha]));
                }
            }
        }
        Ok(DynamicImage::ImageRgba8(cleaned))
    }
}

/// Per-channel median of the opaque pixels in a band of `ring` pixels just
/// outside `bounds`.
fn surrounding_median(image: &RgbaImage, bounds: Rect, ring: u32) -> Option<[u8; 3]> {
    let (width, height) = image.dimensions();
    let outer = bounds.expand(ring).clamp_to(width, height);
    let band = (outer.y..outer.bottom())
        .flat_map(|y| (outer.x..outer.right()).map(move |x| (x, y)))
        .filter(|&(x, y)| {
            x < bounds.x || x >= bounds.right() || y < bounds.y || y >= bounds.bottom()
        })
        .map(|(x, y)| *image.get_pixel(x, y));
    median_rgb(band)
}

/// Per-channel median, skipping fully transparent pixels.
fn median_rgb(pixels: impl Iterator<Item = Rgba<u8>>) -> Option<[u8; 3]> {
    let mut channels: [Vec<u8>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for pixel in pixels.filter(|pixel| pixel[3] != 0) {
        for (channel, values) in channels.iter_mut().enumerate() {
            values.push(pixel[channel]);
        }
    }
    if channels[0].is_empty() {
        return None;
    }
    let mut median = [0u8; 3];
    for (slot, values) in channels.iter_mut().enumerate() {
        values.sort_unstable();
        median[slot] = values[values.len() / 2];
    }
    Some(median)
}

pub fn parse_hex_color(value: &str) -> Result<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
        6 => hex.to_string(),
        _ => return Err(anyhow!("invalid colour '{}', expected #rgb or #rrggbb", value)),
    };
    let channel = |idx: usize| {
        u8::from_str_radix(&expanded[idx..idx + 2], 16)
            .map_err(|_| anyhow!("invalid colour '{}', expected #rgb or #rrggbb", value))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}
