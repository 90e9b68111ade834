//! Speech-bubble outline taken from the image's alpha channel.
//!
//! Bubble art is usually an opaque balloon on a transparent canvas. The
//! largest 4-connected blob of near-opaque pixels is taken as the bubble.

use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::geometry::Rect;

/// Pixels with alpha above this belong to the bubble.
pub const OPAQUE_ALPHA: u8 = 240;

/// Fraction of the bubble's width and height kept clear on each side of the
/// inner bounds.
pub const INNER_INSET: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BubbleMask {
    width: u32,
    height: u32,
    inside: Vec<bool>,
    bounds: Rect,
}

impl BubbleMask {
    /// Finds the bubble in `image`. `None` when the image has no alpha
    /// channel, is fully opaque, or holds no opaque pixel at all.
    pub fn find(image: &DynamicImage) -> Option<Self> {
        if !image.color().has_alpha() {
            return None;
        }
        let (width, height) = image.dimensions();
        let rgba = image.to_rgba8();
        let opaque = rgba
            .pixels()
            .map(|pixel| pixel[3] > OPAQUE_ALPHA)
            .collect::<Vec<_>>();
        if opaque.iter().all(|&pixel| pixel) {
            return None;
        }

        let mut visited = vec![false; opaque.len()];
        let mut best: Option<Vec<usize>> = None;
        for start in 0..opaque.len() {
            if !opaque[start] || visited[start] {
                continue;
            }
            let component = flood_fill(&opaque, &mut visited, width, height, start);
            if best.as_ref().is_none_or(|best| component.len() > best.len()) {
                best = Some(component);
            }
        }

        let component = best?;
        let mut inside = vec![false; opaque.len()];
        for &idx in &component {
            inside[idx] = true;
        }
        let mask = Self::from_pixels(width, height, inside)?;
        debug!(
            "bubble mask: {} px, bounds {:?}",
            component.len(),
            mask.bounds
        );
        Some(mask)
    }

    fn from_pixels(width: u32, height: u32, inside: Vec<bool>) -> Option<Self> {
        let mut min = (u32::MAX, u32::MAX);
        let mut max = (0u32, 0u32);
        for (idx, _) in inside.iter().enumerate().filter(|(_, inside)| **inside) {
            let (x, y) = (idx as u32 % width, idx as u32 / width);
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        if min.0 > max.0 {
            return None;
        }
        Some(Self {
            width,
            height,
            inside,
            bounds: Rect::new(min.0, min.1, max.0 - min.0 + 1, max.1 - min.1 + 1),
        })
    }

    /// Bounding box of the bubble.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Bounding box inset by [`INNER_INSET`] on each side, clamped to the
    /// image.
    pub fn inner_bounds(&self) -> Rect {
        let dx = (self.bounds.w as f32 * INNER_INSET) as u32;
        let dy = (self.bounds.h as f32 * INNER_INSET) as u32;
        Rect::new(
            self.bounds.x + dx,
            self.bounds.y + dy,
            self.bounds.w.saturating_sub(dx * 2),
            self.bounds.h.saturating_sub(dy * 2),
        )
        .clamp_to(self.width, self.height)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.inside[(y * self.width + x) as usize]
    }

    /// Shrinks the mask by `iterations` passes of a 3x3 erosion. Neighbours
    /// beyond the image edge are ignored. `None` once nothing is left.
    pub fn eroded(&self, iterations: u32) -> Option<Self> {
        let (width, height) = (self.width, self.height);
        let mut current = self.inside.clone();
        for _ in 0..iterations {
            let previous = current.clone();
            let kept = |x: u32, y: u32| {
                (y.saturating_sub(1)..=(y + 1).min(height - 1)).all(|ny| {
                    (x.saturating_sub(1)..=(x + 1).min(width - 1))
                        .all(|nx| previous[(ny * width + nx) as usize])
                })
            };
            for y in 0..height {
                for x in 0..width {
                    let idx = (y * width + x) as usize;
                    current[idx] = previous[idx] && kept(x, y);
                }
            }
        }
        Self::from_pixels(width, height, current)
    }
}

/// Stack-based 4-connected fill from `start`; returns the component's pixel
/// indices and marks them visited.
fn flood_fill(
    opaque: &[bool],
    visited: &mut [bool],
    width: u32,
    height: u32,
    start: usize,
) -> Vec<usize> {
    let mut component = Vec::new();
    let mut stack = vec![start];
    visited[start] = true;
    while let Some(idx) = stack.pop() {
        component.push(idx);
        let (x, y) = (idx as u32 % width, idx as u32 / width);
        let neighbours = [
            (x > 0).then(|| idx - 1),
            (x + 1 < width).then(|| idx + 1),
            (y > 0).then(|| idx - width as usize),
            (y + 1 < height).then(|| idx + width as usize),
        ];
        for next in neighbours.into_iter().flatten() {
            if opaque[next] && !visited[next] {
                visited[next] = true;
                stack.push(next);
            }
        }
    }
    component
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    /// Transparent canvas with opaque rectangles painted on it.
    fn canvas(width: u32, height: u32, blobs: &[Rect]) -> DynamicImage {
        let mut image = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        for blob in blobs {
            for y in blob.y..blob.bottom() {
                for x in blob.x..blob.right() {
                    image.put_pixel(x, y, Rgba([255, 255, 255, 255]));
                }
            }
        }
        DynamicImage::ImageRgba8(image)
    }

    #[test]
    fn largest_blob_is_the_bubble() {
        let image = canvas(100, 80, &[Rect::new(2, 2, 6, 6), Rect::new(20, 10, 60, 50)]);
        let mask = BubbleMask::find(&image).expect("bubble");
        assert_eq!(mask.bounds(), Rect::new(20, 10, 60, 50));
        assert_eq!(mask.inner_bounds(), Rect::new(26, 15, 48, 40));
        assert!(mask.contains(30, 30));
        assert!(!mask.contains(4, 4));
    }

    #[test]
    fn semi_transparent_pixels_are_outside() {
        let mut image = canvas(40, 40, &[Rect::new(5, 5, 20, 20)]).to_rgba8();
        for x in 5..25 {
            image.put_pixel(x, 5, Rgba([255, 255, 255, OPAQUE_ALPHA]));
        }
        let mask = BubbleMask::find(&DynamicImage::ImageRgba8(image)).expect("bubble");
        assert_eq!(mask.bounds(), Rect::new(5, 6, 20, 19));
    }

    #[test]
    fn opaque_or_alpha_free_images_have_no_bubble() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        assert!(BubbleMask::find(&rgb).is_none());
        let opaque = canvas(10, 10, &[Rect::new(0, 0, 10, 10)]);
        assert!(BubbleMask::find(&opaque).is_none());
        assert!(BubbleMask::find(&canvas(10, 10, &[])).is_none());
    }

    #[test]
    fn erosion_peels_one_pixel_per_pass() {
        let mask = BubbleMask::find(&canvas(30, 30, &[Rect::new(5, 5, 20, 20)])).expect("bubble");
        let eroded = mask.eroded(3).expect("interior");
        assert_eq!(eroded.bounds(), Rect::new(8, 8, 14, 14));
        assert!(mask.contains(6, 6) && !eroded.contains(6, 6));
        assert!(mask.eroded(10).is_none());
    }
}
