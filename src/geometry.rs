use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.w as f32 * 0.5,
            self.y as f32 + self.h as f32 * 0.5,
        )
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        Rect {
            x: x1,
            y: y1,
            w: x2 - x1,
            h: y2 - y1,
        }
    }

    /// Closed intersection: rectangles that only touch along an edge count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Shared area of two rectangles; `None` when they share no pixels.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        (x2 > x1 && y2 > y1).then(|| Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    /// Grows the rectangle by `padding` on every side; the origin saturates at 0.
    pub fn expand(&self, padding: u32) -> Rect {
        let x = self.x.saturating_sub(padding);
        let y = self.y.saturating_sub(padding);
        Rect {
            x,
            y,
            w: self.right().saturating_add(padding) - x,
            h: self.bottom().saturating_add(padding) - y,
        }
    }

    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Rect {
            x,
            y,
            w: self.right().min(width) - x,
            h: self.bottom().min(height) - y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Shared height over the shorter of the two heights.
    pub fn vertical_overlap_ratio(&self, other: &Rect) -> f32 {
        let iy1 = self.y.max(other.y);
        let iy2 = self.bottom().min(other.bottom());
        if iy2 <= iy1 {
            return 0.0;
        }
        (iy2 - iy1) as f32 / (self.h.min(other.h) as f32).max(1.0)
    }

    pub fn scale_down(&self, factor: f32) -> Rect {
        let factor = factor.max(1.0);
        Rect {
            x: (self.x as f32 / factor).round() as u32,
            y: (self.y as f32 / factor).round() as u32,
            w: (self.w as f32 / factor).round() as u32,
            h: (self.h as f32 / factor).round() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_both() {
        let a = Rect::new(10, 10, 20, 5);
        let b = Rect::new(25, 0, 10, 40);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(10, 0, 25, 40));
        assert!(u.contains(&a) && u.contains(&b));
    }

    #[test]
    fn touching_edges_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        let c = Rect::new(11, 0, 10, 10);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn intersection_needs_shared_pixels() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(
            a.intersection(&Rect::new(5, 2, 10, 4)),
            Some(Rect::new(5, 2, 5, 4))
        );
        assert_eq!(a.intersection(&Rect::new(10, 0, 5, 5)), None);
    }

    #[test]
    fn expand_saturates_at_origin() {
        let r = Rect::new(3, 20, 10, 10).expand(5);
        assert_eq!(r, Rect::new(0, 15, 18, 20));
    }

    #[test]
    fn clamp_keeps_rect_inside_image() {
        let r = Rect::new(90, 40, 30, 30).clamp_to(100, 50);
        assert_eq!(r, Rect::new(90, 40, 10, 10));
        assert!(Rect::new(120, 0, 5, 5).clamp_to(100, 50).is_empty());
    }
}
