use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box `(x, y, w, h)` in its parent image's pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The region covering a whole `width x height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Intersection with the `[0, width) x [0, height)` image rectangle.
    ///
    /// Returns `None` when nothing of the region lies inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn iou(&self, other: &Region) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.area() as f64;
        let area_b = other.area() as f64;
        inter / (area_a + area_b - inter)
    }

    /// Corner-distance similarity used when grouping raw detections.
    ///
    /// Every edge of the two boxes must lie within
    /// `eps * (min_w + min_h) / 2` pixels of its counterpart.
    pub fn is_similar(&self, other: &Region, eps: f64) -> bool {
        let delta = eps
            * (self.width.min(other.width) + self.height.min(other.height)) as f64
            * 0.5;
        (self.x - other.x).abs() as f64 <= delta
            && (self.y - other.y).abs() as f64 <= delta
            && (self.right() - other.right()).abs() as f64 <= delta
            && (self.bottom() - other.bottom()).abs() as f64 <= delta
    }

    /// True when `self` lies inside `outer` grown by `margin` on every side.
    pub fn is_inside(&self, outer: &Region, margin: i32) -> bool {
        self.x >= outer.x - margin
            && self.y >= outer.y - margin
            && self.right() <= outer.right() + margin
            && self.bottom() <= outer.bottom() + margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical_regions() {
        let a = Region::new(10, 10, 100, 100);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = Region::new(0, 0, 100, 100);
        let b = Region::new(50, 0, 100, 100);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[test]
    fn test_iou_touching_edges() {
        let a = Region::new(0, 0, 50, 50);
        let b = Region::new(50, 0, 50, 50);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    // ── Clamping ─────────────────────────────────────────────────────

    #[test]
    fn test_clamp_inside_is_unchanged() {
        let r = Region::new(10, 20, 30, 40);
        assert_eq!(r.clamp_to(100, 100), Some(r));
    }

    #[test]
    fn test_clamp_trims_overhang() {
        let r = Region::new(-3, 90, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(0, 90, 17, 10)));
    }

    #[rstest]
    #[case::left_of_image(Region::new(-20, 0, 10, 10))]
    #[case::below_image(Region::new(0, 100, 10, 10))]
    #[case::zero_width(Region::new(5, 5, 0, 10))]
    fn test_clamp_outside_is_none(#[case] r: Region) {
        assert_eq!(r.clamp_to(100, 100), None);
    }

    // ── Similarity ───────────────────────────────────────────────────

    #[test]
    fn test_similar_small_shift() {
        let a = Region::new(0, 0, 20, 20);
        let b = Region::new(2, 2, 20, 20);
        // delta = 0.2 * 40 / 2 = 4
        assert!(a.is_similar(&b, 0.2));
    }

    #[test]
    fn test_not_similar_large_shift() {
        let a = Region::new(0, 0, 20, 20);
        let b = Region::new(5, 0, 20, 20);
        assert!(!a.is_similar(&b, 0.2));
    }

    #[test]
    fn test_not_similar_different_scale() {
        let a = Region::new(0, 0, 12, 12);
        let b = Region::new(-3, -3, 18, 18);
        assert!(!a.is_similar(&b, 0.2));
    }

    #[test]
    fn test_is_inside_with_margin() {
        let outer = Region::new(10, 10, 50, 50);
        assert!(Region::new(8, 12, 20, 20).is_inside(&outer, 2));
        assert!(!Region::new(8, 12, 20, 20).is_inside(&outer, 1));
    }

    #[test]
    fn test_full_covers_image() {
        let r = Region::full(64, 48);
        assert_eq!(r.area(), 64 * 48);
        assert_eq!((r.right(), r.bottom()), (64, 48));
    }
}
