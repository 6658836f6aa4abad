//! Axis-aligned rectangles in PDF user space
//!
//! All coordinates use the PDF convention (origin at bottom-left, y grows up).

/// An axis-aligned bounding box `(x0, y0)`-`(x1, y1)` with `x0 <= x1` and `y0 <= y1`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    /// Build a box from two arbitrary corners
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Overlapping rectangle, `None` when the boxes are disjoint.
    /// Touching edges produce a degenerate (zero-area) intersection.
    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        if x0 > x1 || y0 > y1 {
            None
        } else {
            Some(BBox { x0, y0, x1, y1 })
        }
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.intersection(other).is_some()
    }

    /// Whether `other` lies entirely inside this box
    pub fn contains(&self, other: &BBox) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1
    }

    /// Fraction of this box's area covered by `region` (0.0 - 1.0).
    ///
    /// Degenerate boxes (zero width or height) have no area to measure, so they
    /// count as fully covered when they lie inside `region` and uncovered otherwise.
    pub fn overlap_ratio(&self, region: &BBox) -> f32 {
        let area = self.area();
        if area <= f32::EPSILON {
            return if region.contains(self) { 1.0 } else { 0.0 };
        }
        match self.intersection(region) {
            Some(inter) => (inter.area() / area).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    /// Grow the box by `pad` on every side
    pub fn expand(&self, pad: f32) -> BBox {
        BBox {
            x0: self.x0 - pad,
            y0: self.y0 - pad,
            x1: self.x1 + pad,
            y1: self.y1 + pad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_corners() {
        let b = BBox::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(b, BBox::new(0.0, 5.0, 10.0, 20.0));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 15.0);
    }

    #[test]
    fn test_overlap_ratio() {
        let span = BBox::new(0.0, 0.0, 10.0, 10.0);
        let half = BBox::new(5.0, 0.0, 20.0, 10.0);
        assert!((span.overlap_ratio(&half) - 0.5).abs() < 1e-6);

        let inside = BBox::new(-1.0, -1.0, 11.0, 11.0);
        assert_eq!(span.overlap_ratio(&inside), 1.0);

        let apart = BBox::new(50.0, 50.0, 60.0, 60.0);
        assert_eq!(span.overlap_ratio(&apart), 0.0);
    }

    #[test]
    fn test_degenerate_overlap() {
        let point = BBox::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(point.overlap_ratio(&BBox::new(0.0, 0.0, 10.0, 10.0)), 1.0);
        assert_eq!(point.overlap_ratio(&BBox::new(6.0, 0.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_union_and_intersection() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.0, 5.0, 20.0, 15.0);
        assert_eq!(a.union(&b), BBox::new(0.0, 0.0, 20.0, 15.0));
        let touch = a.intersection(&b).unwrap();
        assert_eq!(touch.area(), 0.0);
        assert!(!a.intersects(&BBox::new(11.0, 0.0, 12.0, 1.0)));
    }
}
