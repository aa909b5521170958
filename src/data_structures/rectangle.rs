use super::Point;

/// An axis-aligned rectangle in whatever coordinate space the caller is
/// working in (device space, raster space, or pattern "stepping space").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rectangle {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Rectangle { x0, y0, x1, y1 }
    }

    pub fn from_points(p: Point, q: Point) -> Self {
        Rectangle {
            x0: p.x.min(q.x),
            y0: p.y.min(q.y),
            x1: p.x.max(q.x),
            y1: p.y.max(q.y),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Intersects with the positive quadrant, per §4.7.1 step 4 ("intersect
    /// with the positive quadrant").
    pub fn clamp_to_positive_quadrant(&self) -> Self {
        Rectangle {
            x0: self.x0.max(0.0),
            y0: self.y0.max(0.0),
            x1: self.x1.max(0.0),
            y1: self.y1.max(0.0),
        }
    }

    pub fn intersect(&self, other: &Rectangle) -> Rectangle {
        Rectangle {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    /// Smallest rectangle covering both `self` and `other`. Used to grow a
    /// "dirty" bounding box as blits accumulate (§4.6).
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Expands the rectangle by `dx`/`dy` in every direction. Used by the
    /// tiler to widen the stepping-space bounding box by the tile's own
    /// bounding box for non-simple tiles (§4.6).
    pub fn expand(&self, dx: f32, dy: f32) -> Self {
        Rectangle {
            x0: self.x0 - dx,
            y0: self.y0 - dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn intersect_shrinks_to_overlap() {
        let a = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let b = Rectangle::new(5.0, -5.0, 15.0, 5.0);

        let i = a.intersect(&b);
        assert_eq!(i, Rectangle::new(5.0, 0.0, 10.0, 5.0));
    }

    #[test]
    fn clamp_to_positive_quadrant_floors_negative_corners() {
        let r = Rectangle::new(-3.0, -4.0, 2.0, 5.0);
        assert_eq!(r.clamp_to_positive_quadrant(), Rectangle::new(0.0, 0.0, 2.0, 5.0));
    }
}
