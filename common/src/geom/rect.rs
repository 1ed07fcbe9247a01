use super::point::Point;
use std::fmt;

/// Axis-aligned box in database units. `max` is inclusive for containment
/// tests and exclusive for overlap tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub min: Point<i64>,
    pub max: Point<i64>,
}

impl Rect {
    pub fn new(min: Point<i64>, max: Point<i64>) -> Self {
        Self { min, max }
    }

    /// Builds a normalized box from two arbitrary corners.
    pub fn from_corners(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self {
            min: Point::new(x1.min(x2), y1.min(y2)),
            max: Point::new(x1.max(x2), y1.max(y2)),
        }
    }

    pub fn width(&self) -> i64 {
        self.max.x - self.min.x
    }
    pub fn height(&self) -> i64 {
        self.max.y - self.min.y
    }
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point<i64> {
        Point::new(
            (self.min.x + self.max.x) / 2,
            (self.min.y + self.max.y) / 2,
        )
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Like `overlaps` but abutting boxes count as touching.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains(&self, p: Point<i64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    pub fn merge(&self, other: &Rect) -> Rect {
        Rect::new(
            Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        )
    }

    /// Common part of two touching boxes, `None` when they are disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect::new(
            Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        ))
    }

    pub fn translate(&self, offset: Point<i64>) -> Rect {
        Rect::new(self.min + offset, self.max + offset)
    }

    pub fn bloat(&self, dx: i64, dy: i64) -> Rect {
        Rect::new(
            Point::new(self.min.x - dx, self.min.y - dy),
            Point::new(self.max.x + dx, self.max.y + dy),
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) ({}, {})",
            self.min.x, self.min.y, self.max.x, self.max.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abutting_boxes_touch_but_do_not_overlap() {
        let a = Rect::from_corners(0, 0, 10, 10);
        let b = Rect::from_corners(10, 0, 20, 10);
        assert!(!a.overlaps(&b));
        assert!(a.intersects(&b));
    }

    #[test]
    fn corners_are_normalized() {
        let r = Rect::from_corners(50, 80, 10, 20);
        assert_eq!(r.min, Point::new(10, 20));
        assert_eq!(r.max, Point::new(50, 80));
        assert_eq!(r.area(), 40 * 60);
        assert_eq!(r.center(), Point::new(30, 50));
    }
}
