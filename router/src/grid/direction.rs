use groute_common::db::tech::LayerDirection;
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;

/// Preferred wiring direction of a routing layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Horizontal,
    Vertical,
}

impl Direction {
    pub fn from_layer(dir: LayerDirection) -> Option<Self> {
        match dir {
            LayerDirection::Horizontal => Some(Direction::Horizontal),
            LayerDirection::Vertical => Some(Direction::Vertical),
            LayerDirection::Unknown => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Direction::Horizontal => Direction::Vertical,
            Direction::Vertical => Direction::Horizontal,
        }
    }

    pub fn is_horizontal(self) -> bool {
        self == Direction::Horizontal
    }

    /// Coordinate that varies along a wire running in this direction.
    #[inline]
    pub fn along(self, p: Point<i64>) -> i64 {
        match self {
            Direction::Horizontal => p.x,
            Direction::Vertical => p.y,
        }
    }

    /// Coordinate that stays fixed along a wire; tracks are spaced on it.
    #[inline]
    pub fn across(self, p: Point<i64>) -> i64 {
        match self {
            Direction::Horizontal => p.y,
            Direction::Vertical => p.x,
        }
    }

    pub fn span_along(self, r: &Rect) -> (i64, i64) {
        (self.along(r.min), self.along(r.max))
    }

    pub fn span_across(self, r: &Rect) -> (i64, i64) {
        (self.across(r.min), self.across(r.max))
    }

    /// Builds a point from (along, across) components.
    pub fn point(self, along: i64, across: i64) -> Point<i64> {
        match self {
            Direction::Horizontal => Point::new(along, across),
            Direction::Vertical => Point::new(across, along),
        }
    }
}
