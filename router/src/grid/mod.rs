pub mod adjust;
pub mod capacity;
pub mod dense;
pub mod direction;
pub mod layers;
pub mod snapshot;

pub use capacity::{Edge, EdgeCapacities};
pub use dense::EdgeGrid;
pub use direction::Direction;
pub use layers::{RoutingLayer, RoutingTracks};

use crate::error::{Result, RouteError};
use groute_common::geom::coord::GridCoord;
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;
use std::collections::BTreeMap;

/// Search-side view of the edge grid used by the maze router. Moves are
/// between planar neighbours `a` and `b` on the same layer.
pub trait RoutingGrid: Sync + Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn layers(&self) -> u8;
    fn direction(&self, z: u8) -> Direction;

    fn add_wire(&mut self, a: GridCoord, b: GridCoord);
    fn remove_wire(&mut self, a: GridCoord, b: GridCoord);

    fn get_cost(&self, a: GridCoord, b: GridCoord) -> f64;
    fn update_history(&mut self, history_increment: f64);

    fn is_congested(&self, a: GridCoord, b: GridCoord) -> bool;
    fn total_overflow(&self) -> u64;

    fn capacity(&self, a: GridCoord, b: GridCoord) -> u32;
    fn set_penalty(&mut self, penalty: f64);
}

/// First and last tile touched by a box, with the bounds of those tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockedTiles {
    pub first: (usize, usize),
    pub last: (usize, usize),
    pub first_box: Rect,
    pub last_box: Rect,
}

/// Tiling of the die area plus the per-layer facts the capacity pipeline
/// works from.
#[derive(Clone, Debug)]
pub struct Grid {
    die: Rect,
    tile_width: i64,
    tile_height: i64,
    x_grids: usize,
    y_grids: usize,
    perfect_regular_x: bool,
    perfect_regular_y: bool,
    num_layers: usize,
    min_widths: Vec<i64>,
    spacings: Vec<i64>,
    h_capacities: Vec<u32>,
    v_capacities: Vec<u32>,
    h_capacities_x100: Vec<u32>,
    v_capacities_x100: Vec<u32>,
    obstructions: BTreeMap<usize, Vec<Rect>>,
}

impl Grid {
    pub fn new(die: Rect, tile_width: i64, tile_height: i64, num_layers: usize) -> Self {
        let tile_width = tile_width.max(1);
        let tile_height = tile_height.max(1);
        let x_grids = (die.width() / tile_width).max(1) as usize;
        let y_grids = (die.height() / tile_height).max(1) as usize;
        Self {
            die,
            tile_width,
            tile_height,
            x_grids,
            y_grids,
            perfect_regular_x: x_grids as i64 * tile_width == die.width(),
            perfect_regular_y: y_grids as i64 * tile_height == die.height(),
            num_layers,
            min_widths: vec![0; num_layers],
            spacings: vec![0; num_layers],
            h_capacities: vec![0; num_layers],
            v_capacities: vec![0; num_layers],
            h_capacities_x100: vec![0; num_layers],
            v_capacities_x100: vec![0; num_layers],
            obstructions: BTreeMap::new(),
        }
    }

    /// Builds the tiling from the level-1 track pitch. Min widths come from
    /// each level's track pitch.
    pub fn init(
        die: Rect,
        tracks: &[RoutingTracks],
        pitches_in_tile: i64,
        num_layers: usize,
    ) -> Result<Self> {
        let first = tracks
            .iter()
            .find(|t| t.layer == 1)
            .ok_or_else(|| RouteError::MissingTracks {
                layer: "1".to_string(),
            })?;
        let tile = pitches_in_tile * first.track_pitch;
        let mut grid = Grid::new(die, tile, tile, num_layers);
        for t in tracks.iter().filter(|t| t.layer >= 1 && t.layer <= num_layers) {
            grid.min_widths[t.layer - 1] = t.track_pitch;
        }
        Ok(grid)
    }

    pub fn grid_area(&self) -> Rect {
        self.die
    }
    pub fn lower_left(&self) -> Point<i64> {
        self.die.min
    }
    pub fn tile_width(&self) -> i64 {
        self.tile_width
    }
    pub fn tile_height(&self) -> i64 {
        self.tile_height
    }
    pub fn x_grids(&self) -> usize {
        self.x_grids
    }
    pub fn y_grids(&self) -> usize {
        self.y_grids
    }
    pub fn is_perfect_regular_x(&self) -> bool {
        self.perfect_regular_x
    }
    pub fn is_perfect_regular_y(&self) -> bool {
        self.perfect_regular_y
    }
    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    /// Tile size measured along the coordinate a direction varies in.
    pub fn tile_size(&self, direction: Direction) -> i64 {
        match direction {
            Direction::Horizontal => self.tile_width,
            Direction::Vertical => self.tile_height,
        }
    }

    pub fn min_width(&self, layer: usize) -> i64 {
        self.min_widths.get(layer.wrapping_sub(1)).copied().unwrap_or(0)
    }

    pub fn spacing(&self, layer: usize) -> i64 {
        self.spacings.get(layer.wrapping_sub(1)).copied().unwrap_or(0)
    }

    /// Nominal per-layer track count of edges running in `direction`.
    pub fn capacity(&self, layer: usize, direction: Direction) -> u32 {
        let caps = match direction {
            Direction::Horizontal => &self.h_capacities,
            Direction::Vertical => &self.v_capacities,
        };
        caps.get(layer.wrapping_sub(1)).copied().unwrap_or(0)
    }

    /// Same as [`Grid::capacity`] in hundredths of a track.
    pub fn capacity_x100(&self, layer: usize, direction: Direction) -> u32 {
        let caps = match direction {
            Direction::Horizontal => &self.h_capacities_x100,
            Direction::Vertical => &self.v_capacities_x100,
        };
        caps.get(layer.wrapping_sub(1)).copied().unwrap_or(0)
    }

    pub fn set_capacity_x100(&mut self, layer: usize, direction: Direction, value: u32) {
        if layer == 0 || layer > self.num_layers {
            return;
        }
        let (caps, caps_x100) = match direction {
            Direction::Horizontal => (&mut self.h_capacities, &mut self.h_capacities_x100),
            Direction::Vertical => (&mut self.v_capacities, &mut self.v_capacities_x100),
        };
        caps[layer - 1] = value / 100;
        caps_x100[layer - 1] = value;
    }

    /// Tile indices of a point, clamped into the grid.
    pub fn tile_of(&self, p: Point<i64>) -> (usize, usize) {
        let x = ((p.x - self.die.min.x) / self.tile_width).clamp(0, self.x_grids as i64 - 1);
        let y = ((p.y - self.die.min.y) / self.tile_height).clamp(0, self.y_grids as i64 - 1);
        (x as usize, y as usize)
    }

    pub fn tile_center(&self, x: usize, y: usize) -> Point<i64> {
        Point::new(
            x as i64 * self.tile_width + self.tile_width / 2 + self.die.min.x,
            y as i64 * self.tile_height + self.tile_height / 2 + self.die.min.y,
        )
    }

    /// Center of the tile holding `p`.
    pub fn position_on_grid(&self, p: Point<i64>) -> Point<i64> {
        let (x, y) = self.tile_of(p);
        self.tile_center(x, y)
    }

    pub fn coord_of(&self, p: Point<i64>, layer: usize) -> GridCoord {
        let (x, y) = self.tile_of(p);
        GridCoord::new(x as u32, y as u32, layer.saturating_sub(1) as u8)
    }

    /// Bounds of a tile. The last row and column absorb the remainder of
    /// an irregular die.
    pub fn tile_bounds(&self, x: usize, y: usize) -> Rect {
        let min = Point::new(
            self.die.min.x + x as i64 * self.tile_width,
            self.die.min.y + y as i64 * self.tile_height,
        );
        let max_x = if x + 1 >= self.x_grids {
            self.die.max.x
        } else {
            min.x + self.tile_width
        };
        let max_y = if y + 1 >= self.y_grids {
            self.die.max.y
        } else {
            min.y + self.tile_height
        };
        Rect::new(min, Point::new(max_x, max_y))
    }

    pub fn blocked_tiles(&self, rect: &Rect) -> BlockedTiles {
        let first = self.tile_of(rect.min);
        let last = self.tile_of(rect.max);
        BlockedTiles {
            first,
            last,
            first_box: self.tile_bounds(first.0, first.1),
            last_box: self.tile_bounds(last.0, last.1),
        }
    }

    /// Tracks an obstruction consumes inside one boundary tile, rounded up.
    /// Tracks of a horizontal layer are spaced along y, so the y extent is
    /// measured there; vertical layers use x.
    pub fn tile_reduce(
        &self,
        obstruction: &Rect,
        tile_box: &Rect,
        track_space: i64,
        is_first: bool,
        direction: Direction,
    ) -> u32 {
        if track_space <= 0 {
            return 0;
        }
        let (obs_min, obs_max) = direction.span_across(obstruction);
        let (tile_min, tile_max) = direction.span_across(tile_box);
        let covered = if obs_min >= tile_min && obs_max <= tile_max {
            obs_max - obs_min
        } else if is_first {
            tile_max - obs_min
        } else {
            obs_max - tile_min
        };
        ceil_div(covered.max(0), track_space) as u32
    }

    pub fn add_obstruction(&mut self, layer: usize, rect: Rect) {
        self.obstructions.entry(layer).or_default().push(rect);
    }

    pub fn obstructions(&self, layer: usize) -> &[Rect] {
        self.obstructions
            .get(&layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn num_obstructions(&self) -> usize {
        self.obstructions.values().map(Vec::len).sum()
    }

    /// Guide box of a segment between tile centers: the covered tiles,
    /// stretched to the die edge next to the last row or column.
    pub fn segment_box(&self, a: Point<i64>, b: Point<i64>) -> Rect {
        let lo = Point::new(a.x.min(b.x), a.y.min(b.y));
        let hi = Point::new(a.x.max(b.x), a.y.max(b.y));
        let mut ur = Point::new(hi.x + self.tile_width / 2, hi.y + self.tile_height / 2);
        if (self.die.max.x - ur.x) / self.tile_width < 1 {
            ur.x = self.die.max.x;
        }
        if (self.die.max.y - ur.y) / self.tile_height < 1 {
            ur.y = self.die.max.y;
        }
        Rect::new(
            Point::new(lo.x - self.tile_width / 2, lo.y - self.tile_height / 2),
            ur,
        )
    }
}

pub(crate) fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}
