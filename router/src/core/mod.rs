//! Contract between the orchestrator and the negotiated-congestion solver.

pub mod maze;

pub use maze::MazeRouter;

use crate::error::Result;
use crate::grid::{Direction, Edge, EdgeCapacities};
use crate::route::NetRouteMap;
use groute_common::db::indices::NetId;
use groute_common::geom::point::Point;

/// Tiling handed to the core: the origin and tile size turn tile indices
/// back into database units.
#[derive(Clone, Debug)]
pub struct CoreGeometry {
    pub origin: Point<i64>,
    pub tile_width: i64,
    pub tile_height: i64,
    pub x_grids: usize,
    pub y_grids: usize,
    /// Preferred direction per routing level, index `level - 1`.
    pub directions: Vec<Direction>,
    pub min_widths: Vec<i64>,
    pub spacings: Vec<i64>,
}

impl CoreGeometry {
    pub fn num_layers(&self) -> usize {
        self.directions.len()
    }

    pub fn tile_center(&self, x: u32, y: u32) -> Point<i64> {
        Point::new(
            self.origin.x + x as i64 * self.tile_width + self.tile_width / 2,
            self.origin.y + y as i64 * self.tile_height + self.tile_height / 2,
        )
    }
}

/// A net as the core sees it: distinct `(tile x, tile y, level)` pins.
#[derive(Clone, Debug)]
pub struct CoreNet {
    pub id: NetId,
    pub name: String,
    pub pins: Vec<(u32, u32, usize)>,
    pub alpha: f64,
    pub is_clock: bool,
    /// Extra cost per unit step, index `level - 1`.
    pub layer_costs: Vec<f64>,
}

/// Pluggable maze-routing solver. Edge accessors read 0 and ignore
/// writes until `init_grid` has been called.
pub trait RoutingCore: Send {
    fn init_grid(&mut self, geometry: CoreGeometry, capacities: &EdgeCapacities);

    fn edge_capacity(&self, edge: Edge) -> u32;
    fn set_edge_capacity(&mut self, edge: Edge, capacity: u32);
    fn edge_usage(&self, edge: Edge) -> u32;
    fn set_edge_usage(&mut self, edge: Edge, usage: u32);

    fn add_net(&mut self, net: CoreNet);
    fn num_nets(&self) -> usize;

    /// Routes every registered net and returns one segment list per net.
    fn run(&mut self) -> Result<NetRouteMap>;

    fn total_overflow(&self) -> u64;

    /// Usage and capacity of a tile-pair edge summed over all layers.
    fn planar_totals(&self, direction: Direction, x: usize, y: usize) -> (u32, u32);

    /// Drops the grid and every registered net.
    fn clear(&mut self);
}
