use super::capacity::{Edge, edges_of};
use super::direction::Direction;
use super::Grid;
use crate::core::RoutingCore;
use crate::route::GRoute;

/// Capacity and usage of every edge over a layer range, taken from a
/// routing core and written back verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapacitySnapshot {
    min_layer: usize,
    max_layer: usize,
    entries: Vec<(Edge, u32, u32)>,
}

impl CapacitySnapshot {
    pub fn save(core: &dyn RoutingCore, grid: &Grid, min_layer: usize, max_layer: usize) -> Self {
        let mut entries = Vec::new();
        for layer in min_layer..=max_layer.min(grid.num_layers()) {
            for dir in [Direction::Horizontal, Direction::Vertical] {
                for edge in edges_of(grid.x_grids(), grid.y_grids(), layer, dir) {
                    entries.push((edge, core.edge_capacity(edge), core.edge_usage(edge)));
                }
            }
        }
        log::debug!(
            "Saved {} edges over layers {}..={}.",
            entries.len(),
            min_layer,
            max_layer
        );
        Self {
            min_layer,
            max_layer,
            entries,
        }
    }

    pub fn restore(&self, core: &mut dyn RoutingCore) {
        for &(edge, capacity, usage) in &self.entries {
            core.set_edge_capacity(edge, capacity);
            core.set_edge_usage(edge, usage);
        }
    }

    pub fn layer_range(&self) -> (usize, usize) {
        (self.min_layer, self.max_layer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Unit edges covered by a wire between two tile centers.
pub fn wire_edges(grid: &Grid, route: &GRoute) -> Vec<Edge> {
    let mut edges = Vec::new();
    for seg in route.iter().filter(|s| s.is_wire()) {
        let (x0, y0) = grid.tile_of(seg.lo());
        let (x1, y1) = grid.tile_of(seg.hi());
        if y0 == y1 {
            edges.extend((x0..x1).map(|x| Edge::horizontal(seg.init_layer, x, y0)));
        } else if x0 == x1 {
            edges.extend((y0..y1).map(|y| Edge::vertical(seg.init_layer, x0, y)));
        } else {
            log::warn!("Skipping diagonal wire {:?} while releasing usage.", seg);
        }
    }
    edges
}

/// Gives back one track on every unit edge of an old route.
pub fn release_route(core: &mut dyn RoutingCore, grid: &Grid, route: &GRoute) {
    for edge in wire_edges(grid, route) {
        let usage = core.edge_usage(edge);
        core.set_edge_usage(edge, usage.saturating_sub(1));
    }
}
