//! Overflow listings and a utilization heat map of the routed grid.

use crate::core::RoutingCore;
use crate::error::Result;
use crate::grid::capacity::edges_of;
use crate::grid::{Direction, Edge, Grid, RoutingLayer};
use groute_common::util::visualization::draw_heatmap;
use std::fs::File;
use std::io::{BufWriter, Write};

const HEATMAP_CELL_PX: u32 = 8;

/// Every tile-pair edge of `direction` as (x, y, x2, y2).
fn planar_edges(grid: &Grid, direction: Direction) -> impl Iterator<Item = (usize, usize, usize, usize)> + use<> {
    edges_of(grid.x_grids(), grid.y_grids(), 1, direction).map(|e| {
        let (x2, y2) = e.far_tile();
        (e.x, e.y, x2, y2)
    })
}

fn utilization(usage: u32, capacity: u32) -> f64 {
    match (usage, capacity) {
        (0, _) => 0.0,
        (_, 0) => 1.0,
        (u, c) => u as f64 / c as f64,
    }
}

/// Writes `<prefix>2D.log`, `<prefix>3D.log` and `<prefix>.png`.
/// Returns the number of overflowed planar edges.
pub fn write_congestion_report(
    core: &dyn RoutingCore,
    grid: &Grid,
    layers: &[RoutingLayer],
    prefix: &str,
) -> Result<usize> {
    let mut planar = BufWriter::new(File::create(format!("{}2D.log", prefix))?);
    let mut layered = BufWriter::new(File::create(format!("{}3D.log", prefix))?);
    let (cols, rows) = (grid.x_grids(), grid.y_grids());
    let mut heat = vec![0.0f64; cols * rows];
    let mut overflowed = 0;

    for dir in [Direction::Horizontal, Direction::Vertical] {
        for (x1, y1, x2, y2) in planar_edges(grid, dir) {
            let (usage, capacity) = core.planar_totals(dir, x1, y1);
            let util = utilization(usage, capacity);
            let cell = &mut heat[y1 * cols + x1];
            *cell = cell.max(util);

            if usage > capacity {
                overflowed += 1;
                writeln!(planar, "{} {} {} {} {} {}", x1, y1, x2, y2, usage, capacity)?;
            }
            for layer in layers.iter().filter(|l| l.index <= grid.num_layers()) {
                let edge = Edge::new(layer.index, dir, x1, y1);
                let (u, c) = (core.edge_usage(edge), core.edge_capacity(edge));
                if u > c {
                    writeln!(layered, "{} {} {} {} {} {} {}", x1, y1, x2, y2, layer.name, u, c)?;
                }
            }
        }
    }
    planar.flush()?;
    layered.flush()?;

    draw_heatmap(&heat, cols, rows, &format!("{}.png", prefix), HEATMAP_CELL_PX)
        .map_err(std::io::Error::other)?;
    if overflowed > 0 {
        log::warn!("Congestion report: {} overflowed edges.", overflowed);
    } else {
        log::info!("Congestion report: no overflow.");
    }
    Ok(overflowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CoreGeometry, MazeRouter};
    use crate::core::maze::MazeConfig;
    use crate::grid::EdgeCapacities;
    use groute_common::geom::point::Point;
    use groute_common::geom::rect::Rect;
    use groute_common::util::config::GlobalRoutingConfig;

    fn layer(index: usize, direction: Direction) -> RoutingLayer {
        RoutingLayer {
            index,
            name: format!("M{}", index),
            direction,
        }
    }

    #[test]
    fn overflowed_edges_are_listed() {
        let grid = Grid::new(Rect::from_corners(0, 0, 300, 200), 100, 100, 2);
        let layers = vec![layer(1, Direction::Horizontal), layer(2, Direction::Vertical)];
        let mut caps = EdgeCapacities::new(3, 2, 2);
        caps.fill(1, Direction::Horizontal, 1);
        caps.fill(2, Direction::Vertical, 1);

        let mut core = MazeRouter::new(MazeConfig::from(&GlobalRoutingConfig::default()));
        core.init_grid(
            CoreGeometry {
                origin: Point::new(0, 0),
                tile_width: 100,
                tile_height: 100,
                x_grids: 3,
                y_grids: 2,
                directions: vec![Direction::Horizontal, Direction::Vertical],
                min_widths: vec![10, 10],
                spacings: vec![0, 0],
            },
            &caps,
        );
        core.set_edge_usage(Edge::horizontal(1, 1, 0), 3);

        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("cong_");
        let prefix = prefix.to_str().unwrap();
        let overflowed = write_congestion_report(&core, &grid, &layers, prefix).unwrap();

        assert_eq!(overflowed, 1);
        let planar = std::fs::read_to_string(format!("{}2D.log", prefix)).unwrap();
        assert_eq!(planar, "1 0 2 0 3 1\n");
        let layered = std::fs::read_to_string(format!("{}3D.log", prefix)).unwrap();
        assert_eq!(layered, "1 0 2 0 M1 3 1\n");
        assert!(std::path::Path::new(&format!("{}.png", prefix)).exists());
    }

    #[test]
    fn edges_stay_inside_the_grid() {
        let grid = Grid::new(Rect::from_corners(0, 0, 300, 200), 100, 100, 1);
        assert_eq!(planar_edges(&grid, Direction::Horizontal).count(), 4);
        assert_eq!(planar_edges(&grid, Direction::Vertical).count(), 3);
    }
}
