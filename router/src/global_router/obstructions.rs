use crate::grid::Grid;
use groute_common::db::core::{DesignDB, WireShape};
use groute_common::geom::rect::Rect;

/// Records `rect` on `layer`, clipped to the die. Boxes entirely outside
/// the die are dropped.
fn add_clipped(grid: &mut Grid, layer: usize, rect: Rect, owner: &dyn Fn() -> String) -> bool {
    let die = grid.grid_area();
    if die.contains_rect(&rect) {
        grid.add_obstruction(layer, rect);
        return true;
    }
    log::warn!("Found blockage outside die area{}.", owner());
    match die.intersection(&rect) {
        Some(clipped) => {
            grid.add_obstruction(layer, clipped);
            true
        }
        None => false,
    }
}

/// Gathers every routing obstruction of the design into `grid`: routing
/// blockages, instance obstructions (macro ones grown by
/// `macro_extension` tiles), instance pin shapes and existing net wires.
/// Returns the blockage count reported in the log.
pub fn collect_obstructions(db: &DesignDB, grid: &mut Grid, macro_extension: i64) -> usize {
    let num_layers = grid.num_layers();
    let mut count = 0;

    for &(layer, rect) in &db.routing_blockages {
        if layer > num_layers {
            continue;
        }
        if add_clipped(grid, layer, rect, &String::new) {
            count += 1;
        }
    }

    let mut macros = 0;
    for cell in db.cells.iter().filter(|c| c.status.is_placed()) {
        let master = &db.masters[cell.master.index()];
        let owner = || format!(" in instance {}", cell.name);
        let extension = if master.is_block() {
            macros += 1;
            macro_extension * grid.tile_width()
        } else {
            0
        };

        for &(layer, rect) in master.obstructions.iter().filter(|(l, _)| *l <= num_layers) {
            let rect = rect.translate(cell.origin).bloat(extension, extension);
            if add_clipped(grid, layer, rect, &owner) {
                count += 1;
            }
        }
        for &pin in &cell.pins {
            for (layer, rect) in db.pin_shapes(pin) {
                if layer <= num_layers {
                    add_clipped(grid, layer, rect, &owner);
                }
            }
        }
    }

    for net in &db.nets {
        let Some(wire) = &net.wire else {
            continue;
        };
        let owner = || format!(" on net {}", net.name);
        for shape in &wire.shapes {
            if let WireShape::Segment { level, rect } = *shape
                && level <= num_layers
            {
                add_clipped(grid, level, rect, &owner);
            }
        }
    }

    log::info!("Macros: {}", macros);
    log::info!("Blockages: {}", count);
    count
}
