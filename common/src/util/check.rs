use crate::db::core::{DesignDB, PlacementStatus};
use crate::db::indices::CellId;
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use crate::geom::rtree::SpatialIndex;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Checks that placed instances stay inside the die, sit on a row of their
/// height when they are core cells, and do not overlap each other.
pub fn run_placement_check(db: &DesignDB) -> Result<(), String> {
    log::info!("Starting Placement Verification...");
    let valid = AtomicBool::new(true);

    let placed: Vec<CellId> = (0..db.num_cells())
        .map(CellId::new)
        .filter(|&c| db.cells[c.index()].status != PlacementStatus::Unplaced)
        .collect();

    placed.par_iter().for_each(|&cell| {
        let bbox = db.cell_bbox(cell);
        if !db.die_area.contains_rect(&bbox) {
            log::error!("FAIL: Cell '{}' out of bounds.", db.cells[cell.index()].name);
            valid.store(false, Ordering::Relaxed);
        }
        let master = db.master_of(cell);
        if !master.is_block()
            && !master.is_pad()
            && !db.rows.is_empty()
            && !db
                .rows
                .iter()
                .any(|r| r.height == master.height && r.bbox().contains_rect(&bbox))
        {
            log::error!("FAIL: Cell '{}' is not on a row.", db.cells[cell.index()].name);
            valid.store(false, Ordering::Relaxed);
        }
    });

    let mut index = SpatialIndex::new();
    for &cell in &placed {
        index.insert(db.cell_bbox(cell), cell.index());
    }

    let has_overlap = placed.par_iter().any(|&cell| {
        let r1 = db.cell_bbox(cell);
        if r1.area() == 0 {
            return false;
        }
        // Shrink by one unit so abutting instances are legal.
        let probe = Rect::new(
            Point::new(r1.min.x + 1, r1.min.y + 1),
            Point::new(r1.max.x - 1, r1.max.y - 1),
        );
        for other in index.query(probe) {
            if other == cell.index() {
                continue;
            }
            let r2 = db.cell_bbox(CellId::new(other));
            if r2.area() > 0 && r1.overlaps(&r2) {
                log::error!(
                    "FAIL: Cell Overlap '{}' and '{}'",
                    db.cells[cell.index()].name,
                    db.cells[other].name
                );
                return true;
            }
        }
        false
    });

    if has_overlap {
        valid.store(false, Ordering::Relaxed);
    }

    if valid.load(Ordering::Relaxed) {
        log::info!("\x1b[32mPASS\x1b[0m: Placement is valid.");
        Ok(())
    } else {
        Err("Placement verification failed.".to_string())
    }
}
