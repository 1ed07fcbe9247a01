use anyhow::Result;
use groute_common::db::core::{DesignDB, PlacementStatus, RowData};
use groute_common::db::indices::CellId;
use groute_common::db::legalizer::PlacementLegalizer;
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;
use groute_common::util::config::LegalizationConfig;

/// Greedy row legalizer: movable instances are visited left to right and
/// dropped into the closest free, site-aligned gap of a nearby row.
#[derive(Clone, Debug)]
pub struct TetrisLegalizer {
    pad_left: i64,
    pad_right: i64,
    search_radius: usize,
}

impl From<&LegalizationConfig> for TetrisLegalizer {
    fn from(config: &LegalizationConfig) -> Self {
        Self {
            pad_left: config.pad_left.max(0),
            pad_right: config.pad_right.max(0),
            search_radius: config.search_radius,
        }
    }
}

impl Default for TetrisLegalizer {
    fn default() -> Self {
        Self::from(&LegalizationConfig::default())
    }
}

#[derive(Clone, Debug)]
struct RowIntervals {
    start_x: i64,
    end_x: i64,
    y: i64,
    height: i64,
    site_width: i64,
    /// Sorted, merged occupied spans.
    blockages: Vec<(i64, i64)>,
}

impl RowIntervals {
    fn new(row: &RowData) -> Self {
        let bbox = row.bbox();
        Self {
            start_x: bbox.min.x,
            end_x: bbox.max.x,
            y: bbox.min.y,
            height: row.height,
            site_width: row.site_width.max(1),
            blockages: Vec::new(),
        }
    }

    fn overlaps_y(&self, rect: &Rect) -> bool {
        rect.min.y < self.y + self.height && rect.max.y > self.y
    }

    fn add_occupancy(&mut self, start: i64, end: i64) {
        let start = start.max(self.start_x);
        let end = end.min(self.end_x);
        if start >= end {
            return;
        }
        self.blockages.push((start, end));
        self.blockages.sort_by_key(|b| b.0);

        let mut merged: Vec<(i64, i64)> = Vec::with_capacity(self.blockages.len());
        for &(s, e) in &self.blockages {
            match merged.last_mut() {
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }
        self.blockages = merged;
    }

    /// Closest site-aligned x for an instance whose footprint, padding
    /// included, spans `[x - left, x + width + right)`.
    fn find_best_slot(&self, target_x: i64, width: i64, left: i64, right: i64) -> Option<(i64, i64)> {
        let mut best: Option<(i64, i64)> = None;
        let mut free_from = self.start_x;
        let gaps = self
            .blockages
            .iter()
            .copied()
            .chain(std::iter::once((self.end_x, self.end_x)));

        for (occupied_start, occupied_end) in gaps {
            let valid_min = free_from + left;
            let valid_max = occupied_start - width - right;
            free_from = free_from.max(occupied_end);
            if valid_min > valid_max {
                continue;
            }

            let lo = div_ceil(valid_min - self.start_x, self.site_width);
            let hi = (valid_max - self.start_x).div_euclid(self.site_width);
            if lo > hi {
                continue;
            }
            let ideal = ((target_x - self.start_x) as f64 / self.site_width as f64).round() as i64;
            let x = self.start_x + ideal.clamp(lo, hi) * self.site_width;
            let dist = (x - target_x).abs();
            if best.is_none_or(|(_, d)| dist < d) {
                best = Some((x, dist));
            }
        }
        best
    }
}

fn div_ceil(a: i64, b: i64) -> i64 {
    -((-a).div_euclid(b))
}

impl TetrisLegalizer {
    pub fn new(pad_left: i64, pad_right: i64, search_radius: usize) -> Self {
        Self {
            pad_left: pad_left.max(0),
            pad_right: pad_right.max(0),
            search_radius,
        }
    }

    fn is_movable(db: &DesignDB, cell: CellId) -> bool {
        let data = &db.cells[cell.index()];
        let master = db.master_of(cell);
        data.status == PlacementStatus::Placed && !master.is_block() && !master.is_pad()
    }

    fn build_rows(&self, db: &DesignDB, movable: &[CellId]) -> Vec<RowIntervals> {
        let mut rows: Vec<RowIntervals> = db.rows.iter().map(RowIntervals::new).collect();
        rows.sort_by_key(|r| (r.y, r.start_x));

        let mut blocked: Vec<Rect> = db.placement_blockages.clone();
        for i in 0..db.num_cells() {
            let cell = CellId::new(i);
            if db.cells[i].status.is_placed() && !movable.contains(&cell) {
                blocked.push(db.cell_bbox(cell));
            }
        }
        for rect in &blocked {
            for row in rows.iter_mut().filter(|r| r.overlaps_y(rect)) {
                row.add_occupancy(rect.min.x, rect.max.x);
            }
        }
        rows
    }
}

impl PlacementLegalizer for TetrisLegalizer {
    fn legalize(&self, db: &mut DesignDB) -> Result<usize> {
        if db.rows.is_empty() {
            log::warn!("Tetris: design has no rows, nothing to legalize.");
            return Ok(0);
        }

        let mut movable: Vec<CellId> = (0..db.num_cells())
            .map(CellId::new)
            .filter(|&c| Self::is_movable(db, c))
            .collect();
        let mut rows = self.build_rows(db, &movable);
        movable.sort_by_key(|&c| (db.cells[c.index()].origin.x, c.index()));

        let mut moved = 0;
        let mut failed = 0;
        for &cell in &movable {
            let origin = db.cells[cell.index()].origin;
            let (width, height) = {
                let master = db.master_of(cell);
                (master.width, master.height)
            };

            // Rows this instance fits in, ordered by distance from its y.
            let mut candidates: Vec<usize> = (0..rows.len()).filter(|&r| rows[r].height == height).collect();
            candidates.sort_by_key(|&r| ((rows[r].y - origin.y).abs(), rows[r].y));
            candidates.truncate(2 * self.search_radius + 1);

            let mut best: Option<(usize, i64, i64)> = None;
            for r in candidates {
                let row = &rows[r];
                let y_cost = (row.y - origin.y).abs();
                if best.is_some_and(|(_, _, cost)| y_cost * 2 >= cost) {
                    break;
                }
                let left = self.pad_left(db, cell) * row.site_width;
                let right = self.pad_right(db, cell) * row.site_width;
                if let Some((x, x_cost)) = row.find_best_slot(origin.x, width, left, right) {
                    let cost = x_cost + 2 * y_cost;
                    if best.is_none_or(|(_, _, c)| cost < c) {
                        best = Some((r, x, cost));
                    }
                }
            }

            let Some((r, x, _)) = best else {
                log::warn!(
                    "Tetris: Could not find legal spot for cell '{}'.",
                    db.cells[cell.index()].name
                );
                failed += 1;
                continue;
            };
            let row = &mut rows[r];
            let left = self.pad_left * row.site_width;
            let right = self.pad_right * row.site_width;
            row.add_occupancy(x - left, x + width + right);

            let target = Point::new(x, row.y);
            if target != origin {
                db.cells[cell.index()].origin = target;
                moved += 1;
            }
        }

        log::info!(
            "Tetris: legalized {} instances, moved {}.",
            movable.len() - failed,
            moved
        );
        if failed > 0 {
            anyhow::bail!("{} instances have no legal position", failed);
        }
        Ok(moved)
    }

    fn pad_left(&self, _db: &DesignDB, _cell: CellId) -> i64 {
        self.pad_left
    }

    fn pad_right(&self, _db: &DesignDB, _cell: CellId) -> i64 {
        self.pad_right
    }
}
