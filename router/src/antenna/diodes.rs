//! Diode creation and spot legalization next to the protected gates.

use super::checker::Violation;
use crate::error::{Result, RouteError};
use groute_common::db::core::{DesignDB, PlacementStatus};
use groute_common::db::indices::{CellId, MasterId};
use groute_common::db::legalizer::PlacementLegalizer;
use groute_common::db::tech::LayerDirection;
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;
use groute_common::geom::rtree::SpatialIndex;
use groute_common::util::config::AntennaConfig;
use std::collections::BTreeMap;

const DIODE_PREFIX: &str = "ANTENNA_";

/// The diode master resolved from the configuration.
#[derive(Clone, Debug)]
pub struct DiodeMaster {
    pub master: MasterId,
    pub pin: String,
    pub diff_area: f64,
}

impl DiodeMaster {
    pub fn resolve(db: &DesignDB, config: &AntennaConfig) -> Result<Self> {
        let master = db
            .find_master(&config.diode_cell)
            .ok_or_else(|| RouteError::MissingDiodeMaster(config.diode_cell.clone()))?;
        let data = &db.masters[master.index()];
        let pin = data
            .find_pin(&config.diode_pin)
            .ok_or_else(|| RouteError::DiodePinMissing {
                master: config.diode_cell.clone(),
                pin: config.diode_pin.clone(),
            })?;
        Ok(Self {
            master,
            pin: config.diode_pin.clone(),
            diff_area: data.pins[pin].diff_area,
        })
    }
}

pub struct DiodeInserter<'a> {
    legalizer: &'a dyn PlacementLegalizer,
    diode: DiodeMaster,
    retries: usize,
    site_width: i64,
    core: Rect,
    index: SpatialIndex,
    next_id: usize,
    frozen: BTreeMap<CellId, PlacementStatus>,
    inserted: Vec<CellId>,
    needs_legalizer: usize,
}

impl<'a> DiodeInserter<'a> {
    pub fn new(
        db: &DesignDB,
        diode: DiodeMaster,
        retries: usize,
        legalizer: &'a dyn PlacementLegalizer,
    ) -> Self {
        let site_width = match db.rows.first() {
            Some(first) => {
                if db.rows.iter().any(|r| r.site_width != first.site_width) {
                    log::warn!(
                        "Rows have different site widths; using {} from row {}.",
                        first.site_width,
                        first.name
                    );
                }
                first.site_width
            }
            None => 1,
        };
        Self {
            legalizer,
            diode,
            retries,
            site_width,
            core: db.core_area(),
            index: SpatialIndex::new(),
            next_id: 1,
            frozen: BTreeMap::new(),
            inserted: Vec::new(),
            needs_legalizer: 0,
        }
    }

    pub fn inserted(&self) -> &[CellId] {
        &self.inserted
    }

    /// Diodes left where the legalizer has to move them.
    pub fn needs_legalizer(&self) -> usize {
        self.needs_legalizer
    }

    /// Pins gate instances and existing diodes with `Firm` so the index
    /// and the legalizer treat them as obstacles.
    pub fn freeze(&mut self, db: &mut DesignDB, violations: &[Violation]) {
        let mut cells: Vec<CellId> = violations
            .iter()
            .flat_map(|v| v.gates.iter())
            .filter_map(|&pin| db.pins[pin.index()].cell)
            .filter(|&cell| !db.master_of(cell).is_block())
            .collect();
        cells.extend(
            (0..db.cells.len())
                .map(CellId::new)
                .filter(|&c| db.cells[c.index()].master == self.diode.master),
        );
        for cell in cells {
            let status = &mut db.cells[cell.index()].status;
            if status.is_placed() {
                self.frozen.entry(cell).or_insert(*status);
                *status = PlacementStatus::Firm;
            }
        }
    }

    fn padded(&self, db: &DesignDB, cell: CellId, bbox: Rect) -> Rect {
        let left = self.legalizer.pad_left(db, cell) * self.site_width;
        let right = self.legalizer.pad_right(db, cell) * self.site_width;
        Rect::from_corners(bbox.min.x - left, bbox.min.y, bbox.max.x + right, bbox.max.y)
    }

    /// Indexes every `Firm`/`Fixed` instance and placement blockage.
    pub fn build_index(&mut self, db: &DesignDB) {
        for (i, cell) in db.cells.iter().enumerate() {
            if cell.status.is_fixed() {
                let id = CellId::new(i);
                let padded = self.padded(db, id, db.cell_bbox(id));
                self.index.insert(padded, i);
            }
        }
        for (i, &blockage) in db.placement_blockages.iter().enumerate() {
            self.index.insert(blockage, usize::MAX - i);
        }
        log::debug!("Diode placement index holds {} boxes.", self.index.len());
    }

    fn is_legal(&self, db: &DesignDB, cell: CellId, bbox: Rect) -> bool {
        let probe = self.padded(db, cell, bbox).bloat(-1, -1);
        self.index.query(probe).is_empty()
            && self.core.contains_rect(&bbox)
            && db
                .rows
                .iter()
                .any(|r| r.height == bbox.height() && r.bbox().contains_rect(&bbox))
    }

    fn next_name(&mut self, db: &DesignDB) -> String {
        loop {
            let name = format!("{}{}", DIODE_PREFIX, self.next_id);
            self.next_id += 1;
            if db.find_cell(&name).is_none() {
                return name;
            }
        }
    }

    /// Offset of attempt `attempt` from the gate origin: alternating sides,
    /// one site (or row) further out every two attempts.
    fn offset(&self, attempt: usize, gate: Rect, diode: Rect, vertical: bool) -> Point<i64> {
        let step = (attempt / 2) as i64;
        let before = attempt % 2 == 0;
        if vertical {
            let row = diode.height();
            let dy = if before {
                -(diode.height() + step * row)
            } else {
                gate.height() + step * row
            };
            Point::new(0, dy)
        } else {
            let dx = if before {
                -(diode.width() + step * self.site_width)
            } else {
                gate.width() + step * self.site_width
            };
            Point::new(dx, 0)
        }
    }

    /// Creates `violation.diode_count` diodes for every gate of the
    /// violation, all connected to the violating net.
    pub fn insert(&mut self, db: &mut DesignDB, violation: &Violation) -> Result<usize> {
        let vertical = db
            .routing_layer(violation.layer)
            .is_some_and(|l| l.direction == LayerDirection::Vertical);
        let mut count = 0;
        for &gate_pin in &violation.gates {
            let Some(gate) = db.pins[gate_pin.index()].cell else {
                continue;
            };
            for _ in 0..violation.diode_count {
                self.place_diode(db, gate, violation, vertical)?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn place_diode(&mut self, db: &mut DesignDB, gate: CellId, violation: &Violation, vertical: bool) -> Result<CellId> {
        let name = self.next_name(db);
        let origin = db.cells[gate.index()].origin;
        let diode = db.add_cell(name, self.diode.master, origin, PlacementStatus::Placed)?;
        db.connect(diode, &self.diode.pin, violation.net)?;

        let gate_box = db.cell_bbox(gate);
        let gate_is_block = db.master_of(gate).is_block();
        let mut legal = None;
        for attempt in 0..self.retries {
            let offset = self.offset(attempt, gate_box, db.cell_bbox(diode), vertical);
            let candidate = Point::new(origin.x + offset.x, origin.y + offset.y);
            db.cells[diode.index()].origin = candidate;
            if self.is_legal(db, diode, db.cell_bbox(diode)) {
                legal = Some(candidate);
                break;
            }
        }

        let status = match legal {
            Some(_) if !gate_is_block => PlacementStatus::Firm,
            Some(_) => PlacementStatus::Placed,
            None => {
                db.cells[diode.index()].origin = origin;
                self.needs_legalizer += 1;
                PlacementStatus::Placed
            }
        };
        db.cells[diode.index()].status = status;
        if legal.is_some() {
            let padded = self.padded(db, diode, db.cell_bbox(diode));
            self.index.insert(padded, diode.index());
        }
        self.inserted.push(diode);
        Ok(diode)
    }

    /// Runs the legalizer, then releases the frozen instances. New diodes
    /// end up `Placed`.
    pub fn finish(self, db: &mut DesignDB) -> Result<Vec<CellId>> {
        let moved = self
            .legalizer
            .legalize(db)
            .map_err(RouteError::Legalization)?;
        log::info!("Legalizer moved {} instances.", moved);
        for (cell, status) in self.frozen {
            db.cells[cell.index()].status = status;
        }
        for &diode in &self.inserted {
            db.cells[diode.index()].status = PlacementStatus::Placed;
        }
        Ok(self.inserted)
    }
}
