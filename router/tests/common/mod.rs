//! In-code design builder shared by the integration tests.
#![allow(dead_code)]

use groute_common::db::core::{DesignDB, PlacementStatus, RowData};
use groute_common::db::indices::{CellId, NetId};
use groute_common::db::tech::{
    AntennaRule, LayerData, LayerDirection, MasterClass, MasterData, MasterPin, PinDirection,
    PwlTable, SigType, TrackAxis, TrackDef,
};
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct DesignBuilder {
    db: DesignDB,
}

impl DesignBuilder {
    /// Square die of `size` dbu.
    pub fn new(size: i64) -> Self {
        let mut db = DesignDB::new();
        db.name = "top".into();
        db.die_area = Rect::from_corners(0, 0, size, size);
        Self { db }
    }

    /// Routing layer with tracks every `pitch` starting half a pitch in.
    pub fn layer(mut self, direction: LayerDirection, pitch: i64) -> Self {
        let level = self.db.num_layers() + 1;
        let name = format!("M{}", level);
        let mut layer = LayerData::new(name.clone(), direction, pitch, pitch / 5);
        layer.resistance = 0.1;
        layer.capacitance = 0.0002;
        layer.edge_capacitance = 0.00005;
        if level > 1 {
            self.db.add_cut_layer(format!("V{}", level - 1), 5.0);
        }
        self.db.add_layer(layer);

        let span = self.db.die_area.width().max(self.db.die_area.height());
        self.db.tracks.push(TrackDef {
            layer: name,
            axis: match direction {
                LayerDirection::Vertical => TrackAxis::X,
                _ => TrackAxis::Y,
            },
            start: pitch / 2,
            num_tracks: (span / pitch) as u32,
            step: pitch,
        });
        self
    }

    /// Rows of 200 dbu sites, 2000 dbu high, covering the die.
    pub fn rows(mut self) -> Self {
        self.db.sites.insert("core".into(), (200, 2000));
        let die = self.db.die_area;
        for r in 0..die.height() / 2000 {
            self.db.rows.push(RowData {
                name: format!("ROW_{}", r),
                site: "core".into(),
                origin: Point::new(0, r * 2000),
                num_sites: (die.width() / 200) as u32,
                site_width: 200,
                height: 2000,
            });
        }
        self
    }

    /// Inverter with input `A` (0.05 um^2 of gate) and output `Y`, plus a
    /// 0.5 um^2 diode cell.
    pub fn library(mut self) -> Self {
        let pin = |name: &str, direction, x: i64, gate: f64, diff: f64| MasterPin {
            name: name.into(),
            direction,
            usage: SigType::Signal,
            shapes: vec![(1, Rect::from_corners(x, 200, x + 200, 1800))],
            gate_area: gate,
            diff_area: diff,
        };
        self.db.add_master(MasterData {
            name: "INV".into(),
            class: MasterClass::Core,
            width: 1000,
            height: 2000,
            pins: vec![
                pin("A", PinDirection::Input, 100, 0.05, 0.0),
                pin("Y", PinDirection::Output, 700, 0.0, 0.1),
            ],
            obstructions: Vec::new(),
        });
        self.db.add_master(MasterData {
            name: "ANTENNA".into(),
            class: MasterClass::CoreAntennaCell,
            width: 400,
            height: 2000,
            pins: vec![pin("A", PinDirection::Input, 100, 0.0, 0.5)],
            obstructions: Vec::new(),
        });
        self
    }

    /// Same partial-area limit on every layer; any diode lifts it.
    pub fn antenna_rules(mut self, par_ratio: f64) -> Self {
        for layer in &mut self.db.layers {
            layer.antenna = AntennaRule {
                par_ratio,
                diff_par_ratio: PwlTable::new(vec![(0.0, par_ratio), (0.4, 1000.0)]),
                ..AntennaRule::default()
            };
        }
        self
    }

    pub fn build(self) -> DesignDB {
        self.db
    }
}

pub fn place(db: &mut DesignDB, name: &str, x: i64, y: i64) -> CellId {
    let inv = db.find_master("INV").unwrap();
    db.add_cell(name.into(), inv, Point::new(x, y), PlacementStatus::Placed)
        .unwrap()
}

/// Net from the output of `driver` to input `A` of every sink.
pub fn net(db: &mut DesignDB, name: &str, driver: CellId, sinks: &[CellId]) -> NetId {
    let net = db.add_net(name.into(), SigType::Signal);
    db.connect(driver, "Y", net).unwrap();
    for &sink in sinks {
        db.connect(sink, "A", net).unwrap();
    }
    net
}

/// Net joining input `A` of every cell, with no driver.
pub fn gate_net(db: &mut DesignDB, name: &str, cells: &[CellId]) -> NetId {
    let net = db.add_net(name.into(), SigType::Signal);
    for &cell in cells {
        db.connect(cell, "A", net).unwrap();
    }
    net
}

/// Fixed inverter standing in for a single-pin terminal at `at`.
pub fn terminal(db: &mut DesignDB, name: &str, at: Point<i64>) -> CellId {
    let inv = db.find_master("INV").unwrap();
    db.add_cell(name.into(), inv, at, PlacementStatus::Fixed)
        .unwrap()
}
