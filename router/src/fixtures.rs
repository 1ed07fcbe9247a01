//! Small in-memory designs shared by unit tests.

use groute_common::db::core::{DesignDB, PlacementStatus, RowData};
use groute_common::db::indices::{CellId, MasterId, NetId};
use groute_common::db::tech::{
    LayerData, LayerDirection, MasterClass, MasterData, MasterPin, PinDirection, SigType,
    TrackAxis, TrackDef,
};
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;

fn pin(name: &str, direction: PinDirection, rect: Rect, gate: f64, diff: f64) -> MasterPin {
    MasterPin {
        name: name.to_string(),
        direction,
        usage: SigType::Signal,
        shapes: vec![(1, rect)],
        gate_area: gate,
        diff_area: diff,
    }
}

/// 30x30 um die, three layers (H, V, H) with 500 dbu tracks, fifteen
/// 2 um rows, an inverter and a diode master.
pub fn design() -> DesignDB {
    let mut db = DesignDB::new();
    db.die_area = Rect::from_corners(0, 0, 30_000, 30_000);

    let directions = [
        LayerDirection::Horizontal,
        LayerDirection::Vertical,
        LayerDirection::Horizontal,
    ];
    for (i, dir) in directions.into_iter().enumerate() {
        let mut layer = LayerData::new(format!("M{}", i + 1), dir, 500, 100);
        layer.resistance = 0.1;
        layer.capacitance = 0.0002;
        layer.edge_capacitance = 0.00005;
        let level = db.add_layer(layer);
        if level < 3 {
            db.add_cut_layer(format!("V{}", level), 5.0);
        }
        db.tracks.push(TrackDef {
            layer: format!("M{}", i + 1),
            axis: match dir {
                LayerDirection::Vertical => TrackAxis::X,
                _ => TrackAxis::Y,
            },
            start: 250,
            num_tracks: 60,
            step: 500,
        });
    }

    db.sites.insert("core".into(), (200, 2000));
    for r in 0..15 {
        db.rows.push(RowData {
            name: format!("ROW_{}", r),
            site: "core".into(),
            origin: Point::new(0, r * 2000),
            num_sites: 150,
            site_width: 200,
            height: 2000,
        });
    }

    db.add_master(MasterData {
        name: "INV".into(),
        class: MasterClass::Core,
        width: 1000,
        height: 2000,
        pins: vec![
            pin("A", PinDirection::Input, Rect::from_corners(100, 200, 300, 1800), 0.05, 0.0),
            pin("Y", PinDirection::Output, Rect::from_corners(700, 200, 900, 1800), 0.0, 0.1),
        ],
        obstructions: Vec::new(),
    });
    db.add_master(MasterData {
        name: "ANTENNA".into(),
        class: MasterClass::CoreAntennaCell,
        width: 400,
        height: 2000,
        pins: vec![pin(
            "A",
            PinDirection::Input,
            Rect::from_corners(100, 200, 300, 1800),
            0.0,
            0.5,
        )],
        obstructions: Vec::new(),
    });
    db
}

pub fn add_block(db: &mut DesignDB) -> MasterId {
    db.add_master(MasterData {
        name: "RAM".into(),
        class: MasterClass::Block,
        width: 5000,
        height: 5000,
        pins: Vec::new(),
        obstructions: vec![(1, Rect::from_corners(0, 0, 5000, 5000))],
    })
}

pub fn place(db: &mut DesignDB, name: &str, x: i64, y: i64) -> CellId {
    let inv = db.find_master("INV").expect("fixture master");
    db.add_cell(name.into(), inv, Point::new(x, y), PlacementStatus::Placed)
        .expect("unique fixture name")
}

/// Net from the output of `driver` to input `A` of every sink.
pub fn net(db: &mut DesignDB, name: &str, driver: CellId, sinks: &[CellId]) -> NetId {
    let net = db.add_net(name.into(), SigType::Signal);
    db.connect(driver, "Y", net).expect("fixture pin");
    for &sink in sinks {
        db.connect(sink, "A", net).expect("fixture pin");
    }
    net
}
