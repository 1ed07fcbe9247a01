mod common;

use common::DesignBuilder;
use groute_common::db::tech::LayerDirection;
use groute_common::util::check;
use groute_common::util::config::{AntennaConfig, GlobalRoutingConfig};
use groute_placer::TetrisLegalizer;
use groute_router::GlobalRouter;
use groute_router::antenna::wires::{add_local_connections, route_to_wire};
use groute_router::guides::{GuideLayers, write_guides};
use groute_router::rc::{InMemoryParasitics, RcEstimator};
use std::collections::BTreeSet;
use std::io::Write;

fn three_layers(size: i64) -> DesignBuilder {
    DesignBuilder::new(size)
        .layer(LayerDirection::Horizontal, 500)
        .layer(LayerDirection::Vertical, 500)
        .layer(LayerDirection::Horizontal, 500)
        .rows()
        .library()
}

#[test]
fn guides_cover_every_routed_net() {
    common::init_logging();
    let mut db = three_layers(40_000).build();
    let a = common::place(&mut db, "a", 1000, 2000);
    let b = common::place(&mut db, "b", 30_000, 2000);
    let c = common::place(&mut db, "c", 1000, 30_000);
    let d = common::place(&mut db, "d", 3000, 30_000);
    common::net(&mut db, "long", a, &[b]);
    common::net(&mut db, "short", c, &[d]);

    let mut router = GlobalRouter::new(GlobalRoutingConfig::default());
    router.global_route(&db).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("route.guide");
    let mapping = GuideLayers {
        min_layer: 1,
        unidirectional: false,
    };
    let written = write_guides(
        &path,
        &db,
        router.routes(),
        router.grid().unwrap(),
        router.layers(),
        mapping,
    )
    .unwrap();
    assert_eq!(written, 2);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "long");
    assert_eq!(lines[1], "(");
    let close = lines.iter().position(|l| *l == ")").unwrap();
    assert!(close > 2);
    assert_eq!(lines[close + 1], "short");
    for line in lines.iter().filter(|l| l.split_whitespace().count() == 5) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let coords: Vec<i64> = fields[..4].iter().map(|f| f.parse().unwrap()).collect();
        assert!(coords[0] < coords[2] && coords[1] < coords[3], "{line}");
        assert!(["M1", "M2", "M3"].contains(&fields[4]), "{line}");
    }
    assert_eq!(lines.last(), Some(&")"));
}

#[test]
fn antenna_repair_adds_legal_diodes_and_reroutes() {
    common::init_logging();
    let mut db = three_layers(40_000).antenna_rules(10.0).build();
    let a = common::place(&mut db, "a", 1000, 2000);
    let b = common::place(&mut db, "b", 31_000, 2000);
    let floating = common::gate_net(&mut db, "floating", &[a, b]);
    let c = common::place(&mut db, "c", 1000, 30_000);
    let d = common::place(&mut db, "d", 3000, 30_000);
    common::net(&mut db, "local", c, &[d]);

    let mut router = GlobalRouter::new(GlobalRoutingConfig::default());
    router.global_route(&db).unwrap();

    let config = AntennaConfig::default();
    let before = router.check_antennas(&mut db, &config).unwrap();
    assert!(before.iter().any(|v| v.net == floating));
    assert!(db.nets[floating.index()].wire.is_none());

    let violating: BTreeSet<_> = before.iter().map(|v| v.net).collect();
    let untouched: Vec<_> = router
        .routes()
        .iter()
        .filter(|(id, _)| !violating.contains(id))
        .map(|(id, route)| (*id, route.clone()))
        .collect();
    assert!(!untouched.is_empty());

    let cells = db.num_cells();
    let pins = db.nets[floating.index()].pins.len();
    let summary = router
        .repair_antennas(&mut db, &config, &TetrisLegalizer::default())
        .unwrap();
    assert!(summary.diodes > 0);
    assert_eq!(summary.needs_legalizer, 0);
    assert!(summary.rerouted >= 1);
    assert_eq!(db.num_cells(), cells + summary.diodes);
    assert_eq!(db.nets[floating.index()].pins.len(), pins + summary.diodes);
    assert!(check::run_placement_check(&db).is_ok());

    let after = router.check_antennas(&mut db, &config).unwrap();
    assert!(after.len() < before.len());
    assert!(after.iter().all(|v| v.net != floating));
    assert!(!router.routes()[&floating].is_empty());
    for (id, route) in &untouched {
        assert_eq!(&router.routes()[id], route, "{}", db.nets[id.index()].name);
    }
}

#[test]
fn detail_routed_nets_are_checked_against_their_own_wires() {
    common::init_logging();
    let mut db = three_layers(40_000).antenna_rules(10.0).build();
    let a = common::place(&mut db, "a", 1000, 2000);
    let b = common::place(&mut db, "b", 31_000, 2000);
    let floating = common::gate_net(&mut db, "floating", &[a, b]);

    let mut router = GlobalRouter::new(GlobalRoutingConfig::default());
    router.global_route(&db).unwrap();

    let mut routes = router.routes().clone();
    add_local_connections(&mut routes, router.nets());
    let wire = route_to_wire(&db, &routes[&floating]);
    db.create_wire(floating, wire.clone());
    db.nets[floating.index()].detail_routed = true;

    let violations = router
        .check_antennas(&mut db, &AntennaConfig::default())
        .unwrap();
    assert!(violations.iter().any(|v| v.net == floating));
    let kept = db.nets[floating.index()].wire.as_ref().unwrap();
    assert_eq!(kept.shapes, wire.shapes);
}

#[test]
fn rc_summary_lists_routed_nets() {
    common::init_logging();
    let mut db = three_layers(40_000).build();
    let a = common::place(&mut db, "a", 1000, 2000);
    let b = common::place(&mut db, "b", 30_000, 2000);
    let c = common::place(&mut db, "c", 1000, 30_000);
    let long = common::net(&mut db, "long", a, &[b]);
    let short = common::net(&mut db, "short", c, &[a]);

    let mut router = GlobalRouter::new(GlobalRoutingConfig::default());
    router.global_route(&db).unwrap();

    let mut sink = InMemoryParasitics::new();
    let count = RcEstimator::new(&db).estimate_all(router.routes(), router.nets(), &mut sink);
    assert_eq!(count, 2);
    let long_rc = sink.net(long).unwrap();
    let short_rc = sink.net(short).unwrap();
    assert!(long_rc.total_capacitance() > 0.0);
    assert!(long_rc.total_resistance() > 0.0);
    assert!(short_rc.total_capacitance() > 0.0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rc.txt");
    sink.write_summary(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let names: Vec<&str> = text.lines().filter_map(|l| l.split_whitespace().next()).collect();
    assert_eq!(names, vec!["long", "short"]);
}

const LEF: &str = "
UNITS
  DATABASE MICRONS 1000 ;
END UNITS

LAYER metal1
  TYPE ROUTING ;
  DIRECTION HORIZONTAL ;
  PITCH 0.5 ;
  WIDTH 0.1 ;
END metal1

LAYER via1
  TYPE CUT ;
  RESISTANCE 5 ;
END via1

LAYER metal2
  TYPE ROUTING ;
  DIRECTION VERTICAL ;
  PITCH 0.5 ;
  WIDTH 0.1 ;
END metal2

SITE core
  SIZE 0.2 BY 2.0 ;
END core

MACRO INV
  CLASS CORE ;
  SIZE 1.0 BY 2.0 ;
  PIN A
    DIRECTION INPUT ;
    ANTENNAGATEAREA 0.05 ;
    PORT
      LAYER metal1 ;
        RECT 0.1 0.2 0.3 1.8 ;
    END
  END A
  PIN Y
    DIRECTION OUTPUT ;
    PORT
      LAYER metal1 ;
        RECT 0.7 0.2 0.9 1.8 ;
    END
  END Y
END INV
";

const DEF: &str = "VERSION 5.8 ;
DESIGN top ;
UNITS DISTANCE MICRONS 1000 ;
DIEAREA ( 0 0 ) ( 30000 30000 ) ;
TRACKS Y 250 DO 60 STEP 500 LAYER metal1 ;
TRACKS X 250 DO 60 STEP 500 LAYER metal2 ;
COMPONENTS 2 ;
- u1 INV + PLACED ( 1000 2000 ) N ;
- u2 INV + PLACED ( 20000 2000 ) N ;
END COMPONENTS
NETS 1 ;
- n1 ( u1 Y ) ( u2 A ) ;
END NETS
END DESIGN
";

#[test]
fn parsed_design_routes_to_a_guide_file() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let lef = dir.path().join("tech.lef");
    let def = dir.path().join("top.def");
    std::fs::File::create(&lef).unwrap().write_all(LEF.as_bytes()).unwrap();
    std::fs::File::create(&def).unwrap().write_all(DEF.as_bytes()).unwrap();

    let mut db = groute_common::db::core::DesignDB::new();
    groute_common::db::parser::lef::parse(&mut db, lef.to_str().unwrap()).unwrap();
    groute_common::db::parser::def::parse(&mut db, def.to_str().unwrap()).unwrap();

    let mut router = GlobalRouter::new(GlobalRoutingConfig::default());
    router.global_route(&db).unwrap();
    assert_eq!(router.layer_range(), (1, 2));

    let path = dir.path().join("out.guide");
    let mapping = GuideLayers {
        min_layer: 1,
        unidirectional: false,
    };
    write_guides(
        &path,
        &db,
        router.routes(),
        router.grid().unwrap(),
        router.layers(),
        mapping,
    )
    .unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("n1\n(\n"));
    assert!(text.ends_with(")\n"));
    assert!(text.contains("metal1"));
}
