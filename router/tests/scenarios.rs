mod common;

use common::DesignBuilder;
use groute_common::db::tech::{LayerDirection, SigType};
use groute_common::geom::rect::Rect;
use groute_common::util::config::{GlobalRoutingConfig, LayerAdjustment};
use groute_router::GlobalRouter;
use groute_router::grid::{Direction, Edge};
use groute_router::route::merge_segments;
use rstest::rstest;

#[test]
fn two_pin_net_on_a_single_layer() {
    common::init_logging();
    let mut db = DesignBuilder::new(100_000)
        .layer(LayerDirection::Horizontal, 500)
        .library()
        .build();
    let a = common::place(&mut db, "a", 0, 0);
    let b = common::place(&mut db, "b", 89_900, 89_900);
    let id = common::net(&mut db, "n", a, &[b]);

    let mut router = GlobalRouter::new(GlobalRoutingConfig::default());
    router.global_route(&db).unwrap();

    let grid = router.grid().unwrap();
    assert_eq!(grid.tile_width(), 7500);
    assert_eq!((grid.x_grids(), grid.y_grids()), (13, 13));
    assert_eq!(router.layer_range(), (1, 1));

    let route = &router.routes()[&id];
    assert!(!route.is_empty());
    assert_eq!(merge_segments(route), *route);
    for seg in route {
        for p in [seg.init_point(), seg.final_point()] {
            assert_eq!(grid.position_on_grid(p), p, "{:?} is not a tile center", p);
        }
        assert_eq!((seg.init_layer, seg.final_layer), (1, 1));
    }
    assert!(route.iter().any(|s| s.touches(grid.tile_center(0, 0))));
    assert!(route.iter().any(|s| s.touches(grid.tile_center(12, 12))));
}

#[test]
fn obstruction_zeroes_interior_edges_only() {
    common::init_logging();
    let mut db = DesignBuilder::new(100_000)
        .layer(LayerDirection::Horizontal, 500)
        .layer(LayerDirection::Vertical, 500)
        .library()
        .build();
    db.routing_blockages
        .push((1, Rect::from_corners(11_250, 11_250, 41_250, 41_250)));
    let a = common::place(&mut db, "a", 60_000, 80_000);
    let b = common::place(&mut db, "b", 90_000, 80_000);
    common::net(&mut db, "n", a, &[b]);

    let mut router = GlobalRouter::new(GlobalRoutingConfig::default());
    router.global_route(&db).unwrap();
    let core = router.core();

    for x in 1..5 {
        for y in 2..=4 {
            assert_eq!(core.edge_capacity(Edge::horizontal(1, x, y)), 0, "edge {x},{y}");
        }
        for y in [1, 5] {
            let cap = core.edge_capacity(Edge::horizontal(1, x, y));
            assert!(cap > 0 && cap < 15, "boundary edge {x},{y} has {cap}");
        }
    }
    assert_eq!(core.edge_capacity(Edge::horizontal(1, 0, 3)), 15);
    assert_eq!(core.edge_capacity(Edge::horizontal(1, 5, 3)), 15);
    assert_eq!(core.edge_capacity(Edge::vertical(2, 3, 3)), 15);
}

#[rstest]
#[case(Direction::Horizontal, 0.5, 7)]
#[case(Direction::Horizontal, 1.0, 0)]
#[case(Direction::Vertical, 0.2, 12)]
fn layer_adjustment_caps_edges(#[case] direction: Direction, #[case] reduction: f64, #[case] expected: u32) {
    common::init_logging();
    let mut db = DesignBuilder::new(100_000)
        .layer(LayerDirection::Horizontal, 500)
        .layer(LayerDirection::Vertical, 500)
        .library()
        .build();
    let a = common::place(&mut db, "a", 60_000, 80_000);
    let b = common::place(&mut db, "b", 90_000, 80_000);
    common::net(&mut db, "n", a, &[b]);

    let layer = if direction.is_horizontal() { 1 } else { 2 };
    let mut config = GlobalRoutingConfig::default();
    config.layer_adjustments = vec![LayerAdjustment { layer, reduction }];
    let mut router = GlobalRouter::new(config);
    router.global_route(&db).unwrap();

    assert_eq!(router.grid().unwrap().capacity(layer, direction), expected);
    assert_eq!(router.core().edge_capacity(Edge::new(layer, direction, 3, 3)), expected);
}

#[test]
fn clock_nets_stay_within_their_layers() {
    common::init_logging();
    let mut db = DesignBuilder::new(60_000)
        .layer(LayerDirection::Horizontal, 500)
        .layer(LayerDirection::Vertical, 500)
        .layer(LayerDirection::Horizontal, 500)
        .library()
        .build();
    let a = common::place(&mut db, "a", 1000, 2000);
    let b = common::place(&mut db, "b", 40_000, 30_000);
    let c = common::place(&mut db, "c", 40_000, 2000);
    let clk = db.add_net("clk".into(), SigType::Clock);
    db.connect(a, "Y", clk).unwrap();
    db.connect(b, "A", clk).unwrap();
    let sig = common::net(&mut db, "sig", c, &[a]);

    let mut config = GlobalRoutingConfig::default();
    config.clock_min_layer = Some(2);
    let mut router = GlobalRouter::new(config);
    router.global_route(&db).unwrap();

    assert!(
        router.routes()[&clk]
            .iter()
            .filter(|s| s.is_wire())
            .all(|s| s.init_layer >= 2)
    );
    assert!(!router.routes()[&sig].is_empty());
    assert!(router.wirelength() > 0);
}
