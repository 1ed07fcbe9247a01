//! Capacity pipeline. Each stage takes the state left by the previous one
//! and returns the next; stages after the second only ever lower an edge.

use super::capacity::{Edge, EdgeCapacities};
use super::direction::Direction;
use super::layers::{RoutingLayer, RoutingTracks};
use super::{BlockedTiles, Grid};
use crate::error::{Result, RouteError};
use groute_common::geom::rect::Rect;
use std::collections::BTreeMap;

/// User derating of one layer inside a rectangle.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionDerating {
    pub layer: usize,
    pub area: Rect,
    /// Fraction removed, 0.0 to 1.0.
    pub reduction: f64,
}

/// Read-only facts every stage consults.
pub struct AdjustmentInputs<'a> {
    pub grid: &'a Grid,
    pub layers: &'a [RoutingLayer],
    pub tracks: &'a [RoutingTracks],
    pub min_layer: usize,
    pub max_layer: usize,
    pub global_adjustment: f64,
    pub layer_adjustments: &'a [(usize, f64)],
    pub regions: &'a [RegionDerating],
}

impl AdjustmentInputs<'_> {
    fn layer(&self, level: usize) -> Option<&RoutingLayer> {
        self.layers.iter().find(|l| l.index == level)
    }

    fn tracks(&self, level: usize) -> Option<&RoutingTracks> {
        self.tracks.iter().find(|t| t.layer == level)
    }

    fn in_range(&self, level: usize) -> bool {
        level >= self.min_layer && level <= self.max_layer
    }

    /// Levels of the grid that lie inside the routing range, with their
    /// preferred direction.
    fn routed_layers(&self) -> impl Iterator<Item = (usize, Direction)> + '_ {
        (1..=self.grid.num_layers())
            .filter(|&l| self.in_range(l))
            .filter_map(|l| self.layer(l).map(|layer| (l, layer.direction)))
    }
}

/// Edge capacities plus the nominal per-layer track count of each
/// direction in hundredths of a track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapacityState {
    pub edges: EdgeCapacities,
    pub h_nominal_x100: Vec<u32>,
    pub v_nominal_x100: Vec<u32>,
}

impl CapacityState {
    pub fn empty(grid: &Grid) -> Self {
        Self {
            edges: EdgeCapacities::new(grid.x_grids(), grid.y_grids(), grid.num_layers()),
            h_nominal_x100: vec![0; grid.num_layers()],
            v_nominal_x100: vec![0; grid.num_layers()],
        }
    }

    pub fn nominal_x100(&self, layer: usize, direction: Direction) -> u32 {
        let caps = match direction {
            Direction::Horizontal => &self.h_nominal_x100,
            Direction::Vertical => &self.v_nominal_x100,
        };
        caps.get(layer.wrapping_sub(1)).copied().unwrap_or(0)
    }

    fn nominal_x100_mut(&mut self, layer: usize, direction: Direction) -> Option<&mut u32> {
        let caps = match direction {
            Direction::Horizontal => &mut self.h_nominal_x100,
            Direction::Vertical => &mut self.v_nominal_x100,
        };
        caps.get_mut(layer.wrapping_sub(1))
    }
}

pub type Stage = fn(CapacityState, &AdjustmentInputs) -> Result<CapacityState>;

pub const STAGES: [(&str, Stage); 6] = [
    ("base capacity", base_capacity),
    ("edge tiles", edge_tiles),
    ("track margins", track_margins),
    ("obstructions", obstructions),
    ("layer derating", layer_derating),
    ("region derating", region_derating),
];

pub fn run_pipeline(inputs: &AdjustmentInputs) -> Result<CapacityState> {
    STAGES
        .iter()
        .try_fold(CapacityState::empty(inputs.grid), |state, (name, stage)| {
            let next = stage(state, inputs)?;
            log::debug!("Capacity stage '{}': total {}", name, next.edges.total());
            Ok(next)
        })
}

// Lanes run across the preferred direction: rows for horizontal layers,
// columns for vertical ones. `along` indexes edges inside a lane.

fn lane_edge(layer: usize, direction: Direction, along: usize, lane: usize) -> Edge {
    match direction {
        Direction::Horizontal => Edge::horizontal(layer, along, lane),
        Direction::Vertical => Edge::vertical(layer, lane, along),
    }
}

fn split_tile(direction: Direction, tile: (usize, usize)) -> (usize, usize) {
    match direction {
        Direction::Horizontal => tile,
        Direction::Vertical => (tile.1, tile.0),
    }
}

fn num_lanes(grid: &Grid, direction: Direction) -> usize {
    match direction {
        Direction::Horizontal => grid.y_grids(),
        Direction::Vertical => grid.x_grids(),
    }
}

fn lane_len(grid: &Grid, direction: Direction) -> usize {
    match direction {
        Direction::Horizontal => grid.x_grids().saturating_sub(1),
        Direction::Vertical => grid.y_grids().saturating_sub(1),
    }
}

fn set_lane(edges: &mut EdgeCapacities, grid: &Grid, layer: usize, dir: Direction, lane: usize, value: u32) {
    for along in 0..lane_len(grid, dir) {
        edges.set(lane_edge(layer, dir, along, lane), value);
    }
}

fn reduce_lane(
    edges: &mut EdgeCapacities,
    grid: &Grid,
    layer: usize,
    dir: Direction,
    lane: usize,
    value: u32,
) {
    for along in 0..lane_len(grid, dir) {
        edges.reduce(lane_edge(layer, dir, along, lane), value);
    }
}

/// Stage 1: `floor(tile / pitch)` in the preferred direction of every
/// level in range, zero elsewhere.
pub fn base_capacity(mut state: CapacityState, inputs: &AdjustmentInputs) -> Result<CapacityState> {
    let tile = inputs.grid.tile_width();
    for (level, dir) in inputs.routed_layers().collect::<Vec<_>>() {
        let Some(tracks) = inputs.tracks(level) else {
            continue;
        };
        let pitch = tracks.use_pitch();
        if pitch <= 0 {
            continue;
        }
        let cap = (tile / pitch) as u32;
        state.edges.fill(level, dir, cap);
        if let Some(nominal) = state.nominal_x100_mut(level, dir) {
            *nominal = cap * 100;
        }
        log::debug!("Layer {} {:?} capacity {}", level, dir, cap);
    }
    Ok(state)
}

/// Stage 2: the last row/column of an irregular grid is wider than a tile,
/// so its lanes are recomputed from the full remaining space.
pub fn edge_tiles(mut state: CapacityState, inputs: &AdjustmentInputs) -> Result<CapacityState> {
    let grid = inputs.grid;
    let die = grid.grid_area();
    let x_extra = die.width() - grid.x_grids() as i64 * grid.tile_width();
    let y_extra = die.height() - grid.y_grids() as i64 * grid.tile_height();

    for (level, dir) in inputs.routed_layers().collect::<Vec<_>>() {
        let min_width = grid.min_width(level);
        if min_width <= 0 {
            continue;
        }
        let (regular, span) = match dir {
            Direction::Horizontal => (grid.is_perfect_regular_y(), grid.tile_height() + y_extra),
            Direction::Vertical => (grid.is_perfect_regular_x(), grid.tile_width() + x_extra),
        };
        if regular {
            continue;
        }
        let last_lane = num_lanes(grid, dir) - 1;
        set_lane(&mut state.edges, grid, level, dir, last_lane, (span / min_width) as u32);
    }
    Ok(state)
}

/// Stage 3: lanes before the first track or after the last one lose the
/// tracks that are not there.
pub fn track_margins(mut state: CapacityState, inputs: &AdjustmentInputs) -> Result<CapacityState> {
    let grid = inputs.grid;
    let die = grid.grid_area();

    for (level, dir) in inputs.routed_layers().collect::<Vec<_>>() {
        let Some(tracks) = inputs.tracks(level) else {
            continue;
        };
        let space = tracks.use_pitch();
        if tracks.num_tracks == 0 || space <= 0 {
            continue;
        }
        let lanes = num_lanes(grid, dir) as i64;
        let tile = grid.tile_size(dir.other());
        let (die_min, die_max) = dir.span_across(&die);
        let extent = die_max - die_min;

        let mut location = tracks.location - die_min;
        let final_location = location + space * (tracks.num_tracks as i64 - 1);
        let mut remaining_final = extent - final_location;
        let mut extra = extent - tile * lanes;

        let mut lane = 0i64;
        while location >= tile && lane < lanes {
            reduce_lane(&mut state.edges, grid, level, dir, lane as usize, 0);
            lane += 1;
            location -= tile;
        }
        if location > 0 && lane < lanes {
            let cap = ((tile - location) / space) as u32;
            reduce_lane(&mut state.edges, grid, level, dir, lane as usize, cap);
        }

        let mut lane = lanes - 1;
        while remaining_final >= tile + extra && lane >= 0 {
            reduce_lane(&mut state.edges, grid, level, dir, lane as usize, 0);
            lane -= 1;
            remaining_final -= tile + extra;
            extra = 0;
        }
        if remaining_final > 0 && lane >= 0 {
            let cap = ((tile + extra - remaining_final) / space) as u32;
            reduce_lane(&mut state.edges, grid, level, dir, lane as usize, cap);
        }
    }
    Ok(state)
}

/// Applies the full/partial coverage rule of one box. Boundary lanes lose
/// the tracks the box covers there; interior lanes get `interior(cap)`.
fn apply_blockage(
    edges: &mut EdgeCapacities,
    grid: &Grid,
    layer: usize,
    dir: Direction,
    blocked: &BlockedTiles,
    reduces: (u32, u32),
    extend_single_tile: bool,
    interior: impl Fn(u32) -> u32,
) {
    let (first_along, first_lane) = split_tile(dir, blocked.first);
    let (mut last_along, last_lane) = split_tile(dir, blocked.last);
    // A box inside a single tile still blocks the edge leaving that tile.
    if extend_single_tile && first_along == last_along && last_along < lane_len(grid, dir) {
        last_along += 1;
    }
    for along in first_along..last_along {
        for lane in first_lane..=last_lane {
            let edge = lane_edge(layer, dir, along, lane);
            let cap = edges.get(edge);
            let value = if lane == first_lane {
                cap.saturating_sub(reduces.0)
            } else if lane == last_lane {
                cap.saturating_sub(reduces.1)
            } else {
                interior(cap)
            };
            edges.reduce(edge, value);
        }
    }
}

/// Stage 4: physical obstructions recorded on the grid.
pub fn obstructions(mut state: CapacityState, inputs: &AdjustmentInputs) -> Result<CapacityState> {
    let grid = inputs.grid;
    let die = grid.grid_area();
    for level in 1..=grid.num_layers() {
        let obstructions = grid.obstructions(level);
        if obstructions.is_empty() {
            continue;
        }
        let Some(layer) = inputs.layer(level) else {
            continue;
        };
        let dir = layer.direction;
        let track_space = grid.min_width(level);
        log::info!("Processing {} blockages on layer {}.", obstructions.len(), layer.name);

        for obs in obstructions {
            if !die.contains_rect(obs) {
                return Err(RouteError::OutsideDie {
                    kind: "obstruction",
                    layer: level,
                    rect: obs.to_string(),
                });
            }
            let blocked = grid.blocked_tiles(obs);
            let first = grid.tile_reduce(obs, &blocked.first_box, track_space, true, dir);
            let last = grid.tile_reduce(obs, &blocked.last_box, track_space, false, dir);
            apply_blockage(
                &mut state.edges,
                grid,
                level,
                dir,
                &blocked,
                (first, last),
                true,
                |_| 0,
            );
        }
    }
    Ok(state)
}

/// Stage 5: the global percentage fills every unset layer in range, then
/// each derated layer keeps `floor(cap * (1 - pct))` tracks.
pub fn layer_derating(mut state: CapacityState, inputs: &AdjustmentInputs) -> Result<CapacityState> {
    let mut adjustments: BTreeMap<usize, f64> = inputs
        .layer_adjustments
        .iter()
        .filter(|(_, pct)| *pct != 0.0)
        .map(|&(level, pct)| (level, pct.clamp(0.0, 1.0)))
        .collect();
    if inputs.global_adjustment != 0.0 {
        for level in inputs.min_layer..=inputs.max_layer {
            adjustments
                .entry(level)
                .or_insert(inputs.global_adjustment.clamp(0.0, 1.0));
        }
    }

    for (level, pct) in adjustments {
        if !inputs.in_range(level) || level > inputs.grid.num_layers() {
            continue;
        }
        log::info!("Reducing resources of layer {} by {}%.", level, (pct * 100.0) as i32);
        for dir in [Direction::Horizontal, Direction::Vertical] {
            let Some(nominal) = state.nominal_x100_mut(level, dir) else {
                continue;
            };
            if *nominal == 0 {
                continue;
            }
            *nominal = (*nominal as f64 * (1.0 - pct)).floor() as u32;
            for edge in state.edges.edges(level, dir) {
                let cap = state.edges.get(edge);
                state.edges.reduce(edge, (cap as f64 * (1.0 - pct)).floor() as u32);
            }
        }
    }
    Ok(state)
}

/// Stage 6: user regions. Boundary lanes follow the obstruction rule with
/// the layer's capacity pitch; fully covered lanes are derated by the
/// region's percentage.
pub fn region_derating(mut state: CapacityState, inputs: &AdjustmentInputs) -> Result<CapacityState> {
    let grid = inputs.grid;
    let die = grid.grid_area();
    for region in inputs.regions {
        if !die.contains_rect(&region.area) {
            return Err(RouteError::OutsideDie {
                kind: "region",
                layer: region.layer,
                rect: region.area.to_string(),
            });
        }
        let (Some(layer), Some(tracks)) = (inputs.layer(region.layer), inputs.tracks(region.layer))
        else {
            log::warn!("Region adjustment on layer {} without tracks ignored.", region.layer);
            continue;
        };
        log::info!("Adjusting region on layer {}.", layer.name);
        let dir = layer.direction;
        let track_space = tracks.use_pitch();
        let blocked = grid.blocked_tiles(&region.area);
        let first = grid.tile_reduce(&region.area, &blocked.first_box, track_space, true, dir);
        let last = grid.tile_reduce(&region.area, &blocked.last_box, track_space, false, dir);
        let keep = 1.0 - region.reduction.clamp(0.0, 1.0);
        apply_blockage(
            &mut state.edges,
            grid,
            region.layer,
            dir,
            &blocked,
            (first, last),
            false,
            |cap| (cap as f64 * keep).floor() as u32,
        );
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn layer(index: usize, direction: Direction) -> RoutingLayer {
        RoutingLayer {
            index,
            name: format!("M{}", index),
            direction,
        }
    }

    fn tracks(layer: usize, direction: Direction, location: i64, num: u32) -> RoutingTracks {
        RoutingTracks {
            layer,
            track_pitch: 500,
            line_to_via_pitch: 0,
            location,
            num_tracks: num,
            direction,
        }
    }

    struct Fixture {
        grid: Grid,
        layers: Vec<RoutingLayer>,
        tracks: Vec<RoutingTracks>,
    }

    impl Fixture {
        /// 100000 x 100000 die, tiles of 7500, M1 horizontal and M2 vertical,
        /// tracks every 500 starting at 250.
        fn new() -> Self {
            let layers = vec![layer(1, Direction::Horizontal), layer(2, Direction::Vertical)];
            let tracks = vec![
                tracks(1, Direction::Horizontal, 250, 200),
                tracks(2, Direction::Vertical, 250, 200),
            ];
            let grid = Grid::init(Rect::from_corners(0, 0, 100_000, 100_000), &tracks, 15, 2)
                .unwrap();
            Self {
                grid,
                layers,
                tracks,
            }
        }

        fn inputs<'a>(
            &'a self,
            layer_adjustments: &'a [(usize, f64)],
            regions: &'a [RegionDerating],
        ) -> AdjustmentInputs<'a> {
            AdjustmentInputs {
                grid: &self.grid,
                layers: &self.layers,
                tracks: &self.tracks,
                min_layer: 1,
                max_layer: 2,
                global_adjustment: 0.0,
                layer_adjustments,
                regions,
            }
        }
    }

    fn run_until(stage_count: usize, inputs: &AdjustmentInputs) -> CapacityState {
        STAGES[..stage_count]
            .iter()
            .try_fold(CapacityState::empty(inputs.grid), |s, (_, stage)| stage(s, inputs))
            .unwrap()
    }

    #[test]
    fn base_capacity_only_in_preferred_direction() {
        let fx = Fixture::new();
        let state = base_capacity(CapacityState::empty(&fx.grid), &fx.inputs(&[], &[])).unwrap();
        assert_eq!(state.edges.get(Edge::horizontal(1, 3, 3)), 15);
        assert_eq!(state.edges.get(Edge::vertical(1, 3, 3)), 0);
        assert_eq!(state.edges.get(Edge::vertical(2, 3, 3)), 15);
        assert_eq!(state.nominal_x100(1, Direction::Horizontal), 1500);
    }

    #[test]
    fn layers_out_of_range_get_nothing() {
        let fx = Fixture::new();
        let mut inputs = fx.inputs(&[], &[]);
        inputs.min_layer = 2;
        let state = run_pipeline(&inputs).unwrap();
        assert_eq!(state.edges.get(Edge::horizontal(1, 3, 3)), 0);
        assert_eq!(state.edges.get(Edge::vertical(2, 3, 3)), 15);
    }

    #[test]
    fn last_lane_of_irregular_grid_is_wider() {
        let fx = Fixture::new();
        let state = run_until(2, &fx.inputs(&[], &[]));
        // 7500 + 2500 remainder over a 500 pitch.
        assert_eq!(state.edges.get(Edge::horizontal(1, 0, 12)), 20);
        assert_eq!(state.edges.get(Edge::vertical(2, 12, 0)), 20);
        assert_eq!(state.edges.get(Edge::horizontal(1, 0, 11)), 15);
    }

    #[test]
    fn track_margins_trim_first_and_last_lanes() {
        let fx = Fixture::new();
        let state = run_until(3, &fx.inputs(&[], &[]));
        // First track at 250 leaves 7250 usable in lane 0.
        assert_eq!(state.edges.get(Edge::horizontal(1, 4, 0)), 14);
        // Last track at 99750 leaves 9750 usable in the wide last lane.
        assert_eq!(state.edges.get(Edge::horizontal(1, 4, 12)), 19);
        assert_eq!(state.edges.get(Edge::horizontal(1, 4, 6)), 15);
    }

    #[test]
    fn tracks_starting_late_zero_whole_lanes() {
        let mut fx = Fixture::new();
        fx.tracks[0].location = 16_000;
        fx.tracks[0].num_tracks = 20;
        let state = run_until(3, &fx.inputs(&[], &[]));
        assert_eq!(state.edges.get(Edge::horizontal(1, 0, 0)), 0);
        assert_eq!(state.edges.get(Edge::horizontal(1, 0, 1)), 0);
        // 16000 - 15000 = 1000 of lane 2 has no tracks.
        assert_eq!(state.edges.get(Edge::horizontal(1, 0, 2)), 13);
        // Last track at 25500: lanes 4..=12 have nothing.
        assert_eq!(state.edges.get(Edge::horizontal(1, 0, 5)), 0);
        assert_eq!(state.edges.get(Edge::horizontal(1, 0, 12)), 0);
    }

    #[test]
    fn obstruction_zeroes_interior_and_trims_boundary() {
        let mut fx = Fixture::new();
        fx.grid
            .add_obstruction(1, Rect::from_corners(11_250, 11_250, 41_250, 41_250));
        let state = run_pipeline(&fx.inputs(&[], &[])).unwrap();

        for x in 1..5 {
            for y in 2..=4 {
                assert_eq!(state.edges.get(Edge::horizontal(1, x, y)), 0, "edge {x},{y}");
            }
            assert_eq!(state.edges.get(Edge::horizontal(1, x, 1)), 7);
            assert_eq!(state.edges.get(Edge::horizontal(1, x, 5)), 7);
        }
        assert_eq!(state.edges.get(Edge::horizontal(1, 0, 3)), 15);
        assert_eq!(state.edges.get(Edge::horizontal(1, 5, 3)), 15);
        assert_eq!(state.edges.get(Edge::vertical(2, 3, 3)), 15);
    }

    #[test]
    fn full_tile_obstruction_zeroes_exactly_that_edge() {
        let mut fx = Fixture::new();
        fx.grid
            .add_obstruction(2, Rect::from_corners(15_000, 15_000, 22_500, 22_500));
        let state = run_pipeline(&fx.inputs(&[], &[])).unwrap();
        assert_eq!(state.edges.get(Edge::vertical(2, 2, 2)), 0);
        assert_eq!(state.edges.get(Edge::vertical(2, 3, 2)), 15);
        assert_eq!(state.edges.get(Edge::vertical(2, 2, 1)), 15);
    }

    #[test]
    fn zero_area_obstruction_changes_nothing() {
        let mut fx = Fixture::new();
        let before = run_pipeline(&fx.inputs(&[], &[])).unwrap();
        fx.grid
            .add_obstruction(1, Rect::from_corners(30_000, 30_000, 30_000, 30_000));
        let after = run_pipeline(&fx.inputs(&[], &[])).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn obstruction_outside_die_is_fatal() {
        let mut fx = Fixture::new();
        fx.grid
            .add_obstruction(1, Rect::from_corners(90_000, 90_000, 110_000, 95_000));
        let err = run_pipeline(&fx.inputs(&[], &[])).unwrap_err();
        assert!(matches!(err, RouteError::OutsideDie { kind: "obstruction", .. }));
    }

    #[test]
    fn layer_derating_updates_nominal() {
        let fx = Fixture::new();
        let adj = [(2, 0.5)];
        let state = run_pipeline(&fx.inputs(&adj, &[])).unwrap();
        assert_eq!(state.edges.get(Edge::vertical(2, 5, 5)), 7);
        assert_eq!(state.nominal_x100(2, Direction::Vertical), 750);
        assert_eq!(state.edges.get(Edge::horizontal(1, 5, 5)), 15);
    }

    #[test]
    fn global_adjustment_fills_unset_layers() {
        let fx = Fixture::new();
        let adj = [(1, 0.2)];
        let mut inputs = fx.inputs(&adj, &[]);
        inputs.global_adjustment = 0.4;
        let state = run_pipeline(&inputs).unwrap();
        assert_eq!(state.edges.get(Edge::horizontal(1, 5, 5)), 12);
        assert_eq!(state.edges.get(Edge::vertical(2, 5, 5)), 9);
    }

    #[test]
    fn region_derates_interior_by_percentage() {
        let fx = Fixture::new();
        let regions = [RegionDerating {
            layer: 2,
            area: Rect::from_corners(11_250, 11_250, 41_250, 41_250),
            reduction: 0.6,
        }];
        let state = run_pipeline(&fx.inputs(&[], &regions)).unwrap();
        assert_eq!(state.edges.get(Edge::vertical(2, 3, 2)), 6);
        assert_eq!(state.edges.get(Edge::vertical(2, 1, 2)), 7);
        assert_eq!(state.edges.get(Edge::vertical(2, 5, 2)), 7);
        assert_eq!(state.edges.get(Edge::vertical(2, 3, 8)), 15);
    }

    #[test]
    fn region_outside_die_is_fatal() {
        let fx = Fixture::new();
        let regions = [RegionDerating {
            layer: 1,
            area: Rect::from_corners(-10, 0, 5000, 5000),
            reduction: 0.5,
        }];
        assert!(run_pipeline(&fx.inputs(&[], &regions)).is_err());
    }

    #[rstest]
    #[case(&[], &[])]
    #[case(&[(1, 0.3)], &[])]
    #[case(&[(2, 1.0)], &[])]
    #[case(&[], &[(1, 0.5)])]
    #[case(&[(1, 0.1), (2, 0.9)], &[(2, 1.0)])]
    fn later_stages_never_raise_capacity(
        #[case] layer_adj: &[(usize, f64)],
        #[case] region_adj: &[(usize, f64)],
    ) {
        let mut fx = Fixture::new();
        fx.grid
            .add_obstruction(1, Rect::from_corners(3_000, 60_000, 52_000, 61_000));
        fx.grid
            .add_obstruction(2, Rect::from_corners(70_000, 2_000, 71_000, 99_000));
        let regions: Vec<RegionDerating> = region_adj
            .iter()
            .map(|&(layer, reduction)| RegionDerating {
                layer,
                area: Rect::from_corners(20_000, 20_000, 80_000, 50_000),
                reduction,
            })
            .collect();
        let inputs = fx.inputs(layer_adj, &regions);

        let mut state = run_until(2, &inputs);
        for (_, stage) in &STAGES[2..] {
            let next = stage(state.clone(), &inputs).unwrap();
            for level in 1..=2 {
                for dir in [Direction::Horizontal, Direction::Vertical] {
                    for edge in state.edges.edges(level, dir) {
                        assert!(next.edges.get(edge) <= state.edges.get(edge));
                    }
                }
            }
            state = next;
        }
    }
}
