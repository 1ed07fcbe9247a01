use super::{CoreGeometry, CoreNet, RoutingCore};
use crate::algo::astar::{AStar, SearchCosts};
use crate::algo::steiner::prim_dijkstra_order;
use crate::error::{Result, RouteError};
use crate::grid::{Direction, Edge, EdgeCapacities, EdgeGrid, RoutingGrid};
use crate::route::{GRoute, GSegment, NetRouteMap};
use groute_common::geom::coord::GridCoord;
use groute_common::util::config::GlobalRoutingConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

const BATCH_SIZE: usize = 500;
const WINDOW_EXPANSIONS: u32 = 500_000;

/// Negotiated-congestion settings of the default core.
#[derive(Clone, Debug)]
pub struct MazeConfig {
    pub overflow_iterations: usize,
    pub history_increment: f64,
    pub initial_penalty: f64,
    pub penalty_multiplier: f64,
    pub margin: u32,
    pub seed: u64,
    pub costs: SearchCosts,
}

impl From<&GlobalRoutingConfig> for MazeConfig {
    fn from(config: &GlobalRoutingConfig) -> Self {
        Self {
            overflow_iterations: config.overflow_iterations,
            history_increment: config.history_increment,
            initial_penalty: config.initial_penalty,
            penalty_multiplier: config.penalty_multiplier,
            margin: config.margin,
            seed: config.seed,
            costs: SearchCosts {
                heuristic_weight: config.heuristic_weight,
                ..SearchCosts::default()
            },
        }
    }
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self::from(&GlobalRoutingConfig::default())
    }
}

/// Default [`RoutingCore`]: Prim-Dijkstra decomposition, windowed A* per
/// connection, and history-based rip-up and reroute.
pub struct MazeRouter {
    config: MazeConfig,
    geometry: Option<CoreGeometry>,
    grid: Option<EdgeGrid>,
    nets: Vec<CoreNet>,
}

/// Connection paths of one routed net, each starting on the tree built so
/// far.
type NetPaths = Vec<Vec<GridCoord>>;

impl MazeRouter {
    pub fn new(config: MazeConfig) -> Self {
        Self {
            config,
            geometry: None,
            grid: None,
            nets: Vec::new(),
        }
    }

    pub fn config(&self) -> &MazeConfig {
        &self.config
    }
}

fn apply_paths(grid: &mut EdgeGrid, paths: &NetPaths) {
    for path in paths {
        for pair in path.windows(2) {
            grid.add_wire(pair[0], pair[1]);
        }
    }
}

fn rip_up_paths(grid: &mut EdgeGrid, paths: &NetPaths) {
    for path in paths {
        for pair in path.windows(2) {
            grid.remove_wire(pair[0], pair[1]);
        }
    }
}

fn touches_congestion(grid: &EdgeGrid, paths: &NetPaths) -> bool {
    paths
        .iter()
        .any(|path| path.windows(2).any(|pair| grid.is_congested(pair[0], pair[1])))
}

fn route_net(
    net: &CoreNet,
    grid: &EdgeGrid,
    solver: &mut AStar,
    config: &MazeConfig,
) -> NetPaths {
    let mut pins: Vec<GridCoord> = Vec::with_capacity(net.pins.len());
    for &(x, y, layer) in &net.pins {
        let c = GridCoord::new(x, y, layer.saturating_sub(1) as u8);
        if !pins.contains(&c) {
            pins.push(c);
        }
    }
    if pins.len() < 2 {
        return Vec::new();
    }

    let mut tree: BTreeMap<GridCoord, u32> = BTreeMap::new();
    tree.insert(pins[0], 0);
    let mut paths = Vec::with_capacity(pins.len() - 1);

    for (pin, _) in prim_dijkstra_order(&pins, net.alpha) {
        let end = pins[pin];
        if tree.contains_key(&end) {
            continue;
        }
        let starts: Vec<(GridCoord, f64)> = tree
            .iter()
            .map(|(&c, &len)| (c, net.alpha * len as f64))
            .collect();

        let found = solver
            .find_path(
                grid,
                &starts,
                end,
                &config.costs,
                &net.layer_costs,
                Some(config.margin),
                WINDOW_EXPANSIONS,
            )
            .or_else(|| {
                solver.find_path(
                    grid,
                    &starts,
                    end,
                    &config.costs,
                    &net.layer_costs,
                    None,
                    u32::MAX,
                )
            });
        let Some(path) = found else {
            log::warn!("Net {}: no path to pin at {:?}.", net.name, end);
            continue;
        };

        let cut = path
            .iter()
            .rposition(|c| tree.contains_key(c))
            .unwrap_or(0);
        let path = path[cut..].to_vec();
        let base = tree.get(&path[0]).copied().unwrap_or(0);
        for (step, &c) in path.iter().enumerate().skip(1) {
            tree.entry(c).or_insert(base + step as u32);
        }
        paths.push(path);
    }
    paths
}

/// Turns tile paths into wires between tile centers, one wire per straight
/// run, with vias where the path changes layer.
fn paths_to_segments(paths: &NetPaths, geometry: &CoreGeometry) -> GRoute {
    let mut segments = Vec::new();
    let center = |c: GridCoord| geometry.tile_center(c.x, c.y);

    for path in paths {
        let flush = |from: usize, to: usize, segments: &mut GRoute| {
            if to > from {
                let layer = path[from].z as usize + 1;
                segments.push(GSegment::wire(center(path[from]), center(path[to]), layer));
            }
        };
        let mut run_start = 0;
        for i in 1..path.len() {
            let (a, b) = (path[i - 1], path[i]);
            if a.z != b.z {
                flush(run_start, i - 1, &mut segments);
                segments.push(GSegment::via(center(a), a.z as usize + 1, b.z as usize + 1));
                run_start = i;
                continue;
            }
            if i - 1 > run_start {
                let p = path[i - 2];
                let straight = (p.x == a.x && a.x == b.x) || (p.y == a.y && a.y == b.y);
                if !straight {
                    flush(run_start, i - 1, &mut segments);
                    run_start = i - 1;
                }
            }
        }
        if let Some(last) = path.len().checked_sub(1) {
            flush(run_start, last, &mut segments);
        }
    }
    segments
}

impl RoutingCore for MazeRouter {
    fn init_grid(&mut self, geometry: CoreGeometry, capacities: &EdgeCapacities) {
        let mut grid = EdgeGrid::from_capacities(capacities, geometry.directions.clone());
        grid.set_penalty(self.config.initial_penalty);
        log::debug!(
            "Core grid {}x{} with {} layers.",
            geometry.x_grids,
            geometry.y_grids,
            geometry.num_layers()
        );
        self.grid = Some(grid);
        self.geometry = Some(geometry);
    }

    fn edge_capacity(&self, edge: Edge) -> u32 {
        self.grid.as_ref().map_or(0, |g| g.edge_capacity(edge))
    }

    fn set_edge_capacity(&mut self, edge: Edge, capacity: u32) {
        if let Some(grid) = self.grid.as_mut() {
            grid.set_edge_capacity(edge, capacity);
        }
    }

    fn edge_usage(&self, edge: Edge) -> u32 {
        self.grid.as_ref().map_or(0, |g| g.edge_usage(edge))
    }

    fn set_edge_usage(&mut self, edge: Edge, usage: u32) {
        if let Some(grid) = self.grid.as_mut() {
            grid.set_edge_usage(edge, usage);
        }
    }

    fn add_net(&mut self, net: CoreNet) {
        self.nets.push(net);
    }

    fn num_nets(&self) -> usize {
        self.nets.len()
    }

    fn run(&mut self) -> Result<NetRouteMap> {
        let (Some(grid), Some(geometry)) = (self.grid.as_mut(), self.geometry.as_ref()) else {
            return Err(RouteError::GridNotInitialized);
        };
        let config = &self.config;

        // Clock nets claim resources first.
        let mut order: Vec<usize> = (0..self.nets.len()).collect();
        order.sort_by_key(|&i| !self.nets[i].is_clock);
        let nets = &self.nets;
        let total_nets = nets.len();

        log::info!("GR: Starting Initial Route for {} nets...", total_nets);
        let start_time = Instant::now();
        let mut net_paths: Vec<NetPaths> = vec![Vec::new(); total_nets];

        for chunk in order.chunks(BATCH_SIZE) {
            let shared: &EdgeGrid = grid;
            let results: Vec<(usize, NetPaths)> = chunk
                .par_iter()
                .map_with(AStar::new(), |solver, &idx| {
                    (idx, route_net(&nets[idx], shared, solver, config))
                })
                .collect();
            for (idx, paths) in results {
                apply_paths(grid, &paths);
                net_paths[idx] = paths;
            }
        }
        log::info!(
            "GR: Initial route done in {:.2}s, overflow {}.",
            start_time.elapsed().as_secs_f32(),
            grid.total_overflow()
        );

        let mut penalty = config.initial_penalty;
        let mut rng = StdRng::seed_from_u64(config.seed);

        for iter in 0..config.overflow_iterations {
            let start = Instant::now();
            let overflow = grid.total_overflow();
            if overflow == 0 {
                log::info!("Global Routing Converged at iter {}!", iter);
                break;
            }

            grid.update_history(config.history_increment);

            let mut nets_to_reroute = Vec::new();
            for &idx in &order {
                if touches_congestion(grid, &net_paths[idx]) {
                    rip_up_paths(grid, &net_paths[idx]);
                    net_paths[idx].clear();
                    nets_to_reroute.push(idx);
                }
            }
            let ripped = nets_to_reroute.len();
            nets_to_reroute.shuffle(&mut rng);

            if ripped < BATCH_SIZE {
                let mut solver = AStar::new();
                for &idx in &nets_to_reroute {
                    let paths = route_net(&nets[idx], grid, &mut solver, config);
                    apply_paths(grid, &paths);
                    net_paths[idx] = paths;
                }
            } else {
                for chunk in nets_to_reroute.chunks(BATCH_SIZE) {
                    let shared: &EdgeGrid = grid;
                    let results: Vec<(usize, NetPaths)> = chunk
                        .par_iter()
                        .map_with(AStar::new(), |solver, &idx| {
                            (idx, route_net(&nets[idx], shared, solver, config))
                        })
                        .collect();
                    for (idx, paths) in results {
                        apply_paths(grid, &paths);
                        net_paths[idx] = paths;
                    }
                }
            }

            log::info!(
                "GR Iter {}: Overflow: {}, Ripped: {}, Penalty: {:.2}, Time: {}ms",
                iter,
                overflow,
                ripped,
                penalty,
                start.elapsed().as_millis()
            );

            penalty *= config.penalty_multiplier;
            grid.set_penalty(penalty);
        }

        let remaining = grid.total_overflow();
        if remaining > 0 {
            log::warn!(
                "Global routing finished with overflow {} on {} edges.",
                remaining,
                grid.num_overflowed_edges()
            );
        }

        Ok(nets
            .iter()
            .zip(&net_paths)
            .map(|(net, paths)| (net.id, paths_to_segments(paths, geometry)))
            .collect())
    }

    fn total_overflow(&self) -> u64 {
        self.grid.as_ref().map_or(0, |g| g.total_overflow())
    }

    fn planar_totals(&self, direction: Direction, x: usize, y: usize) -> (u32, u32) {
        self.grid
            .as_ref()
            .map_or((0, 0), |g| g.planar_totals(direction, x, y))
    }

    fn clear(&mut self) {
        self.grid = None;
        self.geometry = None;
        self.nets.clear();
    }
}
