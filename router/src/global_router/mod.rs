//! Global routing flow: grid build, capacity pipeline, core routing and
//! post-processing of the raw routes.

mod obstructions;
mod pins;
mod post;

pub use obstructions::collect_obstructions;
pub use pins::check_pin_placement;

use crate::core::maze::MazeConfig;
use crate::core::{CoreGeometry, CoreNet, MazeRouter, RoutingCore};
use crate::error::{Result, RouteError};
use crate::grid::adjust::{AdjustmentInputs, RegionDerating, run_pipeline};
use crate::grid::layers::{build_routing_layers, build_routing_tracks, max_layer_with_tracks};
use crate::grid::snapshot::{CapacitySnapshot, release_route};
use crate::grid::{Direction, Grid, RoutingLayer, RoutingTracks};
use crate::net::{Net, NetType};
use crate::report;
use crate::route::{GRoute, NetRouteMap, merge_segments, route_wirelength};
use groute_common::db::core::DesignDB;
use groute_common::db::indices::NetId;
use groute_common::db::tech::SigType;
use groute_common::geom::rect::Rect;
use groute_common::util::config::GlobalRoutingConfig;
use groute_common::util::profiler::ScopedTimer;
use pins::PinBuilder;
use std::collections::{BTreeMap, BTreeSet};

pub struct GlobalRouter {
    config: GlobalRoutingConfig,
    core: Box<dyn RoutingCore>,
    grid: Option<Grid>,
    layers: Vec<RoutingLayer>,
    tracks: Vec<RoutingTracks>,
    /// Every net built so far, by id. A pass replaces the entries it builds.
    nets: BTreeMap<NetId, Net>,
    /// Nets of the current pass, in build order.
    pass_nets: Vec<NetId>,
    routes: NetRouteMap,
    dirty_nets: BTreeSet<NetId>,
    pad_stubs: BTreeMap<NetId, GRoute>,
    min_layer: usize,
    max_layer: usize,
}

impl GlobalRouter {
    pub fn new(config: GlobalRoutingConfig) -> Self {
        let core = Box::new(MazeRouter::new(MazeConfig::from(&config)));
        Self::with_core(config, core)
    }

    pub fn with_core(config: GlobalRoutingConfig, core: Box<dyn RoutingCore>) -> Self {
        Self {
            config,
            core,
            grid: None,
            layers: Vec::new(),
            tracks: Vec::new(),
            nets: BTreeMap::new(),
            pass_nets: Vec::new(),
            routes: NetRouteMap::new(),
            dirty_nets: BTreeSet::new(),
            pad_stubs: BTreeMap::new(),
            min_layer: 0,
            max_layer: 0,
        }
    }

    pub fn config(&self) -> &GlobalRoutingConfig {
        &self.config
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn layers(&self) -> &[RoutingLayer] {
        &self.layers
    }

    pub fn core(&self) -> &dyn RoutingCore {
        self.core.as_ref()
    }

    pub fn nets(&self) -> &BTreeMap<NetId, Net> {
        &self.nets
    }

    pub fn routes(&self) -> &NetRouteMap {
        &self.routes
    }

    pub fn layer_range(&self) -> (usize, usize) {
        (self.min_layer, self.max_layer)
    }

    /// 1 when an extra via-only layer sits under the routing range.
    pub fn fix_layer(&self) -> usize {
        usize::from(self.config.unidirectional)
    }

    pub fn mark_dirty(&mut self, net: NetId) {
        self.dirty_nets.insert(net);
    }

    pub fn dirty_nets(&self) -> &BTreeSet<NetId> {
        &self.dirty_nets
    }

    /// Signal routing range from the configuration, checked against the
    /// layers that carry tracks.
    pub fn resolve_layer_range(&self, db: &DesignDB) -> Result<(usize, usize)> {
        let with_tracks = max_layer_with_tracks(db);
        let max = self.config.max_routing_layer.unwrap_or(with_tracks);
        let mut min = self.config.min_routing_layer;
        if self.config.unidirectional {
            min = min.max(2);
        }
        if min == 0 || min > max || max > with_tracks {
            return Err(RouteError::InvalidLayerRange {
                min,
                max,
                num_layers: with_tracks,
            });
        }
        Ok((min, max))
    }

    /// Builds the grid and its capacities for `min_layer..=max_layer`,
    /// then registers the nets of `net_type` with the core.
    pub fn start_route(
        &mut self,
        db: &DesignDB,
        min_layer: usize,
        max_layer: usize,
        net_type: NetType,
    ) -> Result<()> {
        let _timer = ScopedTimer::new(format!("Grid build for {:?} nets", net_type));
        if db.nets.is_empty() {
            return Err(RouteError::NoNets);
        }

        self.layers = build_routing_layers(db)?;
        let num_layers = max_layer_with_tracks(db);
        if min_layer == 0 || min_layer > max_layer || max_layer > num_layers {
            return Err(RouteError::InvalidLayerRange {
                min: min_layer,
                max: max_layer,
                num_layers,
            });
        }

        let mut layer_pitches = vec![0; num_layers + 1];
        for lp in self.config.layer_pitches.iter().filter(|lp| lp.layer <= num_layers) {
            layer_pitches[lp.layer] = db.microns_to_dbu(lp.pitch);
        }
        self.tracks = build_routing_tracks(db, &self.layers, num_layers, &layer_pitches)?;

        let mut grid = Grid::init(db.die_area, &self.tracks, self.config.pitches_in_tile, num_layers)?;
        log::info!("Min routing layer: {}", min_layer);
        log::info!("Max routing layer: {}", max_layer);
        log::info!(
            "Grid: {} x {} tiles of {} x {} dbu.",
            grid.x_grids(),
            grid.y_grids(),
            grid.tile_width(),
            grid.tile_height()
        );

        collect_obstructions(db, &mut grid, self.config.macro_extension);

        let layer_adjustments: Vec<(usize, f64)> = self
            .config
            .layer_adjustments
            .iter()
            .map(|a| (a.layer, a.reduction))
            .collect();
        let regions: Vec<RegionDerating> = self
            .config
            .region_adjustments
            .iter()
            .map(|r| RegionDerating {
                layer: r.layer,
                area: Rect::from_corners(
                    db.microns_to_dbu(r.area[0]),
                    db.microns_to_dbu(r.area[1]),
                    db.microns_to_dbu(r.area[2]),
                    db.microns_to_dbu(r.area[3]),
                ),
                reduction: r.reduction,
            })
            .collect();
        let state = run_pipeline(&AdjustmentInputs {
            grid: &grid,
            layers: &self.layers,
            tracks: &self.tracks,
            min_layer,
            max_layer,
            global_adjustment: self.config.adjustment,
            layer_adjustments: &layer_adjustments,
            regions: &regions,
        })?;

        for layer in self.layers.iter().take(num_layers) {
            for dir in [Direction::Horizontal, Direction::Vertical] {
                grid.set_capacity_x100(layer.index, dir, state.nominal_x100(layer.index, dir));
            }
            log::info!(
                "Layer {:<6} H capacity {:>4} V capacity {:>4}",
                layer.name,
                grid.capacity(layer.index, Direction::Horizontal),
                grid.capacity(layer.index, Direction::Vertical)
            );
        }

        let geometry = CoreGeometry {
            origin: grid.lower_left(),
            tile_width: grid.tile_width(),
            tile_height: grid.tile_height(),
            x_grids: grid.x_grids(),
            y_grids: grid.y_grids(),
            directions: self.layers.iter().take(num_layers).map(|l| l.direction).collect(),
            min_widths: (1..=num_layers).map(|l| grid.min_width(l)).collect(),
            spacings: (1..=num_layers).map(|l| grid.spacing(l)).collect(),
        };
        self.core.clear();
        self.core.init_grid(geometry, &state.edges);

        check_pin_placement(db)?;

        let ids: Vec<NetId> = match net_type {
            NetType::Antenna => self.dirty_nets.iter().copied().collect(),
            _ => (0..db.nets.len())
                .map(NetId::new)
                .filter(|id| {
                    let net = &db.nets[id.index()];
                    let clock = net.sig_type == SigType::Clock;
                    !net.special
                        && !net.sig_type.is_supply()
                        && match net_type {
                            NetType::Clock => clock,
                            NetType::Signal => !clock,
                            _ => true,
                        }
                })
                .collect(),
        };

        let mut layer_costs = vec![0.0; num_layers];
        for lc in self.config.layer_costs.iter().filter(|c| c.layer >= 1 && c.layer <= num_layers) {
            layer_costs[lc.layer - 1] = lc.cost;
        }

        let builder = PinBuilder {
            db,
            grid: &grid,
            layers: &self.layers,
            tracks: &self.tracks,
            gcells_offset: self.config.gcells_offset,
        };
        self.pass_nets.clear();
        let (mut min_degree, mut max_degree, mut routed) = (usize::MAX, 0, 0);
        for id in ids {
            let name = &db.nets[id.index()].name;
            let alpha = self.config.net_alpha.get(name).copied().unwrap_or(self.config.alpha);
            let (net, stubs) = builder.build_net(id, alpha)?;

            if stubs.is_empty() {
                self.pad_stubs.remove(&id);
            } else {
                self.pad_stubs.insert(id, stubs);
            }
            if net.num_pins() > 1 {
                routed += 1;
                min_degree = min_degree.min(net.num_pins());
                max_degree = max_degree.max(net.num_pins());
                let pins = builder.core_pins(&net);
                if pins.len() > 1 {
                    self.core.add_net(CoreNet {
                        id,
                        name: net.name.clone(),
                        pins,
                        alpha,
                        is_clock: net.is_clock(),
                        layer_costs: layer_costs.clone(),
                    });
                }
            }
            self.pass_nets.push(id);
            self.nets.insert(id, net);
        }

        log::info!("Nets: {}", routed);
        if routed > 0 {
            log::info!("Min degree: {}", min_degree);
            log::info!("Max degree: {}", max_degree);
        }

        self.grid = Some(grid);
        self.min_layer = min_layer;
        self.max_layer = max_layer;
        Ok(())
    }

    /// Runs the core on the registered nets and post-processes every net
    /// of the current pass.
    pub fn find_routing(&mut self, min_layer: usize, max_layer: usize) -> Result<NetRouteMap> {
        if self.grid.is_none() {
            return Err(RouteError::GridNotInitialized);
        }
        let mut raw = self.core.run()?;
        post::check_via_spans(&raw, |id| {
            self.nets
                .get(id)
                .map_or_else(|| format!("{:?}", id), |n| n.name.clone())
        })?;

        let fix_layer = self.fix_layer();
        let mut routes = NetRouteMap::new();
        for id in &self.pass_nets {
            let Some(net) = self.nets.get(id) else {
                continue;
            };
            if net.num_pins() < 2 {
                continue;
            }
            let mut route = raw.remove(id).unwrap_or_default();
            if route.is_empty() {
                post::add_local_guides(net, &mut route, min_layer, max_layer, fix_layer)?;
            } else {
                post::add_pin_access(net, &mut route);
            }
            if let Some(stubs) = self.pad_stubs.get(id) {
                route.extend_from_slice(stubs);
            }
            routes.insert(*id, merge_segments(&route));
        }
        Ok(routes)
    }

    /// Full flow: an optional clock pass, then the signal pass with the
    /// clock resources carried over.
    pub fn global_route(&mut self, db: &DesignDB) -> Result<()> {
        let _timer = ScopedTimer::new("Global routing");
        let (min_layer, max_layer) = self.resolve_layer_range(db)?;
        self.routes.clear();

        let has_clock = db
            .nets
            .iter()
            .any(|n| n.sig_type == SigType::Clock && !n.special);
        let clock_snapshot = match self.config.clock_min_layer {
            Some(clock_min) if has_clock => {
                let clock_max = self.config.clock_max_layer.unwrap_or(max_layer);
                log::info!("Routing clock nets on layers {}..={}.", clock_min, clock_max);
                self.start_route(db, clock_min, clock_max, NetType::Clock)?;
                let clock_routes = self.find_routing(clock_min, clock_max)?;
                self.routes.extend(clock_routes);
                Some(self.snapshot(clock_min, clock_max)?)
            }
            _ => None,
        };

        let net_type = if clock_snapshot.is_some() {
            NetType::Signal
        } else {
            NetType::All
        };
        self.start_route(db, min_layer, max_layer, net_type)?;
        if let Some(snapshot) = &clock_snapshot {
            snapshot.restore(self.core.as_mut());
        }
        let routes = self.find_routing(min_layer, max_layer)?;
        self.routes.extend(routes);

        log::info!(
            "Total wirelength: {:.2} um",
            db.dbu_to_microns(self.wirelength())
        );
        if let Some(prefix) = self.config.congestion_report.clone() {
            self.write_congestion_report(&prefix)?;
        }
        Ok(())
    }

    pub fn wirelength(&self) -> i64 {
        let Some(grid) = &self.grid else {
            return 0;
        };
        self.routes
            .values()
            .map(|r| route_wirelength(r, grid.tile_width(), grid.tile_height()))
            .sum()
    }

    pub fn snapshot(&self, min_layer: usize, max_layer: usize) -> Result<CapacitySnapshot> {
        let grid = self.grid.as_ref().ok_or(RouteError::GridNotInitialized)?;
        Ok(CapacitySnapshot::save(self.core.as_ref(), grid, min_layer, max_layer))
    }

    pub fn write_congestion_report(&self, prefix: &str) -> Result<()> {
        let grid = self.grid.as_ref().ok_or(RouteError::GridNotInitialized)?;
        report::write_congestion_report(self.core.as_ref(), grid, &self.layers, prefix)?;
        Ok(())
    }

    /// Reroutes only the dirty nets. Capacities and usage go back to
    /// `snapshot`, the dirty nets' old usage is released, and the new
    /// routes replace only the dirty entries.
    pub fn reroute_dirty(&mut self, db: &DesignDB, snapshot: &CapacitySnapshot) -> Result<usize> {
        if self.dirty_nets.is_empty() {
            return Ok(0);
        }
        let _timer = ScopedTimer::new("Incremental reroute");
        let (min_layer, max_layer) = (self.min_layer, self.max_layer);
        log::info!("Nets to reroute: {}.", self.dirty_nets.len());

        let old_routes: Vec<GRoute> = self
            .dirty_nets
            .iter()
            .filter_map(|id| self.routes.get(id).cloned())
            .collect();

        self.start_route(db, min_layer, max_layer, NetType::Antenna)?;
        snapshot.restore(self.core.as_mut());
        let grid = self.grid.as_ref().ok_or(RouteError::GridNotInitialized)?;
        for route in &old_routes {
            release_route(self.core.as_mut(), grid, route);
        }

        let mut rerouted = self.find_routing(min_layer, max_layer)?;
        let dirty = std::mem::take(&mut self.dirty_nets);
        for id in &dirty {
            match rerouted.remove(id) {
                Some(route) => {
                    self.routes.insert(*id, route);
                }
                None => {
                    self.routes.remove(id);
                }
            }
        }
        log::info!("Nets rerouted: {}", dirty.len());
        Ok(dirty.len())
    }
}
