use crate::error::{Result, RouteError};
use crate::grid::{Direction, Grid, RoutingLayer, RoutingTracks};
use crate::net::{Net, Pin, PinOrientation};
use crate::route::GSegment;
use groute_common::db::core::DesignDB;
use groute_common::db::indices::{NetId, PinId};
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;
use std::collections::BTreeMap;

/// Pin extent, in track pitches, below which a pin is treated as sitting
/// on a single track.
const SINGLE_TRACK_PITCHES: i64 = 3;

/// Fails when a port has no shape, or when two ports share a position on
/// the same layer. Every clash is reported before failing.
pub fn check_pin_placement(db: &DesignDB) -> Result<()> {
    let mut placed: BTreeMap<(usize, Point<i64>), Vec<&str>> = BTreeMap::new();
    for port in db.pins.iter().filter(|p| p.is_port()) {
        let Some(&(layer, rect)) = port.shapes.first() else {
            return Err(RouteError::PortWithoutShapes {
                port: port.name.clone(),
            });
        };
        placed.entry((layer, rect.min)).or_default().push(&port.name);
    }

    let mut invalid = false;
    for ((layer, at), names) in placed.iter().filter(|(_, n)| n.len() > 1) {
        for name in names {
            log::warn!(
                "Port {} at ({}, {}) on layer {} overlaps another port.",
                name,
                at.x,
                at.y,
                layer
            );
        }
        invalid = true;
    }
    if invalid {
        return Err(RouteError::InvalidPinPlacement);
    }
    Ok(())
}

fn facing_instance(position: Point<i64>, center: Point<i64>, direction: Direction) -> PinOrientation {
    match direction {
        Direction::Horizontal if position.x < center.x => PinOrientation::East,
        Direction::Horizontal => PinOrientation::West,
        Direction::Vertical if position.y < center.y => PinOrientation::North,
        Direction::Vertical => PinOrientation::South,
    }
}

fn facing_die_edge(position: Point<i64>, center: Point<i64>, direction: Direction) -> PinOrientation {
    match direction {
        Direction::Horizontal if position.x < center.x => PinOrientation::West,
        Direction::Horizontal => PinOrientation::East,
        Direction::Vertical if position.y < center.y => PinOrientation::South,
        Direction::Vertical => PinOrientation::North,
    }
}

/// Turns database terminals into routing pins for one grid build.
pub struct PinBuilder<'a> {
    pub db: &'a DesignDB,
    pub grid: &'a Grid,
    pub layers: &'a [RoutingLayer],
    pub tracks: &'a [RoutingTracks],
    /// Pad stub length in tiles.
    pub gcells_offset: i64,
}

impl PinBuilder<'_> {
    fn direction(&self, level: usize) -> Direction {
        self.layers
            .iter()
            .find(|l| l.index == level)
            .map_or(Direction::Horizontal, |l| l.direction)
    }

    /// Center of the first pad instance on `net`, if any.
    fn pad_center(&self, net: NetId) -> Option<Point<i64>> {
        self.db.nets[net.index()]
            .pins
            .iter()
            .filter_map(|&p| self.db.pins[p.index()].cell)
            .find(|&cell| self.db.master_of(cell).is_pad())
            .map(|cell| self.db.cell_bbox(cell).center())
    }

    /// Builds the routing view of one net together with the stub wires of
    /// its shifted pad and port pins.
    pub fn build_net(&self, id: NetId, alpha: f64) -> Result<(Net, Vec<GSegment>)> {
        let data = &self.db.nets[id.index()];
        let pad_center = self.pad_center(id);

        let mut pins = Vec::with_capacity(data.pins.len());
        for &pid in &data.pins {
            if let Some(pin) = self.build_pin(pid, pad_center)? {
                pins.push(pin);
            }
        }
        let local = pins.windows(2).all(|w| w[0].on_grid == w[1].on_grid);

        let mut stubs = Vec::new();
        if !local {
            for pin in pins
                .iter_mut()
                .filter(|p| p.is_port || p.connected_to_pad_or_macro)
            {
                if let Some(shifted) = self.shifted_position(pin) {
                    stubs.push(GSegment::wire(shifted, pin.on_grid, pin.top_layer()));
                    pin.access = shifted;
                }
            }
        }

        let net = Net {
            id,
            name: data.name.clone(),
            sig_type: data.sig_type,
            pins,
            alpha,
            local,
        };
        Ok((net, stubs))
    }

    fn build_pin(&self, id: PinId, pad_center: Option<Point<i64>>) -> Result<Option<Pin>> {
        let data = &self.db.pins[id.index()];
        let name = self.db.pin_display_name(id);
        let die = self.grid.grid_area();

        let boxes: Vec<(usize, Rect)> = self
            .db
            .pin_shapes(id)
            .into_iter()
            .filter(|(l, _)| *l >= 1 && *l <= self.grid.num_layers())
            .collect();
        let Some(top) = boxes.iter().map(|(l, _)| *l).max() else {
            if data.is_port() {
                return Err(RouteError::PortWithoutShapes { port: name });
            }
            log::debug!("Pin {} has no routing shapes.", name);
            return Ok(None);
        };
        if boxes.iter().any(|(_, r)| !die.contains_rect(r)) {
            log::warn!("Pin {} is outside die area.", name);
        }

        let mut layers: Vec<usize> = boxes.iter().map(|(l, _)| *l).collect();
        layers.sort_unstable();
        layers.dedup();

        let top_boxes: Vec<Rect> = boxes
            .iter()
            .filter(|(l, _)| *l == top)
            .map(|(_, r)| *r)
            .collect();
        let position = top_boxes[0].min;
        let direction = self.direction(top);

        let (is_port, connected_to_pad_or_macro, orientation) = match data.cell {
            Some(cell) => {
                let master = self.db.master_of(cell);
                if master.is_pad() || master.is_block() {
                    let center = self.db.cell_bbox(cell).center();
                    (false, true, facing_instance(position, center, direction))
                } else {
                    (false, false, PinOrientation::None)
                }
            }
            None => match pad_center {
                Some(center) => (true, true, facing_instance(position, center, direction)),
                None => (true, false, facing_die_edge(position, die.center(), direction)),
            },
        };

        let on_grid = self.on_grid_position(&top_boxes, top, direction);
        Ok(Some(Pin {
            id,
            name,
            layers,
            boxes,
            position,
            on_grid,
            access: on_grid,
            orientation,
            is_port,
            connected_to_pad_or_macro,
        }))
    }

    /// Most common tile center among the box middles; equal counts go to
    /// the lowest `(x, y)`. Narrow pins are then pulled onto the tile of
    /// the one track they cover.
    fn on_grid_position(&self, boxes: &[Rect], layer: usize, direction: Direction) -> Point<i64> {
        let mut votes: BTreeMap<Point<i64>, usize> = BTreeMap::new();
        for rect in boxes {
            *votes
                .entry(self.grid.position_on_grid(rect.center()))
                .or_default() += 1;
        }
        let mut best = (Point::new(0, 0), 0);
        for (&pos, &count) in &votes {
            if count > best.1 {
                best = (pos, count);
            }
        }
        let mut position = best.0;

        if let Some(on_track) = self.single_track_point(boxes, layer) {
            let snapped = self.grid.position_on_grid(on_track);
            if direction.across(snapped) != direction.across(position) {
                position = snapped;
            }
        }
        position
    }

    fn single_track_point(&self, boxes: &[Rect], layer: usize) -> Option<Point<i64>> {
        let tracks = self.tracks.iter().find(|t| t.layer == layer)?;
        let pitch = tracks.track_pitch;
        let first = boxes.first()?;
        if pitch <= 0 {
            return None;
        }
        let bbox = boxes.iter().fold(*first, |acc, r| acc.merge(r));
        let direction = tracks.direction;
        let (lo, hi) = direction.span_across(&bbox);
        if (hi - lo) / pitch > SINGLE_TRACK_PITCHES {
            return None;
        }

        let nearest = (hi - tracks.location).div_euclid(pitch) * pitch + tracks.location;
        let previous = nearest - pitch;
        let inside = |t: i64| t >= lo && t <= hi;
        let track = match (inside(nearest), inside(previous)) {
            (true, false) => nearest,
            (false, true) => previous,
            _ => return None,
        };
        let (along_lo, along_hi) = direction.span_along(&bbox);
        Some(direction.point((along_lo + along_hi) / 2, track))
    }

    /// Position `gcells_offset` tiles away from the pin's cell or die edge,
    /// or `None` when that would leave the die.
    fn shifted_position(&self, pin: &Pin) -> Option<Point<i64>> {
        let die = self.grid.grid_area();
        let p = pin.on_grid;
        let dx = self.gcells_offset * self.grid.tile_width();
        let dy = self.gcells_offset * self.grid.tile_height();
        match (self.direction(pin.top_layer()), pin.orientation) {
            (Direction::Horizontal, PinOrientation::West) => {
                (p.x + dx <= die.max.x).then(|| Point::new(p.x + dx, p.y))
            }
            (Direction::Horizontal, PinOrientation::East) => {
                (p.x - dx >= die.min.x).then(|| Point::new(p.x - dx, p.y))
            }
            (Direction::Vertical, PinOrientation::South) => {
                (p.y + dy <= die.max.y).then(|| Point::new(p.x, p.y + dy))
            }
            (Direction::Vertical, PinOrientation::North) => {
                (p.y - dy >= die.min.y).then(|| Point::new(p.x, p.y - dy))
            }
            _ => {
                log::warn!("Pin {} has invalid orientation.", pin.name);
                None
            }
        }
    }

    /// Distinct `(tile x, tile y, top layer)` terminals handed to the core.
    pub fn core_pins(&self, net: &Net) -> Vec<(u32, u32, usize)> {
        let origin = self.grid.lower_left();
        let mut pins = Vec::with_capacity(net.pins.len());
        for pin in &net.pins {
            let tx = (pin.access.x - origin.x).div_euclid(self.grid.tile_width());
            let ty = (pin.access.y - origin.y).div_euclid(self.grid.tile_height());
            let top = pin.top_layer();
            if tx < 0
                || ty < 0
                || tx >= self.grid.x_grids() as i64
                || ty >= self.grid.y_grids() as i64
                || top == 0
                || top > self.grid.num_layers()
            {
                continue;
            }
            let entry = (tx as u32, ty as u32, top);
            if !pins.contains(&entry) {
                pins.push(entry);
            }
        }
        pins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::grid::layers::{build_routing_layers, build_routing_tracks};
    use groute_common::db::core::PlacementStatus;
    use groute_common::db::tech::{MasterClass, MasterData, MasterPin, PinDirection, SigType};

    struct Setup {
        grid: Grid,
        layers: Vec<RoutingLayer>,
        tracks: Vec<RoutingTracks>,
    }

    fn setup(db: &DesignDB) -> Setup {
        let layers = build_routing_layers(db).unwrap();
        let tracks = build_routing_tracks(db, &layers, 3, &[]).unwrap();
        let grid = Grid::init(db.die_area, &tracks, 15, 3).unwrap();
        Setup {
            grid,
            layers,
            tracks,
        }
    }

    fn builder<'a>(db: &'a DesignDB, s: &'a Setup) -> PinBuilder<'a> {
        PinBuilder {
            db,
            grid: &s.grid,
            layers: &s.layers,
            tracks: &s.tracks,
            gcells_offset: 2,
        }
    }

    #[test]
    fn core_pins_snap_to_tiles() {
        let mut db = fixtures::design();
        let a = fixtures::place(&mut db, "a", 1000, 2000);
        let b = fixtures::place(&mut db, "b", 20_000, 20_000);
        let id = fixtures::net(&mut db, "n", a, &[b]);
        let s = setup(&db);
        let builder = builder(&db, &s);

        let (net, stubs) = builder.build_net(id, 0.3).unwrap();
        assert!(stubs.is_empty());
        assert!(!net.local);
        assert_eq!(net.pins[0].position, Point::new(1700, 2200));
        assert_eq!(net.pins[0].on_grid, Point::new(3750, 3750));
        assert_eq!(builder.core_pins(&net), vec![(0, 0, 1), (2, 2, 1)]);
    }

    #[test]
    fn same_tile_pins_make_a_local_net() {
        let mut db = fixtures::design();
        let a = fixtures::place(&mut db, "a", 1000, 2000);
        let b = fixtures::place(&mut db, "b", 3000, 2000);
        let id = fixtures::net(&mut db, "n", a, &[b]);
        let s = setup(&db);

        let (net, _) = builder(&db, &s).build_net(id, 0.3).unwrap();
        assert!(net.local);
        assert_eq!(builder(&db, &s).core_pins(&net).len(), 1);
    }

    #[test]
    fn tied_votes_take_the_lowest_position() {
        let db = fixtures::design();
        let s = setup(&db);
        let boxes = [
            Rect::from_corners(8000, 8000, 8100, 8100),
            Rect::from_corners(1000, 8000, 1100, 8100),
        ];
        let pos = builder(&db, &s).on_grid_position(&boxes, 2, Direction::Vertical);
        assert_eq!(pos, Point::new(3750, 11_250));
    }

    #[test]
    fn narrow_pin_moves_to_its_track() {
        let db = fixtures::design();
        let mut s = setup(&db);
        s.tracks[0].location = 100;
        // The box middle sits in tile row 0 but the only covered M1 track,
        // y = 7600, lies in row 1.
        let boxes = [Rect::from_corners(2000, 7200, 2400, 7700)];
        let b = builder(&db, &s);
        assert_eq!(b.single_track_point(&boxes, 1), Some(Point::new(2200, 7600)));
        assert_eq!(
            b.on_grid_position(&boxes, 1, Direction::Horizontal),
            Point::new(3750, 11_250)
        );
    }

    #[test]
    fn two_covered_tracks_keep_the_vote() {
        let db = fixtures::design();
        let s = setup(&db);
        let boxes = [Rect::from_corners(2000, 7200, 2400, 7800)];
        assert_eq!(builder(&db, &s).single_track_point(&boxes, 1), None);
    }

    #[test]
    fn ports_get_a_stub_toward_the_core() {
        let mut db = fixtures::design();
        let a = fixtures::place(&mut db, "a", 20_000, 20_000);
        let id = db.add_net("in".into(), SigType::Signal);
        db.connect(a, "A", id).unwrap();
        db.add_port("in".into(), Some(id), vec![(1, Rect::from_corners(0, 14_000, 200, 14_200))])
            .unwrap();
        let s = setup(&db);

        let (net, stubs) = builder(&db, &s).build_net(id, 0.3).unwrap();
        let port = net.pins.iter().find(|p| p.is_port).unwrap();
        assert_eq!(port.orientation, PinOrientation::West);
        assert_eq!(port.on_grid, Point::new(3750, 11_250));
        assert_eq!(port.access, Point::new(18_750, 11_250));
        assert_eq!(stubs, vec![GSegment::new(18_750, 11_250, 1, 3750, 11_250, 1)]);
    }

    #[test]
    fn pad_pins_face_away_from_the_pad() {
        let mut db = fixtures::design();
        let pad = db.add_master(MasterData {
            name: "PAD".into(),
            class: MasterClass::Pad,
            width: 4000,
            height: 4000,
            pins: vec![MasterPin {
                name: "P".into(),
                direction: PinDirection::Inout,
                usage: SigType::Signal,
                shapes: vec![(2, Rect::from_corners(1800, 3800, 2200, 4000))],
                gate_area: 0.0,
                diff_area: 0.0,
            }],
            obstructions: Vec::new(),
        });
        let p = db
            .add_cell("io".into(), pad, Point::new(0, 0), PlacementStatus::Fixed)
            .unwrap();
        let a = fixtures::place(&mut db, "a", 20_000, 20_000);
        let id = db.add_net("io_net".into(), SigType::Signal);
        db.connect(p, "P", id).unwrap();
        db.connect(a, "A", id).unwrap();
        let s = setup(&db);

        let (net, stubs) = builder(&db, &s).build_net(id, 0.3).unwrap();
        assert_eq!(net.pins[0].orientation, PinOrientation::South);
        assert!(net.pins[0].connected_to_pad_or_macro);
        assert_eq!(net.pins[0].access, Point::new(3750, 18_750));
        assert_eq!(stubs.len(), 1);
    }

    #[test]
    fn overlapping_ports_are_rejected() {
        let mut db = fixtures::design();
        let shape = vec![(1, Rect::from_corners(0, 100, 200, 300))];
        db.add_port("a".into(), None, shape.clone()).unwrap();
        db.add_port("b".into(), None, shape).unwrap();
        assert!(matches!(
            check_pin_placement(&db),
            Err(RouteError::InvalidPinPlacement)
        ));
    }

    #[test]
    fn port_without_shapes_is_fatal() {
        let mut db = fixtures::design();
        db.add_port("a".into(), None, Vec::new()).unwrap();
        assert!(matches!(
            check_pin_placement(&db),
            Err(RouteError::PortWithoutShapes { .. })
        ));
    }
}
