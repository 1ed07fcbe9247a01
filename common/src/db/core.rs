use crate::db::error::DbError;
use crate::db::indices::*;
use crate::db::tech::*;
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementStatus {
    Unplaced,
    Placed,
    Firm,
    Fixed,
}

impl PlacementStatus {
    /// Firm and fixed instances are never moved by a legalizer.
    pub fn is_fixed(&self) -> bool {
        matches!(self, PlacementStatus::Firm | PlacementStatus::Fixed)
    }

    pub fn is_placed(&self) -> bool {
        !matches!(self, PlacementStatus::Unplaced)
    }
}

#[derive(Clone, Debug)]
pub struct CellData {
    pub name: String,
    pub master: MasterId,
    pub origin: Point<i64>,
    pub status: PlacementStatus,
    pub pins: Vec<PinId>,
}

/// A terminal: either an instance pin (`cell` set, shapes come from the
/// master) or a design port carrying its own shapes.
#[derive(Clone, Debug)]
pub struct PinData {
    pub name: String,
    pub cell: Option<CellId>,
    pub master_pin: usize,
    pub net: Option<NetId>,
    pub shapes: Vec<(usize, Rect)>,
}

impl PinData {
    pub fn is_port(&self) -> bool {
        self.cell.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireShape {
    Segment { level: usize, rect: Rect },
    /// Cut between `bottom` and `bottom + 1` at a point.
    Via { bottom: usize, at: Point<i64> },
}

#[derive(Clone, Debug, Default)]
pub struct Wire {
    pub shapes: Vec<WireShape>,
}

#[derive(Clone, Debug)]
pub struct NetData {
    pub name: String,
    pub sig_type: SigType,
    pub special: bool,
    pub pins: Vec<PinId>,
    pub wire: Option<Wire>,
    /// Set when the wire comes from a detailed router and must not be
    /// replaced by global-routing shapes.
    pub detail_routed: bool,
}

#[derive(Clone, Debug)]
pub struct RowData {
    pub name: String,
    pub site: String,
    pub origin: Point<i64>,
    pub num_sites: u32,
    pub site_width: i64,
    pub height: i64,
}

impl RowData {
    pub fn bbox(&self) -> Rect {
        Rect::new(
            self.origin,
            Point::new(
                self.origin.x + self.site_width * self.num_sites as i64,
                self.origin.y + self.height,
            ),
        )
    }
}

pub struct DesignDB {
    pub name: String,
    pub dbu_per_micron: i64,
    pub die_area: Rect,

    pub layers: Vec<LayerData>,
    pub cut_layers: Vec<CutLayerData>,
    pub tracks: Vec<TrackDef>,
    pub sites: HashMap<String, (i64, i64)>,

    pub masters: Vec<MasterData>,
    pub cells: Vec<CellData>,
    pub nets: Vec<NetData>,
    pub pins: Vec<PinData>,
    pub rows: Vec<RowData>,

    pub routing_blockages: Vec<(usize, Rect)>,
    pub placement_blockages: Vec<Rect>,

    pub cell_name_map: HashMap<String, CellId>,
    pub net_name_map: HashMap<String, NetId>,
    pub master_name_map: HashMap<String, MasterId>,
    pub port_name_map: HashMap<String, PinId>,
    pub layer_name_map: HashMap<String, usize>,
}

impl Default for DesignDB {
    fn default() -> Self {
        Self::new()
    }
}

impl DesignDB {
    pub fn new() -> Self {
        Self {
            name: String::from("top"),
            dbu_per_micron: 1000,
            die_area: Rect::default(),
            layers: Vec::new(),
            cut_layers: Vec::new(),
            tracks: Vec::new(),
            sites: HashMap::new(),
            masters: Vec::new(),
            cells: Vec::with_capacity(1000),
            nets: Vec::with_capacity(1000),
            pins: Vec::with_capacity(5000),
            rows: Vec::new(),
            routing_blockages: Vec::new(),
            placement_blockages: Vec::new(),
            cell_name_map: HashMap::new(),
            net_name_map: HashMap::new(),
            master_name_map: HashMap::new(),
            port_name_map: HashMap::new(),
            layer_name_map: HashMap::new(),
        }
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }
    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn dbu_to_microns(&self, dbu: i64) -> f64 {
        dbu as f64 / self.dbu_per_micron as f64
    }

    pub fn microns_to_dbu(&self, um: f64) -> i64 {
        (um * self.dbu_per_micron as f64).round() as i64
    }

    /// Appends a routing layer; its level is its 1-based position.
    pub fn add_layer(&mut self, mut layer: LayerData) -> usize {
        let level = self.layers.len() + 1;
        layer.level = level;
        self.layer_name_map.insert(layer.name.clone(), level);
        self.layers.push(layer);
        level
    }

    pub fn routing_layer(&self, level: usize) -> Option<&LayerData> {
        if level == 0 {
            return None;
        }
        self.layers.get(level - 1)
    }

    pub fn layer_level(&self, name: &str) -> Option<usize> {
        self.layer_name_map.get(name).copied()
    }

    pub fn add_cut_layer(&mut self, name: String, resistance: f64) {
        let below_level = self.layers.len();
        self.cut_layers.push(CutLayerData {
            name,
            below_level,
            resistance,
        });
    }

    pub fn cut_layer_above(&self, level: usize) -> Option<&CutLayerData> {
        self.cut_layers.iter().find(|c| c.below_level == level)
    }

    pub fn tracks_for_layer(&self, name: &str) -> Vec<&TrackDef> {
        self.tracks.iter().filter(|t| t.layer == name).collect()
    }

    pub fn add_master(&mut self, master: MasterData) -> MasterId {
        if let Some(&id) = self.master_name_map.get(&master.name) {
            self.masters[id.index()] = master;
            return id;
        }
        let id = MasterId::new(self.masters.len());
        self.master_name_map.insert(master.name.clone(), id);
        self.masters.push(master);
        id
    }

    pub fn find_master(&self, name: &str) -> Option<MasterId> {
        self.master_name_map.get(name).copied()
    }

    pub fn find_cell(&self, name: &str) -> Option<CellId> {
        self.cell_name_map.get(name).copied()
    }

    pub fn find_net(&self, name: &str) -> Option<NetId> {
        self.net_name_map.get(name).copied()
    }

    pub fn master_of(&self, cell: CellId) -> &MasterData {
        &self.masters[self.cells[cell.index()].master.index()]
    }

    /// Creates an instance together with one unconnected terminal per
    /// master pin.
    pub fn add_cell(
        &mut self,
        name: String,
        master: MasterId,
        origin: Point<i64>,
        status: PlacementStatus,
    ) -> Result<CellId, DbError> {
        if self.cell_name_map.contains_key(&name) {
            return Err(DbError::DuplicateName {
                kind: "instance",
                name,
            });
        }
        let id = CellId::new(self.cells.len());
        let pin_names: Vec<String> = self.masters[master.index()]
            .pins
            .iter()
            .map(|p| p.name.clone())
            .collect();

        let mut pins = Vec::with_capacity(pin_names.len());
        for (idx, pin_name) in pin_names.into_iter().enumerate() {
            let pid = PinId::new(self.pins.len());
            self.pins.push(PinData {
                name: pin_name,
                cell: Some(id),
                master_pin: idx,
                net: None,
                shapes: Vec::new(),
            });
            pins.push(pid);
        }

        self.cells.push(CellData {
            name: name.clone(),
            master,
            origin,
            status,
            pins,
        });
        self.cell_name_map.insert(name, id);
        Ok(id)
    }

    pub fn add_net(&mut self, name: String, sig_type: SigType) -> NetId {
        if let Some(&id) = self.net_name_map.get(&name) {
            return id;
        }
        let id = NetId::new(self.nets.len());
        self.nets.push(NetData {
            name: name.clone(),
            sig_type,
            special: false,
            pins: Vec::new(),
            wire: None,
            detail_routed: false,
        });
        self.net_name_map.insert(name, id);
        id
    }

    pub fn add_port(
        &mut self,
        name: String,
        net: Option<NetId>,
        shapes: Vec<(usize, Rect)>,
    ) -> Result<PinId, DbError> {
        if self.port_name_map.contains_key(&name) {
            return Err(DbError::DuplicateName { kind: "port", name });
        }
        let pid = PinId::new(self.pins.len());
        self.pins.push(PinData {
            name: name.clone(),
            cell: None,
            master_pin: 0,
            net,
            shapes,
        });
        if let Some(net) = net {
            self.nets[net.index()].pins.push(pid);
        }
        self.port_name_map.insert(name, pid);
        Ok(pid)
    }

    pub fn connect_port(&mut self, port: PinId, net: NetId) {
        if self.pins[port.index()].net == Some(net) {
            return;
        }
        self.pins[port.index()].net = Some(net);
        self.nets[net.index()].pins.push(port);
    }

    pub fn connect(&mut self, cell: CellId, pin_name: &str, net: NetId) -> Result<PinId, DbError> {
        let pid = self.cells[cell.index()]
            .pins
            .iter()
            .copied()
            .find(|p| self.pins[p.index()].name == pin_name)
            .ok_or_else(|| DbError::UnknownPin {
                cell: self.cells[cell.index()].name.clone(),
                pin: pin_name.to_string(),
            })?;
        if let Some(old) = self.pins[pid.index()].net
            && old != net
        {
            self.nets[old.index()].pins.retain(|&p| p != pid);
        }
        if self.pins[pid.index()].net != Some(net) {
            self.pins[pid.index()].net = Some(net);
            self.nets[net.index()].pins.push(pid);
        }
        Ok(pid)
    }

    pub fn cell_bbox(&self, cell: CellId) -> Rect {
        let data = &self.cells[cell.index()];
        let master = &self.masters[data.master.index()];
        Rect::new(
            data.origin,
            Point::new(data.origin.x + master.width, data.origin.y + master.height),
        )
    }

    pub fn master_pin(&self, pin: PinId) -> Option<&MasterPin> {
        let data = &self.pins[pin.index()];
        let cell = data.cell?;
        self.master_of(cell).pins.get(data.master_pin)
    }

    /// Absolute shapes of a terminal as (routing level, box).
    pub fn pin_shapes(&self, pin: PinId) -> Vec<(usize, Rect)> {
        let data = &self.pins[pin.index()];
        match data.cell {
            None => data.shapes.clone(),
            Some(cell) => {
                let origin = self.cells[cell.index()].origin;
                self.master_pin(pin)
                    .map(|mp| {
                        mp.shapes
                            .iter()
                            .map(|&(level, r)| (level, r.translate(origin)))
                            .collect()
                    })
                    .unwrap_or_default()
            }
        }
    }

    pub fn pin_display_name(&self, pin: PinId) -> String {
        let data = &self.pins[pin.index()];
        match data.cell {
            Some(cell) => format!("{}/{}", self.cells[cell.index()].name, data.name),
            None => data.name.clone(),
        }
    }

    pub fn gate_area(&self, pin: PinId) -> f64 {
        self.master_pin(pin).map(|mp| mp.gate_area).unwrap_or(0.0)
    }

    pub fn diff_area(&self, pin: PinId) -> f64 {
        self.master_pin(pin).map(|mp| mp.diff_area).unwrap_or(0.0)
    }

    /// Bounding box of all rows, or the die when the design has none.
    pub fn core_area(&self) -> Rect {
        let mut rows = self.rows.iter();
        match rows.next() {
            None => self.die_area,
            Some(first) => rows.fold(first.bbox(), |acc, r| acc.merge(&r.bbox())),
        }
    }

    pub fn create_wire(&mut self, net: NetId, wire: Wire) {
        self.nets[net.index()].wire = Some(wire);
    }

    pub fn destroy_wire(&mut self, net: NetId) {
        self.nets[net.index()].wire = None;
    }
}
