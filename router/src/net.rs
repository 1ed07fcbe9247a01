use groute_common::db::indices::{NetId, PinId};
use groute_common::db::tech::SigType;
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;

/// Side of its cell (or of the die) a pad or port pin faces. Drives the
/// direction of the synthetic stub wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinOrientation {
    North,
    South,
    East,
    West,
    None,
}

/// Which nets a routing pass works on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetType {
    Signal,
    Clock,
    /// Nets marked dirty by antenna repair.
    Antenna,
    All,
}

#[derive(Clone, Debug)]
pub struct Pin {
    pub id: PinId,
    pub name: String,
    /// Routing levels carrying a shape, ascending.
    pub layers: Vec<usize>,
    pub boxes: Vec<(usize, Rect)>,
    pub position: Point<i64>,
    pub on_grid: Point<i64>,
    /// Where the router connects: `on_grid`, or the shifted spot of a pad
    /// or port pin.
    pub access: Point<i64>,
    pub orientation: PinOrientation,
    pub is_port: bool,
    /// Instance pin of a pad or macro, or a port attached to a pad.
    pub connected_to_pad_or_macro: bool,
}

impl Pin {
    pub fn top_layer(&self) -> usize {
        self.layers.last().copied().unwrap_or(0)
    }

    pub fn boxes_on(&self, layer: usize) -> impl Iterator<Item = &Rect> {
        self.boxes
            .iter()
            .filter(move |(l, _)| *l == layer)
            .map(|(_, r)| r)
    }
}

#[derive(Clone, Debug)]
pub struct Net {
    pub id: NetId,
    pub name: String,
    pub sig_type: SigType,
    pub pins: Vec<Pin>,
    pub alpha: f64,
    /// All pins fall in a single tile.
    pub local: bool,
}

impl Net {
    pub fn num_pins(&self) -> usize {
        self.pins.len()
    }

    pub fn is_clock(&self) -> bool {
        self.sig_type == SigType::Clock
    }

    pub fn max_pin_layer(&self) -> usize {
        self.pins.iter().map(Pin::top_layer).max().unwrap_or(0)
    }
}
