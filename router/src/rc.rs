//! RC networks built from global routes for timing estimation.

use crate::antenna::wires::local_stubs;
use crate::net::Net;
use crate::route::{GRoute, GSegment, NetRouteMap};
use groute_common::db::core::DesignDB;
use groute_common::db::indices::NetId;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Node of a net's RC network: a route point on one routing level.
pub type NodeKey = (i64, i64, usize);

/// Receiver of the per-net networks, usually a timing engine.
pub trait ParasiticsSink {
    fn begin_net(&mut self, net: NetId, name: &str);
    fn add_resistor(&mut self, net: NetId, a: NodeKey, b: NodeKey, ohms: f64);
    fn add_capacitance(&mut self, net: NetId, node: NodeKey, farads: f64);
    fn end_net(&mut self, net: NetId);
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct LayerRc {
    /// Ohm per meter.
    resistance: f64,
    /// Farad per meter.
    capacitance: f64,
}

pub struct RcEstimator<'a> {
    db: &'a DesignDB,
    layers: Vec<LayerRc>,
}

impl<'a> RcEstimator<'a> {
    pub fn new(db: &'a DesignDB) -> Self {
        let layers = db
            .layers
            .iter()
            .map(|l| {
                let width_um = db.dbu_to_microns(l.width);
                if width_um <= 0.0 {
                    return LayerRc::default();
                }
                LayerRc {
                    resistance: 1e6 * l.resistance / width_um,
                    capacitance: 1e6 * 1e-12 * (width_um * l.capacitance + 2.0 * l.edge_capacitance),
                }
            })
            .collect();
        Self { db, layers }
    }

    fn meters(&self, dbu: i64) -> f64 {
        self.db.dbu_to_microns(dbu) * 1e-6
    }

    fn add_segment(&self, net: NetId, seg: &GSegment, sink: &mut dyn ParasiticsSink) {
        let a = (seg.init_x, seg.init_y, seg.init_layer);
        let b = (seg.final_x, seg.final_y, seg.final_layer);
        if seg.is_via() {
            let ohms = self
                .db
                .cut_layer_above(seg.min_layer())
                .map_or(0.0, |c| c.resistance);
            sink.add_resistor(net, a, b, ohms);
            return;
        }
        if seg.is_zero_length() {
            return;
        }
        let rc = self
            .layers
            .get(seg.init_layer.wrapping_sub(1))
            .copied()
            .unwrap_or_default();
        let len = self.meters(seg.length());
        sink.add_resistor(net, a, b, rc.resistance * len);
        let half = rc.capacitance * len / 2.0;
        sink.add_capacitance(net, a, half);
        sink.add_capacitance(net, b, half);
    }

    /// Route segments plus the stubs joining every pin to its tile center.
    pub fn estimate_net(&self, net: &Net, route: &GRoute, sink: &mut dyn ParasiticsSink) {
        sink.begin_net(net.id, &net.name);
        for seg in route {
            self.add_segment(net.id, seg, sink);
        }
        for pin in &net.pins {
            for stub in local_stubs(pin) {
                self.add_segment(net.id, &stub, sink);
            }
        }
        sink.end_net(net.id);
    }

    pub fn estimate_all(&self, routes: &NetRouteMap, nets: &BTreeMap<NetId, Net>, sink: &mut dyn ParasiticsSink) -> usize {
        let mut count = 0;
        for (id, route) in routes {
            if let Some(net) = nets.get(id) {
                self.estimate_net(net, route, sink);
                count += 1;
            }
        }
        log::info!("Estimated parasitics of {} nets.", count);
        count
    }
}

#[derive(Clone, Debug, Default)]
pub struct NetParasitics {
    pub name: String,
    pub resistors: Vec<(NodeKey, NodeKey, f64)>,
    pub node_caps: BTreeMap<NodeKey, f64>,
}

impl NetParasitics {
    pub fn total_resistance(&self) -> f64 {
        self.resistors.iter().map(|r| r.2).sum()
    }

    pub fn total_capacitance(&self) -> f64 {
        self.node_caps.values().sum()
    }
}

/// Keeps every network in memory.
#[derive(Debug, Default)]
pub struct InMemoryParasitics {
    nets: BTreeMap<NetId, NetParasitics>,
}

impl InMemoryParasitics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn net(&self, net: NetId) -> Option<&NetParasitics> {
        self.nets.get(&net)
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// One line per net: `name total_cap_fF total_res_ohm`.
    pub fn write_summary(&self, path: &Path) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        let mut nets: Vec<&NetParasitics> = self.nets.values().collect();
        nets.sort_by(|a, b| a.name.cmp(&b.name));
        for n in nets {
            writeln!(
                out,
                "{} {:.4} {:.4}",
                n.name,
                n.total_capacitance() * 1e15,
                n.total_resistance()
            )?;
        }
        out.flush()
    }
}

impl ParasiticsSink for InMemoryParasitics {
    fn begin_net(&mut self, net: NetId, name: &str) {
        self.nets.insert(
            net,
            NetParasitics {
                name: name.to_string(),
                ..NetParasitics::default()
            },
        );
    }

    fn add_resistor(&mut self, net: NetId, a: NodeKey, b: NodeKey, ohms: f64) {
        if let Some(n) = self.nets.get_mut(&net) {
            n.resistors.push((a, b, ohms));
        }
    }

    fn add_capacitance(&mut self, net: NetId, node: NodeKey, farads: f64) {
        if let Some(n) = self.nets.get_mut(&net) {
            *n.node_caps.entry(node).or_insert(0.0) += farads;
        }
    }

    fn end_net(&mut self, _net: NetId) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::net::{Pin, PinOrientation};
    use groute_common::db::indices::PinId;
    use groute_common::db::tech::SigType;
    use groute_common::geom::point::Point;
    use groute_common::geom::rect::Rect;

    fn net(pins: Vec<Pin>) -> Net {
        Net {
            id: NetId::new(0),
            name: "n".into(),
            sig_type: SigType::Signal,
            pins,
            alpha: 0.3,
            local: false,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1e-18)
    }

    #[test]
    fn wire_and_via_values() {
        let db = fixtures::design();
        let route = vec![
            GSegment::new(3750, 3750, 1, 11_250, 3750, 1),
            GSegment::via(Point::new(11_250, 3750), 1, 2),
        ];
        let mut sink = InMemoryParasitics::new();
        RcEstimator::new(&db).estimate_net(&net(Vec::new()), &route, &mut sink);

        let n = sink.net(NetId::new(0)).unwrap();
        // 7.5 um of 0.1 um wide wire at 0.1 ohm/sq, plus one 5 ohm cut.
        assert!(close(n.total_resistance(), 12.5));
        // (0.1 * 0.0002 + 2 * 0.00005) pF/um over 7.5 um.
        assert!(close(n.total_capacitance(), 9e-16));
        assert_eq!(n.node_caps.len(), 2);
        assert!(close(n.node_caps[&(3750, 3750, 1)], 4.5e-16));
    }

    #[test]
    fn pins_are_joined_by_stubs() {
        let db = fixtures::design();
        let on_grid = Point::new(3750, 3750);
        let pin = Pin {
            id: PinId::new(0),
            name: "u1/A".into(),
            layers: vec![1],
            boxes: vec![(1, Rect::from_corners(1100, 2200, 1300, 3800))],
            position: Point::new(1100, 2200),
            on_grid,
            access: on_grid,
            orientation: PinOrientation::None,
            is_port: false,
            connected_to_pad_or_macro: false,
        };
        let mut sink = InMemoryParasitics::new();
        RcEstimator::new(&db).estimate_net(&net(vec![pin]), &Vec::new(), &mut sink);

        let n = sink.net(NetId::new(0)).unwrap();
        assert_eq!(n.resistors.len(), 2);
        assert_eq!(n.resistors[0].0, (1200, 3000, 1));
        assert_eq!(n.resistors[1].1, (3750, 3750, 1));
        // 2.55 um + 0.75 um.
        assert!(close(n.total_resistance(), 3.3));
    }

    #[test]
    fn summary_lists_nets_by_name() {
        let mut sink = InMemoryParasitics::new();
        sink.begin_net(NetId::new(1), "b");
        sink.add_resistor(NetId::new(1), (0, 0, 1), (1, 0, 1), 2.0);
        sink.begin_net(NetId::new(0), "a");
        sink.add_capacitance(NetId::new(0), (0, 0, 1), 1e-15);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rc.txt");
        sink.write_summary(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "a 1.0000 0.0000\nb 0.0000 2.0000\n");
    }
}
