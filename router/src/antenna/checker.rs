//! Partial-area ratio check over the conductors of a net's wire.

use groute_common::db::core::{DesignDB, WireShape};
use groute_common::db::indices::{NetId, PinId};
use groute_common::db::tech::AntennaRule;
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;
use rayon::prelude::*;
use std::collections::{BTreeSet, VecDeque};

/// One violating component: every gate in it needs `diode_count` diodes.
/// A count of 0 means no number of diodes fixes it.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub net: NetId,
    pub layer: usize,
    pub diode_count: usize,
    pub gates: Vec<PinId>,
}

#[derive(Clone, Copy, Debug)]
enum Conductor {
    Wire { level: usize, rect: Rect },
    Via { bottom: usize, at: Point<i64> },
    Terminal { pin: PinId, level: usize, rect: Rect },
}

impl Conductor {
    /// Highest level the conductor occupies.
    fn top(&self) -> usize {
        match *self {
            Conductor::Wire { level, .. } | Conductor::Terminal { level, .. } => level,
            Conductor::Via { bottom, .. } => bottom + 1,
        }
    }

    fn planar(&self) -> Option<(usize, Rect)> {
        match *self {
            Conductor::Wire { level, rect } | Conductor::Terminal { level, rect, .. } => {
                Some((level, rect))
            }
            Conductor::Via { .. } => None,
        }
    }

    fn touches(&self, other: &Conductor) -> bool {
        match (self, other) {
            (
                Conductor::Terminal { pin: a, .. },
                Conductor::Terminal { pin: b, .. },
            ) if a == b => true,
            (
                Conductor::Via { bottom: b1, at: p1 },
                Conductor::Via { bottom: b2, at: p2 },
            ) => p1 == p2 && b1.abs_diff(*b2) <= 1,
            (Conductor::Via { bottom, at }, c) | (c, Conductor::Via { bottom, at }) => c
                .planar()
                .is_some_and(|(level, rect)| {
                    (level == *bottom || level == *bottom + 1) && rect.contains(*at)
                }),
            _ => match (self.planar(), other.planar()) {
                (Some((la, ra)), Some((lb, rb))) => la == lb && ra.intersects(&rb),
                _ => false,
            },
        }
    }
}

struct ConductorGraph {
    nodes: Vec<Conductor>,
    adjacency: Vec<Vec<usize>>,
}

impl ConductorGraph {
    fn build(db: &DesignDB, net: NetId) -> Self {
        let data = &db.nets[net.index()];
        let mut nodes: Vec<Conductor> = data
            .wire
            .iter()
            .flat_map(|w| w.shapes.iter())
            .map(|shape| match *shape {
                WireShape::Segment { level, rect } => Conductor::Wire { level, rect },
                WireShape::Via { bottom, at } => Conductor::Via { bottom, at },
            })
            .collect();
        for &pin in &data.pins {
            for (level, rect) in db.pin_shapes(pin) {
                nodes.push(Conductor::Terminal { pin, level, rect });
            }
        }

        let mut adjacency = vec![Vec::new(); nodes.len()];
        for i in 0..nodes.len() {
            for j in i + 1..nodes.len() {
                if nodes[i].touches(&nodes[j]) {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        Self { nodes, adjacency }
    }

    /// Nodes reachable from `start` through conductors on levels <= `layer`.
    fn component(&self, start: &[usize], layer: usize) -> BTreeSet<usize> {
        let mut seen: BTreeSet<usize> = BTreeSet::new();
        let mut queue: VecDeque<usize> = start
            .iter()
            .copied()
            .filter(|&n| self.nodes[n].top() <= layer)
            .collect();
        seen.extend(queue.iter().copied());
        while let Some(n) = queue.pop_front() {
            for &m in &self.adjacency[n] {
                if self.nodes[m].top() <= layer && seen.insert(m) {
                    queue.push_back(m);
                }
            }
        }
        seen
    }
}

pub struct AntennaChecker<'a> {
    db: &'a DesignDB,
    /// Percentage taken off every ratio limit.
    margin: f64,
    diode_diff_area: f64,
    max_diodes_per_gate: usize,
}

impl<'a> AntennaChecker<'a> {
    pub fn new(db: &'a DesignDB, margin: f64, diode_diff_area: f64, max_diodes_per_gate: usize) -> Self {
        Self {
            db,
            margin,
            diode_diff_area,
            max_diodes_per_gate,
        }
    }

    /// Checks every net in parallel. Nets are read from the database as
    /// they are, wires included.
    pub fn check_nets(&self, nets: &[NetId]) -> Vec<Violation> {
        nets.par_iter()
            .flat_map_iter(|&net| self.check_net(net))
            .collect()
    }

    pub fn check_net(&self, net: NetId) -> Vec<Violation> {
        let db = self.db;
        let graph = ConductorGraph::build(db, net);
        let gate_pins: Vec<PinId> = db.nets[net.index()]
            .pins
            .iter()
            .copied()
            .filter(|&p| db.gate_area(p) > 0.0)
            .collect();
        if gate_pins.is_empty() {
            return Vec::new();
        }

        let um2 = (db.dbu_per_micron * db.dbu_per_micron) as f64;
        let mut violations = Vec::new();
        for (idx, layer) in db.layers.iter().enumerate() {
            let level = idx + 1;
            let rule = &layer.antenna;
            if !rule.is_active() {
                continue;
            }

            let mut covered: BTreeSet<PinId> = BTreeSet::new();
            for &gate in &gate_pins {
                if covered.contains(&gate) {
                    continue;
                }
                let start: Vec<usize> = graph
                    .nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| matches!(n, Conductor::Terminal { pin, .. } if *pin == gate))
                    .map(|(i, _)| i)
                    .collect();
                let component = graph.component(&start, level);
                if component.is_empty() {
                    continue;
                }

                let mut area = 0.0;
                let mut pins: BTreeSet<PinId> = BTreeSet::new();
                for &n in &component {
                    match graph.nodes[n] {
                        Conductor::Wire { level: l, rect } if l == level => {
                            area += rect.area() as f64 / um2;
                        }
                        Conductor::Terminal { pin, .. } => {
                            pins.insert(pin);
                        }
                        _ => {}
                    }
                }
                let gates: Vec<PinId> = pins
                    .iter()
                    .copied()
                    .filter(|&p| db.gate_area(p) > 0.0)
                    .collect();
                covered.extend(gates.iter().copied());
                if area <= 0.0 {
                    continue;
                }

                let gate_area: f64 = gates.iter().map(|&p| db.gate_area(p)).sum();
                let diff_area: f64 = pins.iter().map(|&p| db.diff_area(p)).sum();
                if self.passes(rule, area, gate_area, diff_area) {
                    continue;
                }

                let diode_count = (1..=self.max_diodes_per_gate)
                    .find(|&n| {
                        let added = self.diode_diff_area * (n * gates.len()) as f64;
                        self.passes(rule, area, gate_area, diff_area + added)
                    })
                    .unwrap_or(0);
                if diode_count == 0 {
                    log::warn!(
                        "Net {} violates the antenna rule on {} and no diode count repairs it.",
                        db.nets[net.index()].name,
                        layer.name
                    );
                }
                violations.push(Violation {
                    net,
                    layer: level,
                    diode_count,
                    gates,
                });
            }
        }
        violations
    }

    fn passes(&self, rule: &AntennaRule, area: f64, gate: f64, diff: f64) -> bool {
        let keep = 1.0 - self.margin / 100.0;
        if diff > 0.0 && !rule.diff_par_ratio.is_empty() {
            let par = (rule.diff_area_factor * area - rule.minus_diff_factor * diff)
                / (gate + rule.plus_diff_factor * diff);
            par <= rule.diff_par_ratio.value_at(diff) * keep
        } else if rule.par_ratio > 0.0 {
            rule.area_factor * area / gate <= rule.par_ratio * keep
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use groute_common::db::core::Wire;
    use groute_common::db::tech::{PwlTable, SigType};
    use rstest::rstest;

    /// Two inverter inputs joined by a 20 um level-1 wire.
    fn floating_pair() -> (DesignDB, NetId) {
        let mut db = fixtures::design();
        db.layers[0].antenna = AntennaRule {
            par_ratio: 10.0,
            diff_par_ratio: PwlTable::new(vec![(0.0, 10.0), (0.4, 1000.0)]),
            ..AntennaRule::default()
        };
        let a = fixtures::place(&mut db, "a", 1000, 2000);
        let b = fixtures::place(&mut db, "b", 21_000, 2000);
        let net = db.add_net("n".into(), SigType::Signal);
        db.connect(a, "A", net).unwrap();
        db.connect(b, "A", net).unwrap();
        db.create_wire(
            net,
            Wire {
                shapes: vec![WireShape::Segment {
                    level: 1,
                    rect: Rect::from_corners(1200, 2950, 21_200, 3050),
                }],
            },
        );
        (db, net)
    }

    #[test]
    fn long_floating_wire_needs_one_diode() {
        let (db, net) = floating_pair();
        let checker = AntennaChecker::new(&db, 0.0, 0.5, 10);
        let violations = checker.check_net(net);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].layer, 1);
        assert_eq!(violations[0].diode_count, 1);
        assert_eq!(violations[0].gates.len(), 2);
    }

    #[rstest]
    #[case(0.0, 1)]
    #[case(90.0, 0)]
    fn margin_tightens_the_limit(#[case] margin: f64, #[case] expected: usize) {
        let (mut db, net) = floating_pair();
        // 2 um^2 over 0.1 um^2 of gate is a ratio of 20.
        db.layers[0].antenna.diff_par_ratio = PwlTable::new(vec![(0.0, 10.0), (0.4, 25.0)]);
        let checker = AntennaChecker::new(&db, margin, 0.5, 4);
        let violations = checker.check_net(net);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].diode_count, expected);
    }

    #[test]
    fn driver_diffusion_protects_the_gates() {
        let (mut db, net) = floating_pair();
        let c = fixtures::place(&mut db, "c", 11_000, 2000);
        db.connect(c, "Y", net).unwrap();
        // The driver output lies under the wire and brings 0.1 um^2 of diffusion.
        let checker = AntennaChecker::new(&db, 0.0, 0.5, 10);
        assert!(checker.check_net(net).is_empty());
    }

    #[test]
    fn upper_metal_is_not_seen_from_lower_layers() {
        let (mut db, net) = floating_pair();
        db.layers[0].antenna = AntennaRule::default();
        db.layers[2].antenna = AntennaRule {
            par_ratio: 10.0,
            ..AntennaRule::default()
        };
        let wire = db.nets[net.index()].wire.as_mut().unwrap();
        wire.shapes = vec![
            WireShape::Segment {
                level: 1,
                rect: Rect::from_corners(1200, 2950, 1300, 3050),
            },
            WireShape::Via {
                bottom: 1,
                at: Point::new(1250, 3000),
            },
            WireShape::Via {
                bottom: 2,
                at: Point::new(1250, 3000),
            },
            WireShape::Segment {
                level: 3,
                rect: Rect::from_corners(1200, 2950, 21_200, 3050),
            },
        ];
        let checker = AntennaChecker::new(&db, 0.0, 0.5, 10);
        let violations = checker.check_net(net);
        // Only gate `a` reaches the level-3 wire; `b` has no metal there.
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].layer, 3);
        assert_eq!(violations[0].gates.len(), 1);
        assert_eq!(violations[0].diode_count, 0);
    }

    #[test]
    fn parallel_check_keeps_net_order() {
        let (db, net) = floating_pair();
        let checker = AntennaChecker::new(&db, 0.0, 0.5, 10);
        let violations = checker.check_nets(&[net, net]);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0], violations[1]);
    }
}
