//! Temporary database wires built from global routes so the checker sees
//! metal with real widths.

use crate::net::{Net, Pin};
use crate::route::{GRoute, GSegment, NetRouteMap};
use groute_common::db::core::{DesignDB, Wire, WireShape};
use groute_common::db::indices::NetId;
use groute_common::geom::point::Point;
use groute_common::geom::rect::Rect;
use std::collections::BTreeMap;

/// Middle of the pin's first shape on its top level.
pub fn real_position(pin: &Pin) -> Point<i64> {
    pin.boxes_on(pin.top_layer())
        .next()
        .map_or(pin.position, Rect::center)
}

/// Horizontal then vertical stub from the pin's shape to its tile center,
/// both on the pin's top level.
pub fn local_stubs(pin: &Pin) -> [GSegment; 2] {
    let real = real_position(pin);
    let corner = Point::new(pin.on_grid.x, real.y);
    let layer = pin.top_layer();
    [
        GSegment::wire(real, corner, layer),
        GSegment::wire(corner, pin.on_grid, layer),
    ]
}

/// Appends the pin stubs of every routed net.
pub fn add_local_connections(routes: &mut NetRouteMap, nets: &BTreeMap<NetId, Net>) {
    for (id, route) in routes.iter_mut() {
        let Some(net) = nets.get(id) else {
            continue;
        };
        for pin in &net.pins {
            route.extend(local_stubs(pin));
        }
    }
}

/// Wire rectangles are the segment centerline grown by half the layer
/// width. Zero-length wires are dropped.
pub fn route_to_wire(db: &DesignDB, route: &GRoute) -> Wire {
    let shapes = route
        .iter()
        .filter_map(|seg| {
            if seg.is_via() {
                return Some(WireShape::Via {
                    bottom: seg.min_layer(),
                    at: seg.init_point(),
                });
            }
            if seg.is_zero_length() {
                return None;
            }
            let half = db.routing_layer(seg.init_layer).map_or(0, |l| l.width / 2);
            Some(WireShape::Segment {
                level: seg.init_layer,
                rect: Rect::new(seg.lo(), seg.hi()).bloat(half, half),
            })
        })
        .collect();
    Wire { shapes }
}

/// Installs a wire for every routed net that has no detailed route yet.
/// Existing wires are handed back for [`restore_wires`].
pub fn materialize(db: &mut DesignDB, routes: &NetRouteMap) -> Vec<(NetId, Option<Wire>)> {
    let mut replaced = Vec::new();
    for (&id, route) in routes {
        if db.nets[id.index()].detail_routed {
            continue;
        }
        let wire = route_to_wire(db, route);
        replaced.push((id, db.nets[id.index()].wire.take()));
        db.create_wire(id, wire);
    }
    replaced
}

pub fn restore_wires(db: &mut DesignDB, replaced: Vec<(NetId, Option<Wire>)>) {
    for (id, previous) in replaced {
        match previous {
            Some(wire) => db.create_wire(id, wire),
            None => db.destroy_wire(id),
        }
    }
}
