//! Turns raw core output into guide-ready routes.

use crate::error::{Result, RouteError};
use crate::net::Net;
use crate::route::{GRoute, GSegment, NetRouteMap};
use groute_common::db::indices::NetId;

/// Fails on any via that skips a layer.
pub fn check_via_spans(routes: &NetRouteMap, name_of: impl Fn(&NetId) -> String) -> Result<()> {
    for (id, route) in routes {
        if let Some(seg) = route.iter().find(|s| s.max_layer() - s.min_layer() > 1) {
            return Err(RouteError::NonAdjacentVia {
                net: name_of(id),
                from: seg.min_layer(),
                to: seg.max_layer(),
            });
        }
    }
    Ok(())
}

/// Via stack for a net the core left unrouted because all its pins share
/// one tile.
pub fn add_local_guides(
    net: &Net,
    route: &mut GRoute,
    min_layer: usize,
    max_layer: usize,
    fix_layer: usize,
) -> Result<()> {
    let Some(first) = net.pins.first() else {
        return Ok(());
    };
    if net.pins.iter().any(|p| p.access != first.access) {
        return Err(RouteError::NetNotCovered {
            net: net.name.clone(),
        });
    }

    let mut last_layer = net.max_pin_layer();
    if last_layer == max_layer {
        last_layer -= 1;
    }
    let start = min_layer.saturating_sub(fix_layer).max(1);
    for layer in start..=last_layer {
        route.push(GSegment::via(first.access, layer, layer + 1));
    }
    Ok(())
}

/// Connects every pin above the first level to its closest touching wire
/// with a via stack, dropping vias under the wires that only dangle.
pub fn add_pin_access(net: &Net, route: &mut GRoute) {
    for pin in net.pins.iter().filter(|p| p.top_layer() > 1) {
        let at = pin.access;
        let top = pin.top_layer();
        let cover: Vec<usize> = route
            .iter()
            .filter(|s| !s.is_zero_length() && (s.init_point() == at || s.final_point() == at))
            .map(|s| s.init_layer)
            .collect();
        let Some(&wire_layer) = cover.iter().min() else {
            continue;
        };

        let lower_pin_here = net
            .pins
            .iter()
            .any(|other| other.on_grid == at && other.top_layer() < top);
        if !lower_pin_here {
            route.retain(|s| {
                !(s.is_zero_length()
                    && s.init_point() == at
                    && (s.init_layer < wire_layer || s.final_layer < wire_layer))
            });
        }

        let mut closest = cover[0];
        for &layer in &cover[1..] {
            let (d, best) = (layer.abs_diff(top), closest.abs_diff(top));
            if d < best || (d == best && layer > closest) {
                closest = layer;
            }
        }

        let (lo, hi) = (closest.min(top), closest.max(top));
        for layer in lo..hi {
            let exists = route.iter().any(|s| {
                s.is_via()
                    && s.init_point() == at
                    && s.min_layer() == layer
                    && s.max_layer() == layer + 1
            });
            if !exists {
                route.push(GSegment::via(at, layer, layer + 1));
            }
        }
    }
}
