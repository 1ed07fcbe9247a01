//! Route guides: per-layer rectangles handed to detailed routing.

use crate::error::{Result, RouteError};
use crate::grid::{Grid, RoutingLayer};
use crate::route::GRoute;
use crate::route::NetRouteMap;
use groute_common::db::core::DesignDB;
use groute_common::geom::rect::Rect;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Maps route levels onto guide levels.
#[derive(Clone, Copy, Debug)]
pub struct GuideLayers {
    pub min_layer: usize,
    pub unidirectional: bool,
}

impl GuideLayers {
    fn map(&self, level: usize) -> usize {
        if level < self.min_layer && !self.unidirectional {
            self.min_layer
        } else {
            level
        }
    }
}

/// Guide boxes of one route. Overlapping boxes on one layer are merged
/// until a via breaks the run.
pub fn net_guides(net: &str, route: &GRoute, grid: &Grid, mapping: GuideLayers) -> Result<Vec<(usize, Rect)>> {
    let mut guides = Vec::new();
    let mut current: Option<(usize, Rect)> = None;

    for seg in route {
        if seg.is_via() {
            if seg.max_layer() - seg.min_layer() > 1 {
                return Err(RouteError::NonAdjacentVia {
                    net: net.to_string(),
                    from: seg.min_layer(),
                    to: seg.max_layer(),
                });
            }
            guides.extend(current.take());
            let b = grid.segment_box(seg.init_point(), seg.init_point());
            for level in [seg.min_layer(), seg.max_layer()] {
                let guide = (mapping.map(level), b);
                if guides.last() != Some(&guide) {
                    guides.push(guide);
                }
            }
            continue;
        }

        if seg.init_layer < mapping.min_layer && seg.is_diagonal() {
            return Err(RouteError::DiagonalSegment {
                net: net.to_string(),
                layer: seg.init_layer,
            });
        }
        let level = mapping.map(seg.init_layer);
        let b = grid.segment_box(seg.init_point(), seg.final_point());
        current = match current {
            Some((l, r)) if l == level && r.intersects(&b) => Some((l, r.merge(&b))),
            other => {
                guides.extend(other);
                Some((level, b))
            }
        };
    }
    guides.extend(current);
    Ok(guides)
}

/// Writes every non-empty route, nets sorted by name:
///
/// ```text
/// net_name
/// (
/// x1 y1 x2 y2 M1
/// )
/// ```
pub fn write_guides(
    path: &Path,
    db: &DesignDB,
    routes: &NetRouteMap,
    grid: &Grid,
    layers: &[RoutingLayer],
    mapping: GuideLayers,
) -> Result<usize> {
    let mut nets: Vec<_> = routes
        .iter()
        .filter(|(_, route)| !route.is_empty())
        .map(|(id, route)| (db.nets[id.index()].name.as_str(), route))
        .collect();
    nets.sort_by(|a, b| a.0.cmp(b.0));

    let layer_name = |level: usize| {
        layers
            .iter()
            .find(|l| l.index == level)
            .map_or_else(|| format!("L{}", level), |l| l.name.clone())
    };

    let mut out = BufWriter::new(File::create(path)?);
    for (name, route) in &nets {
        writeln!(out, "{}\n(", name)?;
        for (level, r) in net_guides(name, route, grid, mapping)? {
            writeln!(
                out,
                "{} {} {} {} {}",
                r.min.x,
                r.min.y,
                r.max.x,
                r.max.y,
                layer_name(level)
            )?;
        }
        writeln!(out, ")")?;
    }
    out.flush()?;
    log::info!("Wrote guides for {} nets to {}.", nets.len(), path.display());
    Ok(nets.len())
}
