use super::direction::Direction;
use crate::error::{Result, RouteError};
use groute_common::db::core::DesignDB;
use groute_common::db::tech::TrackAxis;

/// Routing level facts captured once per grid build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingLayer {
    /// 1-based routing level.
    pub index: usize,
    pub name: String,
    pub direction: Direction,
}

/// Track pattern along the preferred direction of one routing level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingTracks {
    pub layer: usize,
    pub track_pitch: i64,
    /// User line-to-via pitch, 0 when unset.
    pub line_to_via_pitch: i64,
    /// Coordinate of the first track.
    pub location: i64,
    pub num_tracks: u32,
    pub direction: Direction,
}

impl RoutingTracks {
    /// Pitch used for capacity: the larger of track and line-to-via pitch.
    pub fn use_pitch(&self) -> i64 {
        self.track_pitch.max(self.line_to_via_pitch)
    }

    pub fn last_location(&self) -> i64 {
        self.location + self.use_pitch() * (self.num_tracks.max(1) as i64 - 1)
    }
}

pub fn build_routing_layers(db: &DesignDB) -> Result<Vec<RoutingLayer>> {
    db.layers
        .iter()
        .map(|layer| {
            let direction = Direction::from_layer(layer.direction).ok_or_else(|| {
                RouteError::InvalidLayerDirection {
                    layer: layer.name.clone(),
                }
            })?;
            Ok(RoutingLayer {
                index: layer.level,
                name: layer.name.clone(),
                direction,
            })
        })
        .collect()
}

/// Collects the preferred-direction track pattern of levels `1..=max_layer`.
/// `layer_pitches` holds user line-to-via pitches in database units, indexed
/// by level.
pub fn build_routing_tracks(
    db: &DesignDB,
    layers: &[RoutingLayer],
    max_layer: usize,
    layer_pitches: &[i64],
) -> Result<Vec<RoutingTracks>> {
    let mut all = Vec::with_capacity(max_layer);
    for layer in layers.iter().take_while(|l| l.index <= max_layer) {
        let axis = match layer.direction {
            Direction::Horizontal => TrackAxis::Y,
            Direction::Vertical => TrackAxis::X,
        };
        let def = db
            .tracks_for_layer(&layer.name)
            .into_iter()
            .find(|t| t.axis == axis)
            .ok_or_else(|| RouteError::MissingTracks {
                layer: layer.name.clone(),
            })?;
        all.push(RoutingTracks {
            layer: layer.index,
            track_pitch: def.step,
            line_to_via_pitch: layer_pitches.get(layer.index).copied().unwrap_or(0),
            location: def.start,
            num_tracks: def.num_tracks,
            direction: layer.direction,
        });
    }
    if all.len() < max_layer {
        return Err(RouteError::InvalidLayerRange {
            min: 1,
            max: max_layer,
            num_layers: all.len(),
        });
    }
    Ok(all)
}

/// Highest level that still carries a track pattern.
pub fn max_layer_with_tracks(db: &DesignDB) -> usize {
    db.layers
        .iter()
        .take_while(|l| !db.tracks_for_layer(&l.name).is_empty())
        .count()
}
