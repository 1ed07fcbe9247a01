use crate::geom::rect::Rect;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerDirection {
    Vertical,
    Horizontal,
    Unknown,
}

/// Piecewise-linear table, used for diffusion-dependent antenna ratios.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PwlTable {
    points: Vec<(f64, f64)>,
}

impl PwlTable {
    pub fn constant(value: f64) -> Self {
        Self {
            points: vec![(0.0, value)],
        }
    }

    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn value_at(&self, x: f64) -> f64 {
        let Some(&(first_x, first_y)) = self.points.first() else {
            return 0.0;
        };
        if x <= first_x || self.points.len() == 1 {
            return first_y;
        }
        for pair in self.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if x <= x1 {
                if x1 == x0 {
                    return y1;
                }
                return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
            }
        }
        self.points[self.points.len() - 1].1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AntennaRule {
    pub area_factor: f64,
    pub diff_area_factor: f64,
    pub par_ratio: f64,
    pub diff_par_ratio: PwlTable,
    pub minus_diff_factor: f64,
    pub plus_diff_factor: f64,
}

impl Default for AntennaRule {
    fn default() -> Self {
        Self {
            area_factor: 1.0,
            diff_area_factor: 1.0,
            par_ratio: 0.0,
            diff_par_ratio: PwlTable::default(),
            minus_diff_factor: 0.0,
            plus_diff_factor: 0.0,
        }
    }
}

impl AntennaRule {
    pub fn is_active(&self) -> bool {
        self.par_ratio > 0.0 || !self.diff_par_ratio.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct LayerData {
    pub name: String,
    /// 1-based routing level.
    pub level: usize,
    pub direction: LayerDirection,
    pub pitch: i64,
    pub width: i64,
    pub spacing: i64,
    /// Sheet resistance, ohm per square.
    pub resistance: f64,
    /// Area capacitance, pF per square micron.
    pub capacitance: f64,
    /// Edge capacitance, pF per micron.
    pub edge_capacitance: f64,
    pub antenna: AntennaRule,
}

impl LayerData {
    pub fn new(name: String, direction: LayerDirection, pitch: i64, width: i64) -> Self {
        Self {
            name,
            level: 0,
            direction,
            pitch,
            width,
            spacing: 0,
            resistance: 0.0,
            capacitance: 0.0,
            edge_capacitance: 0.0,
            antenna: AntennaRule::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CutLayerData {
    pub name: String,
    pub below_level: usize,
    /// Resistance of a single cut, ohm.
    pub resistance: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackAxis {
    /// Vertical lines at x = start + i * step.
    X,
    /// Horizontal lines at y = start + i * step.
    Y,
}

#[derive(Clone, Debug)]
pub struct TrackDef {
    pub layer: String,
    pub axis: TrackAxis,
    pub start: i64,
    pub num_tracks: u32,
    pub step: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterClass {
    Core,
    CoreAntennaCell,
    Pad,
    Block,
    Cover,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
    Inout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SigType {
    Signal,
    Clock,
    Power,
    Ground,
}

impl SigType {
    pub fn is_supply(&self) -> bool {
        matches!(self, SigType::Power | SigType::Ground)
    }
}

#[derive(Clone, Debug)]
pub struct MasterPin {
    pub name: String,
    pub direction: PinDirection,
    pub usage: SigType,
    /// (routing level, box relative to the master origin)
    pub shapes: Vec<(usize, Rect)>,
    /// Square microns.
    pub gate_area: f64,
    pub diff_area: f64,
}

#[derive(Clone, Debug)]
pub struct MasterData {
    pub name: String,
    pub class: MasterClass,
    pub width: i64,
    pub height: i64,
    pub pins: Vec<MasterPin>,
    pub obstructions: Vec<(usize, Rect)>,
}

impl MasterData {
    pub fn find_pin(&self, name: &str) -> Option<usize> {
        self.pins.iter().position(|p| p.name == name)
    }

    pub fn is_block(&self) -> bool {
        self.class == MasterClass::Block
    }

    pub fn is_pad(&self) -> bool {
        self.class == MasterClass::Pad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pwl_interpolates_and_clamps() {
        let table = PwlTable::new(vec![(1.0, 2000.0), (0.0, 400.0)]);
        assert_eq!(table.value_at(-1.0), 400.0);
        assert_eq!(table.value_at(0.5), 1200.0);
        assert_eq!(table.value_at(5.0), 2000.0);
        assert_eq!(PwlTable::constant(300.0).value_at(9.0), 300.0);
    }
}
