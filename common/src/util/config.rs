use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub global_routing: GlobalRoutingConfig,
    #[serde(default)]
    pub antenna: AntennaConfig,
    #[serde(default)]
    pub legalization: LegalizationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            global_routing: GlobalRoutingConfig::default(),
            antenna: AntennaConfig::default(),
            legalization: LegalizationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayerAdjustment {
    pub layer: usize,
    /// Fraction of the capacity removed, 0.0 to 1.0.
    pub reduction: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegionAdjustment {
    pub layer: usize,
    /// Region in microns: [min_x, min_y, max_x, max_y].
    pub area: [f64; 4],
    pub reduction: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayerPitch {
    pub layer: usize,
    /// Line-to-via pitch in microns.
    pub pitch: f64,
}

/// Extra cost added to every unit step on a routing layer.
#[derive(Debug, Deserialize, Clone)]
pub struct LayerCost {
    pub layer: usize,
    pub cost: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalRoutingConfig {
    #[serde(default = "default_pitches_in_tile")]
    pub pitches_in_tile: i64,
    #[serde(default = "default_min_routing_layer")]
    pub min_routing_layer: usize,
    /// Defaults to the highest layer with tracks.
    #[serde(default)]
    pub max_routing_layer: Option<usize>,
    #[serde(default)]
    pub clock_min_layer: Option<usize>,
    #[serde(default)]
    pub clock_max_layer: Option<usize>,
    #[serde(default)]
    pub unidirectional: bool,
    #[serde(default)]
    pub adjustment: f64,
    #[serde(default)]
    pub layer_adjustments: Vec<LayerAdjustment>,
    #[serde(default)]
    pub region_adjustments: Vec<RegionAdjustment>,
    #[serde(default)]
    pub layer_pitches: Vec<LayerPitch>,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub net_alpha: HashMap<String, f64>,
    #[serde(default)]
    pub layer_costs: Vec<LayerCost>,
    #[serde(default = "default_overflow_iterations")]
    pub overflow_iterations: usize,
    #[serde(default = "default_gcells_offset")]
    pub gcells_offset: i64,
    #[serde(default)]
    pub macro_extension: i64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_gr_history_increment")]
    pub history_increment: f64,
    #[serde(default = "default_gr_initial_penalty")]
    pub initial_penalty: f64,
    #[serde(default = "default_gr_penalty_multiplier")]
    pub penalty_multiplier: f64,
    #[serde(default = "default_gr_heuristic")]
    pub heuristic_weight: f64,
    #[serde(default = "default_gr_margin")]
    pub margin: u32,
    #[serde(default)]
    pub congestion_report: Option<String>,
}

impl Default for GlobalRoutingConfig {
    fn default() -> Self {
        Self {
            pitches_in_tile: default_pitches_in_tile(),
            min_routing_layer: default_min_routing_layer(),
            max_routing_layer: None,
            clock_min_layer: None,
            clock_max_layer: None,
            unidirectional: false,
            adjustment: 0.0,
            layer_adjustments: Vec::new(),
            region_adjustments: Vec::new(),
            layer_pitches: Vec::new(),
            alpha: default_alpha(),
            net_alpha: HashMap::new(),
            layer_costs: Vec::new(),
            overflow_iterations: default_overflow_iterations(),
            gcells_offset: default_gcells_offset(),
            macro_extension: 0,
            seed: 0,
            history_increment: default_gr_history_increment(),
            initial_penalty: default_gr_initial_penalty(),
            penalty_multiplier: default_gr_penalty_multiplier(),
            heuristic_weight: default_gr_heuristic(),
            margin: default_gr_margin(),
            congestion_report: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AntennaConfig {
    #[serde(default = "default_antenna_enabled")]
    pub enabled: bool,
    #[serde(default = "default_diode_cell")]
    pub diode_cell: String,
    #[serde(default = "default_diode_pin")]
    pub diode_pin: String,
    #[serde(default = "default_max_diode_count")]
    pub max_diode_count_per_gate: usize,
    #[serde(default = "default_legalize_retries")]
    pub legalize_retries: usize,
    /// Percentage subtracted from every ratio limit.
    #[serde(default)]
    pub ratio_margin: f64,
}

impl Default for AntennaConfig {
    fn default() -> Self {
        Self {
            enabled: default_antenna_enabled(),
            diode_cell: default_diode_cell(),
            diode_pin: default_diode_pin(),
            max_diode_count_per_gate: default_max_diode_count(),
            legalize_retries: default_legalize_retries(),
            ratio_margin: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LegalizationConfig {
    /// Free sites required on each side of an instance.
    #[serde(default)]
    pub pad_left: i64,
    #[serde(default)]
    pub pad_right: i64,
    #[serde(default = "default_search_radius")]
    pub search_radius: usize,
}

impl Default for LegalizationConfig {
    fn default() -> Self {
        Self {
            pad_left: 0,
            pad_right: 0,
            search_radius: default_search_radius(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_lef_files")]
    pub lef_files: Vec<String>,
    #[serde(default = "default_def_file")]
    pub def_file: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            lef_files: default_lef_files(),
            def_file: default_def_file(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_guide_file")]
    pub guide_file: String,
    #[serde(default = "default_output_def")]
    pub output_def: String,
    #[serde(default = "default_rc_report")]
    pub rc_report: String,
    #[serde(default)]
    pub placement_image: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            guide_file: default_guide_file(),
            output_def: default_output_def(),
            rc_report: default_rc_report(),
            placement_image: None,
        }
    }
}

fn default_pitches_in_tile() -> i64 {
    15
}

fn default_min_routing_layer() -> usize {
    1
}

fn default_alpha() -> f64 {
    0.3
}

fn default_overflow_iterations() -> usize {
    50
}

fn default_gcells_offset() -> i64 {
    2
}

fn default_gr_history_increment() -> f64 {
    0.5
}

fn default_gr_initial_penalty() -> f64 {
    0.5
}

fn default_gr_penalty_multiplier() -> f64 {
    1.1
}

fn default_gr_heuristic() -> f64 {
    1.0
}

fn default_gr_margin() -> u32 {
    10
}

fn default_antenna_enabled() -> bool {
    true
}

fn default_diode_cell() -> String {
    "ANTENNA".to_string()
}

fn default_diode_pin() -> String {
    "A".to_string()
}

fn default_max_diode_count() -> usize {
    10
}

fn default_legalize_retries() -> usize {
    50
}

fn default_search_radius() -> usize {
    20
}

fn default_lef_files() -> Vec<String> {
    vec!["inputs/design.lef".to_string()]
}

fn default_def_file() -> String {
    "inputs/design.def".to_string()
}

fn default_guide_file() -> String {
    "output/route.guide".to_string()
}

fn default_output_def() -> String {
    "output/repaired.def".to_string()
}

fn default_rc_report() -> String {
    "output/rc.rpt".to_string()
}
