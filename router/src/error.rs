use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("missing track pattern for routing layer {layer}")]
    MissingTracks { layer: String },
    #[error("routing layer {layer} has no preferred direction")]
    InvalidLayerDirection { layer: String },
    #[error("design without nets")]
    NoNets,
    #[error("{kind} {rect} on layer {layer} is outside the die area")]
    OutsideDie {
        kind: &'static str,
        layer: usize,
        rect: String,
    },
    #[error("net {net} has a segment spanning non-adjacent layers {from} and {to}")]
    NonAdjacentVia { net: String, from: usize, to: usize },
    #[error("net {net} has a diagonal segment on blocked layer {layer}")]
    DiagonalSegment { net: String, layer: usize },
    #[error("net {net} needs no routing but its pins snap to different tiles")]
    NetNotCovered { net: String },
    #[error("port {port} has no routing shapes")]
    PortWithoutShapes { port: String },
    #[error("invalid pin placement")]
    InvalidPinPlacement,
    #[error("routing layer range {min}..={max} is invalid for {num_layers} layers")]
    InvalidLayerRange {
        min: usize,
        max: usize,
        num_layers: usize,
    },
    #[error("global routing has not been run")]
    GridNotInitialized,
    #[error("diode master {0} not found")]
    MissingDiodeMaster(String),
    #[error("diode master {master} has no pin {pin}")]
    DiodePinMissing { master: String, pin: String },
    #[error(transparent)]
    Db(#[from] groute_common::db::DbError),
    #[error("placement legalization failed")]
    Legalization(#[source] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RouteError>;
