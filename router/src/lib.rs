//! Capacitated-grid global router: tiles the die, derives per-edge track
//! capacities, routes nets with a negotiated-congestion maze core and
//! exports guides, congestion and RC estimates.

pub mod algo;
pub mod antenna;
pub mod core;
pub mod error;
pub mod global_router;
pub mod grid;
pub mod guides;
pub mod net;
pub mod rc;
pub mod report;
pub mod route;

#[cfg(test)]
mod fixtures;

pub use error::{Result, RouteError};
pub use global_router::GlobalRouter;
