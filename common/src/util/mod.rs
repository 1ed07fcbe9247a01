pub mod check;
pub mod config;
pub mod logger;
pub mod profiler;
pub mod visualization;
