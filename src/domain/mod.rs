//! Domain layer: pure data model and ports to external capabilities.

pub mod errors;
pub mod models;
pub mod ports;
