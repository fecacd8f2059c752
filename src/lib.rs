//! Dice roll pipeline library.
//!
//! Three services (specification store, roll engine, gateway) and a traffic
//! simulator, with W3C trace context carried across every hop.

pub mod config;
pub mod dice;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod simulator;
pub mod specs;

pub use config::PipelineConfig;
pub use dice::{RollEngine, RollError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
