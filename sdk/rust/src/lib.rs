//! Typed client for the dice gateway.

pub mod client;

pub use client::{BatchResponse, ErrorResponse, GatewayClient, RollResponse, SdkError};
