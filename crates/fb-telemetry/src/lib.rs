//! Observability bootstrap for fleetboard services.
//!
//! Structured logging rides on the `tracing` ecosystem; every other crate in
//! the workspace emits events and spans and this crate decides where they go.

pub mod logging;

pub use logging::{init, LogConfig, LogFormat};
