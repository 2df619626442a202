//! Waypoint Telemetry - structured logging for the API server.

pub mod tracer;

pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
