//! Outcome telemetry for the retraining feedback loop.
//!
//! This crate provides:
//! - `TelemetrySink` trait for pluggable delivery channels
//! - Webhook (HTTP) and external-program sink implementations
//! - `TelemetryFeedback`, the best-effort reporter used by the workflow

pub mod command;
pub mod feedback;
pub mod traits;
pub mod webhook;

pub use command::ProcessSink;
pub use feedback::TelemetryFeedback;
pub use traits::{TelemetryError, TelemetrySink};
pub use webhook::WebhookSink;
