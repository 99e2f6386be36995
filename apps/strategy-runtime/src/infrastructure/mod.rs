//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports, plus process-level
//! concerns (configuration, tracing, metrics, interrupts).

/// Environment settings and the runtime INI file.
pub mod config;

/// Simulated market feed.
pub mod feed;

/// In-memory data registry.
pub mod memory;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Interrupt handling.
pub mod signal;

/// Tracing subscriber and optional OpenTelemetry export.
pub mod telemetry;
