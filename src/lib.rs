//! Validator Metrics Library
//!
//! Telemetry for an attesting blockchain validator. The validator's event
//! loop reports chain height, epoch progress, attestation outcomes and
//! signer balance through the [`Tracer`] API; a Prometheus collector pulls
//! the current values from `/metrics`.
//!
//! # Architecture
//!
//! ```text
//! validator loop → Tracer → MetricsRegistry ← /metrics ← collector
//!                                              /health  ← liveness probe
//! ```
//!
//! # Design Principles
//!
//! - **Fixed instrument set**: eleven instruments, registered once, one `network` label
//! - **Lock-free updates**: each instrument is atomic; snapshots are not cross-instrument consistent
//! - **Bounded shutdown**: `stop` never waits longer than its deadline
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use validator_metrics::{EpochInfo, ExporterConfig, MetricsExporter, Tracer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExporterConfig::new("127.0.0.1:9090", "SN_SEPOLIA");
//! let exporter = Arc::new(MetricsExporter::new(&config)?);
//!
//! let server = Arc::clone(&exporter);
//! let handle = tokio::spawn(async move { server.start().await });
//!
//! exporter.update_latest_block_number(1_024);
//! exporter.update_epoch_info(&EpochInfo::new(5, 10, 100), 103);
//! exporter.record_attestation_submitted();
//!
//! exporter.stop(Duration::from_secs(5)).await?;
//! handle.await??;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod epoch;
pub mod exporter;
pub mod metrics;

// Re-export commonly used types at crate root
pub use config::{ConfigError, DemoConfig, ExporterConfig, FileConfig};
pub use epoch::EpochInfo;
pub use exporter::{ExporterError, MetricsExporter};
pub use metrics::{
    Instrument, MetricsRecorder, MetricsRegistry, NoopTracer, ServerError, ServerState, Tracer,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
