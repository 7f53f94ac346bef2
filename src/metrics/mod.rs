//! Prometheus metrics for the attesting validator.
//!
//! All instruments carry a single `network` label bound to the chain id.
//!
//! # Metrics Exposed
//!
//! ## Chain and Epoch
//! - `latest_block_number` - Highest block observed
//! - `current_epoch_id` - Active epoch identifier
//! - `current_epoch_length` - Blocks in the active epoch
//! - `current_epoch_starting_block_number` - First block of the active epoch
//! - `current_epoch_assigned_block_number` - Block to attest in this epoch
//!
//! ## Attestations
//! - `last_attestation_timestamp_seconds` - Unix time of the last submission
//! - `attestation_submitted_count` - Submissions since startup
//! - `attestation_failure_count` - Failed submissions since startup
//! - `attestation_confirmed_count` - Confirmations since startup
//!
//! ## Signer
//! - `signer_balance` - Signer account balance
//! - `signer_balance_below_threshold` - 1 while the balance is below threshold
//!
//! # Example
//!
//! ```no_run
//! use validator_metrics::metrics::{MetricsRecorder, MetricsRegistry};
//! use validator_metrics::{EpochInfo, Tracer};
//!
//! let registry = MetricsRegistry::new("SN_SEPOLIA").expect("Failed to create registry");
//! let recorder = MetricsRecorder::new(registry);
//!
//! recorder.update_latest_block_number(120);
//! recorder.update_epoch_info(&EpochInfo::new(5, 10, 100), 103);
//! recorder.record_attestation_submitted();
//! ```

mod recorder;
mod registry;
mod server;

pub use recorder::{MetricsRecorder, NoopTracer, Tracer};
pub use registry::{Instrument, InstrumentKind, MetricsError, MetricsRegistry, NETWORK_LABEL};
pub use server::{router, MetricsServer, ServerError, ServerState};
