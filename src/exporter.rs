//! The validator's metrics exporter.
//!
//! [`MetricsExporter`] bundles the instrument registry, the recorder API,
//! and the exposition server behind one handle. Build one per process and
//! share it behind an [`Arc`](std::sync::Arc).

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::config::{ConfigError, ExporterConfig};
use crate::epoch::EpochInfo;
use crate::metrics::{
    MetricsError, MetricsRecorder, MetricsRegistry, MetricsServer, ServerError, ServerState,
    Tracer,
};

/// Errors raised while building the exporter.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Instrument registration failed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Registry, recorder and exposition server for one validator process.
pub struct MetricsExporter {
    recorder: MetricsRecorder,
    server: MetricsServer,
}

impl MetricsExporter {
    /// Validates `config` and registers every instrument.
    ///
    /// The server is not bound until [`start`](Self::start).
    pub fn new(config: &ExporterConfig) -> Result<Self, ExporterError> {
        config.validate()?;

        let registry = MetricsRegistry::new(config.chain_id.as_str())?;
        let recorder =
            MetricsRecorder::new(registry.clone()).with_balance_ceiling(config.max_signer_balance);
        let server = MetricsServer::new(config.server_address.as_str(), registry);

        Ok(Self { recorder, server })
    }

    /// Serves `/health` and `/metrics` until [`stop`](Self::stop) is called.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.server.start().await
    }

    /// Gracefully stops the server, waiting at most `deadline`.
    pub async fn stop(&self, deadline: Duration) -> Result<(), ServerError> {
        self.server.stop(deadline).await
    }

    /// Current server lifecycle state.
    pub fn state(&self) -> ServerState {
        self.server.state()
    }

    /// Bound listener address, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    /// Waits for the server to bind. See [`MetricsServer::listening`].
    pub async fn listening(&self) -> Option<SocketAddr> {
        self.server.listening().await
    }

    /// The instrument registry.
    pub fn registry(&self) -> &MetricsRegistry {
        self.recorder.registry()
    }
}

impl Tracer for MetricsExporter {
    fn update_latest_block_number(&self, block_number: u64) {
        self.recorder.update_latest_block_number(block_number);
    }

    fn update_epoch_info(&self, epoch: &EpochInfo, assigned_block: u64) {
        self.recorder.update_epoch_info(epoch, assigned_block);
    }

    fn update_signer_balance(&self, balance: f64) {
        self.recorder.update_signer_balance(balance);
    }

    fn record_attestation_submitted(&self) {
        self.recorder.record_attestation_submitted();
    }

    fn record_attestation_failure(&self) {
        self.recorder.record_attestation_failure();
    }

    fn record_attestation_confirmed(&self) {
        self.recorder.record_attestation_confirmed();
    }

    fn record_signer_balance_above_threshold(&self) {
        self.recorder.record_signer_balance_above_threshold();
    }

    fn record_signer_balance_below_threshold(&self) {
        self.recorder.record_signer_balance_below_threshold();
    }
}
