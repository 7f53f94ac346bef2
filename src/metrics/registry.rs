//! Instrument set and Prometheus registry.

use prometheus::{Counter, CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Label key attached to every instrument.
pub const NETWORK_LABEL: &str = "network";

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed in the prometheus crate.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Whether an instrument holds current state or a cumulative count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Value that can be overwritten with any number.
    Gauge,
    /// Value that only ever grows.
    Counter,
}

/// The fixed set of instruments exported by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    /// Highest chain block observed.
    LatestBlockNumber,
    /// Active epoch identifier.
    CurrentEpochId,
    /// Blocks in the active epoch.
    CurrentEpochLength,
    /// First block of the active epoch.
    CurrentEpochStartingBlockNumber,
    /// Block the validator must attest in this epoch.
    CurrentEpochAssignedBlockNumber,
    /// Unix time of the last successful submission.
    LastAttestationTimestampSeconds,
    /// Cumulative submissions.
    AttestationSubmittedCount,
    /// Cumulative submission failures.
    AttestationFailureCount,
    /// Cumulative on-chain confirmations.
    AttestationConfirmedCount,
    /// Signer account balance in native units.
    SignerBalance,
    /// 1 while the signer balance is below threshold, else 0.
    SignerBalanceBelowThreshold,
}

impl Instrument {
    /// Every instrument, in registration order.
    pub const ALL: [Instrument; 11] = [
        Instrument::LatestBlockNumber,
        Instrument::CurrentEpochId,
        Instrument::CurrentEpochLength,
        Instrument::CurrentEpochStartingBlockNumber,
        Instrument::CurrentEpochAssignedBlockNumber,
        Instrument::LastAttestationTimestampSeconds,
        Instrument::AttestationSubmittedCount,
        Instrument::AttestationFailureCount,
        Instrument::AttestationConfirmedCount,
        Instrument::SignerBalance,
        Instrument::SignerBalanceBelowThreshold,
    ];

    /// Exported metric name.
    pub const fn name(self) -> &'static str {
        match self {
            Instrument::LatestBlockNumber => "latest_block_number",
            Instrument::CurrentEpochId => "current_epoch_id",
            Instrument::CurrentEpochLength => "current_epoch_length",
            Instrument::CurrentEpochStartingBlockNumber => "current_epoch_starting_block_number",
            Instrument::CurrentEpochAssignedBlockNumber => "current_epoch_assigned_block_number",
            Instrument::LastAttestationTimestampSeconds => "last_attestation_timestamp_seconds",
            Instrument::AttestationSubmittedCount => "attestation_submitted_count",
            Instrument::AttestationFailureCount => "attestation_failure_count",
            Instrument::AttestationConfirmedCount => "attestation_confirmed_count",
            Instrument::SignerBalance => "signer_balance",
            Instrument::SignerBalanceBelowThreshold => "signer_balance_below_threshold",
        }
    }

    /// Help text shown in the exposition.
    pub const fn help(self) -> &'static str {
        match self {
            Instrument::LatestBlockNumber => "The latest block number seen by the validator",
            Instrument::CurrentEpochId => {
                "The ID of the current epoch the validator is participating in"
            }
            Instrument::CurrentEpochLength => "The total length (in blocks) of the current epoch",
            Instrument::CurrentEpochStartingBlockNumber => {
                "The first block number of the current epoch"
            }
            Instrument::CurrentEpochAssignedBlockNumber => {
                "The block number within the current epoch the validator is assigned to attest"
            }
            Instrument::LastAttestationTimestampSeconds => {
                "The Unix timestamp (in seconds) of the last successful attestation submission"
            }
            Instrument::AttestationSubmittedCount => {
                "The total number of attestations submitted by the validator since startup"
            }
            Instrument::AttestationFailureCount => {
                "The total number of attestation submission failures since startup"
            }
            Instrument::AttestationConfirmedCount => {
                "The total number of attestations confirmed on the network since startup"
            }
            Instrument::SignerBalance => {
                "The balance of the account that signs attestations, in native units"
            }
            Instrument::SignerBalanceBelowThreshold => {
                "Set to 1 if the signer account balance is below the configured threshold"
            }
        }
    }

    /// Gauge or counter.
    pub const fn kind(self) -> InstrumentKind {
        match self {
            Instrument::AttestationSubmittedCount
            | Instrument::AttestationFailureCount
            | Instrument::AttestationConfirmedCount => InstrumentKind::Counter,
            _ => InstrumentKind::Gauge,
        }
    }
}

/// Labelled series for every instrument, bound to one network.
///
/// Each field is the child series for the configured `network` value, so
/// updates never go through a label lookup and can't pick a different
/// label by mistake.
#[derive(Clone)]
pub(crate) struct Instruments {
    pub(crate) latest_block_number: Gauge,
    pub(crate) current_epoch_id: Gauge,
    pub(crate) current_epoch_length: Gauge,
    pub(crate) current_epoch_starting_block_number: Gauge,
    pub(crate) current_epoch_assigned_block_number: Gauge,
    pub(crate) last_attestation_timestamp_seconds: Gauge,
    pub(crate) attestation_submitted_count: Counter,
    pub(crate) attestation_failure_count: Counter,
    pub(crate) attestation_confirmed_count: Counter,
    pub(crate) signer_balance: Gauge,
    pub(crate) signer_balance_below_threshold: Gauge,
}

impl Instruments {
    /// Registers every instrument into `registry` under the given network.
    ///
    /// Fails if any name is already registered there.
    pub(crate) fn register(registry: &Registry, network: &str) -> Result<Self, MetricsError> {
        Ok(Self {
            latest_block_number: gauge(registry, Instrument::LatestBlockNumber, network)?,
            current_epoch_id: gauge(registry, Instrument::CurrentEpochId, network)?,
            current_epoch_length: gauge(registry, Instrument::CurrentEpochLength, network)?,
            current_epoch_starting_block_number: gauge(
                registry,
                Instrument::CurrentEpochStartingBlockNumber,
                network,
            )?,
            current_epoch_assigned_block_number: gauge(
                registry,
                Instrument::CurrentEpochAssignedBlockNumber,
                network,
            )?,
            last_attestation_timestamp_seconds: gauge(
                registry,
                Instrument::LastAttestationTimestampSeconds,
                network,
            )?,
            attestation_submitted_count: counter(
                registry,
                Instrument::AttestationSubmittedCount,
                network,
            )?,
            attestation_failure_count: counter(
                registry,
                Instrument::AttestationFailureCount,
                network,
            )?,
            attestation_confirmed_count: counter(
                registry,
                Instrument::AttestationConfirmedCount,
                network,
            )?,
            signer_balance: gauge(registry, Instrument::SignerBalance, network)?,
            signer_balance_below_threshold: gauge(
                registry,
                Instrument::SignerBalanceBelowThreshold,
                network,
            )?,
        })
    }
}

fn gauge(
    registry: &Registry,
    instrument: Instrument,
    network: &str,
) -> Result<Gauge, MetricsError> {
    debug_assert_eq!(instrument.kind(), InstrumentKind::Gauge);
    let vec = GaugeVec::new(
        Opts::new(instrument.name(), instrument.help()),
        &[NETWORK_LABEL],
    )?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec.get_metric_with_label_values(&[network])?)
}

fn counter(
    registry: &Registry,
    instrument: Instrument,
    network: &str,
) -> Result<Counter, MetricsError> {
    debug_assert_eq!(instrument.kind(), InstrumentKind::Counter);
    let vec = CounterVec::new(
        Opts::new(instrument.name(), instrument.help()),
        &[NETWORK_LABEL],
    )?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec.get_metric_with_label_values(&[network])?)
}

/// Prometheus registry holding the validator instrument set.
///
/// Membership is fixed at construction; only values change afterwards.
/// Cloning shares the same underlying series. Values are read-only from
/// outside the crate; all writes go through [`Tracer`](crate::Tracer):
///
/// ```compile_fail
/// let registry = validator_metrics::MetricsRegistry::new("SN_MAIN").unwrap();
/// registry.instruments().attestation_submitted_count.reset();
/// ```
///
/// ```compile_fail
/// let registry = validator_metrics::MetricsRegistry::new("SN_MAIN").unwrap();
/// let _ = registry.registry().unregister(todo!());
/// ```
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    network: String,
    instruments: Instruments,
}

impl MetricsRegistry {
    /// Creates a registry with all validator instruments registered under
    /// the given `network` label value.
    pub fn new(network: impl Into<String>) -> Result<Self, MetricsError> {
        let network = network.into();
        let registry = Registry::new();
        let instruments = Instruments::register(&registry, &network)?;

        tracing::debug!(
            network = %network,
            instruments = Instrument::ALL.len(),
            "Metrics registry initialized"
        );

        Ok(Self {
            registry,
            network,
            instruments,
        })
    }

    /// Network label value shared by every instrument.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Labelled series, for the recorder.
    pub(crate) fn instruments(&self) -> &Instruments {
        &self.instruments
    }

    /// Current value of one instrument.
    pub fn get(&self, instrument: Instrument) -> f64 {
        let i = &self.instruments;
        match instrument {
            Instrument::LatestBlockNumber => i.latest_block_number.get(),
            Instrument::CurrentEpochId => i.current_epoch_id.get(),
            Instrument::CurrentEpochLength => i.current_epoch_length.get(),
            Instrument::CurrentEpochStartingBlockNumber => {
                i.current_epoch_starting_block_number.get()
            }
            Instrument::CurrentEpochAssignedBlockNumber => {
                i.current_epoch_assigned_block_number.get()
            }
            Instrument::LastAttestationTimestampSeconds => {
                i.last_attestation_timestamp_seconds.get()
            }
            Instrument::AttestationSubmittedCount => i.attestation_submitted_count.get(),
            Instrument::AttestationFailureCount => i.attestation_failure_count.get(),
            Instrument::AttestationConfirmedCount => i.attestation_confirmed_count.get(),
            Instrument::SignerBalance => i.signer_balance.get(),
            Instrument::SignerBalanceBelowThreshold => i.signer_balance_below_threshold.get(),
        }
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
