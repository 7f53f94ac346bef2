//! Recorder API translating validator events into instrument updates.

use chrono::Utc;
use tracing::{debug, warn};

use super::registry::MetricsRegistry;
use crate::epoch::EpochInfo;

/// Sink for validator telemetry events.
///
/// Every method is infallible and non-blocking. Gauge updates overwrite the
/// previous value; counter updates add exactly one.
pub trait Tracer: Send + Sync {
    /// Records the highest block observed on chain.
    fn update_latest_block_number(&self, block_number: u64);

    /// Records the active epoch and the block assigned for attestation.
    fn update_epoch_info(&self, epoch: &EpochInfo, assigned_block: u64);

    /// Records the signer account balance.
    fn update_signer_balance(&self, balance: f64);

    /// Counts a submitted attestation and stamps the submission time.
    fn record_attestation_submitted(&self);

    /// Counts a failed attestation submission.
    fn record_attestation_failure(&self);

    /// Counts an attestation confirmed on chain.
    fn record_attestation_confirmed(&self);

    /// Clears the low-balance flag.
    fn record_signer_balance_above_threshold(&self);

    /// Raises the low-balance flag.
    fn record_signer_balance_below_threshold(&self);
}

/// Tracer that discards everything, for running with metrics disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn update_latest_block_number(&self, _block_number: u64) {}
    fn update_epoch_info(&self, _epoch: &EpochInfo, _assigned_block: u64) {}
    fn update_signer_balance(&self, _balance: f64) {}
    fn record_attestation_submitted(&self) {}
    fn record_attestation_failure(&self) {}
    fn record_attestation_confirmed(&self) {}
    fn record_signer_balance_above_threshold(&self) {}
    fn record_signer_balance_below_threshold(&self) {}
}

/// [`Tracer`] backed by a [`MetricsRegistry`].
#[derive(Clone)]
pub struct MetricsRecorder {
    registry: MetricsRegistry,
    max_signer_balance: Option<f64>,
}

impl MetricsRecorder {
    /// Creates a recorder that records balances as given.
    pub fn new(registry: MetricsRegistry) -> Self {
        Self {
            registry,
            max_signer_balance: None,
        }
    }

    /// Caps recorded signer balances at `ceiling`.
    pub fn with_balance_ceiling(mut self, ceiling: Option<f64>) -> Self {
        self.max_signer_balance = ceiling;
        self
    }

    /// Returns the registry this recorder writes to.
    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    fn network(&self) -> &str {
        self.registry.network()
    }
}

impl Tracer for MetricsRecorder {
    fn update_latest_block_number(&self, block_number: u64) {
        debug!(network = self.network(), block_number, "UpdateLatestBlockNumber");
        self.registry
            .instruments()
            .latest_block_number
            .set(block_number as f64);
    }

    fn update_epoch_info(&self, epoch: &EpochInfo, assigned_block: u64) {
        debug!(
            network = self.network(),
            epoch_id = epoch.epoch_id,
            epoch_length = epoch.epoch_length,
            starting_block = epoch.starting_block,
            assigned_block,
            "UpdateEpochInfo"
        );
        let i = self.registry.instruments();
        i.current_epoch_id.set(epoch.epoch_id as f64);
        i.current_epoch_length.set(epoch.epoch_length as f64);
        i.current_epoch_starting_block_number
            .set(epoch.starting_block as f64);
        i.current_epoch_assigned_block_number
            .set(assigned_block as f64);
    }

    fn update_signer_balance(&self, balance: f64) {
        debug!(network = self.network(), balance, "UpdateSignerBalance");
        let recorded = match self.max_signer_balance {
            Some(ceiling) if balance > ceiling => {
                warn!(
                    network = self.network(),
                    balance,
                    ceiling,
                    "Signer balance above configured ceiling, recording ceiling"
                );
                ceiling
            }
            _ => balance,
        };
        self.registry.instruments().signer_balance.set(recorded);
    }

    fn record_attestation_submitted(&self) {
        debug!(network = self.network(), "RecordAttestationSubmitted");
        let i = self.registry.instruments();
        i.attestation_submitted_count.inc();
        i.last_attestation_timestamp_seconds
            .set(Utc::now().timestamp() as f64);
    }

    fn record_attestation_failure(&self) {
        debug!(network = self.network(), "RecordAttestationFailure");
        self.registry.instruments().attestation_failure_count.inc();
    }

    fn record_attestation_confirmed(&self) {
        debug!(network = self.network(), "RecordAttestationConfirmed");
        self.registry.instruments().attestation_confirmed_count.inc();
    }

    fn record_signer_balance_above_threshold(&self) {
        debug!(network = self.network(), "RecordSignerBalanceAboveThreshold");
        self.registry
            .instruments()
            .signer_balance_below_threshold
            .set(0.0);
    }

    fn record_signer_balance_below_threshold(&self) {
        debug!(network = self.network(), "RecordSignerBalanceBelowThreshold");
        self.registry
            .instruments()
            .signer_balance_below_threshold
            .set(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Instrument;
    use proptest::prelude::*;

    fn recorder() -> MetricsRecorder {
        MetricsRecorder::new(MetricsRegistry::new("SN_SEPOLIA").unwrap())
    }

    #[test]
    fn test_latest_block_number_extremes() {
        let recorder = recorder();

        recorder.update_latest_block_number(0);
        assert_eq!(recorder.registry().get(Instrument::LatestBlockNumber), 0.0);

        // 2^53 is the largest block height an f64 gauge holds exactly
        recorder.update_latest_block_number(1 << 53);
        let output = recorder.registry().encode().unwrap();
        assert!(output.contains("latest_block_number{network=\"SN_SEPOLIA\"} 9007199254740992"));

        recorder.update_latest_block_number(u64::MAX);
        assert_eq!(
            recorder.registry().get(Instrument::LatestBlockNumber),
            u64::MAX as f64
        );
    }

    #[test]
    fn test_epoch_info_sets_all_gauges() {
        let recorder = recorder();
        recorder.update_epoch_info(&EpochInfo::new(5, 10, 100), 103);

        let registry = recorder.registry();
        assert_eq!(registry.get(Instrument::CurrentEpochId), 5.0);
        assert_eq!(registry.get(Instrument::CurrentEpochLength), 10.0);
        assert_eq!(registry.get(Instrument::CurrentEpochStartingBlockNumber), 100.0);
        assert_eq!(registry.get(Instrument::CurrentEpochAssignedBlockNumber), 103.0);
    }

    #[test]
    fn test_submitted_stamps_timestamp() {
        let recorder = recorder();

        let before = Utc::now().timestamp() as f64;
        recorder.record_attestation_submitted();
        let after = Utc::now().timestamp() as f64;

        let stamped = recorder
            .registry()
            .get(Instrument::LastAttestationTimestampSeconds);
        assert!(stamped >= before && stamped <= after);

        // Overwritten, not accumulated
        recorder.record_attestation_submitted();
        let restamped = recorder
            .registry()
            .get(Instrument::LastAttestationTimestampSeconds);
        assert!(restamped >= stamped && restamped <= Utc::now().timestamp() as f64);
        assert_eq!(
            recorder.registry().get(Instrument::AttestationSubmittedCount),
            2.0
        );
    }

    #[test]
    fn test_threshold_flag_last_write_wins() {
        let recorder = recorder();
        recorder.record_signer_balance_below_threshold();
        assert_eq!(
            recorder.registry().get(Instrument::SignerBalanceBelowThreshold),
            1.0
        );

        recorder.record_signer_balance_below_threshold();
        recorder.record_signer_balance_above_threshold();
        assert_eq!(
            recorder.registry().get(Instrument::SignerBalanceBelowThreshold),
            0.0
        );
    }

    #[test]
    fn test_balance_recorded_as_given() {
        let recorder = recorder();
        recorder.update_signer_balance(-12.5);
        assert_eq!(recorder.registry().get(Instrument::SignerBalance), -12.5);

        recorder.update_signer_balance(1e30);
        assert_eq!(recorder.registry().get(Instrument::SignerBalance), 1e30);
    }

    #[test]
    fn test_balance_ceiling() {
        let recorder = recorder().with_balance_ceiling(Some(1000.0));

        recorder.update_signer_balance(250.0);
        assert_eq!(recorder.registry().get(Instrument::SignerBalance), 250.0);

        recorder.update_signer_balance(5000.0);
        assert_eq!(recorder.registry().get(Instrument::SignerBalance), 1000.0);

        recorder.update_signer_balance(-1.0);
        assert_eq!(recorder.registry().get(Instrument::SignerBalance), -1.0);
    }

    #[test]
    fn test_noop_tracer_is_usable_as_trait_object() {
        let tracer: Box<dyn Tracer> = Box::new(NoopTracer);
        tracer.record_attestation_submitted();
        tracer.update_epoch_info(&EpochInfo::default(), 0);
    }

    #[derive(Debug, Clone, Copy)]
    enum Event {
        Submitted,
        Failure,
        Confirmed,
    }

    fn event() -> impl Strategy<Value = Event> {
        prop_oneof![
            Just(Event::Submitted),
            Just(Event::Failure),
            Just(Event::Confirmed),
        ]
    }

    proptest! {
        #[test]
        fn counters_match_call_counts(events in prop::collection::vec(event(), 0..200)) {
            let recorder = recorder();
            let mut expected = (0u32, 0u32, 0u32);
            let mut last_total = 0.0;

            for event in &events {
                match event {
                    Event::Submitted => {
                        recorder.record_attestation_submitted();
                        expected.0 += 1;
                    }
                    Event::Failure => {
                        recorder.record_attestation_failure();
                        expected.1 += 1;
                    }
                    Event::Confirmed => {
                        recorder.record_attestation_confirmed();
                        expected.2 += 1;
                    }
                }

                let registry = recorder.registry();
                let total = registry.get(Instrument::AttestationSubmittedCount)
                    + registry.get(Instrument::AttestationFailureCount)
                    + registry.get(Instrument::AttestationConfirmedCount);
                prop_assert_eq!(total, last_total + 1.0);
                last_total = total;
            }

            let registry = recorder.registry();
            prop_assert_eq!(registry.get(Instrument::AttestationSubmittedCount), f64::from(expected.0));
            prop_assert_eq!(registry.get(Instrument::AttestationFailureCount), f64::from(expected.1));
            prop_assert_eq!(registry.get(Instrument::AttestationConfirmedCount), f64::from(expected.2));
        }
    }
}
