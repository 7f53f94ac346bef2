use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use validator_metrics::{
    EpochInfo, ExporterConfig, Instrument, MetricsExporter, ServerError, ServerState, Tracer,
};

const NETWORK: &str = "SN_SEPOLIA";

async fn spawn_exporter() -> (
    Arc<MetricsExporter>,
    SocketAddr,
    JoinHandle<Result<(), ServerError>>,
) {
    let config = ExporterConfig::new("127.0.0.1:0", NETWORK);
    let exporter = Arc::new(MetricsExporter::new(&config).expect("exporter"));

    let handle = tokio::spawn({
        let exporter = Arc::clone(&exporter);
        async move { exporter.start().await }
    });
    let addr = exporter.listening().await.expect("server should bind");

    (exporter, addr, handle)
}

async fn shutdown(exporter: &MetricsExporter, handle: JoinHandle<Result<(), ServerError>>) {
    exporter
        .stop(Duration::from_secs(5))
        .await
        .expect("graceful stop");
    handle.await.expect("server task").expect("server result");
}

#[tokio::test]
async fn health_returns_ok() {
    let (exporter, addr, handle) = spawn_exporter().await;

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    shutdown(&exporter, handle).await;
}

#[tokio::test]
async fn metrics_lists_every_instrument_with_network_label() {
    let (exporter, addr, handle) = spawn_exporter().await;

    let response = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain; version=0.0.4"));

    let body = response.text().await.unwrap();
    for instrument in Instrument::ALL {
        let prefix = format!("{}{{network=\"{NETWORK}\"}} ", instrument.name());
        assert!(
            body.lines().any(|line| line.starts_with(&prefix)),
            "no series for {}",
            instrument.name()
        );
        assert!(body.contains(&format!("# TYPE {} ", instrument.name())));
    }

    shutdown(&exporter, handle).await;
}

#[tokio::test]
async fn metrics_reflect_recorded_values() {
    let (exporter, addr, handle) = spawn_exporter().await;

    exporter.update_latest_block_number(812_345);
    exporter.update_epoch_info(&EpochInfo::new(5, 10, 100), 103);
    exporter.update_signer_balance(-2.5);
    exporter.record_attestation_submitted();
    exporter.record_attestation_confirmed();
    exporter.record_signer_balance_below_threshold();
    exporter.record_signer_balance_above_threshold();

    let body = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    for expected in [
        "latest_block_number{network=\"SN_SEPOLIA\"} 812345",
        "current_epoch_id{network=\"SN_SEPOLIA\"} 5",
        "current_epoch_length{network=\"SN_SEPOLIA\"} 10",
        "current_epoch_starting_block_number{network=\"SN_SEPOLIA\"} 100",
        "current_epoch_assigned_block_number{network=\"SN_SEPOLIA\"} 103",
        "signer_balance{network=\"SN_SEPOLIA\"} -2.5",
        "attestation_submitted_count{network=\"SN_SEPOLIA\"} 1",
        "attestation_confirmed_count{network=\"SN_SEPOLIA\"} 1",
        "attestation_failure_count{network=\"SN_SEPOLIA\"} 0",
        "signer_balance_below_threshold{network=\"SN_SEPOLIA\"} 0",
    ] {
        assert!(
            body.lines().any(|line| line == expected),
            "missing line {expected:?}"
        );
    }

    shutdown(&exporter, handle).await;
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let (exporter, addr, handle) = spawn_exporter().await;

    let response = reqwest::get(format!("http://{addr}/status")).await.unwrap();
    assert_eq!(response.status(), 404);

    shutdown(&exporter, handle).await;
}

#[tokio::test]
async fn stop_is_bounded_by_deadline_with_stalled_request() {
    let (exporter, addr, handle) = spawn_exporter().await;

    // Request headers never complete, so the connection never drains
    let mut stalled = TcpStream::connect(addr).await.unwrap();
    stalled
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let deadline = Duration::from_millis(200);
    let started = Instant::now();
    let result = exporter.stop(deadline).await;
    let elapsed = started.elapsed();

    assert!(elapsed < deadline + Duration::from_secs(1), "stop took {elapsed:?}");
    assert!(
        matches!(result, Err(ServerError::ShutdownTimeout(d)) if d == deadline),
        "expected shutdown timeout, got {result:?}"
    );

    let joined = tokio::time::timeout(Duration::from_secs(1), handle).await;
    assert!(joined.is_ok(), "start() did not return after stop");
    assert_eq!(exporter.state(), ServerState::Stopped);

    // New connections are refused once stopped
    assert!(TcpStream::connect(addr).await.is_err());
    drop(stalled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_recording_and_scraping() {
    const WRITERS: usize = 8;
    const ROUNDS: usize = 250;

    let (exporter, addr, handle) = spawn_exporter().await;

    let mut writers = Vec::new();
    for writer in 0..WRITERS {
        let tracer: Arc<dyn Tracer> = Arc::clone(&exporter) as Arc<dyn Tracer>;
        writers.push(tokio::task::spawn_blocking(move || {
            for round in 0..ROUNDS {
                tracer.record_attestation_submitted();
                tracer.record_attestation_failure();
                tracer.record_attestation_confirmed();
                tracer.update_latest_block_number((writer * ROUNDS + round) as u64);
                tracer.update_signer_balance(round as f64);
            }
        }));
    }

    let scraper = tokio::spawn(async move {
        let client = reqwest::Client::new();
        for _ in 0..20 {
            let response = client
                .get(format!("http://{addr}/metrics"))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
            let body = response.text().await.unwrap();
            assert!(body.contains("attestation_submitted_count{network=\"SN_SEPOLIA\"}"));
        }
    });

    for writer in writers {
        writer.await.unwrap();
    }
    scraper.await.unwrap();

    let expected = (WRITERS * ROUNDS) as f64;
    let registry = exporter.registry();
    assert_eq!(registry.get(Instrument::AttestationSubmittedCount), expected);
    assert_eq!(registry.get(Instrument::AttestationFailureCount), expected);
    assert_eq!(registry.get(Instrument::AttestationConfirmedCount), expected);

    let block = registry.get(Instrument::LatestBlockNumber);
    assert!(block >= 0.0 && block < expected);

    shutdown(&exporter, handle).await;
}
