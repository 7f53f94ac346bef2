//! Validator Metrics CLI
//!
//! Runs the metrics exporter next to a simulated validator loop, for
//! trying out dashboards and scrape configs without a live chain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use validator_metrics::{DemoConfig, EpochInfo, FileConfig, MetricsExporter, Tracer};

/// Serve validator metrics fed by a simulated attestation loop.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to serve metrics on (host:port).
    #[arg(short, long)]
    listen: Option<String>,

    /// Chain id used as the `network` label.
    #[arg(long)]
    chain_id: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.metrics.server_address = listen;
    }
    if let Some(chain_id) = args.chain_id {
        config.metrics.chain_id = chain_id;
    }

    info!("Validator Metrics v{}", validator_metrics::VERSION);

    let exporter = match MetricsExporter::new(&config.metrics) {
        Ok(exporter) => Arc::new(exporter),
        Err(e) => {
            eprintln!("Failed to initialize metrics exporter: {}", e);
            std::process::exit(1);
        }
    };

    let server = tokio::spawn({
        let exporter = Arc::clone(&exporter);
        async move { exporter.start().await }
    });

    match exporter.listening().await {
        Some(addr) => info!("Serving metrics on http://{}/metrics", addr),
        None => {
            match server.await {
                Ok(Err(e)) => eprintln!("Metrics server failed: {}", e),
                Ok(Ok(())) => eprintln!("Metrics server exited before listening"),
                Err(e) => eprintln!("Metrics server task failed: {}", e),
            }
            std::process::exit(1);
        }
    }

    let demo = config.demo.clone();
    let validator = tokio::spawn(simulate_validator(
        Arc::clone(&exporter) as Arc<dyn Tracer>,
        demo.clone(),
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
    validator.abort();

    if let Err(e) = exporter
        .stop(Duration::from_millis(demo.shutdown_grace_ms))
        .await
    {
        warn!("Metrics server shutdown: {}", e);
    }
    match server.await {
        Ok(Ok(())) => info!("Done"),
        Ok(Err(e)) => error!("Metrics server error: {}", e),
        Err(e) => error!("Metrics server task failed: {}", e),
    }
}

/// Drives every recorder operation the way a validator would.
async fn simulate_validator(tracer: Arc<dyn Tracer>, demo: DemoConfig) {
    let epoch_length = demo.epoch_length.max(1);
    let mut interval = tokio::time::interval(Duration::from_millis(demo.block_interval_ms.max(1)));
    let mut balance = demo.initial_balance;
    let mut epoch = EpochInfo::new(0, epoch_length, 0);
    let mut pending_confirmation = false;

    for block in 0u64.. {
        interval.tick().await;
        tracer.update_latest_block_number(block);

        if !epoch.contains(block) {
            epoch = EpochInfo::new(epoch.epoch_id + 1, epoch_length, epoch.ending_block());
        }
        // Attest a fixed distance into each epoch
        let assigned = epoch.starting_block + epoch_length / 3;
        tracer.update_epoch_info(&epoch, assigned);

        if pending_confirmation {
            tracer.record_attestation_confirmed();
            pending_confirmation = false;
        }

        if block == assigned {
            // Every fifth epoch the submission fails
            if epoch.epoch_id % 5 == 4 {
                tracer.record_attestation_failure();
            } else {
                tracer.record_attestation_submitted();
                pending_confirmation = true;
                balance -= 0.05;
                tracer.update_signer_balance(balance);
            }

            if balance < demo.balance_threshold {
                tracer.record_signer_balance_below_threshold();
            } else {
                tracer.record_signer_balance_above_threshold();
            }
        }
    }
}
