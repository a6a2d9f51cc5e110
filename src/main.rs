//! Log ingestion gateway
//!
//! # Architecture
//! - **ingest**: HTTP and UDP front ends
//! - **core**: Message and payload codecs
//! - **broker**: Kafka producer and partitioner
//! - **infrastructure**: Worker pool, config, logging, stats, shutdown

use anyhow::Context;
use clap::Parser;
use log_gateway::broker::KafkaProducer;
use log_gateway::infrastructure::logging::init_logging;
use log_gateway::infrastructure::pid::{create_pid_file, ProcessIdentity};
use log_gateway::infrastructure::shutdown::{listen_signals, Coordinator, ShutdownOutcome};
use log_gateway::{log_main, Config, Gateway};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "log-gateway", version)]
#[command(about = "Relays HTTP and UDP log records to Kafka")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "APP_CONF_FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    let sinks = init_logging(&config.log).context("initializing logging")?;

    let identity = ProcessIdentity::discover();
    log_main!(
        Level::INFO,
        %identity,
        version = env!("CARGO_PKG_VERSION"),
        "Starting log gateway..."
    );
    create_pid_file(&config.core.pid, &identity)?;

    let producer = Arc::new(KafkaProducer::connect(&config.kafka).await?);
    let gateway = Gateway::start(&config, producer).await?;

    let mut signals = listen_signals().context("installing signal handlers")?;
    let keepalive_cancel = CancellationToken::new();
    let keepalive = gateway.spawn_keepalive(keepalive_cancel.clone());

    let coordinator = Coordinator::new(config.failfast_timeout());
    let outcome = coordinator
        .run(&mut signals, move || async move {
            gateway.shutdown().await;
            keepalive_cancel.cancel();
            if let Err(e) = keepalive.await {
                tracing::error!("keepalive task failed: {}", e);
            }
            // Dropping the appender guards blocks until their queues flush
            if let Err(e) = tokio::task::spawn_blocking(move || sinks.close()).await {
                tracing::error!("log sink flush failed: {}", e);
            }
        })
        .await;

    match outcome {
        ShutdownOutcome::Clean => Ok(()),
        ShutdownOutcome::Forced => std::process::exit(1),
    }
}
