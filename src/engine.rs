//! Gateway Engine
//!
//! Wires the front ends, worker pool and broker producer together.
//! Start order: clock, stats, pool, HTTP, UDP. Shutdown reverses the
//! ingestion side first so nothing new reaches the pool while it stops.

use crate::broker::Producer;
use crate::infrastructure::clock::CachedClock;
use crate::infrastructure::config::Config;
use crate::infrastructure::metrics::StatCounters;
use crate::infrastructure::pool::WorkerPool;
use crate::infrastructure::shutdown;
use crate::ingest::{http, HttpIngest, UdpServer};
use crate::Result;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Running gateway
pub struct Gateway {
    clock: Arc<CachedClock>,
    stats: Arc<StatCounters>,
    pool: Arc<WorkerPool>,
    udp: UdpServer,
    http_addr: SocketAddr,
    http_shutdown: CancellationToken,
    http_task: Mutex<Option<JoinHandle<()>>>,
    keepalive_interval: std::time::Duration,
    report_every: u64,
}

impl Gateway {
    /// Start every component
    ///
    /// # Errors
    /// Returns error if the HTTP listener or the UDP socket cannot bind.
    /// Components started before the failure are stopped again.
    pub async fn start(config: &Config, producer: Arc<dyn Producer>) -> Result<Self> {
        let clock = Arc::new(CachedClock::new());
        let stats = Arc::new(StatCounters::new());
        let pool = Arc::new(WorkerPool::start(
            config.core.worker_num,
            config.core.queue_num,
            producer,
            Arc::clone(&clock),
        ));

        let listener = match TcpListener::bind((config.http.host.as_str(), config.http.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                pool.stop().await;
                return Err(e.into());
            }
        };
        let http_addr = listener.local_addr()?;

        let ingest = Arc::new(
            HttpIngest::new(
                config.kafka.http_topics.iter().cloned(),
                Arc::clone(&pool),
                Arc::clone(&stats),
            )
            .with_max_decoded(config.http.max_decoded_bytes),
        );
        let app = http::router(ingest, &config.http);
        let http_shutdown = CancellationToken::new();
        let token = http_shutdown.clone();
        let http_task = tokio::spawn(async move {
            if let Err(e) = http::serve(listener, app, token).await {
                tracing::error!("HTTP server failed: {}", e);
            }
        });

        let udp = match UdpServer::start(
            &config.core,
            &config.kafka.default_topic,
            Arc::clone(&pool),
            Arc::clone(&stats),
        ) {
            Ok(udp) => udp,
            Err(e) => {
                http_shutdown.cancel();
                let _ = http_task.await;
                pool.stop().await;
                return Err(e.into());
            }
        };

        tracing::info!(
            http = %http_addr,
            udp = %udp.local_addr(),
            topics = ?config.kafka.http_topics,
            "gateway started"
        );

        Ok(Self {
            clock,
            stats,
            pool,
            udp,
            http_addr,
            http_shutdown,
            http_task: Mutex::new(Some(http_task)),
            keepalive_interval: config.keepalive_interval(),
            report_every: config.core.report_every_ticks,
        })
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn udp_addr(&self) -> SocketAddr {
        self.udp.local_addr()
    }

    pub fn stats(&self) -> &Arc<StatCounters> {
        &self.stats
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// One-line status: pool state plus protocol counters
    pub fn status_line(&self) -> String {
        status_line(&self.pool, &self.stats)
    }

    /// Spawn the keep-alive ticker that refreshes the clock and logs status
    pub fn spawn_keepalive(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let pool = Arc::clone(&self.pool);
        let stats = Arc::clone(&self.stats);
        shutdown::spawn_keepalive(
            Arc::clone(&self.clock),
            self.keepalive_interval,
            self.report_every,
            move || tracing::info!("{}", status_line(&pool, &stats)),
            cancel,
        )
    }

    /// Ordered teardown
    ///
    /// Stops accepting HTTP connections, stops the UDP loop, then stops the
    /// worker pool and closes the producer. In-flight HTTP requests finish
    /// against the closed pool and answer 503.
    pub async fn shutdown(&self) {
        self.http_shutdown.cancel();
        self.udp.stop().await;
        self.pool.stop().await;

        let http_task = self.http_task.lock().take();
        if let Some(task) = http_task {
            if let Err(e) = task.await {
                tracing::error!("HTTP server task failed: {}", e);
            }
        }
        tracing::info!("{}", self.status_line());
    }
}

fn status_line(pool: &WorkerPool, stats: &StatCounters) -> String {
    format!("{} | {}", pool.status(), stats.snapshot())
}
