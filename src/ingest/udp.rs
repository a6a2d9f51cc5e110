//! UDP ingestion server
//!
//! One socket, one read loop. Every non-empty datagram becomes a single
//! message on the default topic, keyed by a process-local sequence number.
//! Each read is bounded by a timeout so the loop observes cancellation
//! between reads.

use crate::core::Message;
use crate::infrastructure::config::CoreConfig;
use crate::infrastructure::metrics::StatCounters;
use crate::infrastructure::pool::WorkerPool;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Running UDP listener
pub struct UdpServer {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Read loop state, owned by the loop task
struct UdpReader {
    socket: UdpSocket,
    topic: Arc<str>,
    log_size: usize,
    read_timeout: Duration,
    pool: Arc<WorkerPool>,
    stats: Arc<StatCounters>,
    seq: u64,
}

impl UdpServer {
    /// Bind the socket and spawn the read loop
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns error if the address does not resolve or the bind fails.
    pub fn start(
        config: &CoreConfig,
        topic: &str,
        pool: Arc<WorkerPool>,
        stats: Arc<StatCounters>,
    ) -> io::Result<Self> {
        let addr = (config.udp_host.as_str(), config.udp_port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "udp address did not resolve")
            })?;

        let socket = bind_socket(addr, config.udp_read_buf_size)?;
        let local_addr = socket.local_addr()?;
        let cancel = CancellationToken::new();

        let reader = UdpReader {
            socket,
            topic: Arc::from(topic),
            log_size: config.log_size,
            read_timeout: Duration::from_millis(config.udp_read_timeout_ms),
            pool,
            stats,
            seq: 0,
        };
        let handle = tokio::spawn(reader.run(cancel.clone()));

        tracing::info!(%local_addr, topic, "UDP server listening");

        Ok(Self {
            local_addr,
            cancel,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the read loop and wait for it to exit
    ///
    /// The socket is closed when the loop returns. Later calls are no-ops.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("UDP read loop failed: {}", e);
            }
            tracing::info!(addr = %self.local_addr, "UDP server stopped");
        }
    }
}

impl UdpReader {
    async fn run(mut self, cancel: CancellationToken) {
        let mut buf = BytesMut::with_capacity(self.log_size);

        while !cancel.is_cancelled() {
            buf.resize(self.log_size, 0);
            let read = tokio::time::timeout(self.read_timeout, self.socket.recv_from(&mut buf)).await;

            match read {
                // Deadline expired; re-check cancellation
                Err(_) => continue,
                Ok(Ok((len, _peer))) => {
                    let datagram = buf.split_to(len).freeze();
                    self.on_datagram(datagram).await;
                }
                Ok(Err(e)) => {
                    self.stats.record_udp_error();
                    tracing::debug!("UDP read error: {}", e);
                }
            }
        }

        tracing::debug!(seq = self.seq, "UDP read loop exited");
    }

    /// Turn one datagram into a message on the default topic
    async fn on_datagram(&mut self, datagram: Bytes) {
        if datagram.is_empty() {
            self.stats.record_udp_error();
            return;
        }

        let key = Bytes::from(self.seq.to_string());
        self.seq += 1;

        let message = Message::new(Arc::clone(&self.topic), key, datagram);
        match self.pool.enqueue(message).await {
            Ok(()) => self.stats.record_udp_success(),
            Err(_) => self.stats.record_udp_error(),
        }
    }
}

/// Create a nonblocking UDP socket with the requested receive buffer
fn bind_socket(addr: SocketAddr, recv_buffer_size: usize) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
        tracing::warn!(
            error = %e,
            requested_size = recv_buffer_size,
            "Failed to set UDP SO_RCVBUF"
        );
    }

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}
