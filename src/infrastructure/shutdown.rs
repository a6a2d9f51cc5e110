//! Graceful shutdown
//!
//! Termination signals move the process from `Running` to `Draining`. The
//! drain sequence runs as its own task and races a failfast deadline.
//! Finishing first gives a clean exit. If the deadline fires first the exit
//! is forced and the drain task is aborted, even when a drain step is stuck
//! in synchronous code.

use crate::infrastructure::clock::CachedClock;
use std::fmt;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Process signals the gateway reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Quit,
    Terminate,
    /// Reconfigure request; currently ignored
    Hangup,
}

impl Signal {
    #[inline]
    pub fn is_termination(self) -> bool {
        !matches!(self, Signal::Hangup)
    }

    pub fn name(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Quit => "SIGQUIT",
            Signal::Terminate => "SIGTERM",
            Signal::Hangup => "SIGHUP",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Install signal handlers and forward every delivery to a channel
///
/// # Errors
/// Returns error if a handler cannot be registered.
pub fn listen_signals() -> io::Result<mpsc::Receiver<Signal>> {
    let (tx, rx) = mpsc::channel(4);
    let kinds = [
        (SignalKind::interrupt(), Signal::Interrupt),
        (SignalKind::quit(), Signal::Quit),
        (SignalKind::terminate(), Signal::Terminate),
        (SignalKind::hangup(), Signal::Hangup),
    ];

    for (kind, sig) in kinds {
        let mut stream = signal(kind)?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(sig).await.is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}

/// Process lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Running = 0,
    Draining = 1,
    Terminated = 2,
}

/// Lifecycle flag, written only by the coordinator
#[derive(Debug)]
pub struct ShutdownState {
    phase: AtomicU8,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Running as u8),
        }
    }

    pub fn phase(&self) -> Phase {
        match self.phase.load(Ordering::Acquire) {
            0 => Phase::Running,
            1 => Phase::Draining,
            _ => Phase::Terminated,
        }
    }

    /// `Running -> Draining`; false if draining already started
    fn begin_drain(&self) -> bool {
        self.phase
            .compare_exchange(
                Phase::Running as u8,
                Phase::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn terminate(&self) {
        self.phase.store(Phase::Terminated as u8, Ordering::Release);
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

/// How the drain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every drain step finished before the deadline
    Clean,
    /// The failfast deadline fired first
    Forced,
}

/// Signal-driven shutdown coordinator
pub struct Coordinator {
    state: Arc<ShutdownState>,
    failfast: Duration,
}

impl Coordinator {
    pub fn new(failfast: Duration) -> Self {
        Self {
            state: Arc::new(ShutdownState::new()),
            failfast,
        }
    }

    pub fn state(&self) -> Arc<ShutdownState> {
        Arc::clone(&self.state)
    }

    /// Wait for termination, then drain against the failfast deadline
    ///
    /// A closed signal channel counts as termination.
    pub async fn run<D, F>(&self, signals: &mut mpsc::Receiver<Signal>, drain: D) -> ShutdownOutcome
    where
        D: FnOnce() -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        match self.wait_for_termination(signals).await {
            Some(sig) => tracing::info!("get signal {}", sig),
            None => tracing::warn!("signal channel closed, shutting down"),
        }
        self.drain(drain()).await
    }

    /// Consume signals until one requests termination
    pub async fn wait_for_termination(
        &self,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Option<Signal> {
        while let Some(sig) = signals.recv().await {
            if sig.is_termination() {
                return Some(sig);
            }
            tracing::info!("get signal {}, ignored", sig);
        }
        None
    }

    /// Race `drain` against the failfast deadline
    ///
    /// The drain is spawned on the runtime, so the deadline keeps ticking
    /// while a drain step blocks its worker thread.
    pub async fn drain<F>(&self, drain: F) -> ShutdownOutcome
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.state.begin_drain() {
            tracing::warn!("shutdown already in progress");
        }

        let mut task = tokio::spawn(drain);
        tokio::select! {
            res = &mut task => {
                if let Err(e) = res {
                    tracing::error!("drain task failed: {}", e);
                }
                self.state.terminate();
                tracing::warn!("app exit now...");
                ShutdownOutcome::Clean
            }
            _ = tokio::time::sleep(self.failfast) => {
                task.abort();
                tracing::warn!(timeout = ?self.failfast, "app exit now by force...");
                ShutdownOutcome::Forced
            }
        }
    }
}

/// Spawn the keep-alive ticker
///
/// Each tick refreshes `clock`. Every `report_every` ticks `report` runs.
/// The task ends when `cancel` fires.
pub fn spawn_keepalive<R>(
    clock: Arc<CachedClock>,
    interval: Duration,
    report_every: u64,
    report: R,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: Fn() + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut seq: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    clock.refresh();
                    seq += 1;
                    if report_every > 0 && seq % report_every == 0 {
                        report();
                    }
                }
            }
        }
    })
}
