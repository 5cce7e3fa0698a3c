//! Shutdown coordination.
//!
//! One controller owns the requested shutdown mode; every task observes it
//! through a watch channel. Repeated graceful requests escalate to emergency,
//! so a second Ctrl-C always means "get me out now".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::exchange::{cancel_bot_orders, ExchangeClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Stop trading but leave open orders on the book.
    Graceful,
    /// Stop trading and cancel every order this bot placed.
    Emergency,
}

impl std::fmt::Display for ShutdownMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownMode::Graceful => write!(f, "graceful"),
            ShutdownMode::Emergency => write!(f, "emergency"),
        }
    }
}

pub struct ShutdownController {
    requested: watch::Sender<Option<ShutdownMode>>,
    executed: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (requested, _) = watch::channel(None);
        Self {
            requested,
            executed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ShutdownMode>> {
        self.requested.subscribe()
    }

    pub fn is_requested(&self) -> bool {
        self.requested.borrow().is_some()
    }

    pub fn mode(&self) -> Option<ShutdownMode> {
        *self.requested.borrow()
    }

    /// Record a shutdown request. A repeated request escalates: any request
    /// on top of a pending graceful shutdown upgrades it to emergency, and
    /// emergency is terminal.
    pub fn request(&self, mode: ShutdownMode) {
        self.requested.send_modify(|current| match (*current, mode) {
            (None, _) => {
                info!("Shutdown requested ({})", mode);
                *current = Some(mode);
            }
            (Some(ShutdownMode::Graceful), _) => {
                warn!("Shutdown already in progress, escalating to emergency");
                *current = Some(ShutdownMode::Emergency);
            }
            (Some(ShutdownMode::Emergency), _) => {}
        });
    }

    /// Run the venue-side part of shutdown once; later calls are no-ops.
    ///
    /// Emergency cancels every order carrying this bot's client-id prefix.
    /// Graceful leaves the book untouched so a restart can resume the round.
    pub async fn finalize(&self, client: &dyn ExchangeClient) {
        if self.executed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.mode() {
            Some(ShutdownMode::Emergency) => {
                info!("Emergency shutdown: cancelling open orders");
                let canceled = cancel_bot_orders(client).await;
                info!("Emergency shutdown complete, {} orders cancelled", canceled);
            }
            Some(ShutdownMode::Graceful) | None => {
                info!("Graceful shutdown: leaving open orders on the book");
            }
        }
    }

    /// Process-exit guard. Reaching the exit without any shutdown request
    /// means the engine stopped on its own (feed channels closed, task
    /// failure) and live orders may still rest on the book, so the exit is
    /// escalated to an emergency before the venue-side cleanup runs.
    pub async fn finalize_exit(&self, client: &dyn ExchangeClient) {
        if !self.is_requested() {
            warn!("Exiting without a shutdown request, forcing an emergency cleanup");
            self.request(ShutdownMode::Emergency);
        }
        self.finalize(client).await;
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire OS signals to the controller. Each delivered signal files a graceful
/// request; the controller's escalation turns the second one into emergency.
pub fn install_signal_handlers(controller: Arc<ShutdownController>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut interrupt = match signal(SignalKind::interrupt()) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to install SIGINT handler: {}", e);
                    return;
                }
            };
            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = interrupt.recv() => controller.request(ShutdownMode::Graceful),
                    _ = terminate.recv() => controller.request(ShutdownMode::Graceful),
                }
            }
        }
        #[cfg(not(unix))]
        {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                controller.request(ShutdownMode::Graceful);
            }
        }
    });
}
