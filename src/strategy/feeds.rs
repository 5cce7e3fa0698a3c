//! Feed pump tasks.
//!
//! Two spawned tasks bridge the exchange streams into bounded channels the
//! engine consumes: one for price ticks, one for order-update batches. A
//! transport error never kills a pump; it logs, backs off, and resubscribes.
//! Keeping fills and ticks on separate channels lets the engine drain fills
//! ahead of each tick it processes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::coordination::ShutdownController;
use crate::domain::{ExchangeOrder, Ticker};
use crate::exchange::ExchangeClient;

const FEED_CHANNEL_CAPACITY: usize = 256;
const STREAM_RETRY_DELAY: Duration = Duration::from_secs(15);

pub struct FeedHandles {
    pub ticker: JoinHandle<()>,
    pub orders: JoinHandle<()>,
}

/// Spawn the two pump tasks. They stop when the shutdown controller fires or
/// when the engine drops its receivers.
pub fn spawn(
    client: Arc<dyn ExchangeClient>,
    controller: &ShutdownController,
) -> (
    mpsc::Receiver<Ticker>,
    mpsc::Receiver<Vec<ExchangeOrder>>,
    FeedHandles,
) {
    let (tick_tx, tick_rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
    let (fill_tx, fill_rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);

    let ticker = {
        let client = Arc::clone(&client);
        let mut shutdown = controller.subscribe();
        tokio::spawn(async move {
            // Seed the engine with a snapshot so it can act before the
            // first streamed tick arrives.
            match client.fetch_ticker().await {
                Ok(ticker) => {
                    if tick_tx.send(ticker).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!("Initial ticker fetch failed: {}", e),
            }
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        debug!("Ticker pump stopping");
                        break;
                    }
                    next = client.watch_ticker() => match next {
                        Ok(ticker) => {
                            if tick_tx.send(ticker).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(
                                "Ticker stream error: {}; retrying in {:?}",
                                e, STREAM_RETRY_DELAY
                            );
                            tokio::time::sleep(STREAM_RETRY_DELAY).await;
                        }
                    },
                }
            }
        })
    };

    let orders = {
        let client = Arc::clone(&client);
        let mut shutdown = controller.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        debug!("Order pump stopping");
                        break;
                    }
                    next = client.watch_orders() => match next {
                        Ok(batch) => {
                            if batch.is_empty() {
                                continue;
                            }
                            if fill_tx.send(batch).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(
                                "Order stream error: {}; retrying in {:?}",
                                e, STREAM_RETRY_DELAY
                            );
                            tokio::time::sleep(STREAM_RETRY_DELAY).await;
                        }
                    },
                }
            }
        })
    };

    (tick_rx, fill_rx, FeedHandles { ticker, orders })
}
