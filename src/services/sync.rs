//! Live view synchronizer: re-derives the UI-facing working set (stats +
//! recent rows) whenever the store reports a change, coalescing rapid-fire
//! notifications so a bulk import does not turn into a request storm.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::config::ViewConfig;
use crate::entities::inventory_record::Model as InventoryRecord;
use crate::errors::ServiceError;
use crate::events::ChangeEvent;
use crate::models::StockStats;
use crate::store::{InventoryStore, ScanFilter};

/// Snapshot of everything the UI shows, replaced wholesale on each refresh.
/// A pure function of the store; nothing here is mutated in place.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ViewState {
    pub stats: StockStats,
    pub recent: Vec<InventoryRecord>,
    pub refreshed_at: DateTime<Utc>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            stats: StockStats::default(),
            recent: Vec::new(),
            refreshed_at: Utc::now(),
        }
    }
}

pub struct LiveViewSynchronizer {
    store: Arc<InventoryStore>,
    recent_window: u64,
    debounce: Duration,
}

impl LiveViewSynchronizer {
    pub fn new(store: Arc<InventoryStore>, cfg: &ViewConfig) -> Self {
        Self {
            store,
            recent_window: cfg.recent_window,
            debounce: Duration::from_millis(cfg.debounce_ms),
        }
    }

    /// Starts the background task and hands back the watch side. The
    /// change feed is subscribed before this returns, so no mutation made
    /// after the call can be missed. The task ends when the change feed
    /// closes or every receiver is dropped.
    pub fn spawn(self) -> watch::Receiver<ViewState> {
        let (tx, rx) = watch::channel(ViewState::default());
        let changes = self.store.subscribe();
        tokio::spawn(self.run(tx, changes));
        rx
    }

    async fn run(self, tx: watch::Sender<ViewState>, mut changes: broadcast::Receiver<ChangeEvent>) {
        // Seed the view before the first notification arrives.
        self.publish(&tx).await;

        loop {
            match changes.recv().await {
                Ok(event) => debug!(?event, "Change notification received"),
                // Falling behind just means more happened than we consumed;
                // the refetch below covers it.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Change feed lagged; refetching")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }

            let mut feed_closed = false;
            // Coalesce everything that arrives within the debounce window
            // into a single refetch.
            loop {
                match timeout(self.debounce, changes.recv()).await {
                    Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                    Ok(Err(broadcast::error::RecvError::Closed)) => {
                        feed_closed = true;
                        break;
                    }
                    Err(_elapsed) => break,
                }
            }

            if !self.publish(&tx).await {
                break;
            }
            if feed_closed {
                break;
            }
        }

        info!("Live view synchronizer stopped");
    }

    /// Refetches and publishes one snapshot. Returns false when every
    /// receiver is gone.
    async fn publish(&self, tx: &watch::Sender<ViewState>) -> bool {
        match self.snapshot().await {
            Ok(view) => tx.send(view).is_ok(),
            Err(err) => {
                warn!(error = %err, "Live view refresh failed; keeping previous state");
                !tx.is_closed()
            }
        }
    }

    /// Re-derives the working set: exact counts plus a bounded recent
    /// window, never a full table read.
    pub async fn snapshot(&self) -> Result<ViewState, ServiceError> {
        let total = self.store.count(ScanFilter::All).await?;
        let scanned = self.store.count(ScanFilter::Scanned).await?;
        let recent = self.store.recent(None, self.recent_window).await?;

        Ok(ViewState {
            stats: StockStats::new(total, scanned),
            recent,
            refreshed_at: Utc::now(),
        })
    }
}
