use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Coarse change notification published after every successful mutation of
/// the stock list. Subscribers must refetch rather than trust any payload:
/// the variants identify what happened, not the resulting row state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangeEvent {
    /// A bulk chunk was upserted
    RecordsUpserted { rows: u64 },
    /// A record transitioned unscanned -> scanned
    RecordScanned { id: i64 },
    /// All scan state was reset to pending
    ScansReset { rows: u64 },
    /// The stock list was wiped
    Cleared { rows: u64 },
}

/// Broadcast channel the store gateway publishes change notifications on.
/// Dropping notifications when nobody listens is fine; lagged receivers are
/// treated by subscribers as "something changed" and trigger a refetch.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publishes a change notification. A send error only means there are no
    /// subscribers right now, which is not a failure.
    pub fn publish(&self, event: ChangeEvent) {
        debug!(?event, "Publishing change notification");
        let _ = self.sender.send(event);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_changes() {
        let feed = ChangeFeed::new(8);
        let mut rx = feed.subscribe();

        feed.publish(ChangeEvent::RecordScanned { id: 7 });

        match rx.recv().await {
            Ok(ChangeEvent::RecordScanned { id }) => assert_eq!(id, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_not_an_error() {
        let feed = ChangeFeed::new(8);
        feed.publish(ChangeEvent::Cleared { rows: 3 });
    }
}
