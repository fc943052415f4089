use std::collections::{HashSet, VecDeque};

use anyhow::{Context, Result};
use async_trait::async_trait;
use lsps_hub::nostr::{Event, EventId, Filter};
use lsps_hub::nostr_listener::NostrRelayPool;
use nostr_sdk::{Client, RelayPoolNotification};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Events seen on more than one relay are forwarded once.
/// Only the most recent ids are remembered
const SEEN_EVENT_IDS: usize = 1024;

/// A relay pool backed by the nostr-sdk client
#[derive(Default)]
pub struct NostrSdkPool;

#[async_trait]
impl NostrRelayPool for NostrSdkPool {
    async fn subscribe_many(
        &self,
        cancel: CancellationToken,
        relays: Vec<String>,
        filter: Filter,
    ) -> Result<mpsc::Receiver<Result<Event>>> {
        let client = Client::default();
        for relay in &relays {
            client
                .add_relay(relay.as_str())
                .await
                .with_context(|| format!("Invalid relay '{}'", relay))?;
        }
        client.connect().await;

        // Listen before subscribing so no event slips through
        let notifications = client.notifications();
        client
            .subscribe(filter, None)
            .await
            .context("Failed to subscribe to the relays")?;
        log::info!("Subscribed to {} nostr relays", relays.len());

        let (sender, receiver) = mpsc::channel(64);
        tokio::spawn(forward_events(client, notifications, sender, cancel));
        Ok(receiver)
    }
}

async fn forward_events(
    client: Client,
    mut notifications: broadcast::Receiver<RelayPoolNotification>,
    sender: mpsc::Sender<Result<Event>>,
    cancel: CancellationToken,
) {
    let mut seen = SeenEvents::default();

    loop {
        let notification = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sender.closed() => break,
            notification = notifications.recv() => notification,
        };

        match notification {
            Ok(RelayPoolNotification::Event { relay_url, event, .. }) => {
                if !seen.insert(event.id) {
                    continue;
                }
                log::trace!("Received nostr event {} from {}", event.id, relay_url);
                if sender.send(Ok(*event)).await.is_err() {
                    break;
                }
            }
            Ok(RelayPoolNotification::Shutdown) => {
                let _ = sender
                    .send(Err(anyhow::anyhow!("The relay pool shut down")))
                    .await;
                break;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Skipped {} nostr notifications", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    client.shutdown().await;
    log::info!("Disconnected from nostr relays");
}

#[derive(Default)]
struct SeenEvents {
    ids: HashSet<EventId>,
    order: VecDeque<EventId>,
}

impl SeenEvents {
    /// Returns false if the id was seen before
    fn insert(&mut self, id: EventId) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > SEEN_EVENT_IDS {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lsps_hub::nostr::{EventBuilder, Keys, Kind};

    fn event_id(content: &str) -> EventId {
        EventBuilder::new(Kind::TextNote, content)
            .sign_with_keys(&Keys::generate())
            .unwrap()
            .id
    }

    #[test]
    fn duplicates_are_filtered() {
        let mut seen = SeenEvents::default();
        let id = event_id("a");

        assert!(seen.insert(id));
        assert!(!seen.insert(id));
        assert!(seen.insert(event_id("b")));
    }

    #[test]
    fn old_ids_are_forgotten() {
        let mut seen = SeenEvents::default();
        let first = event_id("first");
        seen.insert(first);

        for i in 0..SEEN_EVENT_IDS {
            seen.insert(event_id(&i.to_string()));
        }

        assert_eq!(seen.ids.len(), SEEN_EVENT_IDS);
        assert!(seen.insert(first));
    }
}
