//! LSPS5 notifications delivered over Nostr.
//!
//! An LSP that can't reach a webhook may publish its notification as a
//! Nostr event addressed to the client. The listener subscribes to those
//! events, checks that they were signed by an LSP we trust and hands
//! them to an [`EventPublisher`]. They never enter the [`EventQueue`]
//! because they don't answer a request.
//!
//! [`EventQueue`]: crate::event_queue::EventQueue
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use lsp_primitives::lsps5::schema::{Lsps5Notification, Lsps5NotificationPayload};
use nostr::{Event, Filter, Kind, PublicKey, Timestamp};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{HubError, Result};
use crate::sync::{lock, read, write};

pub const DEFAULT_LSPS5_NOSTR_KIND: u16 = 9051;
pub const DEFAULT_LSPS5_NOSTR_TAG: &str = "lsps5";
pub const DEFAULT_NOSTR_LOOK_BACK: Duration = Duration::from_secs(24 * 60 * 60);

/// Subscribes to Nostr relays
#[async_trait]
pub trait NostrRelayPool: Send + Sync {
    /// Streams the events matching `filter` until `cancel` fires.
    ///
    /// An error on the stream ends the subscription.
    async fn subscribe_many(
        &self,
        cancel: CancellationToken,
        relays: Vec<String>,
        filter: Filter,
    ) -> anyhow::Result<mpsc::Receiver<anyhow::Result<Event>>>;
}

/// Delivers push notifications to the application
pub trait EventPublisher: Send + Sync {
    fn publish(&self, notification: PushNotification);
}

/// Returns the LSPs whose notifications are accepted. Called for every event
pub type TrustedPubkeyAccessor = Arc<dyn Fn() -> Vec<PublicKey> + Send + Sync>;

/// An authenticated LSPS5 notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushNotification {
    /// e.g.: `lsps5_expiry_soon`
    pub name: String,
    pub lsp_pubkey: PublicKey,
    pub event_id: String,
    pub created_at: u64,
    pub properties: Map<String, Value>,
    #[serde(skip)]
    pub notification: Lsps5Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Starting,
    Running,
    Stopped,
}

/// Why an event was dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("no trusted pubkeys are configured")]
    NoTrustedPubkeys,
    #[error("author {0} is not a trusted LSP")]
    UntrustedAuthor(PublicKey),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("invalid notification: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone)]
pub struct NostrListenerConfig {
    pub relays: Vec<String>,
    /// The key notifications are addressed to
    pub local_pubkey: PublicKey,
    pub kind: u16,
    pub tag: String,
    pub look_back: Duration,
}

impl NostrListenerConfig {
    pub fn new(local_pubkey: PublicKey, relays: Vec<String>) -> Self {
        Self {
            relays,
            local_pubkey,
            kind: DEFAULT_LSPS5_NOSTR_KIND,
            tag: DEFAULT_LSPS5_NOSTR_TAG.to_string(),
            look_back: DEFAULT_NOSTR_LOOK_BACK,
        }
    }

    /// Events addressed to us and published after `now - look_back`
    pub fn filter(&self, now: Timestamp) -> Filter {
        let since = now.as_secs().saturating_sub(self.look_back.as_secs());
        Filter::new()
            .kind(Kind::from(self.kind))
            .pubkey(self.local_pubkey)
            .hashtag(self.tag.clone())
            .since(Timestamp::from(since))
    }
}

pub struct NostrLsps5Listener {
    config: NostrListenerConfig,
    pool: Arc<dyn NostrRelayPool>,
    publisher: Arc<dyn EventPublisher>,
    trusted_pubkeys: RwLock<Option<TrustedPubkeyAccessor>>,
    state: Mutex<ListenerState>,
    stop: CancellationToken,
}

impl NostrLsps5Listener {
    pub fn new(
        config: NostrListenerConfig,
        pool: Arc<dyn NostrRelayPool>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            config,
            pool,
            publisher,
            trusted_pubkeys: RwLock::new(None),
            state: Mutex::new(ListenerState::Idle),
            stop: CancellationToken::new(),
        }
    }

    pub fn set_trusted_pubkey_accessor(&self, accessor: TrustedPubkeyAccessor) {
        *write(&self.trusted_pubkeys) = Some(accessor);
    }

    pub fn state(&self) -> ListenerState {
        *lock(&self.state)
    }

    pub fn config(&self) -> &NostrListenerConfig {
        &self.config
    }

    /// Ends a running subscription. A listener can't be restarted
    pub fn stop(&self) {
        self.stop.cancel();
        *lock(&self.state) = ListenerState::Stopped;
    }

    /// Consumes notifications until `cancel` fires, [`Self::stop`] is
    /// called or the relay pool fails.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if *state != ListenerState::Idle {
                log::warn!("Nostr listener can't be started while {:?}", *state);
                return Ok(());
            }
            if self.config.relays.is_empty() {
                log::warn!("No nostr relays are configured. LSPS5 notifications over nostr are disabled");
                *state = ListenerState::Stopped;
                return Ok(());
            }
            *state = ListenerState::Starting;
        }

        let filter = self.config.filter(Timestamp::now());
        // Stops the relay pool once we return, whatever the reason
        let subscription_cancel = cancel.child_token();
        let _guard = subscription_cancel.clone().drop_guard();

        log::info!(
            "Subscribing to LSPS5 notifications on {} relay(s)",
            self.config.relays.len()
        );
        let mut events = match self
            .pool
            .subscribe_many(
                subscription_cancel.clone(),
                self.config.relays.clone(),
                filter,
            )
            .await
        {
            Ok(events) => events,
            Err(err) => {
                self.set_state(ListenerState::Stopped);
                return Err(HubError::TransportFault(err));
            }
        };

        {
            let mut state = lock(&self.state);
            if *state == ListenerState::Stopped {
                return Ok(());
            }
            *state = ListenerState::Running;
        }
        log::info!("Listening for LSPS5 notifications");

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                _ = self.stop.cancelled() => break Ok(()),
                event = events.recv() => match event {
                    Some(Ok(event)) => {
                        self.handle_event(&event);
                    }
                    Some(Err(err)) => {
                        log::warn!("Nostr relay pool failed: {:#}", err);
                        break Err(HubError::TransportFault(err));
                    }
                    None => {
                        log::info!("Nostr relay pool closed the subscription");
                        break Ok(());
                    }
                }
            }
        };

        self.set_state(ListenerState::Stopped);
        log::info!("Stopped listening for LSPS5 notifications");
        result
    }

    /// Publishes the event if it is an authentic notification.
    ///
    /// Returns `true` if it was published.
    pub fn handle_event(&self, event: &Event) -> bool {
        match self.process_event(event) {
            Ok(notification) => {
                log::debug!(
                    "Publishing {} from {}",
                    notification.name,
                    notification.lsp_pubkey
                );
                self.publisher.publish(notification);
                true
            }
            Err(rejection) => {
                log::warn!("Dropping nostr event {}: {}", event.id.to_hex(), rejection);
                false
            }
        }
    }

    /// Authenticates and decodes an event without publishing it
    pub fn process_event(&self, event: &Event) -> std::result::Result<PushNotification, Rejection> {
        let accessor = read(&self.trusted_pubkeys)
            .clone()
            .ok_or(Rejection::NoTrustedPubkeys)?;

        if !accessor().contains(&event.pubkey) {
            return Err(Rejection::UntrustedAuthor(event.pubkey));
        }

        event
            .verify()
            .map_err(|e| Rejection::InvalidSignature(e.to_string()))?;

        let payload: Lsps5NotificationPayload = serde_json::from_str(&event.content)
            .map_err(|e| Rejection::InvalidPayload(e.to_string()))?;
        let notification = Lsps5Notification::from_payload(&payload)
            .map_err(|e| Rejection::InvalidPayload(e.to_string()))?;

        Ok(PushNotification {
            name: event_name(&notification),
            lsp_pubkey: event.pubkey,
            event_id: event.id.to_hex(),
            created_at: event.created_at.as_secs(),
            properties: properties(payload.params, &notification),
            notification,
        })
    }

    fn set_state(&self, state: ListenerState) {
        *lock(&self.state) = state;
    }
}

fn event_name(notification: &Lsps5Notification) -> String {
    let method = notification.method();
    format!("lsps5_{}", method.strip_prefix("lsps5.").unwrap_or(method))
}

/// The params with the decoded fields in their canonical form
fn properties(mut params: Map<String, Value>, notification: &Lsps5Notification) -> Map<String, Value> {
    match notification {
        Lsps5Notification::ExpirySoon { timeout } => {
            params.insert("timeout".to_string(), Value::from(*timeout));
        }
        Lsps5Notification::OrderStateChanged {
            order_id,
            state,
            channel_point,
            error,
        } => {
            params.insert("order_id".to_string(), Value::from(order_id.as_str()));
            params.insert("state".to_string(), Value::from(state.as_str()));
            if let Some(channel_point) = channel_point {
                params.insert("channel_point".to_string(), Value::from(channel_point.as_str()));
            }
            if let Some(error) = error {
                params.insert("error".to_string(), Value::from(error.as_str()));
            }
        }
        _ => {}
    }
    params
}

#[cfg(test)]
mod test {
    use super::*;
    use nostr::{EventBuilder, Keys, Tag};
    use serde_json::json;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<PushNotification>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, notification: PushNotification) {
            self.published.lock().unwrap().push(notification);
        }
    }

    impl RecordingPublisher {
        fn published(&self) -> Vec<PushNotification> {
            self.published.lock().unwrap().clone()
        }
    }

    struct ChannelPool {
        events: Mutex<Option<mpsc::Receiver<anyhow::Result<Event>>>>,
        fail: bool,
    }

    #[async_trait]
    impl NostrRelayPool for ChannelPool {
        async fn subscribe_many(
            &self,
            _cancel: CancellationToken,
            _relays: Vec<String>,
            _filter: Filter,
        ) -> anyhow::Result<mpsc::Receiver<anyhow::Result<Event>>> {
            if self.fail {
                anyhow::bail!("No relay reachable");
            }
            self.events
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow::anyhow!("Already subscribed"))
        }
    }

    struct Setup {
        local: Keys,
        lsp: Keys,
        publisher: Arc<RecordingPublisher>,
        sender: mpsc::Sender<anyhow::Result<Event>>,
        listener: Arc<NostrLsps5Listener>,
    }

    fn setup(relays: Vec<String>, fail: bool) -> Setup {
        let local = Keys::generate();
        let lsp = Keys::generate();
        let (sender, receiver) = mpsc::channel(8);
        let pool = Arc::new(ChannelPool {
            events: Mutex::new(Some(receiver)),
            fail,
        });
        let publisher = Arc::new(RecordingPublisher::default());
        let config = NostrListenerConfig::new(local.public_key(), relays);
        let listener = Arc::new(NostrLsps5Listener::new(config, pool, publisher.clone()));

        let trusted = lsp.public_key();
        listener.set_trusted_pubkey_accessor(Arc::new(move || vec![trusted]));

        Setup {
            local,
            lsp,
            publisher,
            sender,
            listener,
        }
    }

    fn notification_event(author: &Keys, recipient: &Keys, content: Value) -> Event {
        EventBuilder::new(Kind::from(DEFAULT_LSPS5_NOSTR_KIND), content.to_string())
            .tag(Tag::public_key(recipient.public_key()))
            .tag(Tag::hashtag(DEFAULT_LSPS5_NOSTR_TAG))
            .sign_with_keys(author)
            .unwrap()
    }

    #[test]
    fn filter_targets_our_key_and_tag() {
        let local = Keys::generate();
        let config = NostrListenerConfig::new(local.public_key(), vec![]);

        let filter = config.filter(Timestamp::from(100_000));
        let value = serde_json::to_value(&filter).unwrap();

        assert_eq!(value["kinds"], json!([DEFAULT_LSPS5_NOSTR_KIND]));
        assert_eq!(value["#p"], json!([local.public_key().to_hex()]));
        assert_eq!(value["#t"], json!([DEFAULT_LSPS5_NOSTR_TAG]));
        assert_eq!(value["since"], json!(100_000 - 86_400));
    }

    #[test]
    fn trusted_expiry_soon_is_published() {
        let setup = setup(vec![], false);
        let event = notification_event(
            &setup.lsp,
            &setup.local,
            json!({"method" : "lsps5.expiry_soon", "params" : {"timeout" : "840000"}}),
        );

        assert!(setup.listener.handle_event(&event));

        let published = setup.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].name, "lsps5_expiry_soon");
        assert_eq!(published[0].lsp_pubkey, setup.lsp.public_key());
        assert_eq!(published[0].properties["timeout"], json!(840_000));
        assert_eq!(
            published[0].notification,
            Lsps5Notification::ExpirySoon { timeout: 840_000 }
        );
    }

    #[test]
    fn order_state_changed_fields_are_extracted() {
        let setup = setup(vec![], false);
        let event = notification_event(
            &setup.lsp,
            &setup.local,
            json!({
                "method" : "lsps5.order_state_changed",
                "params" : {"order_id" : "order123", "state" : "COMPLETED", "channel_point" : "ab:1"}
            }),
        );

        let notification = setup.listener.process_event(&event).unwrap();
        assert_eq!(notification.name, "lsps5_order_state_changed");
        assert_eq!(notification.properties["order_id"], "order123");
        assert_eq!(notification.properties["state"], "COMPLETED");
        assert_eq!(notification.properties["channel_point"], "ab:1");
        assert!(notification.properties.get("error").is_none());
    }

    #[test]
    fn untrusted_authors_are_dropped() {
        let setup = setup(vec![], false);
        let stranger = Keys::generate();
        let event = notification_event(
            &stranger,
            &setup.local,
            json!({"method" : "lsps5.payment_incoming", "params" : {}}),
        );

        assert!(!setup.listener.handle_event(&event));
        assert!(setup.publisher.published().is_empty());
        assert_eq!(
            setup.listener.process_event(&event).unwrap_err(),
            Rejection::UntrustedAuthor(stranger.public_key())
        );
    }

    #[test]
    fn events_are_dropped_without_a_trust_accessor() {
        let local = Keys::generate();
        let lsp = Keys::generate();
        let (_sender, receiver) = mpsc::channel(1);
        let pool = Arc::new(ChannelPool {
            events: Mutex::new(Some(receiver)),
            fail: false,
        });
        let publisher = Arc::new(RecordingPublisher::default());
        let listener = NostrLsps5Listener::new(
            NostrListenerConfig::new(local.public_key(), vec![]),
            pool,
            publisher.clone(),
        );

        let event = notification_event(
            &lsp,
            &local,
            json!({"method" : "lsps5.payment_incoming", "params" : {}}),
        );
        assert_eq!(
            listener.process_event(&event).unwrap_err(),
            Rejection::NoTrustedPubkeys
        );
        assert!(!listener.handle_event(&event));
        assert!(publisher.published().is_empty());
    }

    #[test]
    fn tampered_events_are_dropped() {
        let setup = setup(vec![], false);
        let mut event = notification_event(
            &setup.lsp,
            &setup.local,
            json!({"method" : "lsps5.payment_incoming", "params" : {}}),
        );
        event.content = json!({"method" : "lsps5.onion_message_incoming"}).to_string();

        assert!(matches!(
            setup.listener.process_event(&event),
            Err(Rejection::InvalidSignature(_))
        ));
        assert!(!setup.listener.handle_event(&event));
        assert!(setup.publisher.published().is_empty());
    }

    #[test]
    fn unknown_notifications_are_dropped() {
        let setup = setup(vec![], false);
        let event = notification_event(
            &setup.lsp,
            &setup.local,
            json!({"method" : "lsps5.unknown", "params" : {}}),
        );

        assert!(matches!(
            setup.listener.process_event(&event),
            Err(Rejection::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn without_relays_the_listener_stops_immediately() {
        let setup = setup(vec![], false);
        let cancel = CancellationToken::new();

        setup.listener.run(&cancel).await.unwrap();
        assert_eq!(setup.listener.state(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn pool_failures_stop_the_listener() {
        let setup = setup(vec!["wss://relay.example.com".to_string()], true);
        let cancel = CancellationToken::new();

        let result = setup.listener.run(&cancel).await;
        assert!(matches!(result, Err(HubError::TransportFault(_))));
        assert_eq!(setup.listener.state(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn running_listener_publishes_until_cancelled() {
        let setup = setup(vec!["wss://relay.example.com".to_string()], false);
        assert_eq!(setup.listener.state(), ListenerState::Idle);
        let cancel = CancellationToken::new();

        let task = {
            let listener = setup.listener.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { listener.run(&cancel).await })
        };

        let event = notification_event(
            &setup.lsp,
            &setup.local,
            json!({"method" : "lsps5.payment_incoming", "params" : {}}),
        );
        setup.sender.send(Ok(event)).await.unwrap();

        for _ in 0..100 {
            if !setup.publisher.published().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(setup.listener.state(), ListenerState::Running);
        assert_eq!(setup.publisher.published()[0].name, "lsps5_payment_incoming");

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(setup.listener.state(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn stop_ends_the_subscription() {
        let setup = setup(vec!["wss://relay.example.com".to_string()], false);
        let cancel = CancellationToken::new();

        let task = {
            let listener = setup.listener.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { listener.run(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        setup.listener.stop();
        task.await.unwrap().unwrap();
        assert_eq!(setup.listener.state(), ListenerState::Stopped);

        // Stopped is terminal
        setup.listener.run(&cancel).await.unwrap();
        assert_eq!(setup.listener.state(), ListenerState::Stopped);
    }
}
