use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result as AnyResult};
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::event_queue::{EventQueue, DEFAULT_EVENT_QUEUE_CAPACITY};
use crate::lsps0::{Lsps0Client, Lsps0Service, DEFAULT_SUPPORTED_PROTOCOLS};
use crate::lsps1::Lsps1Client;
use crate::lsps5::Lsps5Client;
use crate::nostr_listener::{
    EventPublisher, NostrListenerConfig, NostrLsps5Listener, NostrRelayPool,
    DEFAULT_LSPS5_NOSTR_KIND, DEFAULT_LSPS5_NOSTR_TAG, DEFAULT_NOSTR_LOOK_BACK,
};
use crate::transport::{LightningNode, Transport};

#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    pub event_queue_capacity: usize,
    pub supported_protocols: Vec<u32>,
    pub nostr_relays: Vec<String>,
    pub nostr_look_back: Duration,
    pub lsps5_nostr_kind: u16,
    pub lsps5_nostr_tag: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            supported_protocols: DEFAULT_SUPPORTED_PROTOCOLS.to_vec(),
            nostr_relays: Vec::new(),
            nostr_look_back: DEFAULT_NOSTR_LOOK_BACK,
            lsps5_nostr_kind: DEFAULT_LSPS5_NOSTR_KIND,
            lsps5_nostr_tag: DEFAULT_LSPS5_NOSTR_TAG.to_string(),
        }
    }
}

impl HubConfig {
    pub fn nostr_listener_config(&self, local_pubkey: nostr::PublicKey) -> NostrListenerConfig {
        NostrListenerConfig {
            relays: self.nostr_relays.clone(),
            local_pubkey,
            kind: self.lsps5_nostr_kind,
            tag: self.lsps5_nostr_tag.clone(),
            look_back: self.nostr_look_back,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct HubConfigBuilder {
    event_queue_capacity: Option<usize>,
    supported_protocols: Option<Vec<u32>>,
    nostr_relays: Option<Vec<String>>,
    nostr_look_back: Option<Duration>,
    lsps5_nostr_kind: Option<u16>,
    lsps5_nostr_tag: Option<String>,
}

impl HubConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = Some(capacity);
        self
    }

    pub fn supported_protocols(mut self, protocols: Vec<u32>) -> Self {
        self.supported_protocols = Some(protocols);
        self
    }

    pub fn nostr_relays(mut self, relays: Vec<String>) -> Self {
        self.nostr_relays = Some(relays);
        self
    }

    pub fn nostr_look_back(mut self, look_back: Duration) -> Self {
        self.nostr_look_back = Some(look_back);
        self
    }

    pub fn lsps5_nostr_kind(mut self, kind: u16) -> Self {
        self.lsps5_nostr_kind = Some(kind);
        self
    }

    pub fn lsps5_nostr_tag(mut self, tag: String) -> Self {
        self.lsps5_nostr_tag = Some(tag);
        self
    }

    pub fn build(self) -> AnyResult<HubConfig> {
        let defaults = HubConfig::default();

        let event_queue_capacity = self
            .event_queue_capacity
            .unwrap_or(defaults.event_queue_capacity);
        if event_queue_capacity == 0 {
            return Err(anyhow!("The event queue capacity must be at least 1"));
        }

        let lsps5_nostr_tag = self.lsps5_nostr_tag.unwrap_or(defaults.lsps5_nostr_tag);
        if lsps5_nostr_tag.is_empty() {
            return Err(anyhow!("The LSPS5 nostr tag can't be empty"));
        }

        let nostr_relays = self.nostr_relays.unwrap_or_default();
        if let Some(relay) = nostr_relays.iter().find(|r| r.trim().is_empty()) {
            return Err(anyhow!("Invalid nostr relay '{}'", relay));
        }

        Ok(HubConfig {
            event_queue_capacity,
            supported_protocols: self
                .supported_protocols
                .unwrap_or(defaults.supported_protocols),
            nostr_relays,
            nostr_look_back: self.nostr_look_back.unwrap_or(defaults.nostr_look_back),
            lsps5_nostr_kind: self.lsps5_nostr_kind.unwrap_or(defaults.lsps5_nostr_kind),
            lsps5_nostr_tag,
        })
    }
}

/// Everything needed to speak LSPS with the peers of a node.
///
/// ```ignore
/// let hub = LspsHub::new(node, HubConfig::default());
/// tokio::spawn(async move { hub.run(&cancel).await });
/// ```
pub struct LspsHub {
    config: HubConfig,
    transport: Transport,
    events: Arc<EventQueue>,
    lsps0_client: Arc<Lsps0Client>,
    lsps0_service: Arc<Lsps0Service>,
    lsps1_client: Arc<Lsps1Client>,
    lsps5_client: Arc<Lsps5Client>,
    dispatcher: Dispatcher,
}

impl LspsHub {
    pub fn new(node: Arc<dyn LightningNode>, config: HubConfig) -> Self {
        let transport = Transport::new(node);
        let events = Arc::new(EventQueue::new(config.event_queue_capacity));

        let lsps0_client = Arc::new(Lsps0Client::new(transport.clone()));
        let lsps0_service = Arc::new(Lsps0Service::with_protocols(
            transport.clone(),
            config.supported_protocols.clone(),
        ));
        let lsps1_client = Arc::new(Lsps1Client::new(transport.clone(), events.clone()));
        let lsps5_client = Arc::new(Lsps5Client::new(transport.clone(), events.clone()));

        let dispatcher = Dispatcher::new(
            transport.clone(),
            lsps0_client.clone(),
            lsps0_service.clone(),
            lsps1_client.clone(),
            lsps5_client.clone(),
        );

        Self {
            config,
            transport,
            events,
            lsps0_client,
            lsps0_service,
            lsps1_client,
            lsps5_client,
            dispatcher,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn events(&self) -> &Arc<EventQueue> {
        &self.events
    }

    pub fn lsps0_client(&self) -> &Arc<Lsps0Client> {
        &self.lsps0_client
    }

    pub fn lsps0_service(&self) -> &Arc<Lsps0Service> {
        &self.lsps0_service
    }

    pub fn lsps1_client(&self) -> &Arc<Lsps1Client> {
        &self.lsps1_client
    }

    pub fn lsps5_client(&self) -> &Arc<Lsps5Client> {
        &self.lsps5_client
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// A listener for LSPS5 notifications addressed to `local_pubkey`
    pub fn nostr_listener(
        &self,
        local_pubkey: nostr::PublicKey,
        pool: Arc<dyn NostrRelayPool>,
        publisher: Arc<dyn EventPublisher>,
    ) -> NostrLsps5Listener {
        NostrLsps5Listener::new(
            self.config.nostr_listener_config(local_pubkey),
            pool,
            publisher,
        )
    }

    /// Dispatches incoming messages until `cancel` fires
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        self.dispatcher.run(cancel).await
    }

    /// Closes the event queue. Queued events can still be drained
    pub fn shutdown(&self) {
        self.events.close();
    }
}
