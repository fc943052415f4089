use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use lsps_hub::nostr_listener::{EventPublisher, PushNotification};
use lsps_hub::{CustomMessage, LspsHub};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::node::ClnLightningNode;

#[derive(Clone)]
pub struct PluginState {
    pub hub: Arc<LspsHub>,
    pub node: Arc<ClnLightningNode>,
    pub notifications: Arc<NotificationInbox>,
    /// Feeds the `custommsg` hook into the node
    pub incoming: mpsc::Sender<anyhow::Result<CustomMessage>>,
    pub cancel: CancellationToken,
}

impl PluginState {
    pub fn new(
        hub: Arc<LspsHub>,
        node: Arc<ClnLightningNode>,
        incoming: mpsc::Sender<anyhow::Result<CustomMessage>>,
    ) -> Self {
        let capacity = hub.config().event_queue_capacity;
        Self {
            hub,
            node,
            notifications: Arc::new(NotificationInbox::new(capacity)),
            incoming,
            cancel: CancellationToken::new(),
        }
    }
}

/// Keeps LSPS5 push notifications until they are drained.
///
/// Follows the policy of the event queue: when full, new notifications
/// are dropped.
pub struct NotificationInbox {
    notifications: Mutex<VecDeque<PushNotification>>,
    capacity: usize,
}

impl NotificationInbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            notifications: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn drain(&self) -> Vec<PushNotification> {
        match self.notifications.lock() {
            Ok(mut notifications) => notifications.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}

impl EventPublisher for NotificationInbox {
    fn publish(&self, notification: PushNotification) {
        log::info!(
            "Received {} from LSP {}",
            notification.name,
            notification.lsp_pubkey
        );

        let mut notifications = match self.notifications.lock() {
            Ok(notifications) => notifications,
            Err(poisoned) => poisoned.into_inner(),
        };
        if notifications.len() >= self.capacity {
            log::warn!("Notification inbox is full. Dropping {}", notification.name);
            return;
        }
        notifications.push_back(notification);
    }
}
