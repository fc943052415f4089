use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{HubError, Result};
use crate::events::Event;
use crate::sync::lock;

pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 100;

/// A bounded FIFO of [`Event`]s.
///
/// Producers never wait: an event that arrives while the queue is full
/// or closed is dropped and logged. Consumers can poll with
/// [`EventQueue::next_event`] or wait with [`EventQueue::next`].
pub struct EventQueue {
    state: Mutex<QueueState>,
    notifier: Notify,
    capacity: usize,
}

struct QueueState {
    events: VecDeque<Event>,
    closed: bool,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_QUEUE_CAPACITY)
    }
}

impl EventQueue {
    /// Creates a queue. The capacity is at least 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notifier: Notify::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if the event was accepted
    pub fn enqueue(&self, event: impl Into<Event>) -> bool {
        let event = event.into();
        {
            let mut state = lock(&self.state);
            if state.closed {
                log::warn!(
                    "Dropping {} event for request {}: the event queue is closed",
                    event.event_type(),
                    event.request_id()
                );
                return false;
            }
            if state.events.len() >= self.capacity {
                log::warn!(
                    "Dropping {} event for request {}: the event queue is full ({} events)",
                    event.event_type(),
                    event.request_id(),
                    self.capacity
                );
                return false;
            }
            state.events.push_back(event);
        }

        self.notifier.notify_waiters();
        true
    }

    /// Waits for the next event.
    ///
    /// Fails with [`HubError::Cancelled`] once `cancel` fires and with
    /// [`HubError::Closed`] once the queue is closed and empty.
    pub async fn next(&self, cancel: &CancellationToken) -> Result<Event> {
        loop {
            let notified = self.notifier.notified();
            tokio::pin!(notified);
            // Register before checking the state so a concurrent enqueue
            // can't slip in between the check and the wait.
            notified.as_mut().enable();

            if cancel.is_cancelled() {
                return Err(HubError::Cancelled);
            }

            {
                let mut state = lock(&self.state);
                if let Some(event) = state.events.pop_front() {
                    return Ok(event);
                }
                if state.closed {
                    return Err(HubError::Closed);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HubError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    pub fn next_event(&self) -> Option<Event> {
        lock(&self.state).events.pop_front()
    }

    /// Removes and returns all queued events in order
    pub fn drain_pending(&self) -> Vec<Event> {
        lock(&self.state).events.drain(..).collect()
    }

    /// Rejects all future events and wakes up every waiting consumer.
    ///
    /// Events that are already queued can still be consumed.
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.notifier.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn len(&self) -> usize {
        lock(&self.state).events.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).events.is_empty()
    }
}
