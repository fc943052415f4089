use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::sync::lock;

type SlotTable<Key, Response> = Arc<Mutex<HashMap<Key, oneshot::Sender<Response>>>>;

/// Matches responses with the requests that are awaiting them.
///
/// Registering a key returns a [`ResponseSlot`] that resolves once
/// [`ResponseSlots::complete`] is called for the same key. Dropping the
/// slot removes the key, so a caller that gives up on a request (time-out,
/// cancellation, failed send) never leaves an entry behind.
pub struct ResponseSlots<Key, Response> {
    slots: SlotTable<Key, Response>,
}

impl<Key, Response> Clone for ResponseSlots<Key, Response> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<Key, Response> Default for ResponseSlots<Key, Response> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<Key, Response> ResponseSlots<Key, Response>
where
    Key: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Err(key)` if the key is already awaiting a response
    pub fn register(&self, key: Key) -> Result<ResponseSlot<Key, Response>, Key> {
        let mut slots = lock(&self.slots);
        if slots.contains_key(&key) {
            return Err(key);
        }

        let (sender, receiver) = oneshot::channel();
        slots.insert(key.clone(), sender);

        Ok(ResponseSlot {
            key,
            receiver,
            slots: self.slots.clone(),
        })
    }

    /// Returns `true` if a matching slot existed
    pub fn complete(&self, key: &Key, response: Response) -> bool {
        let sender = lock(&self.slots).remove(key);
        match sender {
            // The receiver may have been dropped since we took the lock.
            // The request was known, so the response is still consumed.
            Some(sender) => {
                let _ = sender.send(response);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &Key) -> bool {
        lock(&self.slots).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.slots).is_empty()
    }
}

/// Resolves to the response, or `None` if the table was dropped
pub struct ResponseSlot<Key, Response>
where
    Key: Hash + Eq,
{
    key: Key,
    receiver: oneshot::Receiver<Response>,
    slots: SlotTable<Key, Response>,
}

impl<Key, Response> Drop for ResponseSlot<Key, Response>
where
    Key: Hash + Eq,
{
    fn drop(&mut self) {
        lock(&self.slots).remove(&self.key);
    }
}

impl<Key, Response> Future for ResponseSlot<Key, Response>
where
    Key: Hash + Eq + Unpin,
{
    type Output = Option<Response>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver).poll(cx).map(|r| r.ok())
    }
}
