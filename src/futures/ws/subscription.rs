//! Subscriber registries and the caller-owned receiving half.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::futures::ws::reconnect::ReconnectingSession;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one subscriber; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        SubscriptionId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The receiving end of one subscription.
///
/// Messages are buffered up to the configured subscriber buffer. A
/// subscriber that falls behind misses messages instead of slowing down
/// the connection or other subscribers.
///
/// ```rust,no_run
/// use bitunix_api_client::futures::ws::Subscription;
/// use futures_util::StreamExt;
///
/// # async fn run<T: std::fmt::Debug>(sub: Subscription<T>) {
/// let mut stream = sub.into_stream();
/// while let Some(update) = stream.next().await {
///     println!("{update:?}");
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriptionId,
    receiver: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// This subscription's ID.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next message; `None` once the subscription is removed.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Take a buffered message without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Convert into a [`futures_util::Stream`].
    pub fn into_stream(self) -> ReceiverStream<T> {
        ReceiverStream::new(self.receiver)
    }
}

struct Entry<K, T> {
    id: SubscriptionId,
    key: K,
    sender: mpsc::Sender<T>,
}

/// Outcome of one [`Registry::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Delivery {
    /// Subscribers that accepted the message.
    pub(crate) delivered: usize,
    /// The last subscriber for the key was pruned by this delivery.
    pub(crate) orphaned: bool,
}

/// Senders for every subscriber of one kind of message.
///
/// Registering or removing a subscriber together with the matching wire
/// frame must happen under [`Registry::lock_changes`].
pub(crate) struct Registry<K, T> {
    name: &'static str,
    entries: Mutex<Vec<Entry<K, T>>>,
    changes: AsyncMutex<()>,
}

impl<K: PartialEq + Clone, T: Clone> Registry<K, T> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(Vec::new()),
            changes: AsyncMutex::new(()),
        }
    }

    /// Serialize subscribe and unsubscribe for this registry.
    pub(crate) async fn lock_changes(&self) -> AsyncMutexGuard<'_, ()> {
        self.changes.lock().await
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Vec<Entry<K, T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a subscriber for `key` with a bounded buffer.
    pub(crate) fn register(&self, key: K, buffer: usize) -> Subscription<T> {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let id = SubscriptionId::next();
        self.entries().push(Entry { id, key, sender });
        Subscription { id, receiver }
    }

    /// Remove a subscriber, returning its key if it was registered.
    pub(crate) fn remove(&self, id: SubscriptionId) -> Option<K> {
        let mut entries = self.entries();
        let index = entries.iter().position(|e| e.id == id)?;
        Some(entries.remove(index).key)
    }

    /// Whether any subscriber is registered for `key`.
    pub(crate) fn has_key(&self, key: &K) -> bool {
        self.entries().iter().any(|e| &e.key == key)
    }

    /// Distinct keys with at least one subscriber.
    pub(crate) fn keys(&self) -> Vec<K> {
        let mut keys: Vec<K> = Vec::new();
        for entry in self.entries().iter() {
            if !keys.contains(&entry.key) {
                keys.push(entry.key.clone());
            }
        }
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }

    /// Offer `message` to every subscriber of `key` without blocking.
    ///
    /// Full buffers are skipped; dropped receivers are pruned.
    pub(crate) fn deliver(&self, key: &K, message: T) -> Delivery {
        let mut delivered = 0;
        let mut pruned = false;
        let mut entries = self.entries();
        entries.retain(|entry| {
            if &entry.key != key {
                return true;
            }
            match entry.sender.try_send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(
                        channel = self.name,
                        subscription = %entry.id,
                        "poisoned channel: subscriber buffer full, dropping message"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    pruned = true;
                    false
                }
            }
        });
        let orphaned = pruned && !entries.iter().any(|e| &e.key == key);
        Delivery { delivered, orphaned }
    }
}

/// Unsubscribe `intent` in the background once no subscriber for `key` is left.
///
/// Called from the read loop after a delivery pruned the last receiver; the
/// check is repeated under the change lock in case a new subscriber raced in.
pub(crate) fn release_orphan<K, T>(
    session: &Arc<ReconnectingSession>,
    registry: &Arc<Registry<K, T>>,
    key: K,
    intent: String,
    frame: String,
) where
    K: PartialEq + Clone + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    let session = Arc::clone(session);
    let registry = Arc::clone(registry);
    tokio::spawn(async move {
        let _changes = registry.lock_changes().await;
        if registry.has_key(&key) {
            return;
        }
        debug!(channel = registry.name, subscription = %intent, "releasing abandoned subscription");
        if let Err(e) = session.unsubscribe(&intent, frame).await {
            warn!(channel = registry.name, error = %e, "unsubscribe of abandoned subscription failed");
        }
    });
}
