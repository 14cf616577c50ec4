//! In-process [`RoomStore`] backend.
//!
//! One [`MemoryBackend`] plays the part of the remote database. Each
//! client gets its own [`MemoryStore`] handle from
//! [`MemoryBackend::connect`], so on-disconnect hooks and connectivity
//! are tracked per client exactly as a hosted backend would track them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::{
    CreateOutcome, DisconnectAction, Document, RoomStore, Snapshot, StoreError,
    Subscription, SubscriptionId,
};

/// Counter for generating unique client IDs.
static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

type ClientId = u64;

struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct Shared {
    documents: HashMap<String, Document>,
    subscribers: HashMap<String, Vec<Subscriber>>,
    /// Pending on-disconnect hooks, per client, in registration order.
    hooks: HashMap<ClientId, Vec<(String, DisconnectAction)>>,
}

impl Shared {
    /// Replaces the document at `path` and notifies subscribers if the
    /// value actually changed.
    fn write(&mut self, path: &str, next: Option<Document>) {
        let previous = match &next {
            Some(doc) if !doc.is_empty() => {
                self.documents.insert(path.to_string(), doc.clone())
            }
            // Empty documents do not exist.
            _ => self.documents.remove(path),
        };
        let current = self.documents.get(path).cloned();
        if previous != current {
            self.notify(path, Snapshot(current));
        }
    }

    fn notify(&mut self, path: &str, snapshot: Snapshot) {
        if let Some(subs) = self.subscribers.get_mut(path) {
            // Receivers that were dropped without unsubscribing are pruned here.
            subs.retain(|sub| sub.sender.send(snapshot.clone()).is_ok());
            tracing::trace!(path, subscribers = subs.len(), "snapshot delivered");
        }
    }

    fn apply_patch(&mut self, path: &str, patch: Document) {
        let mut doc = self.documents.get(path).cloned().unwrap_or_default();
        for (key, value) in patch {
            if value.is_null() {
                doc.remove(&key);
            } else {
                doc.insert(key, value);
            }
        }
        self.write(path, Some(doc));
    }

    fn run_hook(&mut self, path: &str, action: DisconnectAction) {
        match action {
            DisconnectAction::Remove => self.write(path, None),
            DisconnectAction::ClearFields(fields) => {
                let patch = fields.into_iter().map(|f| (f, Value::Null)).collect();
                self.apply_patch(path, patch);
            }
        }
    }
}

/// The shared backing store. Cheap to clone; every clone sees the same
/// documents.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new client connection to this backend.
    pub fn connect(&self) -> MemoryStore {
        let (online, _) = watch::channel(true);
        MemoryStore {
            client: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            shared: Arc::clone(&self.shared),
            online: Arc::new(online),
        }
    }

    /// Current value of the document at `path`, for inspection.
    pub fn document(&self, path: &str) -> Option<Document> {
        lock(&self.shared).ok()?.documents.get(path).cloned()
    }

    /// Writes a document directly, bypassing any client. Subscribers are
    /// notified as for a client write.
    pub fn insert(&self, path: &str, doc: Document) -> Result<(), StoreError> {
        lock(&self.shared)?.write(path, Some(doc));
        Ok(())
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        lock(&self.shared).map(|s| s.documents.len()).unwrap_or(0)
    }

    /// Returns `true` if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One client's connection to a [`MemoryBackend`].
///
/// Clones share the same client identity: hooks registered through one
/// clone fire when any clone simulates a drop.
#[derive(Clone)]
pub struct MemoryStore {
    client: ClientId,
    shared: Arc<Mutex<Shared>>,
    online: Arc<watch::Sender<bool>>,
}

impl MemoryStore {
    /// Simulates this client's connection dropping.
    ///
    /// All of its pending on-disconnect hooks run (and are consumed), and
    /// its connectivity flips to `false`. Further reads and writes fail
    /// with [`StoreError::Offline`] until [`reconnect`](Self::reconnect).
    pub fn drop_connection(&self) -> Result<(), StoreError> {
        let mut shared = lock(&self.shared)?;
        let hooks = shared.hooks.remove(&self.client).unwrap_or_default();
        tracing::debug!(client = self.client, hooks = hooks.len(), "connection dropped");
        for (path, action) in hooks {
            shared.run_hook(&path, action);
        }
        drop(shared);
        self.online.send_replace(false);
        Ok(())
    }

    /// Restores the connection after [`drop_connection`](Self::drop_connection).
    pub fn reconnect(&self) {
        tracing::debug!(client = self.client, "connection restored");
        self.online.send_replace(true);
    }

    /// Hooks this client has pending on `path`, in registration order.
    pub fn pending_hooks(&self, path: &str) -> Vec<DisconnectAction> {
        let Ok(shared) = lock(&self.shared) else {
            return Vec::new();
        };
        shared
            .hooks
            .get(&self.client)
            .map(|hooks| {
                hooks
                    .iter()
                    .filter(|(p, _)| p == path)
                    .map(|(_, action)| action.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if *self.online.borrow() {
            Ok(())
        } else {
            Err(StoreError::Offline)
        }
    }
}

impl RoomStore for MemoryStore {
    async fn create_if_absent(
        &self,
        path: &str,
        value: Document,
    ) -> Result<CreateOutcome, StoreError> {
        self.ensure_online()?;
        let mut shared = lock(&self.shared)?;
        if shared.documents.contains_key(path) {
            return Ok(CreateOutcome::Exists);
        }
        shared.write(path, Some(value));
        Ok(CreateOutcome::Created)
    }

    async fn read_once(&self, path: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_online()?;
        Ok(lock(&self.shared)?.documents.get(path).cloned())
    }

    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let mut shared = lock(&self.shared)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::next();

        // The current value goes out first, like a realtime listener's
        // initial event.
        let current = shared.documents.get(path).cloned();
        let _ = tx.send(Snapshot(current));

        shared
            .subscribers
            .entry(path.to_string())
            .or_default()
            .push(Subscriber { id, sender: tx });
        tracing::debug!(client = self.client, path, ?id, "subscribed");
        Ok(Subscription::new(id, rx))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let Ok(mut shared) = lock(&self.shared) else {
            return;
        };
        for subs in shared.subscribers.values_mut() {
            subs.retain(|sub| sub.id != id);
        }
        shared.subscribers.retain(|_, subs| !subs.is_empty());
        tracing::debug!(client = self.client, ?id, "unsubscribed");
    }

    async fn update_fields(&self, path: &str, patch: Document) -> Result<(), StoreError> {
        self.ensure_online()?;
        lock(&self.shared)?.apply_patch(path, patch);
        Ok(())
    }

    async fn register_on_disconnect(
        &self,
        path: &str,
        action: DisconnectAction,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        lock(&self.shared)?
            .hooks
            .entry(self.client)
            .or_default()
            .push((path.to_string(), action));
        Ok(())
    }

    async fn cancel_on_disconnect(&self, path: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut shared = lock(&self.shared)?;
        if let Some(hooks) = shared.hooks.get_mut(&self.client) {
            hooks.retain(|(p, _)| p != path);
        }
        Ok(())
    }

    fn connectivity(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}

fn lock(shared: &Mutex<Shared>) -> Result<MutexGuard<'_, Shared>, StoreError> {
    shared
        .lock()
        .map_err(|_| StoreError::Unavailable("memory backend lock poisoned".into()))
}
