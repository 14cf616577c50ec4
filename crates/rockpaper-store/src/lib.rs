//! Shared document store abstraction for Rockpaper.
//!
//! Provides the [`RoomStore`] trait: the complete set of capabilities the
//! match engine needs from a remote, subscribable key/value store. The
//! engine never talks to a backend directly, so it can run against the
//! in-memory backend in tests and against a hosted realtime database in
//! the app without changing a line.
//!
//! # Feature Flags
//!
//! - `memory` (default): in-process backend ([`MemoryBackend`]) that
//!   several clients can share, including simulated connection drops.

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::StoreError;
#[cfg(feature = "memory")]
pub use memory::{MemoryBackend, MemoryStore};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{mpsc, watch};

/// A document as stored: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// Outcome of [`RoomStore::create_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The document did not exist and now holds the given value.
    Created,
    /// A document already lives at that path; nothing was written.
    Exists,
}

/// What the store does on its own when a client's connection drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectAction {
    /// Delete the whole document.
    Remove,
    /// Delete only the named fields.
    ClearFields(Vec<String>),
}

/// Handle for one live subscription, unique within the process.
///
/// Backends mint these with [`SubscriptionId::next`]; callers only hand
/// them back to [`RoomStore::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }
}

/// The full value of a document at one moment.
///
/// Always the whole document, never a delta. `None` means the document
/// does not exist (never created, or deleted).
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(pub Option<Document>);

impl Snapshot {
    /// Returns `true` if the document exists.
    pub fn exists(&self) -> bool {
        self.0.is_some()
    }

    /// Consumes the snapshot, returning the document if it exists.
    pub fn into_document(self) -> Option<Document> {
        self.0
    }
}

/// Receiving end of a document subscription.
///
/// The first snapshot delivered is the document's value at subscription
/// time; after that, one snapshot per change. Dropping the subscription
/// closes the channel, and the store stops delivering on its next write.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    /// Wraps a receiver fed by a store implementation.
    pub fn new(id: SubscriptionId, receiver: mpsc::UnboundedReceiver<Snapshot>) -> Self {
        Self { id, receiver }
    }

    /// The handle to pass to [`RoomStore::unsubscribe`].
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the store has dropped this subscription.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }
}

/// The capabilities a shared room document store provides.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` so a store handle can live inside a spawned
///   task for the whole match.
/// - The async methods return `Send` futures, so generic callers can be
///   spawned onto a multi-threaded runtime.
///
/// Nothing else (queries, indices, security rules, transactions beyond an
/// atomic multi-field update) is part of the contract.
pub trait RoomStore: Send + Sync + 'static {
    /// Writes `value` at `path` only if nothing is there yet.
    fn create_if_absent(
        &self,
        path: &str,
        value: Document,
    ) -> impl Future<Output = Result<CreateOutcome, StoreError>> + Send;

    /// Reads the current value at `path` once.
    fn read_once(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Starts receiving snapshots of the document at `path`.
    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Stops a subscription. Unknown or already-removed ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Applies a partial write atomically.
    ///
    /// Every key in `patch` is written; a `null` value removes the key. A
    /// document left with no keys ceases to exist.
    fn update_fields(
        &self,
        path: &str,
        patch: Document,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Asks the store to run `action` on `path` if this client's
    /// connection drops before the hook is cancelled.
    fn register_on_disconnect(
        &self,
        path: &str,
        action: DisconnectAction,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Cancels every hook this client registered on `path`.
    fn cancel_on_disconnect(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// This client's connection state; `true` while connected.
    fn connectivity(&self) -> watch::Receiver<bool>;
}
