//! Integration tests for `SessionController` against the in-memory store.
//!
//! Every controller runs on an `AuditStore`, which forwards to a real
//! `MemoryStore` and records any write that touches a field owned by the
//! other role. Each test ends by asserting the audit log is empty. It can
//! also refuse or slow down on-disconnect hook calls, to exercise the
//! controller's failure and cancellation paths.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rockpaper_protocol::{Field, Move, PlayerId, Role, Room, TapBattleMode};
use rockpaper_session::{
    Identity, SessionConfig, SessionController, SessionError, SessionEvent, SessionUpdate,
};
use rockpaper_store::{
    CreateOutcome, DisconnectAction, Document, MemoryBackend, MemoryStore, RoomStore,
    StoreError, Subscription, SubscriptionId,
};
use tokio::sync::watch;

// =========================================================================
// Ownership-auditing store
// =========================================================================

#[derive(Clone)]
struct AuditStore {
    inner: MemoryStore,
    role: Role,
    violations: Arc<Mutex<Vec<String>>>,
    refuse_hooks: Arc<AtomicBool>,
    hook_delay_ms: Arc<AtomicU64>,
}

impl AuditStore {
    fn new(inner: MemoryStore, role: Role) -> Self {
        Self {
            inner,
            role,
            violations: Arc::new(Mutex::new(Vec::new())),
            refuse_hooks: Arc::new(AtomicBool::new(false)),
            hook_delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    fn refuse_hooks(&self, refuse: bool) {
        self.refuse_hooks.store(refuse, Ordering::SeqCst);
    }

    fn delay_hooks(&self, delay: Duration) {
        self.hook_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn hook_gate(&self) -> Result<(), StoreError> {
        let delay = self.hook_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.refuse_hooks.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("hooks refused".into()));
        }
        Ok(())
    }

    /// Records every key in `doc` that `self.role` may not write. The one
    /// cross-role write allowed is the host nulling a round field.
    fn audit(&self, doc: &Document) {
        for (key, value) in doc {
            let Some(field) = Field::from_name(key) else {
                self.violate(format!("{} wrote unknown key {key}", self.role));
                continue;
            };
            if field.owner() == self.role {
                continue;
            }
            let round_reset =
                self.role == Role::Host && field.is_round_field() && value.is_null();
            if !round_reset {
                self.violate(format!("{} wrote {key} = {value}", self.role));
            }
        }
    }

    fn violate(&self, msg: String) {
        self.violations.lock().unwrap().push(msg);
    }

    fn violations(&self) -> Vec<String> {
        self.violations.lock().unwrap().clone()
    }
}

impl RoomStore for AuditStore {
    async fn create_if_absent(
        &self,
        path: &str,
        value: Document,
    ) -> Result<CreateOutcome, StoreError> {
        self.audit(&value);
        self.inner.create_if_absent(path, value).await
    }

    async fn read_once(&self, path: &str) -> Result<Option<Document>, StoreError> {
        self.inner.read_once(path).await
    }

    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe(path)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.unsubscribe(id)
    }

    async fn update_fields(&self, path: &str, patch: Document) -> Result<(), StoreError> {
        self.audit(&patch);
        self.inner.update_fields(path, patch).await
    }

    async fn register_on_disconnect(
        &self,
        path: &str,
        action: DisconnectAction,
    ) -> Result<(), StoreError> {
        self.hook_gate().await?;
        match &action {
            DisconnectAction::Remove if self.role == Role::Guest => {
                self.violate("guest registered a room-removing hook".into());
            }
            DisconnectAction::Remove => {}
            // A hook runs long after the round it was registered in, so
            // the round-reset exception does not apply.
            DisconnectAction::ClearFields(fields) => {
                for key in fields {
                    if Field::from_name(key).is_none_or(|f| f.owner() != self.role) {
                        self.violate(format!("{} hook clears {key}", self.role));
                    }
                }
            }
        }
        self.inner.register_on_disconnect(path, action).await
    }

    async fn cancel_on_disconnect(&self, path: &str) -> Result<(), StoreError> {
        self.hook_gate().await?;
        self.inner.cancel_on_disconnect(path).await
    }

    fn connectivity(&self) -> watch::Receiver<bool> {
        self.inner.connectivity()
    }
}

// =========================================================================
// Helpers
// =========================================================================

struct Client {
    ctrl: SessionController<AuditStore>,
    /// Same client identity as the controller's store, for simulating
    /// drops and inspecting hooks.
    store: MemoryStore,
}

impl Client {
    fn new(backend: &MemoryBackend, role: Role, name: &str) -> Self {
        Self::with_config(backend, role, name, SessionConfig::default())
    }

    fn with_config(
        backend: &MemoryBackend,
        role: Role,
        name: &str,
        config: SessionConfig,
    ) -> Self {
        let store = backend.connect();
        let identity = Identity::new(format!("{name}-id"), Some(name.to_string()));
        let ctrl = SessionController::new(AuditStore::new(store.clone(), role), identity, config);
        Self { ctrl, store }
    }

    /// Next room update, skipping connectivity events.
    async fn next_update(&mut self) -> SessionUpdate {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(1), self.ctrl.next_event())
                .await
                .expect("timed out waiting for an event")
                .expect("controller is not subscribed");
            if let SessionEvent::Update(update) = event {
                return update;
            }
        }
    }

    /// Processes updates until one satisfies `pred`.
    async fn update_until(&mut self, pred: impl Fn(&SessionUpdate) -> bool) -> SessionUpdate {
        loop {
            let update = self.next_update().await;
            if pred(&update) {
                return update;
            }
        }
    }

    fn assert_clean(&self) {
        assert_eq!(self.ctrl.store().violations(), Vec::<String>::new());
    }
}

fn room_at(backend: &MemoryBackend, path: &str) -> Option<Room> {
    backend
        .document(path)
        .map(|doc| Room::from_document(doc).unwrap())
}

/// A host with a room and a guest that joined it, both caught up.
async fn joined_pair(backend: &MemoryBackend) -> (Client, Client, String) {
    let mut host = Client::new(backend, Role::Host, "Ada");
    let mut guest = Client::new(backend, Role::Guest, "Bo");

    let code = host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap();
    host.next_update().await;
    guest.ctrl.join_session(code.as_str()).await.unwrap();
    host.update_until(|u| u.room.as_ref().is_some_and(|r| r.guest_id.is_some()))
        .await;
    guest.next_update().await;

    (host, guest, code.path())
}

// =========================================================================
// create_session
// =========================================================================

#[tokio::test]
async fn test_create_session_writes_host_fields_and_remove_hook() {
    let backend = MemoryBackend::new();
    let mut host = Client::new(&backend, Role::Host, "Ada");

    let code = host.ctrl.create_session(5, TapBattleMode::Always).await.unwrap();

    assert_eq!(code.as_str().len(), 4);
    let room = room_at(&backend, &code.path()).unwrap();
    assert_eq!(room.host_id, Some(PlayerId::from("Ada-id")));
    assert_eq!(room.host_name.as_deref(), Some("Ada"));
    assert_eq!(room.best_of, 5);
    assert_eq!(room.current_round, 1);
    assert_eq!(room.tap_battle_mode, Some(TapBattleMode::Always));
    assert!(room.timestamp.is_some_and(|t| t > 0));
    assert_eq!(host.ctrl.role(), Some(Role::Host));
    assert_eq!(host.store.pending_hooks(&code.path()), vec![DisconnectAction::Remove]);

    // The subscription starts with the room as created.
    let first = host.next_update().await;
    assert_eq!(first.room, Some(room));
    assert!(!first.opponent_disconnected);
    host.assert_clean();
}

#[tokio::test]
async fn test_create_session_all_codes_taken_returns_creation_exhausted() {
    let backend = MemoryBackend::new();
    // One-symbol codes: occupy all 32 so every attempt collides.
    for symbol in rockpaper_protocol::CODE_ALPHABET {
        let path = format!("games/{}", *symbol as char);
        let doc = Room::new(PlayerId::from("x"), None, 3, TapBattleMode::TiesOnly, 1)
            .to_document()
            .unwrap();
        backend.insert(&path, doc).unwrap();
    }
    let config = SessionConfig {
        room_code_len: 1,
        ..SessionConfig::default()
    };
    let mut host = Client::with_config(&backend, Role::Host, "Ada", config);

    let err = host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap_err();

    assert!(matches!(err, SessionError::CreationExhausted { attempts: 5 }));
    assert!(!host.ctrl.in_room());
    assert!(host.ctrl.last_error().is_some());
    assert_eq!(backend.len(), 32);
}

#[tokio::test]
async fn test_create_session_twice_is_rejected() {
    let backend = MemoryBackend::new();
    let mut host = Client::new(&backend, Role::Host, "Ada");
    host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap();

    let err = host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap_err();

    assert!(matches!(err, SessionError::AlreadyInRoom(_)));
    assert_eq!(backend.len(), 1);
}

// =========================================================================
// join_session
// =========================================================================

#[tokio::test]
async fn test_join_session_missing_room_is_not_found_or_full() {
    let backend = MemoryBackend::new();
    let mut guest = Client::new(&backend, Role::Guest, "Bo");

    let err = guest.ctrl.join_session("ZZZZ").await.unwrap_err();

    assert!(matches!(err, SessionError::RoomNotFoundOrFull));
    assert_eq!(err.to_string(), "Game not found or already full");
    assert_eq!(guest.ctrl.last_error(), Some("Game not found or already full"));
    assert!(!guest.ctrl.in_room());
}

#[tokio::test]
async fn test_join_session_malformed_code_is_not_found_or_full() {
    let backend = MemoryBackend::new();
    let mut guest = Client::new(&backend, Role::Guest, "Bo");

    let err = guest.ctrl.join_session("O0I1").await.unwrap_err();

    assert!(matches!(err, SessionError::RoomNotFoundOrFull));
}

#[tokio::test]
async fn test_join_session_full_room_is_not_found_or_full() {
    let backend = MemoryBackend::new();
    let (_host, _guest, path) = joined_pair(&backend).await;
    let code = path.trim_start_matches("games/").to_string();
    let mut third = Client::new(&backend, Role::Guest, "Cy");

    let err = third.ctrl.join_session(&code).await.unwrap_err();

    assert!(matches!(err, SessionError::RoomNotFoundOrFull));
    let room = room_at(&backend, &path).unwrap();
    assert_eq!(room.guest_id, Some(PlayerId::from("Bo-id")), "first guest keeps the seat");
}

#[tokio::test]
async fn test_join_session_room_without_host_is_not_found_or_full() {
    let backend = MemoryBackend::new();
    let mut remnant = Room::new(PlayerId::from("h"), None, 3, TapBattleMode::TiesOnly, 1);
    remnant.host_id = None;
    backend.insert("games/ABCD", remnant.to_document().unwrap()).unwrap();
    let mut guest = Client::new(&backend, Role::Guest, "Bo");

    let err = guest.ctrl.join_session("ABCD").await.unwrap_err();

    assert!(matches!(err, SessionError::RoomNotFoundOrFull));
}

#[tokio::test]
async fn test_join_session_normalises_code_and_writes_guest_fields() {
    let backend = MemoryBackend::new();
    let mut host = Client::new(&backend, Role::Host, "Ada");
    let mut guest = Client::new(&backend, Role::Guest, "Bo");
    let code = host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap();

    let typed = format!("  {} ", code.as_str().to_lowercase());
    let joined = guest.ctrl.join_session(&typed).await.unwrap();

    assert_eq!(joined.guest_id, Some(PlayerId::from("Bo-id")));
    assert_eq!(joined.host_name.as_deref(), Some("Ada"));
    assert_eq!(guest.ctrl.room_code(), Some(&code));
    assert_eq!(guest.ctrl.role(), Some(Role::Guest));
    let stored = room_at(&backend, &code.path()).unwrap();
    assert_eq!(stored.guest_name.as_deref(), Some("Bo"));
    assert_eq!(
        guest.store.pending_hooks(&code.path()),
        vec![DisconnectAction::ClearFields(vec![
            "guestId".into(),
            "guestName".into(),
            "guestMove".into(),
            "guestTapCount".into(),
        ])]
    );
    host.assert_clean();
    guest.assert_clean();
}

// =========================================================================
// Snapshot processing
// =========================================================================

#[tokio::test]
async fn test_host_seeing_guest_rescopes_disconnect_hook() {
    let backend = MemoryBackend::new();
    let (host, _guest, path) = joined_pair(&backend).await;

    assert!(host.ctrl.guest_ever_joined());
    assert_eq!(
        host.store.pending_hooks(&path),
        vec![DisconnectAction::ClearFields(vec![
            "hostId".into(),
            "hostName".into(),
            "hostMove".into(),
            "hostTapCount".into(),
        ])]
    );
}

#[tokio::test]
async fn test_host_connection_blip_after_join_keeps_room() {
    let backend = MemoryBackend::new();
    let (host, mut guest, path) = joined_pair(&backend).await;

    host.store.drop_connection().unwrap();

    let room = room_at(&backend, &path).expect("room survives a host drop");
    assert!(room.host_id.is_none());
    assert_eq!(room.best_of, 3);
    let update = guest.update_until(|u| u.opponent_disconnected).await;
    assert!(update.room.is_some());
}

#[tokio::test]
async fn test_host_drop_before_guest_removes_room() {
    let backend = MemoryBackend::new();
    let mut host = Client::new(&backend, Role::Host, "Ada");
    let code = host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap();

    host.store.drop_connection().unwrap();

    assert!(backend.document(&code.path()).is_none());
}

#[tokio::test]
async fn test_guest_drop_is_seen_by_host_as_opponent_left() {
    let backend = MemoryBackend::new();
    let (mut host, guest, path) = joined_pair(&backend).await;

    guest.store.drop_connection().unwrap();

    let update = host.update_until(|u| u.opponent_disconnected).await;
    let room = update.room.unwrap();
    assert!(room.guest_id.is_none());
    assert!(host.ctrl.opponent_disconnected());
    // The host has stepped out too; only the match settings remain.
    let remnant = room_at(&backend, &path).unwrap();
    assert!(remnant.host_id.is_none());
    assert_eq!(remnant.best_of, 3);
    host.assert_clean();
}

#[tokio::test]
async fn test_join_session_room_vacated_by_guest_is_not_found_or_full() {
    let backend = MemoryBackend::new();
    let (mut host, mut guest, path) = joined_pair(&backend).await;
    guest.ctrl.cleanup().await;
    host.update_until(|u| u.opponent_disconnected).await;
    let code = path.trim_start_matches("games/").to_string();
    let mut newcomer = Client::new(&backend, Role::Guest, "Cy");

    let result = newcomer.ctrl.join_session(&code).await;

    assert!(matches!(result, Err(SessionError::RoomNotFoundOrFull)));
    assert!(!newcomer.ctrl.in_room());
    assert!(room_at(&backend, &path).unwrap().guest_id.is_none());
    host.assert_clean();
}

#[tokio::test]
async fn test_opponent_disconnected_is_sticky() {
    let backend = MemoryBackend::new();
    let (mut host, guest, _path) = joined_pair(&backend).await;
    guest.store.drop_connection().unwrap();
    host.update_until(|u| u.opponent_disconnected).await;

    host.ctrl.submit_move(Move::Rock).await.unwrap();
    let update = host.next_update().await;

    assert!(update.opponent_disconnected);
}

#[tokio::test]
async fn test_guest_sees_room_vanish_as_opponent_left() {
    let backend = MemoryBackend::new();
    let (_host, mut guest, path) = joined_pair(&backend).await;

    // Only the store can do this; a host never deletes a joined room.
    let mut doc = backend.document(&path).unwrap();
    for key in doc.keys().cloned().collect::<Vec<_>>() {
        doc.insert(key, serde_json::Value::Null);
    }
    guest.store.update_fields(&path, doc).await.unwrap();

    let update = guest.update_until(|u| u.room.is_none()).await;
    assert!(update.opponent_disconnected);
}

#[tokio::test]
async fn test_connectivity_change_is_reported() {
    let backend = MemoryBackend::new();
    let (_host, mut guest, _path) = joined_pair(&backend).await;

    guest.store.drop_connection().unwrap();

    let mut saw_offline = false;
    for _ in 0..4 {
        let event = tokio::time::timeout(Duration::from_secs(1), guest.ctrl.next_event())
            .await
            .unwrap()
            .unwrap();
        if event == SessionEvent::Connectivity(false) {
            saw_offline = true;
            break;
        }
    }
    assert!(saw_offline);
    assert!(!guest.ctrl.is_connected());
}

// =========================================================================
// Submissions
// =========================================================================

#[tokio::test]
async fn test_submit_move_writes_only_own_field() {
    let backend = MemoryBackend::new();
    let (mut host, mut guest, path) = joined_pair(&backend).await;

    host.ctrl.submit_move(Move::Rock).await.unwrap();
    guest.ctrl.submit_move(Move::Scissors).await.unwrap();

    let room = room_at(&backend, &path).unwrap();
    assert_eq!(room.host_move, Some(Move::Rock));
    assert_eq!(room.guest_move, Some(Move::Scissors));
    let update = host.update_until(|u| u.room.as_ref().is_some_and(Room::both_moves_submitted)).await;
    assert!(!update.opponent_disconnected);
    host.assert_clean();
    guest.assert_clean();
}

#[tokio::test]
async fn test_submit_tap_count_writes_only_own_field() {
    let backend = MemoryBackend::new();
    let (mut host, mut guest, path) = joined_pair(&backend).await;

    host.ctrl.submit_tap_count(31).await.unwrap();
    guest.ctrl.submit_tap_count(17).await.unwrap();

    let room = room_at(&backend, &path).unwrap();
    assert_eq!(room.host_tap_count, Some(31));
    assert_eq!(room.guest_tap_count, Some(17));
    host.assert_clean();
    guest.assert_clean();
}

#[tokio::test]
async fn test_submit_before_joining_is_not_in_room() {
    let backend = MemoryBackend::new();
    let mut guest = Client::new(&backend, Role::Guest, "Bo");

    let err = guest.ctrl.submit_move(Move::Paper).await.unwrap_err();

    assert!(matches!(err, SessionError::NotInRoom));
}

#[tokio::test]
async fn test_submit_move_offline_returns_store_error() {
    let backend = MemoryBackend::new();
    let (_host, mut guest, _path) = joined_pair(&backend).await;
    guest.store.drop_connection().unwrap();

    let err = guest.ctrl.submit_move(Move::Paper).await.unwrap_err();

    assert!(matches!(err, SessionError::Store(StoreError::Offline)));
    assert_eq!(guest.ctrl.last_error(), Some("store is offline"));
}

#[tokio::test]
async fn test_clear_round_host_resets_round_fields() {
    let backend = MemoryBackend::new();
    let (mut host, mut guest, path) = joined_pair(&backend).await;
    host.ctrl.submit_move(Move::Rock).await.unwrap();
    guest.ctrl.submit_move(Move::Rock).await.unwrap();
    host.ctrl.submit_tap_count(12).await.unwrap();
    guest.ctrl.submit_tap_count(9).await.unwrap();

    host.ctrl.clear_round(2).await.unwrap();

    let room = room_at(&backend, &path).unwrap();
    assert!(room.moves_cleared());
    assert_eq!(room.host_tap_count, None);
    assert_eq!(room.guest_tap_count, None);
    assert_eq!(room.current_round, 2);
    assert_eq!(room.guest_id, Some(PlayerId::from("Bo-id")));
    host.assert_clean();
}

#[tokio::test]
async fn test_clear_round_guest_is_noop() {
    let backend = MemoryBackend::new();
    let (_host, mut guest, path) = joined_pair(&backend).await;
    guest.ctrl.submit_move(Move::Paper).await.unwrap();

    guest.ctrl.clear_round(2).await.unwrap();

    let room = room_at(&backend, &path).unwrap();
    assert_eq!(room.guest_move, Some(Move::Paper));
    assert_eq!(room.current_round, 1);
    guest.assert_clean();
}

// =========================================================================
// cleanup
// =========================================================================

#[tokio::test]
async fn test_cleanup_host_without_guest_deletes_room() {
    let backend = MemoryBackend::new();
    let mut host = Client::new(&backend, Role::Host, "Ada");
    let code = host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap();

    host.ctrl.cleanup().await;

    assert!(backend.document(&code.path()).is_none());
    assert!(backend.is_empty());
    assert!(host.store.pending_hooks(&code.path()).is_empty());
    assert!(!host.ctrl.in_room());
    host.assert_clean();
}

#[tokio::test]
async fn test_cleanup_host_with_guest_nulls_only_host_fields() {
    let backend = MemoryBackend::new();
    let (mut host, mut guest, path) = joined_pair(&backend).await;

    host.ctrl.cleanup().await;

    let room = room_at(&backend, &path).expect("remnant stays for the guest");
    assert!(room.host_id.is_none());
    assert!(room.host_name.is_none());
    assert_eq!(room.guest_id, Some(PlayerId::from("Bo-id")));
    assert_eq!(room.best_of, 3);
    guest.update_until(|u| u.opponent_disconnected).await;
    host.assert_clean();
}

#[tokio::test]
async fn test_cleanup_guest_nulls_only_guest_fields() {
    let backend = MemoryBackend::new();
    let (mut host, mut guest, path) = joined_pair(&backend).await;

    guest.ctrl.cleanup().await;

    let room = room_at(&backend, &path).unwrap();
    assert!(room.guest_id.is_none());
    assert!(room.guest_name.is_none());
    assert_eq!(room.host_id, Some(PlayerId::from("Ada-id")));
    assert!(guest.store.pending_hooks(&path).is_empty());
    host.update_until(|u| u.opponent_disconnected).await;
    guest.assert_clean();
}

#[tokio::test]
async fn test_cleanup_host_after_guest_left_deletes_room() {
    let backend = MemoryBackend::new();
    let (mut host, mut guest, path) = joined_pair(&backend).await;
    guest.ctrl.cleanup().await;
    host.update_until(|u| u.opponent_disconnected).await;

    host.ctrl.cleanup().await;

    assert!(backend.document(&path).is_none());
    host.assert_clean();
}

#[tokio::test]
async fn test_cleanup_is_idempotent_and_ends_event_stream() {
    let backend = MemoryBackend::new();
    let (mut host, mut guest, path) = joined_pair(&backend).await;

    guest.ctrl.cleanup().await;
    guest.ctrl.cleanup().await;

    assert!(guest.ctrl.next_event().await.is_none());
    // Later room changes never reach the retired controller.
    host.ctrl.submit_move(Move::Rock).await.unwrap();
    assert!(guest.ctrl.next_event().await.is_none());
    assert!(guest.ctrl.snapshot().is_none());
    assert!(room_at(&backend, &path).is_some());
}

#[tokio::test]
async fn test_cleanup_before_any_room_is_harmless() {
    let backend = MemoryBackend::new();
    let mut client = Client::new(&backend, Role::Guest, "Bo");

    client.ctrl.cleanup().await;

    assert!(client.ctrl.next_event().await.is_none());
    assert!(backend.is_empty());
}

// =========================================================================
// Partial failures
// =========================================================================

#[tokio::test]
async fn test_create_session_hook_failure_deletes_room_and_stays_idle() {
    let backend = MemoryBackend::new();
    let mut host = Client::new(&backend, Role::Host, "Ada");
    host.ctrl.store().refuse_hooks(true);

    let result = host.ctrl.create_session(3, TapBattleMode::TiesOnly).await;

    assert!(matches!(result, Err(SessionError::Store(StoreError::Unavailable(_)))));
    assert!(backend.is_empty());
    assert!(!host.ctrl.in_room());
    assert!(host.ctrl.last_error().is_some());
    assert!(host.ctrl.next_event().await.is_none());

    host.ctrl.store().refuse_hooks(false);
    host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap();
    assert_eq!(backend.len(), 1);
    host.assert_clean();
}

#[tokio::test]
async fn test_join_session_hook_failure_leaves_no_guest_and_allows_retry() {
    let backend = MemoryBackend::new();
    let mut host = Client::new(&backend, Role::Host, "Ada");
    let mut guest = Client::new(&backend, Role::Guest, "Bo");
    let code = host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap();
    host.next_update().await;
    guest.ctrl.store().refuse_hooks(true);

    let result = guest.ctrl.join_session(code.as_str()).await;

    assert!(matches!(result, Err(SessionError::Store(StoreError::Unavailable(_)))));
    assert!(!guest.ctrl.in_room());
    assert!(room_at(&backend, &code.path()).unwrap().guest_id.is_none());
    assert!(guest.store.pending_hooks(&code.path()).is_empty());

    guest.ctrl.store().refuse_hooks(false);
    let room = guest.ctrl.join_session(code.as_str()).await.unwrap();
    assert_eq!(room.guest_id, Some(PlayerId::from("Bo-id")));
    host.update_until(|u| u.room.as_ref().is_some_and(|r| r.guest_id.is_some()))
        .await;
    assert!(host.ctrl.guest_ever_joined());
    assert!(!host.ctrl.opponent_disconnected());
    guest.assert_clean();
}

#[tokio::test(start_paused = true)]
async fn test_next_event_interrupted_while_rescoping_replays_snapshot() {
    let backend = MemoryBackend::new();
    let mut host = Client::new(&backend, Role::Host, "Ada");
    let mut guest = Client::new(&backend, Role::Guest, "Bo");
    let code = host.ctrl.create_session(3, TapBattleMode::TiesOnly).await.unwrap();
    host.next_update().await;
    guest.ctrl.join_session(code.as_str()).await.unwrap();
    host.ctrl.store().delay_hooks(Duration::from_millis(100));

    // Dropped while the hook swap is still in flight.
    let interrupted =
        tokio::time::timeout(Duration::from_millis(10), host.ctrl.next_event()).await;
    assert!(interrupted.is_err());
    assert!(!host.ctrl.guest_ever_joined());

    let update = host.next_update().await;

    assert!(update.room.unwrap().guest_id.is_some());
    assert!(host.ctrl.guest_ever_joined());
    let host_fields = Field::presence(Role::Host)
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert_eq!(
        host.store.pending_hooks(&code.path()),
        vec![DisconnectAction::ClearFields(host_fields)]
    );
    host.assert_clean();
}
