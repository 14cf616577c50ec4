//! The session controller: one client's participation in one room.
//!
//! The controller is the only thing that talks to the [`RoomStore`]. It
//! creates or joins a room, writes this client's fields (and only those),
//! installs the on-disconnect hooks, and turns the store's raw snapshots
//! into [`SessionEvent`]s with the derived "opponent left" flag attached.
//!
//! # Lifecycle
//!
//! ```text
//!   idle ──create_session──→ host  ──┐
//!     │                               ├──cleanup──→ idle
//!     └───join_session───→  guest ──┘
//! ```
//!
//! Snapshots are pulled, not pushed: the owner calls
//! [`next_event`](SessionController::next_event) in its own loop. After
//! [`cleanup`](SessionController::cleanup) the subscription is gone, so
//! nothing from the old room can reach the caller again.

use std::time::{SystemTime, UNIX_EPOCH};

use rockpaper_protocol::{Field, Move, Role, Room, RoomCode, RoomPatch, TapBattleMode};
use rockpaper_store::{CreateOutcome, DisconnectAction, RoomStore, Snapshot, Subscription};
use tokio::sync::watch;

use crate::{Identity, SessionConfig, SessionError, code};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A room snapshot after the controller has processed it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    /// The decoded room, or `None` if the document no longer exists.
    pub room: Option<Room>,
    /// Sticky: once the opponent is seen leaving, every later update
    /// carries `true` until the controller is cleaned up.
    pub opponent_disconnected: bool,
}

/// What [`SessionController::next_event`] yields.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The room changed.
    Update(SessionUpdate),
    /// This client's own connection went down (`false`) or came back.
    Connectivity(bool),
}

/// One thing read off the store's streams, before it is processed.
enum Incoming {
    Snapshot(Snapshot),
    Connectivity(bool),
    ConnectivityClosed,
    SubscriptionClosed,
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Owns one client's side of a room.
///
/// Generic over the store so tests can run it against
/// [`MemoryStore`](rockpaper_store::MemoryStore) or a wrapper around it.
pub struct SessionController<S: RoomStore> {
    store: S,
    identity: Identity,
    config: SessionConfig,

    role: Option<Role>,
    room_code: Option<RoomCode>,
    /// Latest decoded snapshot.
    snapshot: Option<Room>,
    is_connected: bool,
    opponent_disconnected: bool,
    last_error: Option<String>,
    /// For the host: a guest id has been observed. A guest sets this on
    /// its own successful join.
    guest_ever_joined: bool,

    subscription: Option<Subscription>,
    connectivity: Option<watch::Receiver<bool>>,
    /// A snapshot taken off the subscription but not yet fully applied.
    unapplied: Option<Snapshot>,
}

impl<S: RoomStore> SessionController<S> {
    pub fn new(store: S, identity: Identity, config: SessionConfig) -> Self {
        Self {
            store,
            identity,
            config,
            role: None,
            room_code: None,
            snapshot: None,
            is_connected: true,
            opponent_disconnected: false,
            last_error: None,
            guest_ever_joined: false,
            subscription: None,
            connectivity: None,
            unapplied: None,
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn room_code(&self) -> Option<&RoomCode> {
        self.room_code.as_ref()
    }

    pub fn snapshot(&self) -> Option<&Room> {
        self.snapshot.as_ref()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn opponent_disconnected(&self) -> bool {
        self.opponent_disconnected
    }

    pub fn guest_ever_joined(&self) -> bool {
        self.guest_ever_joined
    }

    /// Text of the most recent failure, for showing to the player.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns `true` while the controller is hosting or playing in a room.
    pub fn in_room(&self) -> bool {
        self.room_code.is_some()
    }

    // -- Room lifecycle ---------------------------------------------------

    /// Creates a room and becomes its host.
    ///
    /// Tries up to `max_create_attempts` freshly generated codes. Once a
    /// code is free, the room is written with this client's host fields,
    /// an on-disconnect hook that removes the whole room is registered
    /// (nobody else is in it yet), and the controller subscribes. If any
    /// step after the create fails, the room is deleted again before the
    /// error is returned.
    ///
    /// # Errors
    /// - [`SessionError::CreationExhausted`] if every code was taken.
    /// - [`SessionError::AlreadyInRoom`] if called twice without cleanup.
    /// - [`SessionError::Store`] if the store refused a write.
    pub async fn create_session(
        &mut self,
        best_of: u32,
        tap_battle_mode: TapBattleMode,
    ) -> Result<RoomCode, SessionError> {
        if let Some(code) = &self.room_code {
            return Err(SessionError::AlreadyInRoom(code.clone()));
        }
        self.last_error = None;

        for attempt in 1..=self.config.max_create_attempts {
            let code = RoomCode::parse(&code::generate(self.config.room_code_len))?;
            let room = Room::new(
                self.identity.id.clone(),
                self.identity.display_name.clone(),
                best_of,
                tap_battle_mode,
                now_millis(),
            );
            let path = code.path();

            let outcome = self.store.create_if_absent(&path, room.to_document()?).await;
            match outcome.inspect_err(|err| self.last_error = Some(err.to_string()))? {
                CreateOutcome::Exists => {
                    tracing::debug!(room = %code, attempt, "room code collision");
                    continue;
                }
                CreateOutcome::Created => {}
            }

            self.role = Some(Role::Host);
            self.room_code = Some(code.clone());
            self.snapshot = Some(room);
            if let Err(err) = self.enter_as_host(&path).await {
                self.abandon(&err).await;
                return Err(err);
            }

            tracing::info!(room = %code, best_of, mode = tap_battle_mode.as_str(), "room created");
            return Ok(code);
        }

        let err = SessionError::CreationExhausted {
            attempts: self.config.max_create_attempts,
        };
        tracing::warn!(attempts = self.config.max_create_attempts, "room creation exhausted");
        self.last_error = Some(err.to_string());
        Err(err)
    }

    /// Joins the room named by `code` as its guest.
    ///
    /// The code is trimmed and upper-cased first. One read decides whether
    /// the room is joinable. Then an on-disconnect hook that clears only the
    /// guest fields is registered, the guest fields are written, and the
    /// controller subscribes. Returns the room as it now stands.
    ///
    /// A failure part way through leaves nothing behind: the guest fields
    /// and hook are removed again and the controller is back to idle.
    ///
    /// # Errors
    /// - [`SessionError::RoomNotFoundOrFull`] if the code is malformed, the
    ///   room does not exist, has no host, or already has a guest.
    /// - [`SessionError::Store`] if the store refused a step of the join.
    pub async fn join_session(&mut self, code: &str) -> Result<Room, SessionError> {
        if let Some(current) = &self.room_code {
            return Err(SessionError::AlreadyInRoom(current.clone()));
        }
        self.last_error = None;

        let Ok(code) = RoomCode::parse(code) else {
            return Err(self.join_failed(code));
        };
        let path = code.path();

        let doc = self.store.read_once(&path).await?;
        let room = match doc.map(Room::from_document) {
            Some(Ok(room)) => room,
            Some(Err(err)) => {
                tracing::warn!(room = %code, error = %err, "undecodable room on join");
                return Err(self.join_failed(code.as_str()));
            }
            None => return Err(self.join_failed(code.as_str())),
        };
        if room.host_id.is_none() || room.guest_id.is_some() {
            return Err(self.join_failed(code.as_str()));
        }

        self.role = Some(Role::Guest);
        self.room_code = Some(code.clone());
        self.guest_ever_joined = true;
        if let Err(err) = self.enter_as_guest(&path).await {
            self.abandon(&err).await;
            return Err(err);
        }

        let mut joined = room;
        joined.guest_id = Some(self.identity.id.clone());
        joined.guest_name = self.identity.display_name.clone();
        self.snapshot = Some(joined.clone());

        tracing::info!(room = %code, role = "guest", "joined room");
        Ok(joined)
    }

    // -- Submissions ------------------------------------------------------

    /// Writes this client's move for the current round.
    pub async fn submit_move(&mut self, mv: Move) -> Result<(), SessionError> {
        let field = match self.role.ok_or(SessionError::NotInRoom)? {
            Role::Host => Field::HostMove,
            Role::Guest => Field::GuestMove,
        };
        self.write(RoomPatch::new().set(field, mv.as_str())).await
    }

    /// Writes this client's tap count for the current tap battle.
    pub async fn submit_tap_count(&mut self, taps: u32) -> Result<(), SessionError> {
        let field = match self.role.ok_or(SessionError::NotInRoom)? {
            Role::Host => Field::HostTapCount,
            Role::Guest => Field::GuestTapCount,
        };
        self.write(RoomPatch::new().set(field, taps)).await
    }

    /// Starts round `new_round`: clears both moves and both tap counts and
    /// sets the round number, in one write.
    ///
    /// Host only. For a guest this does nothing; the guest learns about
    /// the new round by seeing the moves disappear.
    pub async fn clear_round(&mut self, new_round: u32) -> Result<(), SessionError> {
        if self.role != Some(Role::Host) {
            tracing::debug!(role = ?self.role, "clear_round ignored for non-host");
            return Ok(());
        }
        self.write(RoomPatch::round_reset(new_round)).await?;
        tracing::debug!(round = new_round, "round cleared");
        Ok(())
    }

    // -- Snapshot processing ----------------------------------------------

    /// Waits for the next event from the room or the connection.
    ///
    /// Returns `None` when the controller is not subscribed to anything:
    /// before a create or join, and forever after [`cleanup`](Self::cleanup).
    ///
    /// Cancel-safe. A snapshot whose processing was interrupted is applied
    /// again, from the start, by the next call.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(snapshot) = self.unapplied.clone() {
                let update = self.on_snapshot_changed(snapshot).await;
                self.unapplied = None;
                return Some(SessionEvent::Update(update));
            }

            let incoming = {
                let subscription = self.subscription.as_mut()?;
                match self.connectivity.as_mut() {
                    Some(online) => tokio::select! {
                        snapshot = subscription.recv() => match snapshot {
                            Some(snapshot) => Incoming::Snapshot(snapshot),
                            None => Incoming::SubscriptionClosed,
                        },
                        changed = online.changed() => match changed {
                            Ok(()) => Incoming::Connectivity(*online.borrow_and_update()),
                            Err(_) => Incoming::ConnectivityClosed,
                        },
                    },
                    None => match subscription.recv().await {
                        Some(snapshot) => Incoming::Snapshot(snapshot),
                        None => Incoming::SubscriptionClosed,
                    },
                }
            };

            match incoming {
                Incoming::Snapshot(snapshot) => self.unapplied = Some(snapshot),
                Incoming::Connectivity(online) => {
                    self.is_connected = online;
                    tracing::info!(online, "connectivity changed");
                    return Some(SessionEvent::Connectivity(online));
                }
                Incoming::ConnectivityClosed => self.connectivity = None,
                Incoming::SubscriptionClosed => {
                    self.subscription = None;
                    return None;
                }
            }
        }
    }

    /// Recomputes derived state from a full snapshot.
    ///
    /// Every snapshot replaces the previous one entirely; nothing is
    /// patched incrementally. Applying the same snapshot twice has the same
    /// effect as applying it once: the flags only flip after the store
    /// writes they trigger have gone through.
    ///
    /// A host that sees its guest go also clears its own presence fields.
    /// The room then has no host, so nobody else can join it.
    pub async fn on_snapshot_changed(&mut self, snapshot: Snapshot) -> SessionUpdate {
        let room = match snapshot.into_document().map(Room::from_document) {
            None => None,
            Some(Ok(room)) => Some(room),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "ignoring undecodable snapshot");
                self.last_error = Some(err.to_string());
                return self.update();
            }
        };

        match (self.role, &room) {
            (Some(Role::Host), Some(room)) => {
                if !self.guest_ever_joined && room.guest_id.is_some() {
                    tracing::info!(room = ?self.room_code, guest = ?room.guest_id, "guest joined");
                    self.rescope_host_hooks().await;
                    self.guest_ever_joined = true;
                } else if self.guest_ever_joined
                    && room.guest_id.is_none()
                    && !self.opponent_disconnected
                {
                    self.vacate_host_seat().await;
                    self.mark_opponent_left();
                }
            }
            (Some(Role::Guest), Some(room)) => {
                if self.guest_ever_joined && room.host_id.is_none() {
                    self.mark_opponent_left();
                }
            }
            // The whole room vanished under us.
            (Some(_), None) => {
                if self.guest_ever_joined {
                    self.mark_opponent_left();
                }
            }
            (None, _) => {}
        }

        self.snapshot = room;
        self.update()
    }

    // -- Cleanup ----------------------------------------------------------

    /// Leaves the room.
    ///
    /// Unsubscribes first, then removes this client's presence:
    ///
    /// - a host whose guest never came (or already left) deletes the room
    /// - a host with a guest nulls only the host fields, so the guest
    ///   sees the departure
    /// - a guest nulls only the guest fields
    ///
    /// Failures are logged and otherwise ignored; the pending on-disconnect
    /// hooks are the fallback. Safe to call any number of times.
    pub async fn cleanup(&mut self) {
        self.detach();
        let (Some(role), Some(code)) = (self.role.take(), self.room_code.take()) else {
            return;
        };
        let path = code.path();

        let patch = match role {
            Role::Host if !self.guest_ever_joined || self.opponent_disconnected => {
                RoomPatch::delete_room()
            }
            role => RoomPatch::new().clear_all(Field::presence(role)),
        };
        if let Err(err) = self.write_as(role, &path, patch).await {
            tracing::warn!(room = %code, %role, error = %err, "cleanup write failed");
        }
        if let Err(err) = self.store.cancel_on_disconnect(&path).await {
            tracing::warn!(room = %code, %role, error = %err, "could not cancel disconnect hooks");
        }

        self.snapshot = None;
        self.opponent_disconnected = false;
        self.guest_ever_joined = false;
        tracing::info!(room = %code, %role, "left room");
    }

    // -- Internals --------------------------------------------------------

    fn update(&self) -> SessionUpdate {
        SessionUpdate {
            room: self.snapshot.clone(),
            opponent_disconnected: self.opponent_disconnected,
        }
    }

    fn attach(&mut self, path: &str) -> Result<(), SessionError> {
        self.subscription = Some(self.store.subscribe(path)?);
        let online = self.store.connectivity();
        self.is_connected = *online.borrow();
        self.connectivity = Some(online);
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.store.unsubscribe(subscription.id());
        }
        self.connectivity = None;
        self.unapplied = None;
    }

    async fn enter_as_host(&mut self, path: &str) -> Result<(), SessionError> {
        self.store
            .register_on_disconnect(path, DisconnectAction::Remove)
            .await?;
        self.attach(path)
    }

    async fn enter_as_guest(&mut self, path: &str) -> Result<(), SessionError> {
        let guest_fields = Field::presence(Role::Guest)
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        self.store
            .register_on_disconnect(path, DisconnectAction::ClearFields(guest_fields))
            .await?;

        let mut patch = RoomPatch::new().set(Field::GuestId, self.identity.id.0.clone());
        if let Some(name) = &self.identity.display_name {
            patch = patch.set(Field::GuestName, name.clone());
        }
        self.write_as(Role::Guest, path, patch).await?;
        self.attach(path)
    }

    /// Backs out of a create or join that failed after its first write.
    async fn abandon(&mut self, err: &SessionError) {
        tracing::warn!(room = ?self.room_code, error = %err, "could not enter room, rolling back");
        self.cleanup().await;
        self.last_error = Some(err.to_string());
    }

    /// Clears the host's presence fields once the guest has gone, so the
    /// room reads as abandoned rather than as an open lobby.
    async fn vacate_host_seat(&mut self) {
        let Some(code) = self.room_code.clone() else { return };
        let patch = RoomPatch::new().clear_all(Field::presence(Role::Host));
        if let Err(err) = self.write_as(Role::Host, &code.path(), patch).await {
            tracing::warn!(room = %code, error = %err, "could not close room after guest left");
        }
    }

    fn mark_opponent_left(&mut self) {
        if !self.opponent_disconnected {
            tracing::info!(room = ?self.room_code, role = ?self.role, "opponent left");
        }
        self.opponent_disconnected = true;
    }

    /// Swaps the host's room-deleting hook for one that clears only the
    /// host's own fields, so a connection blip no longer destroys a match
    /// the guest is playing in.
    async fn rescope_host_hooks(&mut self) {
        let Some(code) = &self.room_code else { return };
        let path = code.path();
        let host_fields = Field::presence(Role::Host)
            .iter()
            .map(|f| f.name().to_string())
            .collect();

        let store = &self.store;
        let result = async {
            store.cancel_on_disconnect(&path).await?;
            store
                .register_on_disconnect(&path, DisconnectAction::ClearFields(host_fields))
                .await
        }
        .await;
        if let Err(err) = result {
            tracing::warn!(room = %code, error = %err, "could not rescope disconnect hooks");
            self.last_error = Some(err.to_string());
        }
    }

    async fn write(&mut self, patch: RoomPatch) -> Result<(), SessionError> {
        let (Some(role), Some(code)) = (self.role, &self.room_code) else {
            return Err(SessionError::NotInRoom);
        };
        let path = code.path();
        self.write_as(role, &path, patch).await
    }

    /// Every write to the room goes through here.
    async fn write_as(
        &mut self,
        role: Role,
        path: &str,
        patch: RoomPatch,
    ) -> Result<(), SessionError> {
        patch.check_ownership(role)?;
        if let Err(err) = self.store.update_fields(path, patch.into_document()).await {
            self.last_error = Some(err.to_string());
            return Err(err.into());
        }
        Ok(())
    }

    fn join_failed(&mut self, code: &str) -> SessionError {
        let err = SessionError::RoomNotFoundOrFull;
        tracing::info!(room = code, "join refused");
        self.last_error = Some(err.to_string());
        err
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
