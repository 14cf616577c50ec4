//! The online match state machine.
//!
//! [`MatchStateMachine`] does no I/O. Local actions (host, join, pick a
//! move, tap, next round) and session events go in; [`Intent`]s for the
//! session layer come out, the same way a game's rules hand the room a
//! list of messages to send rather than sending them itself.
//!
//! Phase changes driven by the room are evaluated against the latest
//! full snapshot, never against the order in which changes arrived. Each
//! round remembers the first value it saw for every move and tap count,
//! so a snapshot that races ahead of the local UI (the host clearing the
//! round while this client still shows the countdown, say) is not lost.

use rockpaper_protocol::{Move, PlayerId, Role, Room, RoomCode, TapBattleMode};
use rockpaper_session::{SessionEvent, SessionUpdate};

use crate::{
    MatchConfig, MatchPhase, RoundOutcome, rps_winner, tap_battle_winner, wins_needed,
};

/// Name shown for the host when the room has none.
pub const DEFAULT_HOST_NAME: &str = "Player 1";
/// Name shown for the guest when the room has none.
pub const DEFAULT_GUEST_NAME: &str = "Player 2";

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// Something the state machine wants done outside itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Create a room and host it.
    CreateSession { best_of: u32, mode: TapBattleMode },
    /// Join the room with this code, as typed by the player.
    JoinSession(String),
    /// Write the local move.
    SubmitMove(Move),
    /// Write the local tap count.
    SubmitTaps(u32),
    /// Host only: reset the round fields and set the round number.
    ClearRound(u32),
    /// Arm the tap battle timer; call `tap_timer_expired` when it fires.
    StartTapTimer,
    /// Leave the room.
    Cleanup,
}

// ---------------------------------------------------------------------------
// RoundState
// ---------------------------------------------------------------------------

/// What is known about the round in progress.
#[derive(Debug, Clone, Default)]
struct RoundState {
    local_move: Option<Move>,
    host_move: Option<Move>,
    guest_move: Option<Move>,
    host_taps: Option<u32>,
    guest_taps: Option<u32>,
    local_taps: u32,
    taps_submitted: bool,
    /// The plain RPS result, once the countdown has finished.
    rps: Option<RoundOutcome>,
    /// The final result, after any tap battle.
    outcome: Option<RoundOutcome>,
    flavor_text: Option<&'static str>,
    /// Both moves were seen cleared after both had been seen set: the
    /// host has already reset this round.
    reset_seen: bool,
}

impl RoundState {
    /// Latches every round value present in `room`. The first value seen
    /// for a field is kept.
    fn observe(&mut self, room: &Room) {
        if self.moves().is_some() && room.moves_cleared() {
            self.reset_seen = true;
        }
        self.host_move = self.host_move.or(room.host_move);
        self.guest_move = self.guest_move.or(room.guest_move);
        self.host_taps = self.host_taps.or(room.host_tap_count);
        self.guest_taps = self.guest_taps.or(room.guest_tap_count);
    }

    fn moves(&self) -> Option<(Move, Move)> {
        Some((self.host_move?, self.guest_move?))
    }

    fn taps(&self) -> Option<(u32, u32)> {
        Some((self.host_taps?, self.guest_taps?))
    }
}

// ---------------------------------------------------------------------------
// MatchStateMachine
// ---------------------------------------------------------------------------

/// One client's view of an online match.
///
/// Inputs that do not apply to the current phase are ignored (and logged
/// at debug level), so a double tap on a button can never corrupt state.
#[derive(Debug, Clone)]
pub struct MatchStateMachine {
    config: MatchConfig,
    phase: MatchPhase,
    role: Option<Role>,
    room_code: Option<RoomCode>,
    /// Latest room snapshot.
    room: Option<Room>,
    best_of: u32,
    mode: TapBattleMode,
    current_round: u32,
    host_score: u32,
    guest_score: u32,
    round: RoundState,
    connected: bool,
    last_error: Option<String>,
}

impl Default for MatchStateMachine {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

impl MatchStateMachine {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            phase: MatchPhase::ModeSelect,
            role: None,
            room_code: None,
            room: None,
            best_of: 0,
            mode: TapBattleMode::default(),
            current_round: 1,
            host_score: 0,
            guest_score: 0,
            round: RoundState::default(),
            connected: true,
            last_error: None,
        }
    }

    // -- Queries ----------------------------------------------------------

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn room_code(&self) -> Option<&RoomCode> {
        self.room_code.as_ref()
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn best_of(&self) -> u32 {
        self.best_of
    }

    pub fn tap_battle_mode(&self) -> TapBattleMode {
        self.mode
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    /// `(host, guest)` round wins.
    pub fn scores(&self) -> (u32, u32) {
        (self.host_score, self.guest_score)
    }

    /// Round wins needed to take the match; `None` for an endless match.
    pub fn wins_needed(&self) -> Option<u32> {
        wins_needed(self.best_of)
    }

    /// The role that reached the wins needed, if any.
    pub fn match_winner(&self) -> Option<Role> {
        let needed = self.wins_needed()?;
        if self.host_score >= needed {
            Some(Role::Host)
        } else if self.guest_score >= needed {
            Some(Role::Guest)
        } else {
            None
        }
    }

    pub fn is_match_over(&self) -> bool {
        self.match_winner().is_some()
    }

    /// Returns `true` if the match is over and this client did not win it.
    pub fn did_local_player_lose(&self) -> bool {
        match (self.role, self.match_winner()) {
            (Some(role), Some(winner)) => role != winner,
            _ => false,
        }
    }

    pub fn host_name(&self) -> &str {
        self.room
            .as_ref()
            .and_then(|r| r.host_name.as_deref())
            .unwrap_or(DEFAULT_HOST_NAME)
    }

    pub fn guest_name(&self) -> &str {
        self.room
            .as_ref()
            .and_then(|r| r.guest_name.as_deref())
            .unwrap_or(DEFAULT_GUEST_NAME)
    }

    pub fn opponent_id(&self) -> Option<&PlayerId> {
        let role = self.role?;
        self.room.as_ref()?.id_of(role.opponent())
    }

    /// `(host, guest)` moves, once both are known for this round.
    pub fn revealed_moves(&self) -> Option<(Move, Move)> {
        self.round.moves()
    }

    /// Result of the round on show; set from `RoundReveal` on.
    pub fn round_outcome(&self) -> Option<RoundOutcome> {
        self.round.outcome
    }

    /// "Rock crushes Scissors!" and friends, for a round won on moves.
    pub fn flavor_text(&self) -> Option<&'static str> {
        self.round.flavor_text
    }

    /// Taps counted locally in the current tap battle.
    pub fn local_taps(&self) -> u32 {
        self.round.local_taps
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // -- Lobby ------------------------------------------------------------

    /// Starts hosting a match.
    pub fn host_game(&mut self, best_of: u32, mode: TapBattleMode) -> Vec<Intent> {
        if self.phase != MatchPhase::ModeSelect {
            self.ignored("host_game");
            return Vec::new();
        }
        self.start_match(best_of, mode, 1);
        self.last_error = None;
        self.enter(MatchPhase::HostWaiting);
        vec![Intent::CreateSession { best_of, mode }]
    }

    /// The room for [`host_game`](Self::host_game) exists.
    pub fn on_session_created(&mut self, code: RoomCode) {
        if self.phase != MatchPhase::HostWaiting {
            self.ignored("on_session_created");
            return;
        }
        tracing::info!(room = %code, "hosting");
        self.role = Some(Role::Host);
        self.room_code = Some(code);
    }

    /// The room for [`host_game`](Self::host_game) could not be created.
    pub fn on_create_failed(&mut self, reason: impl Into<String>) {
        if self.phase != MatchPhase::HostWaiting {
            self.ignored("on_create_failed");
            return;
        }
        self.last_error = Some(reason.into());
        self.enter(MatchPhase::ModeSelect);
    }

    /// Asks to join the room with `code`.
    pub fn join_game(&mut self, code: &str) -> Vec<Intent> {
        if self.phase != MatchPhase::ModeSelect {
            self.ignored("join_game");
            return Vec::new();
        }
        self.last_error = None;
        vec![Intent::JoinSession(code.to_string())]
    }

    /// The join succeeded; `room` is the room as joined.
    pub fn on_joined(&mut self, code: RoomCode, room: Room) {
        if self.phase != MatchPhase::ModeSelect {
            self.ignored("on_joined");
            return;
        }
        tracing::info!(room = %code, best_of = room.best_of, "joined as guest");
        self.start_match(room.best_of, room.tap_battle_mode(), room.current_round);
        self.role = Some(Role::Guest);
        self.room_code = Some(code);
        self.room = Some(room);
        self.enter(MatchPhase::OnlineSelect);
        self.advance();
    }

    /// The join failed; `reason` is shown to the player.
    pub fn on_join_failed(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
    }

    // -- Room events ------------------------------------------------------

    /// Feeds one session event into the machine.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Update(update) => self.on_update(update),
            SessionEvent::Connectivity(online) => self.connected = online,
        }
    }

    /// Re-evaluates the match against a new room snapshot.
    pub fn on_update(&mut self, update: SessionUpdate) {
        if self.role.is_none() {
            self.ignored("on_update");
            return;
        }
        if update.opponent_disconnected {
            if self.phase != MatchPhase::Disconnected {
                tracing::info!(phase = %self.phase, "opponent disconnected");
                self.enter(MatchPhase::Disconnected);
            }
            self.room = update.room;
            return;
        }
        if self.phase == MatchPhase::Disconnected {
            return;
        }
        let Some(room) = update.room else {
            tracing::debug!(phase = %self.phase, "room snapshot missing");
            return;
        };
        self.best_of = room.best_of;
        self.mode = room.tap_battle_mode();
        self.room = Some(room);
        self.advance();
    }

    // -- Round play -------------------------------------------------------

    /// Locks in the local move.
    pub fn submit_move(&mut self, mv: Move) -> Vec<Intent> {
        if self.phase != MatchPhase::OnlineSelect || self.round.local_move.is_some() {
            self.ignored("submit_move");
            return Vec::new();
        }
        self.round.local_move = Some(mv);
        self.enter(MatchPhase::OnlineWaiting);
        self.advance();
        vec![Intent::SubmitMove(mv)]
    }

    /// The reveal countdown has finished: settle the moves.
    ///
    /// A tie, or any round in [`TapBattleMode::Always`], goes to a tap
    /// battle. Anything else is decided here.
    pub fn countdown_finished(&mut self) -> Vec<Intent> {
        let (MatchPhase::Countdown, Some((host, guest))) = (self.phase, self.round.moves())
        else {
            self.ignored("countdown_finished");
            return Vec::new();
        };

        let rps = rps_winner(host, guest);
        self.round.rps = Some(rps);
        if rps.is_tie() || self.mode == TapBattleMode::Always {
            tracing::debug!(round = self.current_round, ?rps, "tap battle");
            self.round.local_taps = 0;
            self.round.taps_submitted = false;
            self.enter(MatchPhase::TapBattle);
            return vec![Intent::StartTapTimer];
        }

        self.finish_round(rps);
        self.advance();
        Vec::new()
    }

    /// Counts one tap. Returns the local count so far.
    pub fn tap(&mut self) -> u32 {
        if self.phase == MatchPhase::TapBattle && !self.round.taps_submitted {
            self.round.local_taps = self.round.local_taps.saturating_add(1);
        }
        self.round.local_taps
    }

    /// The tap battle timer ran out: submit the count, once.
    pub fn tap_timer_expired(&mut self) -> Vec<Intent> {
        if self.phase != MatchPhase::TapBattle || self.round.taps_submitted {
            self.ignored("tap_timer_expired");
            return Vec::new();
        }
        self.round.taps_submitted = true;
        let taps = self.round.local_taps;
        tracing::debug!(taps, "tap battle over");
        self.advance();
        vec![Intent::SubmitTaps(taps)]
    }

    /// Leaves the reveal.
    ///
    /// If the match is decided this goes to `MatchOver`. Otherwise the host
    /// starts the next round (the round number only moves on after a
    /// decisive round), and the guest keeps waiting for the host to do so.
    pub fn next_round(&mut self) -> Vec<Intent> {
        if self.phase != MatchPhase::RoundReveal {
            self.ignored("next_round");
            return Vec::new();
        }
        if self.is_match_over() {
            self.end_match();
            return Vec::new();
        }
        if self.role != Some(Role::Host) {
            tracing::debug!("waiting for the host to start the next round");
            return Vec::new();
        }

        let was_tie = self.round.outcome.is_none_or(RoundOutcome::is_tie);
        let next = if was_tie {
            self.current_round
        } else {
            self.current_round + 1
        };
        self.start_round(next);
        // The clear is on its way; don't wait for the echo to forget the
        // old moves.
        if let Some(room) = &mut self.room {
            room.clear_round(next);
        }
        vec![Intent::ClearRound(next)]
    }

    /// Abandons the match and returns to `ModeSelect`.
    pub fn reset(&mut self) -> Vec<Intent> {
        let in_session = self.role.is_some() || self.phase != MatchPhase::ModeSelect;
        if in_session {
            tracing::info!(phase = %self.phase, "match reset");
        }
        *self = Self::new(self.config.clone());
        if in_session {
            vec![Intent::Cleanup]
        } else {
            Vec::new()
        }
    }

    // -- Internals --------------------------------------------------------

    fn start_match(&mut self, best_of: u32, mode: TapBattleMode, round: u32) {
        self.best_of = best_of;
        self.mode = mode;
        self.host_score = 0;
        self.guest_score = 0;
        self.current_round = round;
        self.round = RoundState::default();
    }

    fn start_round(&mut self, round: u32) {
        tracing::debug!(round, "round started");
        self.current_round = round;
        self.round = RoundState::default();
        self.enter(MatchPhase::OnlineSelect);
    }

    fn finish_round(&mut self, outcome: RoundOutcome) {
        match outcome {
            RoundOutcome::HostWins => self.host_score += 1,
            RoundOutcome::GuestWins => self.guest_score += 1,
            RoundOutcome::Tie => {}
        }
        // Flavor text only when the moves themselves decided the round.
        self.round.flavor_text = match (self.round.moves(), self.round.rps) {
            (Some((host, guest)), Some(rps)) if rps == outcome => match outcome {
                RoundOutcome::HostWins => host.flavor_text(guest),
                RoundOutcome::GuestWins => guest.flavor_text(host),
                RoundOutcome::Tie => None,
            },
            _ => None,
        };
        self.round.outcome = Some(outcome);
        tracing::info!(
            round = self.current_round,
            ?outcome,
            host_score = self.host_score,
            guest_score = self.guest_score,
            "round resolved"
        );
        self.enter(MatchPhase::RoundReveal);
    }

    fn end_match(&mut self) {
        tracing::info!(
            winner = ?self.match_winner(),
            host_score = self.host_score,
            guest_score = self.guest_score,
            "match over"
        );
        self.enter(MatchPhase::MatchOver);
    }

    /// Applies every transition the latest snapshot allows.
    fn advance(&mut self) {
        loop {
            let Some(room) = self.room.clone() else { return };
            let latching = self.phase.is_in_round() && self.phase != MatchPhase::RoundReveal;
            if latching {
                self.round.observe(&room);
            }

            let progressed = match self.phase {
                MatchPhase::HostWaiting if room.guest_id.is_some() => {
                    self.enter(MatchPhase::OnlineSelect);
                    true
                }
                MatchPhase::OnlineSelect if self.role == Some(Role::Guest) => {
                    self.current_round = room.current_round;
                    false
                }
                MatchPhase::OnlineWaiting if self.round.moves().is_some() => {
                    self.enter(MatchPhase::Countdown);
                    true
                }
                MatchPhase::TapBattle if self.round.taps_submitted => {
                    match self.round.taps() {
                        Some((host_taps, guest_taps)) => {
                            let advantage = self.round.rps.unwrap_or(RoundOutcome::Tie);
                            let outcome = tap_battle_winner(
                                host_taps,
                                guest_taps,
                                advantage,
                                self.config.head_start,
                            );
                            self.finish_round(outcome);
                            true
                        }
                        None => false,
                    }
                }
                // Both moves cleared is the host's "next round" signal. It
                // may already have been seen before the reveal.
                MatchPhase::RoundReveal
                    if self.role == Some(Role::Guest)
                        && (room.moves_cleared() || self.round.reset_seen) =>
                {
                    if self.is_match_over() {
                        self.end_match();
                    } else {
                        self.start_round(room.current_round);
                    }
                    true
                }
                _ => false,
            };
            if !progressed {
                return;
            }
        }
    }

    fn enter(&mut self, next: MatchPhase) {
        if self.phase != next {
            tracing::debug!(from = %self.phase, to = %next, "phase change");
            self.phase = next;
        }
    }

    fn ignored(&self, input: &str) {
        tracing::debug!(input, phase = %self.phase, "input ignored in this phase");
    }
}
