//! One player's view of an online match.
//!
//! [`OnlineMatch`] glues the pieces together: the [`MatchStateMachine`]
//! decides what should happen, the [`SessionController`] talks to the
//! store, and the [`TapTimer`] ends tap battles. The state machine never
//! performs I/O itself; it hands back [`Intent`]s which are executed here,
//! in order.

use rockpaper_match::{Intent, MatchConfig, MatchPhase, MatchStateMachine};
use rockpaper_protocol::{Move, Room, RoomCode, TapBattleMode};
use rockpaper_session::{Identity, SessionConfig, SessionController};
use rockpaper_store::RoomStore;

use crate::error::RockpaperError;
use crate::timer::TapTimer;

// ---------------------------------------------------------------------------
// OnlineMatch
// ---------------------------------------------------------------------------

/// A single client's match: the state machine, the session and the tap
/// battle timer.
///
/// User actions are plain methods. Room changes and timer expiry are picked
/// up by [`pump`](Self::pump), which the caller runs in its event loop.
pub struct OnlineMatch<S: RoomStore> {
    session: SessionController<S>,
    machine: MatchStateMachine,
    timer: TapTimer,
}

impl<S: RoomStore> OnlineMatch<S> {
    /// Creates a client with default session and match settings.
    pub fn new(store: S, identity: Identity) -> Self {
        Self::with_config(
            store,
            identity,
            SessionConfig::default(),
            MatchConfig::default(),
        )
    }

    pub fn with_config(
        store: S,
        identity: Identity,
        session: SessionConfig,
        rules: MatchConfig,
    ) -> Self {
        Self {
            session: SessionController::new(store, identity, session),
            machine: MatchStateMachine::new(rules),
            timer: TapTimer::new(),
        }
    }

    // -- Queries ----------------------------------------------------------

    pub fn phase(&self) -> MatchPhase {
        self.machine.phase()
    }

    /// The match as the player sees it.
    pub fn machine(&self) -> &MatchStateMachine {
        &self.machine
    }

    /// The connection to the room.
    pub fn session(&self) -> &SessionController<S> {
        &self.session
    }

    pub fn tap_timer(&self) -> &TapTimer {
        &self.timer
    }

    // -- User actions -----------------------------------------------------

    /// Hosts a new match and returns the room code to share.
    pub async fn host(
        &mut self,
        best_of: u32,
        mode: TapBattleMode,
    ) -> Result<RoomCode, RockpaperError> {
        let intents = self.machine.host_game(best_of, mode);
        self.require("host", &intents)?;
        self.run(intents).await?;
        self.session
            .room_code()
            .cloned()
            .ok_or(RockpaperError::NotAllowed {
                action: "host",
                phase: self.machine.phase(),
            })
    }

    /// Joins the match behind `code` and returns the room as joined.
    pub async fn join(&mut self, code: &str) -> Result<Room, RockpaperError> {
        let intents = self.machine.join_game(code);
        self.require("join", &intents)?;
        self.run(intents).await?;
        self.machine
            .room()
            .cloned()
            .ok_or(RockpaperError::NotAllowed {
                action: "join",
                phase: self.machine.phase(),
            })
    }

    /// Locks in this player's move for the round.
    pub async fn submit_move(&mut self, mv: Move) -> Result<(), RockpaperError> {
        let intents = self.machine.submit_move(mv);
        self.run(intents).await
    }

    /// Called when the reveal countdown animation has finished.
    pub async fn countdown_finished(&mut self) -> Result<(), RockpaperError> {
        let intents = self.machine.countdown_finished();
        self.run(intents).await
    }

    /// Counts a tap during a tap battle. Returns the count so far.
    pub fn tap(&mut self) -> u32 {
        self.machine.tap()
    }

    /// Leaves the reveal screen.
    pub async fn next_round(&mut self) -> Result<(), RockpaperError> {
        let intents = self.machine.next_round();
        self.run(intents).await
    }

    /// Abandons the match and leaves the room.
    ///
    /// The session is cleaned up whenever it still holds a room, even if
    /// the state machine never learned about it.
    pub async fn reset(&mut self) {
        let intents = self.machine.reset();
        if let Err(err) = self.run(intents).await {
            tracing::warn!(error = %err, "reset failed");
        }
        if self.session.in_room() {
            tracing::debug!(room = ?self.session.room_code(), "leaving room the match did not track");
            self.timer.cancel();
            self.session.cleanup().await;
        }
    }

    // -- Event loop -------------------------------------------------------

    /// Waits for one room event or the tap battle timer, applies it, and
    /// returns the resulting phase.
    ///
    /// Returns `None` once there is nothing left to wait for: the room
    /// subscription has ended, or there is no room and no running timer.
    ///
    /// Safe to drop while waiting. Both arms are cancel-safe: a room
    /// snapshot whose processing is interrupted is replayed by the next
    /// call, and an interrupted timer keeps its deadline. Once the timer has
    /// fired, the tap count is written before `pump` returns; dropping the
    /// future during that write loses the submission.
    pub async fn pump(&mut self) -> Option<MatchPhase> {
        if !self.session.in_room() && !self.timer.is_armed() {
            return None;
        }

        let live = tokio::select! {
            // Room events first, so a snapshot that is already queued is
            // applied before a timer that expired at the same moment.
            biased;

            event = self.session.next_event(), if self.session.in_room() => match event {
                Some(event) => {
                    self.machine.handle_event(event);
                    true
                }
                None => {
                    tracing::debug!("room subscription ended");
                    false
                }
            },
            () = self.timer.expired() => {
                let intents = self.machine.tap_timer_expired();
                if let Err(err) = self.run(intents).await {
                    tracing::debug!(error = %err, "tap battle ended without a submission");
                }
                true
            }
        };

        live.then(|| self.machine.phase())
    }

    // -- Intent execution -------------------------------------------------

    fn require(&self, action: &'static str, intents: &[Intent]) -> Result<(), RockpaperError> {
        if intents.is_empty() {
            return Err(RockpaperError::NotAllowed {
                action,
                phase: self.machine.phase(),
            });
        }
        Ok(())
    }

    /// Executes the machine's intents in order, stopping at the first
    /// failure.
    async fn run(&mut self, intents: Vec<Intent>) -> Result<(), RockpaperError> {
        for intent in intents {
            self.execute(intent).await?;
        }
        Ok(())
    }

    async fn execute(&mut self, intent: Intent) -> Result<(), RockpaperError> {
        match intent {
            Intent::CreateSession { best_of, mode } => {
                match self.session.create_session(best_of, mode).await {
                    Ok(code) => self.machine.on_session_created(code),
                    Err(err) => {
                        self.machine.on_create_failed(err.to_string());
                        return Err(err.into());
                    }
                }
            }
            Intent::JoinSession(code) => match self.session.join_session(&code).await {
                Ok(room) => {
                    let code = self.session.room_code().cloned().ok_or(
                        RockpaperError::NotAllowed {
                            action: "join",
                            phase: self.machine.phase(),
                        },
                    )?;
                    self.machine.on_joined(code, room);
                }
                Err(err) => {
                    self.machine.on_join_failed(err.to_string());
                    return Err(err.into());
                }
            },
            Intent::SubmitMove(mv) => self
                .session
                .submit_move(mv)
                .await
                .inspect_err(|err| tracing::warn!(?mv, error = %err, "move not submitted"))?,
            Intent::SubmitTaps(taps) => self
                .session
                .submit_tap_count(taps)
                .await
                .inspect_err(|err| tracing::warn!(taps, error = %err, "taps not submitted"))?,
            Intent::ClearRound(round) => self
                .session
                .clear_round(round)
                .await
                .inspect_err(|err| tracing::warn!(round, error = %err, "round not cleared"))?,
            Intent::StartTapTimer => {
                let duration = self.machine.config().tap_battle_duration;
                tracing::debug!(?duration, "tap battle timer started");
                self.timer.start(duration);
            }
            Intent::Cleanup => {
                self.timer.cancel();
                self.session.cleanup().await;
            }
        }
        Ok(())
    }
}

impl<S: RoomStore + std::fmt::Debug> std::fmt::Debug for OnlineMatch<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnlineMatch")
            .field("phase", &self.machine.phase())
            .field("room", &self.session.room_code())
            .field("timer", &self.timer)
            .finish()
    }
}
