//! The visible phases of an online match.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where one client is in the match.
///
/// ```text
/// ModeSelect ──host──→ HostWaiting ──guest seen──┐
///     │                                          ↓
///     └────────join ok─────────────────→ OnlineSelect ←──────────┐
///                                              │ submit_move      │
///                                              ↓                  │
///                                        OnlineWaiting            │
///                                              │ both moves seen  │
///                                              ↓                  │
///                                          Countdown              │
///                                     tie or  │    │ decisive     │
///                                     always  ↓    │              │
///                                        TapBattle │              │
///                                   both taps │    │              │
///                                             ↓    ↓              │
///                                          RoundReveal ──next─────┘
///                                              │ winner decided
///                                              ↓
///                                          MatchOver
/// ```
///
/// [`Disconnected`](Self::Disconnected) can be entered from every phase
/// but `ModeSelect` and only left through a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Not in a room. Hosting or joining starts from here.
    ModeSelect,
    /// Room created, no guest yet.
    HostWaiting,
    /// Pick a move.
    OnlineSelect,
    /// Move sent; waiting for the opponent's.
    OnlineWaiting,
    /// Both moves are in; the reveal countdown is running.
    Countdown,
    /// Tie-break minigame: tap as fast as possible until the timer ends.
    TapBattle,
    /// Round result is shown.
    RoundReveal,
    /// One side reached the wins needed.
    MatchOver,
    /// The opponent left. Terminal until reset.
    Disconnected,
}

impl MatchPhase {
    /// Returns `true` while a round is being played or shown.
    pub fn is_in_round(self) -> bool {
        matches!(
            self,
            Self::OnlineSelect
                | Self::OnlineWaiting
                | Self::Countdown
                | Self::TapBattle
                | Self::RoundReveal
        )
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ModeSelect => "ModeSelect",
            Self::HostWaiting => "HostWaiting",
            Self::OnlineSelect => "OnlineSelect",
            Self::OnlineWaiting => "OnlineWaiting",
            Self::Countdown => "Countdown",
            Self::TapBattle => "TapBattle",
            Self::RoundReveal => "RoundReveal",
            Self::MatchOver => "MatchOver",
            Self::Disconnected => "Disconnected",
        };
        f.write_str(name)
    }
}
