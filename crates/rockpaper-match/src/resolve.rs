//! Round resolution: pure functions, no state, no I/O.

use rockpaper_protocol::{Move, Role};
use serde::{Deserialize, Serialize};

/// Tap-count bonus for the side that won the RPS comparison.
pub const DEFAULT_HEAD_START: u32 = 10;

/// Who took a round (or one stage of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundOutcome {
    HostWins,
    GuestWins,
    Tie,
}

impl RoundOutcome {
    /// The winning role, or `None` for a tie.
    pub fn winner(self) -> Option<Role> {
        match self {
            Self::HostWins => Some(Role::Host),
            Self::GuestWins => Some(Role::Guest),
            Self::Tie => None,
        }
    }

    pub fn is_tie(self) -> bool {
        self == Self::Tie
    }
}

/// Plain rock-paper-scissors between the host's and the guest's move.
pub fn rps_winner(host: Move, guest: Move) -> RoundOutcome {
    if host.beats(guest) {
        RoundOutcome::HostWins
    } else if guest.beats(host) {
        RoundOutcome::GuestWins
    } else {
        RoundOutcome::Tie
    }
}

/// Settles a tap battle.
///
/// The side holding `advantage` gets `head_start` extra taps. The higher
/// effective count wins; on equal counts the advantage decides, and with
/// no advantage the battle is a tie.
pub fn tap_battle_winner(
    host_taps: u32,
    guest_taps: u32,
    advantage: RoundOutcome,
    head_start: u32,
) -> RoundOutcome {
    let bonus = |side: RoundOutcome| if advantage == side { head_start } else { 0 };
    let host = host_taps.saturating_add(bonus(RoundOutcome::HostWins));
    let guest = guest_taps.saturating_add(bonus(RoundOutcome::GuestWins));

    match host.cmp(&guest) {
        std::cmp::Ordering::Greater => RoundOutcome::HostWins,
        std::cmp::Ordering::Less => RoundOutcome::GuestWins,
        std::cmp::Ordering::Equal => advantage,
    }
}

/// Round wins needed to take a best-of-`best_of` match.
///
/// `None` when `best_of` is 0: the match is endless.
pub fn wins_needed(best_of: u32) -> Option<u32> {
    (best_of > 0).then(|| best_of / 2 + 1)
}
