//! Match rules and flow for Rockpaper.
//!
//! Two halves, both free of I/O:
//!
//! - **Resolution**: who wins a round of rock-paper-scissors and who
//!   wins a tap battle ([`rps_winner`], [`tap_battle_winner`],
//!   [`wins_needed`]).
//! - **State machine**: [`MatchStateMachine`] turns local actions and
//!   room snapshots into [`MatchPhase`] transitions and [`Intent`]s.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client facade (above)  ← executes Intents, owns the tap battle timer
//!     ↕
//! Match Layer (this crate)  ← phases, scores, round resolution
//!     ↕
//! Session Layer (below)  ← SessionEvents from the shared room
//! ```

mod config;
mod machine;
mod phase;
mod resolve;

pub use config::MatchConfig;
pub use machine::{DEFAULT_GUEST_NAME, DEFAULT_HOST_NAME, Intent, MatchStateMachine};
pub use phase::MatchPhase;
pub use resolve::{
    DEFAULT_HEAD_START, RoundOutcome, rps_winner, tap_battle_winner, wins_needed,
};
