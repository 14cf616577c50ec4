//! # Rockpaper
//!
//! Two-player online rock-paper-scissors played over a shared room
//! document, with tap battles to settle ties.
//!
//! This is the meta crate: it re-exports the layers below and adds
//! [`OnlineMatch`], which runs one player's match end to end.
//!
//! ## How it fits in the stack
//!
//! ```text
//! rockpaper            ← YOU ARE HERE (OnlineMatch, TapTimer, errors)
//!   ├── rockpaper-match     rules and phase machine (no I/O)
//!   ├── rockpaper-session   room lifecycle and field ownership
//!   ├── rockpaper-store     the shared document store
//!   └── rockpaper-protocol  room schema and wire format
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use rockpaper::prelude::*;
//!
//! let backend = MemoryBackend::new();
//! let mut host = OnlineMatch::new(backend.connect(), Identity::generate());
//! let code = host.host(3, TapBattleMode::TiesOnly).await?;
//!
//! while let Some(phase) = host.pump().await {
//!     // redraw for `phase`
//! }
//! ```

mod client;
mod error;
mod timer;

pub use client::OnlineMatch;
pub use error::RockpaperError;
pub use timer::TapTimer;

pub use rockpaper_match as rules;
pub use rockpaper_protocol as protocol;
pub use rockpaper_session as session;
pub use rockpaper_store as store;

/// Everything needed to play a match.
pub mod prelude {
    pub use crate::{OnlineMatch, RockpaperError, TapTimer};
    pub use rockpaper_match::{
        Intent, MatchConfig, MatchPhase, MatchStateMachine, RoundOutcome,
    };
    pub use rockpaper_protocol::{Move, PlayerId, Role, Room, RoomCode, TapBattleMode};
    pub use rockpaper_session::{Identity, SessionConfig, SessionController, SessionEvent};
    pub use rockpaper_store::{MemoryBackend, MemoryStore, RoomStore};
}
