//! Shared room contract for Rockpaper.
//!
//! Two clients play a match by reading and writing one JSON document per
//! room. This crate is the "language" both of them speak:
//!
//! - **Types** ([`Move`], [`Role`], [`TapBattleMode`], [`PlayerId`],
//!   [`RoomCode`]) with fixed string encodings.
//! - **Room** ([`Room`], [`Field`], [`RoomPatch`]): the document, its
//!   field table, and the single-writer-per-field rule.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer knows nothing about the store or the match rules.
//! It only knows what a valid document looks like and who may write
//! which part of it.
//!
//! ```text
//! Store (documents) → Protocol (Room, RoomPatch) → Session (role, lifecycle)
//! ```

mod error;
mod room;
mod types;

pub use error::ProtocolError;
pub use room::{Document, Field, Room, RoomPatch};
pub use types::{
    CODE_ALPHABET, FRIEND_CODE_LEN, GAMES_PATH, Move, PlayerId, ROOM_CODE_LEN,
    Role, RoomCode, TapBattleMode,
};
