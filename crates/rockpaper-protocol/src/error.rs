//! Error types for the protocol layer.
//!
//! Each crate in Rockpaper defines its own error enum. A `ProtocolError`
//! always means a document or patch did not match the room contract,
//! never a network or storage problem.

use crate::{Field, Role};

/// Errors that can occur while encoding, decoding, or validating room
/// documents.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Turning a room into a JSON document failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A snapshot from the store did not decode as a room.
    ///
    /// Common causes: a field with the wrong type (`"bestOf": "three"`),
    /// or a move string outside `rock`/`paper`/`scissors`.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// A patch tried to write a field owned by the other role.
    ///
    /// This is the single-writer-per-field rule. Hitting it means a code
    /// path is broken, not that the remote peer misbehaved.
    #[error("{role} may not write {field}")]
    ForeignField { role: Role, field: Field },

    /// The input is not a usable room code.
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),
}
