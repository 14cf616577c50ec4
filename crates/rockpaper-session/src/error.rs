//! Error types for the session layer.

use rockpaper_protocol::ProtocolError;
use rockpaper_store::StoreError;

/// Errors that can occur while creating, joining or playing in a room.
///
/// An opponent leaving is not an error: it is reported as a flag on
/// [`SessionUpdate`](crate::SessionUpdate), because the match simply
/// stops rather than failing.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The code named no room, a room without a host, or a room that
    /// already has a guest. The text is shown to the player as is.
    #[error("Game not found or already full")]
    RoomNotFoundOrFull,

    /// Every generated code collided with an existing room.
    #[error("could not find a free room code after {attempts} attempts")]
    CreationExhausted { attempts: u32 },

    /// The operation needs a room, but the controller is not in one.
    #[error("not in a room")]
    NotInRoom,

    /// The controller is already hosting or playing in a room.
    #[error("already in room {0}")]
    AlreadyInRoom(rockpaper_protocol::RoomCode),

    /// Building or checking a write failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
}
