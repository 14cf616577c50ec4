//! Unified error type for Rockpaper.

use rockpaper_match::MatchPhase;
use rockpaper_protocol::ProtocolError;
use rockpaper_session::SessionError;
use rockpaper_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors, so code
/// using [`OnlineMatch`](crate::OnlineMatch) handles one error type.
#[derive(Debug, thiserror::Error)]
pub enum RockpaperError {
    /// Encoding, decoding, or an ownership check failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The store refused a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Creating, joining, or writing to the room failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The action does not apply to the match's current phase.
    #[error("{action} is not allowed in phase {phase}")]
    NotAllowed {
        action: &'static str,
        phase: MatchPhase,
    },
}
