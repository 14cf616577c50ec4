//! Controller configuration and the local player's identity.

use rand::Rng;
use rockpaper_protocol::{PlayerId, ROOM_CODE_LEN};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tunables for [`SessionController`](crate::SessionController).
///
/// Start from `SessionConfig::default()` and override the fields you
/// care about.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How many fresh codes to try before `create_session` gives up.
    ///
    /// Default: 5.
    pub max_create_attempts: u32,

    /// Length of generated room codes.
    ///
    /// Default: 4. Both clients must agree, since the code is typed in.
    pub room_code_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_create_attempts: 5,
            room_code_len: ROOM_CODE_LEN,
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Who the local player is, as written into the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable per-device id, written to `hostId` or `guestId`.
    pub id: PlayerId,
    /// Shown to the opponent; omitted from the room when `None`.
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            id: PlayerId(id.into()),
            display_name,
        }
    }

    /// A fresh anonymous identity with a random 128-bit hex id.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        let id = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self::new(id, None)
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}
