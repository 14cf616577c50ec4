//! Core value types that appear inside the shared room document.
//!
//! Every type here has a fixed string encoding that the other client
//! depends on. Changing a `#[serde(rename...)]` attribute is a wire break:
//! a peer running an older build would stop understanding our writes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Codes
// ---------------------------------------------------------------------------

/// The 32 symbols a room or friend code may contain.
///
/// `0`, `O`, `1` and `I` are left out because they are easy to confuse
/// when a code is read aloud or copied from a phone screen.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 4;

/// Length of a friend code (the friends graph itself lives outside this
/// workspace; only the code shape is shared).
pub const FRIEND_CODE_LEN: usize = 6;

/// Root path under which every room document lives.
pub const GAMES_PATH: &str = "games";

/// A unique identifier for a player's device.
///
/// A "newtype wrapper" around the string id the app persists on first
/// launch. `#[serde(transparent)]` keeps it a plain JSON string on the
/// wire, so `PlayerId("ab12".into())` is written as `"ab12"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A short, human-shareable room code, e.g. `K7QX`.
///
/// The code doubles as the document key: the room lives at
/// `games/<code>` in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalises user input into a room code.
    ///
    /// Surrounding whitespace is dropped and letters are upper-cased, so
    /// `" k7qx "` and `"K7QX"` name the same room.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] if the input is empty or
    /// contains a symbol outside [`CODE_ALPHABET`].
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let code = input.trim().to_ascii_uppercase();
        let valid = !code.is_empty()
            && code.bytes().all(|b| CODE_ALPHABET.contains(&b));
        if !valid {
            return Err(ProtocolError::InvalidRoomCode(input.to_string()));
        }
        Ok(Self(code))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store path of the room document this code names.
    pub fn path(&self) -> String {
        format!("{GAMES_PATH}/{}", self.0)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// One of the three hand shapes.
///
/// Encoded in lowercase: `"rock"`, `"paper"`, `"scissors"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    /// All moves, in declaration order.
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// The wire encoding, identical to what serde writes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rock => "rock",
            Self::Paper => "paper",
            Self::Scissors => "scissors",
        }
    }

    /// Returns `true` if `self` defeats `other` in a plain comparison.
    pub fn beats(self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors)
                | (Move::Paper, Move::Rock)
                | (Move::Scissors, Move::Paper)
        )
    }

    /// The line shown when `self` defeats `other`, or `None` if it doesn't.
    pub fn flavor_text(self, other: Move) -> Option<&'static str> {
        match (self, other) {
            (Move::Rock, Move::Scissors) => Some("Rock crushes Scissors!"),
            (Move::Paper, Move::Rock) => Some("Paper covers Rock!"),
            (Move::Scissors, Move::Paper) => Some("Scissors cuts Paper!"),
            _ => None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rock => write!(f, "Rock"),
            Self::Paper => write!(f, "Paper"),
            Self::Scissors => write!(f, "Scissors"),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which side of a room this client plays.
///
/// Fixed for the lifetime of one client's participation in one room.
/// The host created the room; the guest joined it by code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    /// The other side.
    pub fn opponent(self) -> Role {
        match self {
            Self::Host => Self::Guest,
            Self::Guest => Self::Host,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

// ---------------------------------------------------------------------------
// TapBattleMode
// ---------------------------------------------------------------------------

/// When the tap battle runs after the RPS comparison.
///
/// An absent `tapBattleMode` field in the document means
/// [`TapBattleMode::TiesOnly`], which is also the `Default`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "camelCase")]
pub enum TapBattleMode {
    /// Only a tied RPS round goes to a tap battle.
    #[default]
    TiesOnly,
    /// Every round goes to a tap battle; the RPS winner gets a head start.
    Always,
}

impl TapBattleMode {
    /// The wire encoding, identical to what serde writes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TiesOnly => "tiesOnly",
            Self::Always => "always",
        }
    }
}
