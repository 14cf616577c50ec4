//! The room document and its write discipline.
//!
//! A match is synchronised through exactly one JSON object per room. Both
//! clients read the whole object on every change and write individual
//! fields. There is no server arbitrating those writes, so the contract
//! that keeps them from colliding lives here:
//!
//! - [`Room`] is the typed view of one snapshot.
//! - [`Field`] lists every key and which [`Role`] owns it.
//! - [`RoomPatch`] is the only way to build a partial write, and
//!   [`RoomPatch::check_ownership`] refuses writes to the other role's
//!   fields.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Move, PlayerId, ProtocolError, Role, TapBattleMode};

/// A raw document as the store holds it: a JSON object.
pub type Document = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// Every key a room document may carry.
///
/// `Ord` is derived so patches iterate in a stable order, which keeps log
/// lines and test assertions deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    HostId,
    HostName,
    GuestId,
    GuestName,
    BestOf,
    CurrentRound,
    HostMove,
    GuestMove,
    HostTapCount,
    GuestTapCount,
    TapBattleMode,
    Timestamp,
}

impl Field {
    /// Every field, in wire-table order.
    pub const ALL: [Field; 12] = [
        Field::HostId,
        Field::HostName,
        Field::GuestId,
        Field::GuestName,
        Field::BestOf,
        Field::CurrentRound,
        Field::HostMove,
        Field::GuestMove,
        Field::HostTapCount,
        Field::GuestTapCount,
        Field::TapBattleMode,
        Field::Timestamp,
    ];

    /// The JSON key, byte-for-byte what the other client expects.
    pub fn name(self) -> &'static str {
        match self {
            Self::HostId => "hostId",
            Self::HostName => "hostName",
            Self::GuestId => "guestId",
            Self::GuestName => "guestName",
            Self::BestOf => "bestOf",
            Self::CurrentRound => "currentRound",
            Self::HostMove => "hostMove",
            Self::GuestMove => "guestMove",
            Self::HostTapCount => "hostTapCount",
            Self::GuestTapCount => "guestTapCount",
            Self::TapBattleMode => "tapBattleMode",
            Self::Timestamp => "timestamp",
        }
    }

    /// The only role allowed to put a value in this field.
    ///
    /// Match settings (`bestOf`, `currentRound`, `tapBattleMode`,
    /// `timestamp`) belong to the host, who created the room.
    pub fn owner(self) -> Role {
        match self {
            Self::GuestId
            | Self::GuestName
            | Self::GuestMove
            | Self::GuestTapCount => Role::Guest,
            _ => Role::Host,
        }
    }

    /// Fields reset together at the start of every round.
    pub fn is_round_field(self) -> bool {
        matches!(
            self,
            Self::HostMove
                | Self::GuestMove
                | Self::HostTapCount
                | Self::GuestTapCount
        )
    }

    /// The fields that mark `role` as present in the room.
    ///
    /// These are what a departing player nulls (directly on cleanup, or
    /// through an on-disconnect hook). Match settings are left in place so
    /// the remnant still decodes and the opponent can see who left.
    pub fn presence(role: Role) -> [Field; 4] {
        match role {
            Role::Host => [
                Field::HostId,
                Field::HostName,
                Field::HostMove,
                Field::HostTapCount,
            ],
            Role::Guest => [
                Field::GuestId,
                Field::GuestName,
                Field::GuestMove,
                Field::GuestTapCount,
            ],
        }
    }

    /// Looks a field up by its JSON key.
    pub fn from_name(name: &str) -> Option<Field> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

fn default_best_of() -> u32 {
    3
}

fn default_round() -> u32 {
    1
}

/// Typed view of one room snapshot.
///
/// Every optional field is omitted from the JSON when `None` rather than
/// written as `null`: in the store, `null` means "delete this key".
///
/// `host_id` is optional even though a live room always has one, because
/// a host that leaves a started match nulls its own fields and the guest
/// must still be able to decode what is left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,

    /// Rounds in the match; 0 means endless.
    #[serde(default = "default_best_of")]
    pub best_of: u32,
    #[serde(default = "default_round")]
    pub current_round: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_move: Option<Move>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_move: Option<Move>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_tap_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_tap_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_battle_mode: Option<TapBattleMode>,

    /// Creation time, milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl Room {
    /// A fresh room as the host first writes it.
    pub fn new(
        host_id: PlayerId,
        host_name: Option<String>,
        best_of: u32,
        tap_battle_mode: TapBattleMode,
        timestamp: u64,
    ) -> Self {
        Self {
            host_id: Some(host_id),
            host_name,
            guest_id: None,
            guest_name: None,
            best_of,
            current_round: 1,
            host_move: None,
            guest_move: None,
            host_tap_count: None,
            guest_tap_count: None,
            tap_battle_mode: Some(tap_battle_mode),
            timestamp: Some(timestamp),
        }
    }

    /// Decodes a snapshot delivered by the store.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if a present field has the wrong
    /// type or an unknown enum value.
    pub fn from_document(doc: Document) -> Result<Self, ProtocolError> {
        serde_json::from_value(Value::Object(doc)).map_err(ProtocolError::Decode)
    }

    /// Encodes the room as a store document.
    pub fn to_document(&self) -> Result<Document, ProtocolError> {
        match serde_json::to_value(self).map_err(ProtocolError::Encode)? {
            Value::Object(doc) => Ok(doc),
            // A struct with named fields always serializes to an object.
            other => Err(ProtocolError::Encode(serde::ser::Error::custom(
                format!("room encoded as {other}, expected an object"),
            ))),
        }
    }

    /// The effective tap battle mode; absence means ties only.
    pub fn tap_battle_mode(&self) -> TapBattleMode {
        self.tap_battle_mode.unwrap_or_default()
    }

    pub fn id_of(&self, role: Role) -> Option<&PlayerId> {
        match role {
            Role::Host => self.host_id.as_ref(),
            Role::Guest => self.guest_id.as_ref(),
        }
    }

    pub fn name_of(&self, role: Role) -> Option<&str> {
        match role {
            Role::Host => self.host_name.as_deref(),
            Role::Guest => self.guest_name.as_deref(),
        }
    }

    pub fn move_of(&self, role: Role) -> Option<Move> {
        match role {
            Role::Host => self.host_move,
            Role::Guest => self.guest_move,
        }
    }

    pub fn tap_count_of(&self, role: Role) -> Option<u32> {
        match role {
            Role::Host => self.host_tap_count,
            Role::Guest => self.guest_tap_count,
        }
    }

    /// Both players have locked in a move for this round.
    pub fn both_moves_submitted(&self) -> bool {
        self.host_move.is_some() && self.guest_move.is_some()
    }

    /// Neither move is present: the host has reset the round.
    pub fn moves_cleared(&self) -> bool {
        self.host_move.is_none() && self.guest_move.is_none()
    }

    /// Drops every per-round value, mirroring what a round reset writes.
    pub fn clear_round(&mut self, new_round: u32) {
        self.host_move = None;
        self.guest_move = None;
        self.host_tap_count = None;
        self.guest_tap_count = None;
        self.current_round = new_round;
    }
}

// ---------------------------------------------------------------------------
// RoomPatch
// ---------------------------------------------------------------------------

/// A partial, atomic write to a room document.
///
/// Built with [`set`](Self::set) and [`clear`](Self::clear); a cleared
/// field becomes `null` in the patch, which the store treats as "remove
/// this key".
///
/// ```rust
/// use rockpaper_protocol::{Field, Move, RoomPatch, Role};
///
/// let patch = RoomPatch::new().set(Field::HostMove, Move::Rock.as_str());
/// assert!(patch.check_ownership(Role::Host).is_ok());
/// assert!(patch.check_ownership(Role::Guest).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomPatch {
    entries: BTreeMap<Field, Value>,
}

impl RoomPatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` into `field`.
    pub fn set(mut self, field: Field, value: impl Into<Value>) -> Self {
        self.entries.insert(field, value.into());
        self
    }

    /// Removes `field` from the document.
    pub fn clear(mut self, field: Field) -> Self {
        self.entries.insert(field, Value::Null);
        self
    }

    /// Removes every field in `fields`.
    pub fn clear_all(self, fields: impl IntoIterator<Item = Field>) -> Self {
        fields.into_iter().fold(self, RoomPatch::clear)
    }

    /// Removes every host-owned field.
    ///
    /// Used by a host whose guest never arrived: with no guest fields
    /// present the document ends up empty, and the store drops empty
    /// documents. If a guest slipped in concurrently, what remains is a
    /// guest-only remnant that reads as "host left".
    pub fn delete_room() -> Self {
        Self::new().clear_all(Field::ALL.into_iter().filter(|f| f.owner() == Role::Host))
    }

    /// The host's round reset: all moves and tap counts cleared, round set.
    pub fn round_reset(new_round: u32) -> Self {
        Self::new()
            .clear_all(Field::ALL.into_iter().filter(|f| f.is_round_field()))
            .set(Field::CurrentRound, new_round)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fields this patch touches, and what it writes to each.
    pub fn entries(&self) -> impl Iterator<Item = (Field, &Value)> {
        self.entries.iter().map(|(f, v)| (*f, v))
    }

    /// Verifies the single-writer rule for a patch issued by `role`.
    ///
    /// A role may write anything into its own fields. Into the other
    /// role's fields it may write nothing, with one exception: the host's
    /// round reset clears the guest's move and tap count.
    ///
    /// # Errors
    /// Returns [`ProtocolError::ForeignField`] naming the first offending
    /// field.
    pub fn check_ownership(&self, role: Role) -> Result<(), ProtocolError> {
        for (field, value) in &self.entries {
            if field.owner() == role {
                continue;
            }
            let reset_clear =
                role == Role::Host && field.is_round_field() && value.is_null();
            if !reset_clear {
                return Err(ProtocolError::ForeignField {
                    role,
                    field: *field,
                });
            }
        }
        Ok(())
    }

    /// Converts the patch into the raw form the store applies.
    pub fn into_document(self) -> Document {
        self.entries
            .into_iter()
            .map(|(field, value)| (field.name().to_string(), value))
            .collect()
    }
}
