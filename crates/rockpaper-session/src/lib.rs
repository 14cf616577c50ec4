//! Room lifecycle for Rockpaper.
//!
//! This crate is the only layer that writes to the shared room document:
//!
//! 1. **Codes**: short, unambiguous room codes ([`generate_code`])
//! 2. **Create / join**: becoming host or guest of a room
//!    ([`SessionController`])
//! 3. **Ownership**: every write is checked so a client only ever touches
//!    its own role's fields
//! 4. **Departure**: on-disconnect hooks plus explicit cleanup, and
//!    detection of the opponent leaving
//!
//! # How it fits in the stack
//!
//! ```text
//! Match Layer (above)  ← turns SessionEvents into phase transitions
//!     ↕
//! Session Layer (this crate)  ← owns the room and this client's fields
//!     ↕
//! Store Layer (below)  ← RoomStore: shared documents, hooks, connectivity
//! ```

mod code;
mod config;
mod controller;
mod error;

pub use code::generate as generate_code;
pub use config::{Identity, SessionConfig};
pub use controller::{SessionController, SessionEvent, SessionUpdate};
pub use error::SessionError;
