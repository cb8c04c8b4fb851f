//! Chat frame types and protocol constants.
//!
//! Every frame on the wire starts with a one-byte opcode.  The body of both
//! frame kinds is built from the same entry layout:
//!
//! ```text
//! [sender_id:2][sender_hue:2][nick_len:4][nick:N][content_len:4][content:M]
//! ```
//!
//! All multi-byte integers are little-endian.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of the opcode prefix that starts every frame.
pub const OPCODE_SIZE: usize = 1;

/// Size of the fixed-width part of one encoded entry:
/// id (2) + hue (2) + nick length (4) + content length (4).
pub const ENTRY_FIXED_SIZE: usize = 12;

/// Largest nick or content field, in bytes, accepted by the codec.
///
/// Encoding a larger field fails before any byte is produced; decoding a
/// length field above this value is rejected as a malformed frame.
pub const MAX_FIELD_LEN: usize = 1 << 20;

/// Hue values are colour angles and must stay below this bound.
pub const HUE_RANGE: u16 = 360;

// ── Opcodes ───────────────────────────────────────────────────────────────────

/// Opcode byte identifying the frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// Join replay: zero or more concatenated entries.
    Snapshot = 0x03,
    /// Exactly one chat entry.
    Single = 0x04,
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x03 => Ok(Opcode::Snapshot),
            0x04 => Ok(Opcode::Single),
            _ => Err(()),
        }
    }
}

// ── Entries ───────────────────────────────────────────────────────────────────

/// Identity of a message author, captured when the message was accepted.
///
/// This is a value copy of the session fields, not a reference to the live
/// session, so renaming a session later never rewrites history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sender {
    /// Session id assigned by the registry.
    pub id: u16,
    /// Colour angle in degrees, `[0, 360)`.
    pub hue: u16,
    /// Display name.
    pub nick: String,
}

/// One delivered chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub sender: Sender,
    pub content: String,
}

impl ChatEntry {
    /// Creates an entry from a sender snapshot and message text.
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
        }
    }
}

// ── Decoded frames ────────────────────────────────────────────────────────────

/// A fully decoded frame, as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// History replay sent once on join.
    Snapshot(Vec<ChatEntry>),
    /// A single newly broadcast entry.
    Single(ChatEntry),
}

impl Frame {
    /// Returns the opcode this frame is encoded with.
    pub fn opcode(&self) -> Opcode {
        match self {
            Frame::Snapshot(_) => Opcode::Snapshot,
            Frame::Single(_) => Opcode::Single,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_try_from_known_values() {
        assert_eq!(Opcode::try_from(3), Ok(Opcode::Snapshot));
        assert_eq!(Opcode::try_from(4), Ok(Opcode::Single));
    }

    #[test]
    fn test_opcode_try_from_unknown_value_fails() {
        assert!(Opcode::try_from(0).is_err());
        assert!(Opcode::try_from(5).is_err());
        assert!(Opcode::try_from(0xFF).is_err());
    }

    #[test]
    fn test_opcode_repr_matches_wire_value() {
        assert_eq!(Opcode::Snapshot as u8, 3);
        assert_eq!(Opcode::Single as u8, 4);
    }

    #[test]
    fn test_frame_reports_its_opcode() {
        let entry = ChatEntry::new(
            Sender {
                id: 0,
                hue: 120,
                nick: "Anonymous".to_string(),
            },
            "hello",
        );
        assert_eq!(Frame::Single(entry).opcode(), Opcode::Single);
        assert_eq!(Frame::Snapshot(vec![]).opcode(), Opcode::Snapshot);
    }
}
