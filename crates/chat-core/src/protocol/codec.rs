//! Binary codec for encoding and decoding chat frames.
//!
//! Wire format:
//! ```text
//! single:   [opcode=4][entry]
//! snapshot: [opcode=3][entry][entry]...
//! entry:    [sender_id:2][sender_hue:2][nick_len:4][nick:N][content_len:4][content:M]
//! ```
//! Ids and hues are unsigned, lengths are signed.  All multi-byte integers
//! are little-endian.  A snapshot carries no count prefix: the reader decodes
//! entries until the buffer is exhausted.
//!
//! Every output buffer is allocated from the exact encoded length, and every
//! field is validated before the first byte is written, so an encode call
//! either returns a complete frame or an error.

use std::iter::FusedIterator;

use thiserror::Error;

use crate::protocol::messages::{
    ChatEntry, Frame, Opcode, Sender, ENTRY_FIXED_SIZE, MAX_FIELD_LEN, OPCODE_SIZE,
};

/// Errors that can occur during frame encoding or decoding.
///
/// Every variant except [`ProtocolError::FieldTooLong`] describes a malformed
/// frame received from a peer; the payload should be discarded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A read would run past the end of the buffer.
    #[error("insufficient data: need {needed} bytes at offset {offset}, {available} available")]
    InsufficientData {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A length field is negative or above [`MAX_FIELD_LEN`].
    #[error("{field} length {value} is out of range")]
    LengthOutOfRange { field: &'static str, value: i32 },

    /// A string field does not contain valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// The frame has no opcode byte at all.
    #[error("empty frame")]
    EmptyFrame,

    /// The opcode byte is not a recognized frame kind.
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// The opcode byte names a different frame kind than the caller expected.
    #[error("expected {expected:?} frame, found opcode 0x{found:02X}")]
    UnexpectedOpcode { expected: Opcode, found: u8 },

    /// A single-entry frame carries bytes after its entry.
    #[error("{0} trailing bytes after single entry")]
    TrailingBytes(usize),

    /// An entry field is too large to encode.
    #[error("{field} is {len} bytes, maximum is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

impl ProtocolError {
    /// Returns `true` if the error was raised while decoding a corrupt payload.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, ProtocolError::FieldTooLong { .. })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Returns the exact number of bytes [`encode_entry`] produces for `entry`.
pub fn encoded_entry_len(entry: &ChatEntry) -> usize {
    ENTRY_FIXED_SIZE + entry.sender.nick.len() + entry.content.len()
}

/// Encodes one entry without an opcode prefix.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLong`] if the nick or content exceeds
/// [`MAX_FIELD_LEN`].
///
/// # Examples
///
/// ```rust
/// use chat_core::protocol::{decode_entry, encode_entry, ChatEntry, Sender};
///
/// let entry = ChatEntry::new(Sender { id: 7, hue: 200, nick: "Ann".into() }, "hi");
/// let bytes = encode_entry(&entry).unwrap();
/// let (decoded, next) = decode_entry(&bytes, 0).unwrap();
/// assert_eq!(decoded, entry);
/// assert_eq!(next, bytes.len());
/// ```
pub fn encode_entry(entry: &ChatEntry) -> Result<Vec<u8>, ProtocolError> {
    check_entry(entry)?;
    let mut buf = Vec::with_capacity(encoded_entry_len(entry));
    write_entry(&mut buf, entry);
    Ok(buf)
}

/// Decodes one entry starting at `offset`.
///
/// Returns the entry and the offset of the first byte after it, so several
/// concatenated entries can be read from one buffer in sequence.
///
/// # Errors
///
/// Returns a malformed-frame [`ProtocolError`] if the buffer is truncated, a
/// length field is out of range, or a string is not UTF-8.
pub fn decode_entry(bytes: &[u8], offset: usize) -> Result<(ChatEntry, usize), ProtocolError> {
    let id = read_u16(bytes, offset)?;
    let hue = read_u16(bytes, offset + 2)?;
    let (nick, nick_end) = read_field(bytes, offset + 4, "nick")?;
    let (content, content_end) = read_field(bytes, nick_end, "content")?;
    let entry = ChatEntry {
        sender: Sender { id, hue, nick },
        content,
    };
    Ok((entry, content_end))
}

/// Encodes the join-replay frame: opcode `3` followed by every entry in order.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLong`] if any entry is too large; no
/// partial frame is produced.
pub fn encode_snapshot(entries: &[ChatEntry]) -> Result<Vec<u8>, ProtocolError> {
    let mut total = OPCODE_SIZE;
    for entry in entries {
        check_entry(entry)?;
        total += encoded_entry_len(entry);
    }

    let mut buf = Vec::with_capacity(total);
    buf.push(Opcode::Snapshot as u8);
    for entry in entries {
        write_entry(&mut buf, entry);
    }
    Ok(buf)
}

/// Starts decoding a snapshot frame.
///
/// Only the opcode is checked up front.  The returned iterator decodes one
/// entry per call to `next`, in encoded order, until the buffer is exhausted.
/// A malformed entry is yielded as a single `Err` and ends the sequence.
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyFrame`] or [`ProtocolError::UnexpectedOpcode`]
/// if `bytes` is not a snapshot frame.
pub fn decode_snapshot(bytes: &[u8]) -> Result<SnapshotEntries<'_>, ProtocolError> {
    expect_opcode(bytes, Opcode::Snapshot)?;
    Ok(SnapshotEntries {
        bytes,
        offset: OPCODE_SIZE,
        failed: false,
    })
}

/// Encodes a broadcast frame: opcode `4` followed by one entry.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLong`] if the entry is too large.
pub fn encode_single(entry: &ChatEntry) -> Result<Vec<u8>, ProtocolError> {
    check_entry(entry)?;
    let mut buf = Vec::with_capacity(OPCODE_SIZE + encoded_entry_len(entry));
    buf.push(Opcode::Single as u8);
    write_entry(&mut buf, entry);
    Ok(buf)
}

/// Decodes a broadcast frame holding exactly one entry.
///
/// # Errors
///
/// Returns a malformed-frame [`ProtocolError`] if the opcode is wrong, the
/// entry is corrupt, or bytes follow the entry.
pub fn decode_single(bytes: &[u8]) -> Result<ChatEntry, ProtocolError> {
    expect_opcode(bytes, Opcode::Single)?;
    let (entry, end) = decode_entry(bytes, OPCODE_SIZE)?;
    if end != bytes.len() {
        return Err(ProtocolError::TrailingBytes(bytes.len() - end));
    }
    Ok(entry)
}

/// Decodes any frame by dispatching on its opcode byte.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownOpcode`] for an unrecognized frame kind,
/// or any error produced by the kind-specific decoder.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    let first = *bytes.first().ok_or(ProtocolError::EmptyFrame)?;
    match Opcode::try_from(first) {
        Ok(Opcode::Snapshot) => decode_snapshot(bytes)?
            .collect::<Result<Vec<_>, _>>()
            .map(Frame::Snapshot),
        Ok(Opcode::Single) => decode_single(bytes).map(Frame::Single),
        Err(()) => Err(ProtocolError::UnknownOpcode(first)),
    }
}

// ── Lazy snapshot reader ──────────────────────────────────────────────────────

/// Single-pass iterator over the entries of a snapshot frame.
///
/// Created by [`decode_snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotEntries<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl Iterator for SnapshotEntries<'_> {
    type Item = Result<ChatEntry, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }
        match decode_entry(self.bytes, self.offset) {
            Ok((entry, next)) => {
                self.offset = next;
                Some(Ok(entry))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for SnapshotEntries<'_> {}

// ── Entry helpers ─────────────────────────────────────────────────────────────

fn check_entry(entry: &ChatEntry) -> Result<(), ProtocolError> {
    check_field("nick", &entry.sender.nick)?;
    check_field("content", &entry.content)
}

fn check_field(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.len() > MAX_FIELD_LEN {
        return Err(ProtocolError::FieldTooLong {
            field,
            len: value.len(),
            max: MAX_FIELD_LEN,
        });
    }
    Ok(())
}

/// Appends one entry.  Callers must have run [`check_entry`] first, which
/// guarantees both lengths fit in an `i32`.
fn write_entry(buf: &mut Vec<u8>, entry: &ChatEntry) {
    buf.extend_from_slice(&entry.sender.id.to_le_bytes());
    buf.extend_from_slice(&entry.sender.hue.to_le_bytes());
    write_field(buf, &entry.sender.nick);
    write_field(buf, &entry.content);
}

fn write_field(buf: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    buf.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn expect_opcode(bytes: &[u8], expected: Opcode) -> Result<(), ProtocolError> {
    let found = *bytes.first().ok_or(ProtocolError::EmptyFrame)?;
    if found != expected as u8 {
        return Err(ProtocolError::UnexpectedOpcode { expected, found });
    }
    Ok(())
}

// ── Primitive readers ─────────────────────────────────────────────────────────

/// Returns `len` bytes starting at `offset`, or `InsufficientData`.
fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], ProtocolError> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(ProtocolError::InsufficientData {
            offset,
            needed: len,
            available: bytes.len().saturating_sub(offset),
        })
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, ProtocolError> {
    let b = take(bytes, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn read_i32(bytes: &[u8], offset: usize) -> Result<i32, ProtocolError> {
    let b = take(bytes, offset, 4)?;
    Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Reads a 4-byte signed length prefix and then that many UTF-8 bytes.
/// Returns the string and the offset of the byte after it.
fn read_field(
    bytes: &[u8],
    offset: usize,
    field: &'static str,
) -> Result<(String, usize), ProtocolError> {
    let declared = read_i32(bytes, offset)?;
    let len = usize::try_from(declared)
        .ok()
        .filter(|len| *len <= MAX_FIELD_LEN)
        .ok_or(ProtocolError::LengthOutOfRange {
            field,
            value: declared,
        })?;
    let start = offset + 4;
    let data = take(bytes, start, len)?;
    let value = std::str::from_utf8(data)
        .map_err(|_| ProtocolError::InvalidUtf8 { field })?
        .to_owned();
    Ok((value, start + len))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
