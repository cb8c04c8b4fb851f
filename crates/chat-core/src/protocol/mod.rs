//! Protocol module containing frame types and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_entry, decode_frame, decode_single, decode_snapshot, encode_entry, encode_single,
    encode_snapshot, encoded_entry_len, ProtocolError, SnapshotEntries,
};
pub use messages::*;
