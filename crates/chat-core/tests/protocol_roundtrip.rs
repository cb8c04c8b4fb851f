//! Integration tests for the chat-core protocol codec.
//!
//! These tests go through the public API only, exercising the codec, the
//! session registry, and the history log together the way the relay does.

use chat_core::{
    decode_entry, decode_frame, decode_single, decode_snapshot, encode_entry, encode_single,
    encode_snapshot, ChatEntry, ConnectionId, Frame, HistoryLog, ProtocolError, Sender,
    SessionRegistry,
};

fn sender(id: u16, hue: u16, nick: &str) -> Sender {
    Sender {
        id,
        hue,
        nick: nick.to_string(),
    }
}

#[test]
fn test_roundtrip_entry_for_varied_fields() {
    let long = "long ".repeat(2_000);
    let cases = [
        ("", ""),
        ("Anonymous", "hello"),
        ("ünïcødé", "emoji 🎉 and tabs\tand\nnewlines"),
        ("a", long.as_str()),
    ];

    for (i, (nick, content)) in cases.iter().enumerate() {
        let original = ChatEntry::new(sender(i as u16, (i as u16 * 90) % 360, nick), *content);
        let bytes = encode_entry(&original).expect("encode must succeed");
        let (decoded, consumed) = decode_entry(&bytes, 0).expect("decode must succeed");
        assert_eq!(decoded, original);
        assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    }
}

#[test]
fn test_reference_frame_for_ann_hi() {
    let original = ChatEntry::new(sender(7, 200, "Ann"), "hi");

    let bytes = encode_single(&original).unwrap();

    assert_eq!(
        bytes,
        [
            0x04, 0x07, 0x00, 0xC8, 0x00, 0x03, 0x00, 0x00, 0x00, b'A', b'n', b'n', 0x02, 0x00,
            0x00, 0x00, b'h', b'i'
        ]
    );
    assert_eq!(decode_single(&bytes).unwrap(), original);
}

#[test]
fn test_join_snapshot_replays_history_in_order() {
    // Arrange: three sessions each say something, one after the other.
    let mut registry = SessionRegistry::new();
    let mut history = HistoryLog::new();
    let conns: Vec<ConnectionId> = (0..3).map(|_| ConnectionId::new()).collect();
    for conn in &conns {
        registry.register(*conn).unwrap();
    }
    for (n, conn) in conns.iter().enumerate() {
        let session = registry.lookup(conn).unwrap();
        history.append(ChatEntry::new(session.sender(), format!("e{}", n + 1)));
    }

    // Act: encode the snapshot a newcomer would receive.
    let frame = encode_snapshot(history.snapshot_all()).unwrap();

    // Assert
    let replay: Vec<ChatEntry> = decode_snapshot(&frame)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let contents: Vec<&str> = replay.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, ["e1", "e2", "e3"]);
    assert_eq!(replay.as_slice(), history.snapshot_all());
}

#[test]
fn test_history_keeps_old_nick_after_rename() {
    let mut registry = SessionRegistry::new();
    let mut history = HistoryLog::new();
    let conn = ConnectionId::new();
    registry.register(conn).unwrap();

    history.append(ChatEntry::new(registry.lookup(&conn).unwrap().sender(), "before"));
    registry.set_nick(&conn, "renamed").unwrap();
    registry.set_hue(&conn, 10).unwrap();
    history.append(ChatEntry::new(registry.lookup(&conn).unwrap().sender(), "after"));

    let frame = encode_snapshot(history.snapshot_all()).unwrap();
    let Frame::Snapshot(replay) = decode_frame(&frame).unwrap() else {
        panic!("expected a snapshot frame");
    };

    assert_eq!(replay[0].sender, sender(0, 120, "Anonymous"));
    assert_eq!(replay[1].sender, sender(0, 10, "renamed"));
}

#[test]
fn test_snapshot_is_lazy_and_single_pass() {
    let entries: Vec<ChatEntry> = (0..5)
        .map(|i| ChatEntry::new(sender(i, 0, "x"), format!("m{i}")))
        .collect();
    let frame = encode_snapshot(&entries).unwrap();

    let mut iter = decode_snapshot(&frame).unwrap();
    let first_two: Vec<ChatEntry> = iter.by_ref().take(2).map(Result::unwrap).collect();
    let rest: Vec<ChatEntry> = iter.map(Result::unwrap).collect();

    assert_eq!(first_two, entries[..2]);
    assert_eq!(rest, entries[2..]);
}

#[test]
fn test_corrupt_frames_are_reported_as_malformed() {
    let good = encode_single(&ChatEntry::new(sender(1, 1, "n"), "c")).unwrap();

    let truncated = decode_single(&good[..good.len() - 1]).unwrap_err();
    let unknown = decode_frame(&[0x07]).unwrap_err();

    assert!(truncated.is_malformed());
    assert!(unknown.is_malformed());
    assert_eq!(unknown, ProtocolError::UnknownOpcode(0x07));
}
