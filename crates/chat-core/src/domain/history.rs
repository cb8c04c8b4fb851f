//! Append-only log of delivered chat entries.

use crate::protocol::messages::ChatEntry;

/// Ordered record of every accepted message, oldest first.
///
/// Entries are never reordered, mutated, or evicted; memory grows with the
/// number of messages for the lifetime of the relay.
#[derive(Debug, Default, Clone)]
pub struct HistoryLog {
    entries: Vec<ChatEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `entry` to the end of the log.
    pub fn append(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
    }

    /// Returns every entry in arrival order.
    pub fn snapshot_all(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::Sender;

    fn entry(id: u16, content: &str) -> ChatEntry {
        ChatEntry::new(
            Sender {
                id,
                hue: 120,
                nick: "Anonymous".to_string(),
            },
            content,
        )
    }

    #[test]
    fn test_new_log_is_empty() {
        let log = HistoryLog::new();
        assert!(log.is_empty());
        assert!(log.snapshot_all().is_empty());
    }

    #[test]
    fn test_append_preserves_arrival_order() {
        let mut log = HistoryLog::new();
        log.append(entry(0, "e1"));
        log.append(entry(1, "e2"));
        log.append(entry(0, "e3"));

        let contents: Vec<&str> = log.snapshot_all().iter().map(|e| e.content.as_str()).collect();

        assert_eq!(contents, ["e1", "e2", "e3"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_cloned_snapshot_is_unaffected_by_later_appends() {
        let mut log = HistoryLog::new();
        log.append(entry(0, "before"));
        let snapshot = log.snapshot_all().to_vec();

        log.append(entry(0, "after"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }
}
