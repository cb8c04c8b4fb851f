//! Session id allocation.
//!
//! Ids are 16-bit on the wire.  They are handed out in strictly increasing
//! order starting at 0 and are never reused, even after the session that
//! held one disconnects.  Once all 65 536 values have been issued the
//! allocator reports exhaustion instead of wrapping, because wrapping would
//! hand a live session's id to a newcomer.

/// A monotonically increasing allocator for session ids.
///
/// # Examples
///
/// ```rust
/// use chat_core::domain::IdAllocator;
///
/// let mut ids = IdAllocator::new();
/// assert_eq!(ids.allocate(), Some(0));
/// assert_eq!(ids.allocate(), Some(1));
/// ```
#[derive(Debug, Default)]
pub struct IdAllocator {
    /// Next id to hand out.  Held as `u32` so the "all ids used" state
    /// (`u16::MAX + 1`) is representable.
    next: u32,
}

impl IdAllocator {
    /// Creates an allocator whose first id is 0.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns the next id and advances the counter, or `None` once the id
    /// space is exhausted.
    pub fn allocate(&mut self) -> Option<u16> {
        let id = u16::try_from(self.next).ok()?;
        self.next += 1;
        Some(id)
    }

    /// Returns the number of ids handed out so far.
    pub fn issued(&self) -> u32 {
        self.next
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: u32) -> Self {
        Self { next }
    }
}
