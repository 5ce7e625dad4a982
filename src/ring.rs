//! Fixed capacity byte FIFO between the link ISR and the tile decoder.
//!
//! The buffer is index based and never allocates. Bytes can be pushed either
//! directly with [`RingBuffer::enqueue`] or as a staged batch that is later
//! accepted or thrown away as a whole, which is how a packet's payload is held
//! back until its checksum has been seen.
//!
//! ## Concurrency
//!
//! The buffer itself is not synchronised. In an interrupt driven setup the
//! whole [`Session`](crate::session::Session) lives behind a
//! `critical_section::Mutex` (see [`crate::timer`]), which gives the single
//! producer / single consumer pair exclusive access per call.
//!
//! ## Overflow
//!
//! A full buffer drops the incoming byte and keeps everything it already
//! holds. Drops are counted, see [`RingBuffer::dropped`].

/// A circular byte queue with `N` bytes of storage.
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    buf: [u8; N],
    /// Index of the next committed write.
    head: usize,
    /// Index of the oldest committed byte.
    tail: usize,
    /// Committed bytes.
    count: usize,
    /// Bytes written past `head` but not yet committed.
    staged: usize,
    /// Highest `count + staged` seen since the last reset of the mark.
    waterline: usize,
    /// Bytes refused because the buffer was full.
    dropped: u32,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    /// Creates an empty buffer.
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            head: 0,
            tail: 0,
            count: 0,
            staged: 0,
            waterline: 0,
            dropped: 0,
        }
    }

    /// Total storage in bytes.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Committed bytes available to [`dequeue`](Self::dequeue).
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Bytes waiting in the current staged batch.
    pub const fn staged_count(&self) -> usize {
        self.staged
    }

    /// No committed bytes.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// No room for another byte, staged or committed.
    pub const fn is_full(&self) -> bool {
        self.count + self.staged >= N
    }

    /// Bytes refused because the buffer was full.
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Returns the high-water mark, optionally restarting it.
    pub fn waterline(&mut self, reset: bool) -> usize {
        let mark = self.waterline;
        if reset {
            self.waterline = 0;
        }
        mark
    }

    /// Empties the buffer, including any staged bytes.
    ///
    /// The drop counter and waterline are diagnostics and survive a reset.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
        self.staged = 0;
    }

    /// Appends a committed byte.
    ///
    /// Returns `false` without touching the stored bytes when the buffer is
    /// full, or while a staged batch is pending.
    pub fn enqueue(&mut self, byte: u8) -> bool {
        if self.staged != 0 {
            return false;
        }
        if !self.push_at_head(byte) {
            return false;
        }
        self.head = (self.head + 1) % N;
        self.count += 1;
        self.staged = 0;
        true
    }

    /// Removes the oldest committed byte.
    pub fn dequeue(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }
        let byte = self.buf[self.tail];
        self.tail = (self.tail + 1) % N;
        self.count -= 1;
        Some(byte)
    }

    /// Reads the committed byte `offset` places from the front without removing it.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        if offset >= self.count {
            return None;
        }
        Some(self.buf[(self.tail + offset) % N])
    }

    /// Appends a byte to the pending staged batch.
    ///
    /// Staged bytes are invisible to [`dequeue`](Self::dequeue) until
    /// [`accept_staged`](Self::accept_staged) is called.
    pub fn enqueue_staged(&mut self, byte: u8) -> bool {
        if !self.push_at_head(byte) {
            return false;
        }
        self.staged += 1;
        true
    }

    /// Commits the staged batch.
    pub fn accept_staged(&mut self) {
        if N == 0 {
            return;
        }
        self.head = (self.head + self.staged) % N;
        self.count += self.staged;
        self.staged = 0;
    }

    /// Throws the staged batch away.
    pub fn discard_staged(&mut self) {
        self.staged = 0;
    }

    /// Writes `byte` into the first free slot after any staged bytes.
    fn push_at_head(&mut self, byte: u8) -> bool {
        if self.is_full() {
            self.dropped = self.dropped.saturating_add(1);
            return false;
        }
        self.buf[(self.head + self.staged) % N] = byte;
        let used = self.count + self.staged + 1;
        if used > self.waterline {
            self.waterline = used;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_fifo_order() {
        let mut ring: RingBuffer<4> = RingBuffer::new();
        assert!(ring.enqueue(1));
        assert!(ring.enqueue(2));
        assert!(ring.enqueue(3));
        assert_eq!(ring.count(), 3);
        assert_eq!(ring.dequeue(), Some(1));
        assert_eq!(ring.dequeue(), Some(2));
        assert!(ring.enqueue(4));
        assert!(ring.enqueue(5));
        assert_eq!(ring.dequeue(), Some(3));
        assert_eq!(ring.dequeue(), Some(4));
        assert_eq!(ring.dequeue(), Some(5));
        assert_eq!(ring.dequeue(), None);
    }

    #[test]
    fn test_ring_full_drops_new_byte() {
        let mut ring: RingBuffer<2> = RingBuffer::new();
        assert!(ring.enqueue(0xAA));
        assert!(ring.enqueue(0xBB));
        assert!(ring.is_full());
        assert!(!ring.enqueue(0xCC));
        assert_eq!(ring.dropped(), 1);
        assert_eq!(ring.count(), 2);
        assert_eq!(ring.dequeue(), Some(0xAA));
        assert_eq!(ring.dequeue(), Some(0xBB));
    }

    #[test]
    fn test_ring_peek_does_not_consume() {
        let mut ring: RingBuffer<8> = RingBuffer::new();
        for b in [10, 20, 30] {
            assert!(ring.enqueue(b));
        }
        assert_eq!(ring.peek(0), Some(10));
        assert_eq!(ring.peek(2), Some(30));
        assert_eq!(ring.peek(3), None);
        assert_eq!(ring.count(), 3);
    }

    #[test]
    fn test_ring_staged_accept_and_discard() {
        let mut ring: RingBuffer<8> = RingBuffer::new();
        assert!(ring.enqueue(1));
        assert!(ring.enqueue_staged(2));
        assert!(ring.enqueue_staged(3));
        assert_eq!(ring.count(), 1);
        assert_eq!(ring.staged_count(), 2);
        assert!(!ring.enqueue(9));

        ring.discard_staged();
        assert_eq!(ring.staged_count(), 0);
        assert!(ring.enqueue_staged(4));
        ring.accept_staged();
        assert_eq!(ring.count(), 2);
        assert_eq!(ring.dequeue(), Some(1));
        assert_eq!(ring.dequeue(), Some(4));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_staged_respects_capacity() {
        let mut ring: RingBuffer<3> = RingBuffer::new();
        assert!(ring.enqueue(1));
        assert!(ring.enqueue_staged(2));
        assert!(ring.enqueue_staged(3));
        assert!(!ring.enqueue_staged(4));
        ring.accept_staged();
        assert_eq!(ring.count(), 3);
        assert_eq!(ring.dropped(), 1);
    }

    #[test]
    fn test_ring_staged_wraps_around() {
        let mut ring: RingBuffer<4> = RingBuffer::new();
        for b in 0..3 {
            assert!(ring.enqueue(b));
        }
        for _ in 0..3 {
            let _ = ring.dequeue();
        }
        for b in [7, 8, 9, 10] {
            assert!(ring.enqueue_staged(b));
        }
        ring.accept_staged();
        assert_eq!(ring.dequeue(), Some(7));
        assert_eq!(ring.dequeue(), Some(8));
        assert_eq!(ring.dequeue(), Some(9));
        assert_eq!(ring.dequeue(), Some(10));
    }

    #[test]
    fn test_ring_waterline_and_reset() {
        let mut ring: RingBuffer<8> = RingBuffer::new();
        for b in 0..5 {
            assert!(ring.enqueue(b));
        }
        for _ in 0..5 {
            let _ = ring.dequeue();
        }
        assert_eq!(ring.waterline(true), 5);
        assert_eq!(ring.waterline(false), 0);

        assert!(ring.enqueue(1));
        assert!(ring.enqueue_staged(2));
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.staged_count(), 0);
        assert_eq!(ring.capacity(), 8);
    }
}
