//! Reader/writer-indexed resizable byte buffer.
//!
//! ```text
//! +-----------------+------------------+------------------+
//! |  useless bytes  |  readable bytes  |  writable bytes  |
//! |                 |     (CONTENT)    |                  |
//! +-----------------+------------------+------------------+
//! |                 |                  |                  |
//! 0     <=     reader_index   <=   writer_index    <=    capacity
//! ```
//!
//! Grounded on `original_source`'s `IoBuffer` (see `TCPServer.h`), which a
//! `TcpConnection` owns exclusively for both its send and receive sides.

const INITIAL_SIZE: usize = 1024;

#[derive(Debug, Default)]
pub struct IoBuffer {
    buf: Vec<u8>,
    reader_index: usize,
    writer_index: usize,
}

impl IoBuffer {
    pub fn new() -> IoBuffer {
        IoBuffer {
            buf: vec![0u8; INITIAL_SIZE],
            reader_index: 0,
            writer_index: 0,
        }
    }

    pub fn readable_bytes(&self) -> usize {
        self.writer_index - self.reader_index
    }

    pub fn writable_bytes(&self) -> usize {
        self.buf.len() - self.writer_index
    }

    fn useless_bytes(&self) -> usize {
        self.reader_index
    }

    /// Pointer to the first readable byte (the current "peek" position).
    pub fn peek(&self) -> &[u8] {
        &self.buf[self.reader_index..self.writer_index]
    }

    /// Appends `data` to the writable region, compacting or growing first if
    /// necessary.
    pub fn append(&mut self, data: &[u8]) {
        if self.writable_bytes() < data.len() {
            self.make_space(data.len());
        }
        let start = self.writer_index;
        self.buf[start..start + data.len()].copy_from_slice(data);
        self.writer_index += data.len();
    }

    /// Reserves `more_bytes` of writable space at the tail, returning the
    /// writer-side slice to fill (used by recv to read directly into the
    /// buffer without an intermediate copy).
    pub fn writable_tail(&mut self, more_bytes: usize) -> &mut [u8] {
        if self.writable_bytes() < more_bytes {
            self.make_space(more_bytes);
        }
        let start = self.writer_index;
        &mut self.buf[start..start + more_bytes]
    }

    /// Commits `n` bytes previously written into the slice returned by
    /// [`writable_tail`](Self::writable_tail).
    pub fn commit_written(&mut self, n: usize) {
        debug_assert!(self.writer_index + n <= self.buf.len());
        self.writer_index += n;
    }

    /// Drops `n` bytes from the readable region (the bytes have been
    /// delivered to a user callback already).
    pub fn retrieve(&mut self, n: usize) {
        debug_assert!(n <= self.readable_bytes());
        if n < self.readable_bytes() {
            self.reader_index += n;
        } else {
            self.retrieve_all();
        }
    }

    pub fn retrieve_all(&mut self) {
        self.reader_index = 0;
        self.writer_index = 0;
    }

    fn make_space(&mut self, more_bytes: usize) {
        if self.useless_bytes() + self.writable_bytes() >= more_bytes {
            // Compact: slide the readable region down to offset 0.
            let readable = self.readable_bytes();
            self.buf.copy_within(self.reader_index..self.writer_index, 0);
            self.reader_index = 0;
            self.writer_index = readable;
        } else {
            self.buf.resize(self.writer_index + more_bytes, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_retrieve_round_trip() {
        let mut buf = IoBuffer::new();
        buf.append(b"hello");
        assert_eq!(buf.readable_bytes(), 5);
        assert_eq!(buf.peek(), b"hello");
        buf.retrieve(5);
        assert_eq!(buf.readable_bytes(), 0);
    }

    #[test]
    fn retrieve_all_resets_both_indices() {
        let mut buf = IoBuffer::new();
        buf.append(b"abc");
        buf.retrieve(1);
        buf.retrieve_all();
        assert_eq!(buf.readable_bytes(), 0);
        assert_eq!(buf.writable_bytes(), buf.buf.len());
    }

    #[test]
    fn append_compacts_before_growing() {
        let mut buf = IoBuffer::new();
        buf.append(&vec![0u8; INITIAL_SIZE - 10]);
        buf.retrieve(INITIAL_SIZE - 20);
        let cap_before = buf.buf.len();
        // Only 10 writable bytes remain untouched, but 10 "useless" bytes
        // sit before reader_index; appending something that fits in
        // useless+writable should compact rather than grow.
        buf.append(&vec![1u8; 15]);
        assert_eq!(buf.buf.len(), cap_before);
    }

    #[test]
    fn append_grows_when_compaction_is_not_enough() {
        let mut buf = IoBuffer::new();
        buf.append(&vec![0u8; INITIAL_SIZE]);
        let cap_before = buf.buf.len();
        buf.append(&[1, 2, 3]);
        assert!(buf.buf.len() > cap_before);
    }

    #[test]
    fn writable_tail_then_commit() {
        let mut buf = IoBuffer::new();
        {
            let tail = buf.writable_tail(4);
            tail.copy_from_slice(b"abcd");
        }
        buf.commit_written(4);
        assert_eq!(buf.peek(), b"abcd");
    }
}
