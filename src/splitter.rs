//! Packet splitters: pure functions that, given the current readable window
//! of a connection's receive buffer, decide how many leading bytes form one
//! complete application packet.
//!
//! Grounded on `original_source`'s `PacketSplitter` typedef and its four
//! predefined splitters in `TCPServer.h`.

/// A splitter observes the readable window `data` and returns the number of
/// leading bytes that form one complete packet, or `0` if `data` does not
/// yet contain a complete packet.
///
/// Returning a value greater than `data.len()` is a contract violation; see
/// [`crate::connection::TcpConnection::recv`].
pub type PacketSplitter = fn(data: &[u8]) -> usize;

/// Delivers exactly one byte at a time.
pub fn byte_splitter(data: &[u8]) -> usize {
    if data.is_empty() {
        0
    } else {
        1
    }
}

/// Delivers up to and including the first `\r` or `\n`. If that byte is
/// immediately followed by the *other* terminator, both are included
/// (`\r\n` and `\n\r` are one break), but `\r\r` is treated as two breaks —
/// this mirrors the original implementation's behavior exactly (see
/// `spec.md` §9 open questions).
pub fn line_splitter(data: &[u8]) -> usize {
    for (i, &b) in data.iter().enumerate() {
        if b == b'\r' || b == b'\n' {
            let other = if b == b'\r' { b'\n' } else { b'\r' };
            return if data.get(i + 1) == Some(&other) {
                i + 2
            } else {
                i + 1
            };
        }
    }
    0
}

/// Delivers up to and including the first `\0`.
pub fn null_terminated_splitter(data: &[u8]) -> usize {
    match data.iter().position(|&b| b == 0) {
        Some(i) => i + 1,
        None => 0,
    }
}

/// Delivers whatever is currently available, as soon as there is anything.
pub fn any_splitter(data: &[u8]) -> usize {
    data.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_splitter_delivers_one_byte_at_a_time() {
        assert_eq!(byte_splitter(b""), 0);
        assert_eq!(byte_splitter(b"x"), 1);
        assert_eq!(byte_splitter(b"xy"), 1);
    }

    #[test]
    fn line_splitter_handles_crlf_as_one_break() {
        assert_eq!(line_splitter(b"hello\r\nworld"), 7);
        assert_eq!(line_splitter(b"hello\n\rworld"), 7);
    }

    #[test]
    fn line_splitter_treats_crcr_as_two_breaks() {
        assert_eq!(line_splitter(b"\r\rworld"), 1);
    }

    #[test]
    fn line_splitter_waits_for_more_data() {
        assert_eq!(line_splitter(b"no terminator yet"), 0);
    }

    #[test]
    fn null_terminated_splitter_frames_on_nul() {
        assert_eq!(null_terminated_splitter(b"A\0BB\0CCC\0"), 2);
    }

    #[test]
    fn any_splitter_takes_everything() {
        assert_eq!(any_splitter(b""), 0);
        assert_eq!(any_splitter(b"anything"), 8);
    }
}
