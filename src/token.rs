use std::fmt;

/// Associates an I/O source registered with a [`Demultiplexer`](crate::demux::Demultiplexer)
/// with the event it produced.
///
/// Tokens are opaque to the core; callers choose their own encoding. The
/// crate itself only ever hands out one reserved token (see
/// [`WAKE_TOKEN`]) to distinguish cross-thread wakeups from I/O readiness.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Token(pub usize);

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

impl From<usize> for Token {
    fn from(val: usize) -> Token {
        Token(val)
    }
}

impl From<Token> for usize {
    fn from(val: Token) -> usize {
        val.0
    }
}

/// Reserved token for the loop's own wakeup source (pipe or IOCP sentinel).
pub(crate) const WAKE_TOKEN: Token = Token(usize::MAX);
