//! The vocabulary shared by the two platform demultiplexers: a readiness-
//! based one (epoll) and a completion-based one (IOCP).
//!
//! On Linux, `register`/`reregister`/`deregister` arm interest and
//! `Selector::select` reports readiness; the connection still issues its
//! own non-blocking `read`/`write`. On Windows, registration happens once
//! at connection creation, and sends/recvs are posted directly to the OS
//! via [`crate::sys::windows::selector::Selector::post_send`]/`post_recv`;
//! `select` then reports completions, not readiness. `EventKind` is the
//! vocabulary both variants report results in; `EventLoop` (see
//! `crate::event_loop`) is generic over neither — it's built once per
//! platform behind `#[cfg(unix)]`/`#[cfg(windows)]` and always drives its
//! own concrete `sys::Selector`.
//!
//! Grounded on `original_source`'s `linux_epoll.h` (`EpollObject::poll`,
//! `EVENT_TYPE`) and `win_iocp.h` (`IocpObject::work`, `IocpTaskData`) which
//! are two platform-specific event loop backends behind a shared interface
//! in `EventLoop.h`'s `OsEventLoop::doLoopWork`.

use crate::token::Token;

/// What a single reported event means to the connection owning its token.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EventKind {
    /// Readiness backend: the socket is ready to be read from.
    Readable,
    /// Readiness backend: the socket is ready to be written to.
    Writable,
    /// Readiness backend: an error condition is pending on the socket.
    Error,
    /// Completion backend: a previously posted receive finished, carrying
    /// the bytes it read directly (an empty vec means the peer closed the
    /// connection).
    RecvComplete { data: Vec<u8> },
    /// Completion backend: a previously posted send finished; `len` is the
    /// number of bytes actually transmitted.
    SendComplete { len: usize },
    /// Completion backend: a posted operation failed.
    OperationFailed { error: std::io::Error },
}

/// One demultiplexed event tagged with the token it was registered under.
pub struct DemuxEvent {
    pub token: Token,
    pub kind: EventKind,
}
