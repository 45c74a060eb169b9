//! User-facing callback surface for a [`TcpConnection`](crate::connection::TcpConnection).
//!
//! Grounded on `original_source`'s `TcpCallbacks` interface (`TCPServer.h`):
//! `onTcpConnected`/`onTcpDisconnected`/`onTcpRecvComplete`/`onTcpSendComplete`.

use std::any::Any;
use std::sync::Arc;

use crate::connection::TcpConnection;

/// Opaque user payload threaded through a send or recv task and handed back
/// on completion. Modeled as `Box<dyn Any + Send>` because the core itself
/// never inspects it.
pub type Context = Box<dyn Any + Send>;

pub trait TcpCallbacks: Send + Sync {
    /// Invoked once, right after a connection is admitted to its event
    /// loop (after acceptance or after an outbound connect succeeds), and
    /// before any data is ever dispatched to it.
    fn on_connected(&self, conn: &Arc<TcpConnection>) {
        let _ = conn;
    }

    /// Invoked exactly once for a connection, whether it closed cleanly or
    /// via [`TcpConnection::error_occurred`](crate::connection::TcpConnection::error_occurred).
    fn on_disconnected(&self, conn: &Arc<TcpConnection>) {
        let _ = conn;
    }

    /// Invoked once per packet a registered `recv` completes, `packet`
    /// being exactly the leading bytes the splitter selected.
    fn on_recv_complete(&self, conn: &Arc<TcpConnection>, packet: &[u8], context: Option<Context>) {
        let _ = (conn, packet, context);
    }

    /// Invoked once a registered `send` has been fully flushed to the
    /// socket (not merely accepted into the send buffer).
    fn on_send_complete(&self, conn: &Arc<TcpConnection>, context: Option<Context>) {
        let _ = (conn, context);
    }
}
