//! Wires an [`EventLoop`] to a connection registry: every event the loop's
//! demultiplexer reports is routed here by token to the owning
//! [`TcpConnection`], and a periodic sweep walks the registry to enforce
//! per-task timeouts.
//!
//! Grounded on `original_source`'s `TcpEventLoop` (`EventLoop.h`): a thin
//! decorator over the base loop holding the connection map and dispatching
//! `EVENT_TYPE`-tagged callbacks to the right `TcpConnection` by descriptor.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::callbacks::TcpCallbacks;
use crate::config::ConnectionConfig;
use crate::connection::{Origin, TcpConnection};
use crate::demux::{DemuxEvent, EventKind};
use crate::event_loop::EventLoop;
use crate::sys;
use crate::token::Token;

const TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

type ConnectionMap = Arc<Mutex<HashMap<Token, Arc<TcpConnection>>>>;

pub struct TcpEventLoop {
    event_loop: Arc<EventLoop>,
    connections: ConnectionMap,
}

impl TcpEventLoop {
    pub fn new() -> io::Result<Arc<TcpEventLoop>> {
        let connections: ConnectionMap = Arc::new(Mutex::new(HashMap::new()));
        let dispatch_connections = connections.clone();
        let event_loop = Arc::new(EventLoop::new(move |events| {
            dispatch(&dispatch_connections, events);
        })?);

        let sweep_connections = connections.clone();
        event_loop.execute_every(
            TIMEOUT_SWEEP_INTERVAL,
            Box::new(move || {
                let now = Instant::now();
                let snapshot: Vec<_> = sweep_connections.lock().unwrap().values().cloned().collect();
                for conn in snapshot {
                    conn.check_timeout(now);
                }
            }),
        );

        Ok(Arc::new(TcpEventLoop {
            event_loop,
            connections,
        }))
    }

    pub fn selector(&self) -> &Arc<sys::Selector> {
        self.event_loop.selector()
    }

    pub fn event_loop(&self) -> &Arc<EventLoop> {
        &self.event_loop
    }

    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.event_loop.clone().start()
    }

    pub fn stop(&self) {
        self.event_loop.stop()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Admits a freshly accepted or connected socket. Construction happens
    /// on the calling thread (the acceptor's or connector's own thread),
    /// but registration with the demultiplexer, insertion into the
    /// connection map, and the `on_connected` callback are all delegated
    /// onto the owning loop thread, matching `set_event_loop`'s "must be
    /// called on that loop's thread" contract (spec.md §4.3) and the
    /// invariant that every callback for a connection runs on its
    /// `owner_loop`'s thread (spec.md §8).
    pub fn add_connection(
        self: &Arc<Self>,
        socket: sys::Socket,
        origin: Origin,
        callbacks: Arc<dyn TcpCallbacks>,
        config: ConnectionConfig,
    ) -> Arc<TcpConnection> {
        let conn = TcpConnection::new(socket, origin, Arc::downgrade(self), callbacks, config);
        let admitted = conn.clone();
        let pool = self.clone();
        self.event_loop.execute_in_loop(move || {
            if let Err(e) = admitted.initial_register(&pool.event_loop) {
                log::warn!("failed to register connection with demultiplexer: {}", e);
                admitted.error_occurred(&format!("demultiplexer registration failed: {e}"));
                return;
            }
            pool.connections.lock().unwrap().insert(admitted.token(), admitted.clone());
            admitted.fire_connected();
        });
        conn
    }

    pub(crate) fn remove_connection(&self, token: Token) {
        self.connections.lock().unwrap().remove(&token);
    }
}

fn dispatch(connections: &ConnectionMap, events: &[DemuxEvent]) {
    for event in events {
        let conn = {
            let map = connections.lock().unwrap();
            match map.get(&event.token) {
                Some(conn) => conn.clone(),
                None => continue,
            }
        };
        route(&conn, event);
    }
}

#[cfg(unix)]
fn route(conn: &Arc<TcpConnection>, event: &DemuxEvent) {
    match &event.kind {
        EventKind::Readable => conn.on_readable(),
        EventKind::Writable => conn.on_writable(),
        EventKind::Error => conn.error_occurred("socket reported an error condition"),
        EventKind::RecvComplete { .. } | EventKind::SendComplete { .. } | EventKind::OperationFailed { .. } => {
            unreachable!("readiness-based selector never reports completion events")
        }
    }
}

#[cfg(windows)]
fn route(conn: &Arc<TcpConnection>, event: &DemuxEvent) {
    let Some(owner) = conn_event_loop(conn) else {
        return;
    };
    match &event.kind {
        EventKind::RecvComplete { data } => conn.on_recv_complete(&owner, data.clone()),
        EventKind::SendComplete { len } => conn.on_send_complete(*len),
        EventKind::OperationFailed { error } => {
            conn.error_occurred(&format!("posted operation failed: {error}"))
        }
        EventKind::Readable | EventKind::Writable | EventKind::Error => {
            unreachable!("completion-based selector never reports readiness events")
        }
    }
}

#[cfg(windows)]
fn conn_event_loop(conn: &Arc<TcpConnection>) -> Option<Arc<EventLoop>> {
    conn.owning_loop().map(|owner| owner.event_loop().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::Context;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCallbacks {
        connected: AtomicUsize,
        disconnected: AtomicUsize,
    }

    impl TcpCallbacks for CountingCallbacks {
        fn on_connected(&self, _conn: &Arc<TcpConnection>) {
            self.connected.fetch_add(1, Ordering::SeqCst);
        }
        fn on_disconnected(&self, _conn: &Arc<TcpConnection>) {
            self.disconnected.fetch_add(1, Ordering::SeqCst);
        }
        fn on_recv_complete(&self, _conn: &Arc<TcpConnection>, _packet: &[u8], _context: Option<Context>) {}
        fn on_send_complete(&self, _conn: &Arc<TcpConnection>, _context: Option<Context>) {}
    }

    #[test]
    fn add_then_remove_connection_updates_registry() {
        let pool = TcpEventLoop::new().unwrap();
        let handle = pool.clone().start();
        std::thread::sleep(Duration::from_millis(20));

        let listener = sys::Socket::new_stream().unwrap();
        listener.bind(crate::addr::InetAddr::from_parts(127, 0, 0, 1, 0)).unwrap();
        listener.listen(1).unwrap();
        let addr = listener.local_addr().unwrap();

        let client = sys::Socket::new_stream().unwrap();
        let _ = client.connect(addr);
        std::thread::sleep(Duration::from_millis(20));

        let callbacks = Arc::new(CountingCallbacks {
            connected: AtomicUsize::new(0),
            disconnected: AtomicUsize::new(0),
        });
        let conn = pool.add_connection(client, Origin::Connected, callbacks.clone(), ConnectionConfig::default());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(pool.connection_count(), 1);
        assert_eq!(callbacks.connected.load(Ordering::SeqCst), 1);

        conn.disconnect();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(pool.connection_count(), 0);
        assert_eq!(callbacks.disconnected.load(Ordering::SeqCst), 1);

        pool.stop();
        handle.join().unwrap();
    }
}
