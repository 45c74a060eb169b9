//! The event loop pool and the `IoService` facade sitting in front of it.
//!
//! Grounded on `original_source`'s `TcpEventLoopList`/`IoService`
//! (`TCPServer.h`/`TCPServer.cpp`): a fixed-size list of `TcpEventLoop`s,
//! each running its own OS thread, and a thin facade that owns the list
//! and is the one entry point `TcpAcceptor`/`TcpConnector` use to register
//! a freshly accepted or connected socket to some loop in the set.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::callbacks::TcpCallbacks;
use crate::config::{ConnectionConfig, IoServiceConfig};
use crate::connection::{Origin, TcpConnection};
use crate::loop_pool::TcpEventLoop;
use crate::sys;

/// A fixed-size set of [`TcpEventLoop`]s. Assignment is round-robin: each
/// call to [`EventLoopPool::next`] returns the next loop in sequence,
/// wrapping back to the first once the set is exhausted (spec.md §2,
/// "Data flow").
pub struct EventLoopPool {
    loops: Vec<Arc<TcpEventLoop>>,
    next: AtomicUsize,
}

impl EventLoopPool {
    pub fn new(loop_count: usize) -> io::Result<EventLoopPool> {
        let mut loops = Vec::with_capacity(loop_count);
        for _ in 0..loop_count {
            loops.push(TcpEventLoop::new()?);
        }
        Ok(EventLoopPool {
            loops,
            next: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn get(&self, index: usize) -> &Arc<TcpEventLoop> {
        &self.loops[index % self.loops.len()]
    }

    /// Picks the next loop in round-robin order and returns its index
    /// alongside the loop itself, so the caller can stamp
    /// `Origin::Accepted { server_index, .. }` with it.
    pub fn next(&self) -> (usize, Arc<TcpEventLoop>) {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.loops.len();
        (index, self.loops[index].clone())
    }

    pub fn start_all(&self) -> Vec<JoinHandle<()>> {
        self.loops.iter().map(|l| l.clone().start()).collect()
    }

    pub fn stop_all(&self) {
        for l in &self.loops {
            l.stop();
        }
    }

    pub fn total_connection_count(&self) -> usize {
        self.loops.iter().map(|l| l.connection_count()).sum()
    }
}

/// The top-level facade: owns the loop pool and is the single point
/// through which accepted or connected sockets are admitted to it.
/// Grounded on `original_source`'s `IoService` class, which wraps exactly
/// one `TcpEventLoopList` and exposes `registerToEventLoop`.
pub struct IoService {
    pool: EventLoopPool,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl IoService {
    pub fn new(config: IoServiceConfig) -> io::Result<Arc<IoService>> {
        let pool = EventLoopPool::new(config.loop_count)?;
        Ok(Arc::new(IoService {
            pool,
            handles: std::sync::Mutex::new(Vec::new()),
        }))
    }

    pub fn pool(&self) -> &EventLoopPool {
        &self.pool
    }

    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap();
        if handles.is_empty() {
            *handles = self.pool.start_all();
        }
    }

    pub fn stop(&self) {
        self.pool.stop_all();
        let mut handles = self.handles.lock().unwrap();
        for h in handles.drain(..) {
            let _ = h.join();
        }
    }

    pub fn connection_count(&self) -> usize {
        self.pool.total_connection_count()
    }

    /// Hands `socket` to the next loop in round-robin order, tagging it
    /// with `server_port` when it arrived via an acceptor (`None` for a
    /// connector's outbound connection, see [`Origin`]).
    pub fn register(
        self: &Arc<Self>,
        socket: sys::Socket,
        server_port: Option<u16>,
        callbacks: Arc<dyn TcpCallbacks>,
        config: ConnectionConfig,
    ) -> Arc<TcpConnection> {
        let (index, target_loop) = self.pool.next();
        let origin = match server_port {
            Some(port) => Origin::Accepted {
                server_index: index,
                server_port: port,
            },
            None => Origin::Connected,
        };
        log::debug!("assigning new connection to loop {index}");
        target_loop.add_connection(socket, origin, callbacks, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_cycles_through_every_loop() {
        let pool = EventLoopPool::new(3).unwrap();
        let picked: Vec<usize> = (0..7).map(|_| pool.next().0).collect();
        assert_eq!(picked, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn io_service_config_bounds_loop_count() {
        assert!(IoServiceConfig::new(0).is_err());
        assert!(IoServiceConfig::new(65).is_err());
        assert!(IoService::new(IoServiceConfig::new(2).unwrap()).is_ok());
    }
}
