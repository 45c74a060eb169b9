//! Asynchronous outbound TCP connect: a single worker thread owns a list of
//! in-flight connect attempts, polls them for completion in batches, and
//! hands each successful socket to an [`IoService`] exactly like an
//! accepted one.
//!
//! Grounded on `original_source`'s `TcpConnector`
//! (`TCPServer.h`/`TCPServer.cpp`): `tryConnect` issues a non-blocking
//! `connect`, the worker thread's `checkAsyncConnectState` batches pending
//! descriptors through `select` in groups no larger than `FD_SETSIZE` and
//! inspects `SO_ERROR` on whichever become writable; this core does the
//! same batching with `poll`/`WSAPoll` instead, since neither backend needs
//! `FD_SETSIZE`'s descriptor-count ceiling.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::addr::InetAddr;
use crate::callbacks::{Context, TcpCallbacks};
use crate::config::{ConnectionConfig, ConnectorConfig};
use crate::connection::TcpConnection;
use crate::io_service::IoService;
use crate::sys;

const POLL_TIMEOUT_MS: i32 = 50;
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Invoked once per [`TcpConnector::connect`] call, whether it succeeded or
/// not. On success `conn` is `Some` and already admitted to an event loop
/// (its `on_connected` callback has already fired); on failure or timeout
/// it is `None`.
pub type ConnectComplete = Box<dyn FnOnce(bool, Option<Arc<TcpConnection>>, InetAddr, Option<Context>) + Send>;

struct ConnectTask {
    socket: sys::Socket,
    peer: InetAddr,
    context: Option<Context>,
    callbacks: Arc<dyn TcpCallbacks>,
    conn_config: ConnectionConfig,
    on_complete: ConnectComplete,
    started: Instant,
}

pub struct TcpConnector {
    io_service: Arc<IoService>,
    config: ConnectorConfig,
    tasks: Arc<Mutex<VecDeque<ConnectTask>>>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TcpConnector {
    pub fn new(io_service: Arc<IoService>, config: ConnectorConfig) -> Arc<TcpConnector> {
        let tasks: Arc<Mutex<VecDeque<ConnectTask>>> = Arc::new(Mutex::new(VecDeque::new()));
        let running = Arc::new(AtomicBool::new(true));

        let worker_tasks = tasks.clone();
        let worker_running = running.clone();
        let worker_service = io_service.clone();
        let handle = thread::Builder::new()
            .name("tcp-connector".into())
            .spawn(move || worker_loop(worker_service, worker_tasks, worker_running, config))
            .expect("failed to spawn tcp connector thread");

        Arc::new(TcpConnector {
            io_service,
            config,
            tasks,
            running,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Issues a non-blocking connect to `peer`. `on_complete` runs on the
    /// connector's worker thread, never on the caller's.
    pub fn connect(
        &self,
        peer: InetAddr,
        callbacks: Arc<dyn TcpCallbacks>,
        conn_config: ConnectionConfig,
        context: Option<Context>,
        on_complete: impl FnOnce(bool, Option<Arc<TcpConnection>>, InetAddr, Option<Context>) + Send + 'static,
    ) -> io::Result<()> {
        let socket = sys::Socket::new_stream()?;
        socket.connect(peer)?;
        self.tasks.lock().unwrap().push_back(ConnectTask {
            socket,
            peer,
            context,
            callbacks,
            conn_config,
            on_complete: Box::new(on_complete),
            started: Instant::now(),
        });
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn io_service(&self) -> &Arc<IoService> {
        &self.io_service
    }

    pub fn config(&self) -> ConnectorConfig {
        self.config
    }

    pub fn close(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    io_service: Arc<IoService>,
    tasks: Arc<Mutex<VecDeque<ConnectTask>>>,
    running: Arc<AtomicBool>,
    config: ConnectorConfig,
) {
    let timeout = Duration::from_millis(config.connect_timeout_ms);
    while running.load(Ordering::Acquire) {
        let batch: Vec<ConnectTask> = {
            let mut guard = tasks.lock().unwrap();
            let take = guard.len().min(config.batch_size);
            guard.drain(..take).collect()
        };
        if batch.is_empty() {
            thread::sleep(IDLE_SLEEP);
            continue;
        }

        let ready = match poll_writable(&batch, POLL_TIMEOUT_MS) {
            Ok(ready) => ready,
            Err(e) => {
                log::error!("tcp connector poll failed: {e}");
                vec![false; batch.len()]
            }
        };

        let now = Instant::now();
        for (task, is_ready) in batch.into_iter().zip(ready) {
            if is_ready {
                complete_task(&io_service, task);
            } else if now.saturating_duration_since(task.started) >= timeout {
                log::warn!("connect to {} timed out", task.peer);
                (task.on_complete)(false, None, task.peer, task.context);
            } else {
                tasks.lock().unwrap().push_back(task);
            }
        }
    }
}

fn complete_task(io_service: &Arc<IoService>, task: ConnectTask) {
    let ConnectTask {
        socket,
        peer,
        context,
        callbacks,
        conn_config,
        on_complete,
        ..
    } = task;

    match socket.take_error() {
        Ok(None) => {
            let conn = io_service.register(socket, None, callbacks, conn_config);
            on_complete(true, Some(conn), peer, context);
        }
        Ok(Some(e)) => {
            log::warn!("connect to {peer} failed: {e}");
            on_complete(false, None, peer, context);
        }
        Err(e) => {
            log::warn!("connect to {peer} failed to query SO_ERROR: {e}");
            on_complete(false, None, peer, context);
        }
    }
}

#[cfg(unix)]
fn poll_writable(batch: &[ConnectTask], timeout_ms: i32) -> io::Result<Vec<bool>> {
    use std::os::fd::AsRawFd;
    let mut pollfds: Vec<libc::pollfd> = batch
        .iter()
        .map(|t| libc::pollfd {
            fd: t.socket.as_raw_fd(),
            events: libc::POLLOUT,
            revents: 0,
        })
        .collect();

    let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
    if rc < 0 {
        let e = io::Error::last_os_error();
        if e.kind() == io::ErrorKind::Interrupted {
            return Ok(vec![false; batch.len()]);
        }
        return Err(e);
    }
    Ok(pollfds
        .iter()
        .map(|p| p.revents & (libc::POLLOUT | libc::POLLERR | libc::POLLHUP) != 0)
        .collect())
}

#[cfg(windows)]
fn poll_writable(batch: &[ConnectTask], timeout_ms: i32) -> io::Result<Vec<bool>> {
    use windows_sys::Win32::Networking::WinSock::{WSAPoll, POLLWRNORM, SOCKET_ERROR, WSAPOLLFD};
    let mut pollfds: Vec<WSAPOLLFD> = batch
        .iter()
        .map(|t| WSAPOLLFD {
            fd: t.socket.as_raw(),
            events: POLLWRNORM,
            revents: 0,
        })
        .collect();

    let rc = unsafe { WSAPoll(pollfds.as_mut_ptr(), pollfds.len() as u32, timeout_ms) };
    if rc == SOCKET_ERROR {
        return Err(io::Error::last_os_error());
    }
    Ok(pollfds.iter().map(|p| p.revents & POLLWRNORM != 0).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::TcpAcceptor;
    use crate::config::IoServiceConfig;
    use std::sync::mpsc;

    struct NoopCallbacks;
    impl TcpCallbacks for NoopCallbacks {}

    #[test]
    fn connects_to_a_listening_acceptor() {
        let service = IoService::new(IoServiceConfig::new(1).unwrap()).unwrap();
        service.start();

        let acceptor = TcpAcceptor::open(
            service.clone(),
            crate::config::ServerConfig::new(0),
            Arc::new(NoopCallbacks),
            ConnectionConfig::default(),
        )
        .unwrap();

        let connector = TcpConnector::new(service.clone(), ConnectorConfig::default());
        let (tx, rx) = mpsc::channel();
        connector
            .connect(
                InetAddr::from_parts(127, 0, 0, 1, acceptor.port()),
                Arc::new(NoopCallbacks),
                ConnectionConfig::default(),
                None,
                move |success, conn, _peer, _ctx| {
                    let _ = tx.send((success, conn.is_some()));
                },
            )
            .unwrap();

        let (success, has_conn) = rx.recv_timeout(Duration::from_secs(2)).expect("connect completed");
        assert!(success);
        assert!(has_conn);

        connector.close();
        acceptor.close();
        service.stop();
    }

    #[test]
    fn connect_to_closed_port_fails() {
        let service = IoService::new(IoServiceConfig::new(1).unwrap()).unwrap();
        service.start();

        let connector = TcpConnector::new(service.clone(), ConnectorConfig::default());
        let (tx, rx) = mpsc::channel();
        connector
            .connect(
                InetAddr::from_parts(127, 0, 0, 1, 1),
                Arc::new(NoopCallbacks),
                ConnectionConfig::default(),
                None,
                move |success, conn, _peer, _ctx| {
                    let _ = tx.send((success, conn.is_some()));
                },
            )
            .unwrap();

        let (success, has_conn) = rx.recv_timeout(Duration::from_secs(2)).expect("connect completed");
        assert!(!success);
        assert!(!has_conn);

        connector.close();
        service.stop();
    }
}
