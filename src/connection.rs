//! The connection state machine: per-connection send/recv task queues,
//! buffered framing, idempotent error teardown and the timeout sweep.
//!
//! Grounded on `original_source`'s `TcpConnection`/`BaseTcpConnection`
//! (`TCPServer.h`/`BaseSocket.h`): `SendTask`/`RecvTask`, `send`/`recv`,
//! `errorOccurred`, `checkTimeout`, and the three-owner lifetime comment
//! documented on that class (the loop's connection map, the platform's own
//! in-flight I/O bookkeeping, and whatever `Arc` the user callback holds).

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::addr::InetAddr;
use crate::buffer::IoBuffer;
use crate::callbacks::{Context, TcpCallbacks};
use crate::config::ConnectionConfig;
use crate::event_loop::EventLoop;
use crate::loop_pool::TcpEventLoop;
use crate::splitter::{any_splitter, PacketSplitter};
use crate::sys;
use crate::token::Token;

static NEXT_CONN_SERIAL: AtomicU64 = AtomicU64::new(1);

pub const TIMEOUT_INFINITE: Option<Duration> = None;

/// `len` is how many of the task's bytes were appended to `send_buffer`;
/// the task is only complete once that many bytes have actually left the
/// buffer over the wire (tracked via `send_acked`), not merely enqueued.
struct SendTask {
    len: usize,
    context: Option<Context>,
    timeout: Option<Duration>,
    start_ticks: Option<Instant>,
}

struct RecvTask {
    splitter: PacketSplitter,
    context: Option<Context>,
    timeout: Option<Duration>,
    start_ticks: Option<Instant>,
}

/// Where a connection came from, kept so callbacks and inspection can tell
/// an inbound connection (via [`TcpAcceptor`](crate::acceptor::TcpAcceptor))
/// from an outbound one (via [`TcpConnector`](crate::connector::TcpConnector)).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Origin {
    Accepted { server_index: usize, server_port: u16 },
    Connected,
}

pub struct TcpConnection {
    socket: sys::Socket,
    token: Token,
    origin: Origin,
    name: Mutex<Option<String>>,
    local_addr: Mutex<Option<InetAddr>>,
    peer_addr: Mutex<Option<InetAddr>>,
    event_loop: Weak<TcpEventLoop>,
    callbacks: Arc<dyn TcpCallbacks>,
    config: ConnectionConfig,

    send_buffer: Mutex<IoBuffer>,
    recv_buffer: Mutex<IoBuffer>,
    send_queue: Mutex<VecDeque<SendTask>>,
    recv_queue: Mutex<VecDeque<RecvTask>>,
    /// Bytes acked by the OS toward completing `send_queue`'s front task;
    /// the spec's "bytes_sent accumulator" (spec.md §4.3).
    send_acked: Mutex<usize>,

    is_error_occurred: AtomicBool,
    pending_disconnect: AtomicBool,

    #[cfg(unix)]
    interest: Mutex<crate::interest::Interest>,
    #[cfg(windows)]
    is_sending: AtomicBool,
    #[cfg(windows)]
    is_recving: AtomicBool,
}

impl TcpConnection {
    pub(crate) fn new(
        socket: sys::Socket,
        origin: Origin,
        event_loop: Weak<TcpEventLoop>,
        callbacks: Arc<dyn TcpCallbacks>,
        config: ConnectionConfig,
    ) -> Arc<TcpConnection> {
        #[cfg(unix)]
        let token = {
            use std::os::fd::AsRawFd;
            Token(socket.as_raw_fd() as usize)
        };
        #[cfg(windows)]
        let token = Token(socket.as_raw() as usize);

        Arc::new(TcpConnection {
            socket,
            token,
            origin,
            name: Mutex::new(None),
            local_addr: Mutex::new(None),
            peer_addr: Mutex::new(None),
            event_loop,
            callbacks,
            config,
            send_buffer: Mutex::new(IoBuffer::new()),
            recv_buffer: Mutex::new(IoBuffer::new()),
            send_queue: Mutex::new(VecDeque::new()),
            recv_queue: Mutex::new(VecDeque::new()),
            send_acked: Mutex::new(0),
            is_error_occurred: AtomicBool::new(false),
            pending_disconnect: AtomicBool::new(false),
            #[cfg(unix)]
            interest: Mutex::new(crate::interest::Interest::READABLE),
            #[cfg(windows)]
            is_sending: AtomicBool::new(false),
            #[cfg(windows)]
            is_recving: AtomicBool::new(false),
        })
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn is_from_client(&self) -> bool {
        matches!(self.origin, Origin::Accepted { .. })
    }

    pub fn is_from_server(&self) -> bool {
        matches!(self.origin, Origin::Connected)
    }

    pub fn server_index(&self) -> Option<usize> {
        match self.origin {
            Origin::Accepted { server_index, .. } => Some(server_index),
            Origin::Connected => None,
        }
    }

    pub fn server_port(&self) -> Option<u16> {
        match self.origin {
            Origin::Accepted { server_port, .. } => Some(server_port),
            Origin::Connected => None,
        }
    }

    /// A human-readable, lazily computed, stable-for-life identifier —
    /// `"conn-<serial>-<peer>"` — useful for logging and as a map key.
    pub fn connection_name(&self) -> String {
        let mut name = self.name.lock().unwrap();
        if let Some(existing) = name.as_ref() {
            return existing.clone();
        }
        let serial = NEXT_CONN_SERIAL.fetch_add(1, Ordering::Relaxed);
        let peer = self.peer_addr().map(|a| a.to_string()).unwrap_or_default();
        let generated = format!("conn-{serial}-{peer}");
        *name = Some(generated.clone());
        generated
    }

    pub fn local_addr(&self) -> io::Result<InetAddr> {
        let mut cached = self.local_addr.lock().unwrap();
        if let Some(addr) = *cached {
            return Ok(addr);
        }
        let addr = self.socket.local_addr()?;
        *cached = Some(addr);
        Ok(addr)
    }

    pub fn peer_addr(&self) -> io::Result<InetAddr> {
        let mut cached = self.peer_addr.lock().unwrap();
        if let Some(addr) = *cached {
            return Ok(addr);
        }
        let addr = self.socket.peer_addr()?;
        *cached = Some(addr);
        Ok(addr)
    }

    pub fn set_no_delay(&self, enabled: bool) -> io::Result<()> {
        self.socket.set_no_delay(enabled)
    }

    pub fn set_keep_alive(&self, enabled: bool) -> io::Result<()> {
        self.socket.set_keep_alive(enabled)
    }

    pub fn is_connected(&self) -> bool {
        !self.is_error_occurred.load(Ordering::Acquire)
    }

    /// Fired once by `TcpEventLoop::add_connection` right after this
    /// connection is registered with its loop's demultiplexer.
    pub(crate) fn fire_connected(self: &Arc<Self>) {
        self.callbacks.on_connected(self);
    }

    pub(crate) fn owning_loop(&self) -> Option<Arc<TcpEventLoop>> {
        self.event_loop.upgrade()
    }

    /// Queues `data` to be sent, in order relative to any other queued
    /// send. `timeout` is measured from whenever this task reaches the
    /// front of the queue, not from submission (see `check_timeout`).
    ///
    /// All queue/buffer mutation happens on the owning loop thread (spec.md
    /// §4.3); a call from any other thread copies `data` into a delegated
    /// closure and hands it to that loop instead of touching state here.
    pub fn send(self: &Arc<Self>, data: &[u8], context: Option<Context>, timeout: Option<Duration>) {
        let Some(owner) = self.owning_loop() else {
            return;
        };
        let event_loop = owner.event_loop().clone();
        if event_loop.is_in_loop_thread() {
            self.send_in_loop(data, context, timeout);
        } else {
            let conn = self.clone();
            let bytes = data.to_vec();
            event_loop.delegate_to_loop(move || conn.send_in_loop(&bytes, context, timeout));
        }
    }

    fn send_in_loop(self: &Arc<Self>, data: &[u8], context: Option<Context>, timeout: Option<Duration>) {
        if self.is_error_occurred.load(Ordering::Acquire) || data.is_empty() {
            return;
        }
        self.send_buffer.lock().unwrap().append(data);
        self.send_queue.lock().unwrap().push_back(SendTask {
            len: data.len(),
            context,
            timeout,
            start_ticks: None,
        });
        self.pump_send();
    }

    /// Credits `transferred` bytes to the accumulator and fires
    /// `on_send_complete` for every queued task it now fully covers, in
    /// FIFO order, per spec.md §4.3 step 3.
    fn complete_acked_send_tasks(self: &Arc<Self>, transferred: usize) {
        let mut acked = self.send_acked.lock().unwrap();
        *acked += transferred;
        loop {
            let done = {
                let mut queue = self.send_queue.lock().unwrap();
                match queue.front() {
                    Some(task) if *acked >= task.len => {
                        *acked -= task.len;
                        queue.pop_front()
                    }
                    _ => None,
                }
            };
            match done {
                Some(task) => self.callbacks.on_send_complete(self, task.context),
                None => break,
            }
        }
    }

    /// Queues a request for the next packet `splitter` can frame out of
    /// the stream. Delegated to the owning loop thread when called from
    /// elsewhere, same as [`send`](Self::send).
    pub fn recv(self: &Arc<Self>, splitter: PacketSplitter, context: Option<Context>, timeout: Option<Duration>) {
        let Some(owner) = self.owning_loop() else {
            return;
        };
        let event_loop = owner.event_loop().clone();
        if event_loop.is_in_loop_thread() {
            self.recv_in_loop(splitter, context, timeout);
        } else {
            let conn = self.clone();
            event_loop.delegate_to_loop(move || conn.recv_in_loop(splitter, context, timeout));
        }
    }

    fn recv_in_loop(self: &Arc<Self>, splitter: PacketSplitter, context: Option<Context>, timeout: Option<Duration>) {
        if self.is_error_occurred.load(Ordering::Acquire) {
            return;
        }
        self.recv_queue.lock().unwrap().push_back(RecvTask {
            splitter,
            context,
            timeout,
            start_ticks: None,
        });
        self.pump_recv();
    }

    /// Convenience over [`recv`](Self::recv) that delivers whatever is
    /// currently buffered, as soon as there is anything.
    pub fn recv_any(self: &Arc<Self>, context: Option<Context>, timeout: Option<Duration>) {
        self.recv(any_splitter, context, timeout)
    }

    /// Half-closes the send direction and marks the connection for
    /// teardown once any queued sends finish draining — `on_send_complete`
    /// for a task queued before `disconnect()` still fires before the
    /// eventual `on_disconnected` (spec.md §8's graceful half-close). The
    /// drain check (and the `on_disconnected` it may trigger) always runs
    /// on the owning loop thread, same as `send`/`recv`.
    pub fn disconnect(self: &Arc<Self>) {
        if self.is_error_occurred.load(Ordering::Acquire) {
            return;
        }
        if self.pending_disconnect.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown(true, false);

        let Some(owner) = self.owning_loop() else {
            self.error_occurred("graceful disconnect drained");
            return;
        };
        let event_loop = owner.event_loop().clone();
        if event_loop.is_in_loop_thread() {
            self.finish_disconnect_if_drained();
        } else {
            let conn = self.clone();
            event_loop.delegate_to_loop(move || conn.finish_disconnect_if_drained());
        }
    }

    /// Completes a pending graceful disconnect once the send side has
    /// nothing left queued or buffered. Called after every send-side pump
    /// so the drain is observed as soon as it happens.
    fn finish_disconnect_if_drained(self: &Arc<Self>) {
        if !self.pending_disconnect.load(Ordering::Acquire) {
            return;
        }
        let drained = self.send_queue.lock().unwrap().is_empty() && self.send_buffer.lock().unwrap().readable_bytes() == 0;
        if drained {
            self.error_occurred("graceful disconnect drained");
        }
    }

    pub fn shutdown(&self, close_send: bool, close_recv: bool) -> io::Result<()> {
        #[cfg(unix)]
        {
            let how = match (close_send, close_recv) {
                (true, true) => libc::SHUT_RDWR,
                (true, false) => libc::SHUT_WR,
                (false, true) => libc::SHUT_RD,
                (false, false) => return Ok(()),
            };
            self.socket.shutdown(how)
        }
        #[cfg(windows)]
        {
            use windows_sys::Win32::Networking::WinSock::{SD_BOTH, SD_RECEIVE, SD_SEND};
            let how = match (close_send, close_recv) {
                (true, true) => SD_BOTH,
                (true, false) => SD_SEND,
                (false, true) => SD_RECEIVE,
                (false, false) => return Ok(()),
            };
            self.socket.shutdown(how)
        }
    }

    /// Idempotent teardown: the first caller runs `on_disconnected` and
    /// schedules removal from the owning loop's connection map via a
    /// finalizer (so it survives until the current dispatch unwinds); every
    /// later caller is a no-op.
    pub(crate) fn error_occurred(self: &Arc<Self>, reason: &str) {
        if self
            .is_error_occurred
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        log::warn!("connection {} torn down: {}", self.connection_name(), reason);
        self.callbacks.on_disconnected(self);

        if let Some(owner) = self.event_loop.upgrade() {
            #[cfg(unix)]
            {
                use std::os::fd::AsRawFd;
                let _ = owner.selector().deregister(self.socket.as_raw_fd());
            }
            let token = self.token;
            let conn = self.clone();
            owner.event_loop().add_finalizer(move || {
                owner.remove_connection(token);
                drop(conn);
            });
        }
    }

    /// Sweeps the front of each task queue for expiry against `now`,
    /// tearing the connection down on the first timed-out task. Called
    /// once every sweep interval by the owning loop (`crate::loop_pool`).
    pub(crate) fn check_timeout(self: &Arc<Self>, now: Instant) {
        if self.is_error_occurred.load(Ordering::Acquire) {
            return;
        }
        let send_expired = {
            let queue = self.send_queue.lock().unwrap();
            queue.front().is_some_and(|t| Self::task_expired(t.start_ticks, t.timeout, now))
        };
        let recv_expired = {
            let queue = self.recv_queue.lock().unwrap();
            queue.front().is_some_and(|t| Self::task_expired(t.start_ticks, t.timeout, now))
        };
        if send_expired || recv_expired {
            self.error_occurred("task timed out");
        }
    }

    fn task_expired(start_ticks: Option<Instant>, timeout: Option<Duration>, now: Instant) -> bool {
        match (start_ticks, timeout) {
            (Some(start), Some(timeout)) => now.saturating_duration_since(start) > timeout,
            _ => false,
        }
    }

    /// Stamps `start_ticks` on the front of each queue that doesn't have
    /// one yet — the clock starts the first time a task becomes the one
    /// actually being waited on, not at submission.
    fn stamp_front_tasks(&self) {
        let now = Instant::now();
        if let Some(front) = self.send_queue.lock().unwrap().front_mut() {
            if front.start_ticks.is_none() {
                front.start_ticks = Some(now);
            }
        }
        if let Some(front) = self.recv_queue.lock().unwrap().front_mut() {
            if front.start_ticks.is_none() {
                front.start_ticks = Some(now);
            }
        }
    }
}

// ---- Unix readiness-based pump ----------------------------------------

#[cfg(unix)]
impl TcpConnection {
    pub(crate) fn on_readable(self: &Arc<Self>) {
        if self.is_error_occurred.load(Ordering::Acquire) {
            return;
        }
        loop {
            if self.should_pause_recv() {
                break;
            }
            let mut recv_buffer = self.recv_buffer.lock().unwrap();
            let tail = recv_buffer.writable_tail(4096);
            match self.socket.read(tail) {
                Ok(0) => {
                    drop(recv_buffer);
                    self.error_occurred("peer closed connection");
                    return;
                }
                Ok(n) => {
                    recv_buffer.commit_written(n);
                    drop(recv_buffer);
                    self.drain_packets();
                    if n < 4096 {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    drop(recv_buffer);
                    self.error_occurred(&format!("recv failed: {e}"));
                    return;
                }
            }
        }
        self.rearm_interest();
    }

    pub(crate) fn on_writable(self: &Arc<Self>) {
        if self.is_error_occurred.load(Ordering::Acquire) {
            return;
        }
        self.pump_send();
    }

    fn pump_send(self: &Arc<Self>) {
        self.stamp_front_tasks();
        loop {
            let mut send_buffer = self.send_buffer.lock().unwrap();
            if send_buffer.readable_bytes() == 0 {
                break;
            }

            match self.socket.write(send_buffer.peek()) {
                Ok(0) => break,
                Ok(n) => {
                    send_buffer.retrieve(n);
                    drop(send_buffer);
                    self.complete_acked_send_tasks(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    drop(send_buffer);
                    self.error_occurred(&format!("send failed: {e}"));
                    return;
                }
            }
        }
        self.rearm_interest();
        self.finish_disconnect_if_drained();
    }

    fn pump_recv(self: &Arc<Self>) {
        self.stamp_front_tasks();
        self.drain_packets();
        self.rearm_interest();
    }

    /// Tries to frame as many packets as the front of the recv queue will
    /// accept, in order, stopping as soon as either side runs dry.
    fn drain_packets(self: &Arc<Self>) {
        loop {
            let splitter = {
                let queue = self.recv_queue.lock().unwrap();
                match queue.front() {
                    Some(task) => task.splitter,
                    None => return,
                }
            };

            let packet_len = {
                let recv_buffer = self.recv_buffer.lock().unwrap();
                splitter(recv_buffer.peek())
            };
            if packet_len == 0 {
                return;
            }

            let (packet, context) = {
                let mut recv_buffer = self.recv_buffer.lock().unwrap();
                let packet = recv_buffer.peek()[..packet_len].to_vec();
                recv_buffer.retrieve(packet_len);
                let task = self.recv_queue.lock().unwrap().pop_front().unwrap();
                (packet, task.context)
            };
            self.callbacks.on_recv_complete(self, &packet, context);
        }
    }

    /// Back-pressure gate (spec.md §4.3, recv lifecycle step 1): once the
    /// recv queue is empty and the buffered-but-undelivered bytes reach the
    /// configured cap, further receiving pauses rather than growing the
    /// buffer without bound. Resumes as soon as a task is posted or the
    /// buffer drains below the cap.
    fn should_pause_recv(&self) -> bool {
        self.recv_queue.lock().unwrap().is_empty()
            && self.recv_buffer.lock().unwrap().readable_bytes() >= self.config.recv_backlog_cap
    }

    fn rearm_interest(&self) {
        use crate::interest::Interest;
        use std::os::fd::AsRawFd;

        let wants_write = !self.send_queue.lock().unwrap().is_empty()
            || self.send_buffer.lock().unwrap().readable_bytes() > 0;
        let wants_read = !self.should_pause_recv();

        let mut desired = Interest::NONE;
        if wants_read {
            desired |= Interest::READABLE;
        }
        if wants_write {
            desired |= Interest::WRITABLE;
        }

        let mut interest = self.interest.lock().unwrap();
        if *interest != desired {
            if let Some(owner) = self.event_loop.upgrade() {
                let _ = owner
                    .selector()
                    .reregister(self.socket.as_raw_fd(), self.token, desired);
            }
            *interest = desired;
        }
    }

    pub(crate) fn initial_register(self: &Arc<Self>, event_loop: &EventLoop) -> io::Result<()> {
        use std::os::fd::AsRawFd;
        event_loop
            .selector()
            .register(self.socket.as_raw_fd(), self.token, *self.interest.lock().unwrap())
    }
}

// ---- Windows completion-based pump ------------------------------------

#[cfg(windows)]
impl TcpConnection {
    pub(crate) fn initial_register(self: &Arc<Self>, event_loop: &EventLoop) -> io::Result<()> {
        event_loop.selector().register(self.socket.as_raw(), self.token)?;
        self.post_next_recv(event_loop);
        Ok(())
    }

    fn post_next_recv(self: &Arc<Self>, event_loop: &EventLoop) {
        if self
            .is_recving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if let Err(e) = event_loop.selector().post_recv(self.socket.as_raw(), self.token) {
            self.is_recving.store(false, Ordering::Release);
            self.error_occurred(&format!("posting recv failed: {e}"));
        }
    }

    pub(crate) fn on_recv_complete(self: &Arc<Self>, event_loop: &EventLoop, data: Vec<u8>) {
        self.is_recving.store(false, Ordering::Release);
        if self.is_error_occurred.load(Ordering::Acquire) {
            return;
        }
        if data.is_empty() {
            self.error_occurred("peer closed connection");
            return;
        }
        self.recv_buffer.lock().unwrap().append(&data);
        self.stamp_front_tasks();
        self.drain_packets();
        if !self.should_pause_recv() {
            self.post_next_recv(event_loop);
        }
    }

    /// Mirrors the unix pump's back-pressure gate (spec.md §4.3 recv
    /// lifecycle step 1): once the queue is empty and the buffer has
    /// reached its cap, no further recv is posted until a task arrives.
    fn should_pause_recv(&self) -> bool {
        self.recv_queue.lock().unwrap().is_empty()
            && self.recv_buffer.lock().unwrap().readable_bytes() >= self.config.recv_backlog_cap
    }

    fn pump_send(self: &Arc<Self>) {
        self.stamp_front_tasks();
        if self
            .is_sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let data = {
            let send_buffer = self.send_buffer.lock().unwrap();
            send_buffer.peek().to_vec()
        };
        if data.is_empty() {
            self.is_sending.store(false, Ordering::Release);
            self.finish_disconnect_if_drained();
            return;
        }

        if let Some(owner) = self.event_loop.upgrade() {
            if let Err(e) = owner.selector().post_send(self.socket.as_raw(), self.token, &data) {
                self.is_sending.store(false, Ordering::Release);
                self.error_occurred(&format!("posting send failed: {e}"));
            }
        }
    }

    /// `len` is how many bytes the posted `WSASend` actually transferred
    /// (may be short — the caller re-posts the remainder via `pump_send`).
    pub(crate) fn on_send_complete(self: &Arc<Self>, len: usize) {
        self.is_sending.store(false, Ordering::Release);
        if self.is_error_occurred.load(Ordering::Acquire) {
            return;
        }
        self.send_buffer.lock().unwrap().retrieve(len);
        self.complete_acked_send_tasks(len);
        self.pump_send();
    }

    /// Posting a recv task may need to resume a receive paused by the
    /// back-pressure gate — re-checks `should_pause_recv` and reposts if a
    /// recv isn't already in flight.
    fn pump_recv(self: &Arc<Self>) {
        self.stamp_front_tasks();
        self.drain_packets();
        if !self.should_pause_recv() {
            if let Some(owner) = self.event_loop.upgrade() {
                self.post_next_recv(owner.event_loop());
            }
        }
    }

    fn drain_packets(self: &Arc<Self>) {
        loop {
            let splitter = {
                let queue = self.recv_queue.lock().unwrap();
                match queue.front() {
                    Some(task) => task.splitter,
                    None => return,
                }
            };
            let packet_len = {
                let recv_buffer = self.recv_buffer.lock().unwrap();
                splitter(recv_buffer.peek())
            };
            if packet_len == 0 {
                return;
            }
            let (packet, context) = {
                let mut recv_buffer = self.recv_buffer.lock().unwrap();
                let packet = recv_buffer.peek()[..packet_len].to_vec();
                recv_buffer.retrieve(packet_len);
                let task = self.recv_queue.lock().unwrap().pop_front().unwrap();
                (packet, task.context)
            };
            self.callbacks.on_recv_complete(self, &packet, context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_expired_requires_both_start_and_timeout() {
        let now = Instant::now();
        assert!(!TcpConnection::task_expired(None, Some(Duration::from_millis(1)), now));
        assert!(!TcpConnection::task_expired(Some(now), None, now));
        let past = now - Duration::from_secs(1);
        assert!(TcpConnection::task_expired(Some(past), Some(Duration::from_millis(1)), now));
        assert!(!TcpConnection::task_expired(Some(now), Some(Duration::from_secs(10)), now));
    }
}
