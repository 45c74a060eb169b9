//! Pooled `OVERLAPPED` allocator for in-flight IOCP sends/recvs.
//!
//! Every posted WSASend/WSARecv needs a stable-address buffer and an
//! `OVERLAPPED` structure that must stay alive until the completion port
//! reports it, which can be long after `post_send`/`post_recv` return.
//! Grounded on `original_source`'s `IocpBufferAllocator`/`IocpOverlappedData`
//! (`win_iocp.h`) and the teacher's `sys/windows/buffer_pool.rs`
//! (pooled `Vec<u8>` reuse) and `sys/windows/from_raw_arc.rs` (a
//! reference-counted allocation whose address survives being handed to the
//! kernel as a raw pointer) — reimplemented with `Box` instead of a
//! hand-rolled Arc, since nothing here needs to be cloned while in flight.

use std::sync::Mutex;

use windows_sys::Win32::Networking::WinSock::SOCKET;
use windows_sys::Win32::System::IO::OVERLAPPED;

use crate::token::Token;

pub const OVERLAPPED_BUFFER_CAPACITY: usize = 64 * 1024;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OpKind {
    Send,
    Recv,
}

/// Must stay `#[repr(C)]` with `overlapped` first: the selector recovers
/// this whole struct from the raw `*mut OVERLAPPED` the kernel hands back.
#[repr(C)]
pub struct OverlappedOp {
    pub overlapped: OVERLAPPED,
    pub kind: OpKind,
    pub token: Token,
    pub socket: SOCKET,
    pub buf: Vec<u8>,
}

impl OverlappedOp {
    fn new(kind: OpKind, token: Token, socket: SOCKET, buf: Vec<u8>) -> Box<OverlappedOp> {
        Box::new(OverlappedOp {
            overlapped: unsafe { std::mem::zeroed() },
            kind,
            token,
            socket,
            buf,
        })
    }

    /// Leaks this box to the kernel, returning the stable pointer to pass as
    /// `LPOVERLAPPED`. Reclaimed later by [`OverlappedOp::from_raw`].
    pub fn into_raw(self: Box<Self>) -> *mut OverlappedOp {
        Box::into_raw(self)
    }

    /// # Safety
    /// `ptr` must have come from [`OverlappedOp::into_raw`] and not been
    /// reclaimed already.
    pub unsafe fn from_raw(ptr: *mut OverlappedOp) -> Box<OverlappedOp> {
        Box::from_raw(ptr)
    }
}

/// Recycles the fixed-capacity `Vec<u8>` buffers backing overlapped
/// operations, avoiding an allocation on every posted send/recv.
pub struct OverlappedPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl OverlappedPool {
    pub fn new() -> OverlappedPool {
        OverlappedPool {
            free: Mutex::new(Vec::new()),
        }
    }

    fn take_buffer(&self) -> Vec<u8> {
        let mut free = self.free.lock().unwrap();
        free.pop()
            .unwrap_or_else(|| vec![0u8; OVERLAPPED_BUFFER_CAPACITY])
    }

    fn return_buffer(&self, mut buf: Vec<u8>) {
        buf.clear();
        buf.resize(OVERLAPPED_BUFFER_CAPACITY, 0);
        let mut free = self.free.lock().unwrap();
        free.push(buf);
    }

    pub fn alloc_recv(&self, token: Token, socket: SOCKET) -> Box<OverlappedOp> {
        OverlappedOp::new(OpKind::Recv, token, socket, self.take_buffer())
    }

    pub fn alloc_send(&self, token: Token, socket: SOCKET, data: &[u8]) -> Box<OverlappedOp> {
        let mut buf = self.take_buffer();
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        buf.truncate(n);
        OverlappedOp::new(OpKind::Send, token, socket, buf)
    }

    /// Reclaims the op's buffer back into the pool once its completion has
    /// been processed.
    pub fn free(&self, op: Box<OverlappedOp>) {
        self.return_buffer(op.buf);
    }
}

impl Default for OverlappedPool {
    fn default() -> OverlappedPool {
        OverlappedPool::new()
    }
}
