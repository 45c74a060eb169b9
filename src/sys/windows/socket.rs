//! Non-blocking Winsock wrapper shared by the acceptor, connector and
//! connection modules on Windows.
//!
//! Conceptually grounded on the teacher's `sys/windows/socket.rs` (which
//! wraps `miow`, a dependency this crate does not carry); reimplemented
//! directly against `windows-sys` so the dependency stack matches
//! `Cargo.toml`.

use std::io;
use std::mem::{self, MaybeUninit};
use std::sync::Once;

use windows_sys::Win32::Networking::WinSock::{
    self, ADDRESS_FAMILY, AF_INET, INVALID_SOCKET, IN_ADDR, IN_ADDR_0, IPPROTO_TCP, SOCKADDR,
    SOCKADDR_IN, SOCKET, SOCKET_ERROR, SOCK_STREAM, SO_ERROR, SO_KEEPALIVE, SO_REUSEADDR,
    SOL_SOCKET, TCP_NODELAY, WSADATA,
};

use crate::addr::InetAddr;

static WINSOCK_INIT: Once = Once::new();

fn ensure_winsock_initialized() {
    WINSOCK_INIT.call_once(|| unsafe {
        let mut data = MaybeUninit::<WSADATA>::zeroed();
        // Winsock 2.2, matching every API used below.
        WinSock::WSAStartup(0x0202, data.as_mut_ptr());
    });
}

fn last_error() -> io::Error {
    io::Error::from_raw_os_error(unsafe { WinSock::WSAGetLastError() })
}

fn to_sockaddr(addr: InetAddr) -> SOCKADDR_IN {
    SOCKADDR_IN {
        sin_family: AF_INET as ADDRESS_FAMILY,
        sin_port: addr.port().to_be(),
        sin_addr: IN_ADDR {
            S_un: IN_ADDR_0 {
                S_addr: addr.ip().to_be(),
            },
        },
        sin_zero: [0; 8],
    }
}

unsafe fn from_sockaddr(raw: &SOCKADDR_IN) -> InetAddr {
    let ip = u32::from_be(raw.sin_addr.S_un.S_addr);
    InetAddr::new(ip, u16::from_be(raw.sin_port))
}

/// A non-blocking IPv4 TCP socket handle.
#[derive(Debug)]
pub struct Socket {
    raw: SOCKET,
}

impl Socket {
    pub fn new_stream() -> io::Result<Socket> {
        ensure_winsock_initialized();
        let raw = unsafe { WinSock::socket(AF_INET as i32, SOCK_STREAM as i32, IPPROTO_TCP as i32) };
        if raw == INVALID_SOCKET {
            return Err(last_error());
        }
        let socket = Socket { raw };
        socket.set_non_blocking()?;
        Ok(socket)
    }

    fn set_non_blocking(&self) -> io::Result<()> {
        let mut mode: u32 = 1;
        let rc = unsafe { WinSock::ioctlsocket(self.raw, WinSock::FIONBIO, &mut mode) };
        if rc == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    pub fn as_raw(&self) -> SOCKET {
        self.raw
    }

    pub fn bind(&self, addr: InetAddr) -> io::Result<()> {
        let sockaddr = to_sockaddr(addr);
        let rc = unsafe {
            WinSock::bind(
                self.raw,
                &sockaddr as *const _ as *const SOCKADDR,
                mem::size_of::<SOCKADDR_IN>() as i32,
            )
        };
        if rc == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    pub fn set_reuse_address(&self) -> io::Result<()> {
        let val: i32 = 1;
        let rc = unsafe {
            WinSock::setsockopt(
                self.raw,
                SOL_SOCKET as i32,
                SO_REUSEADDR as i32,
                &val as *const _ as *const u8,
                mem::size_of::<i32>() as i32,
            )
        };
        if rc == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    pub fn listen(&self, backlog: i32) -> io::Result<()> {
        let rc = unsafe { WinSock::listen(self.raw, backlog) };
        if rc == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    /// Starts a non-blocking connect; `WSAEWOULDBLOCK` means the connect is
    /// in progress and completion must be observed via `take_error` once
    /// the socket becomes writable.
    pub fn connect(&self, addr: InetAddr) -> io::Result<()> {
        let sockaddr = to_sockaddr(addr);
        let rc = unsafe {
            WinSock::connect(
                self.raw,
                &sockaddr as *const _ as *const SOCKADDR,
                mem::size_of::<SOCKADDR_IN>() as i32,
            )
        };
        if rc == SOCKET_ERROR {
            let err = last_error();
            if err.raw_os_error() == Some(WinSock::WSAEWOULDBLOCK) {
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        let mut err: i32 = 0;
        let mut len = mem::size_of::<i32>() as i32;
        let rc = unsafe {
            WinSock::getsockopt(
                self.raw,
                SOL_SOCKET as i32,
                SO_ERROR as i32,
                &mut err as *mut _ as *mut u8,
                &mut len,
            )
        };
        if rc == SOCKET_ERROR {
            return Err(last_error());
        }
        if err == 0 {
            Ok(None)
        } else {
            Ok(Some(io::Error::from_raw_os_error(err)))
        }
    }

    pub fn accept(&self) -> io::Result<(Socket, InetAddr)> {
        let mut storage = MaybeUninit::<SOCKADDR_IN>::zeroed();
        let mut len = mem::size_of::<SOCKADDR_IN>() as i32;
        let raw =
            unsafe { WinSock::accept(self.raw, storage.as_mut_ptr() as *mut SOCKADDR, &mut len) };
        if raw == INVALID_SOCKET {
            return Err(last_error());
        }
        let addr = unsafe { from_sockaddr(&storage.assume_init()) };
        let socket = Socket { raw };
        socket.set_non_blocking()?;
        Ok((socket, addr))
    }

    pub fn local_addr(&self) -> io::Result<InetAddr> {
        let mut storage = MaybeUninit::<SOCKADDR_IN>::zeroed();
        let mut len = mem::size_of::<SOCKADDR_IN>() as i32;
        let rc = unsafe {
            WinSock::getsockname(self.raw, storage.as_mut_ptr() as *mut SOCKADDR, &mut len)
        };
        if rc == SOCKET_ERROR {
            return Err(last_error());
        }
        Ok(unsafe { from_sockaddr(&storage.assume_init()) })
    }

    pub fn peer_addr(&self) -> io::Result<InetAddr> {
        let mut storage = MaybeUninit::<SOCKADDR_IN>::zeroed();
        let mut len = mem::size_of::<SOCKADDR_IN>() as i32;
        let rc = unsafe {
            WinSock::getpeername(self.raw, storage.as_mut_ptr() as *mut SOCKADDR, &mut len)
        };
        if rc == SOCKET_ERROR {
            return Err(last_error());
        }
        Ok(unsafe { from_sockaddr(&storage.assume_init()) })
    }

    pub fn set_no_delay(&self, enabled: bool) -> io::Result<()> {
        let val: i32 = enabled as i32;
        let rc = unsafe {
            WinSock::setsockopt(
                self.raw,
                IPPROTO_TCP as i32,
                TCP_NODELAY as i32,
                &val as *const _ as *const u8,
                mem::size_of::<i32>() as i32,
            )
        };
        if rc == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    pub fn set_keep_alive(&self, enabled: bool) -> io::Result<()> {
        let val: i32 = enabled as i32;
        let rc = unsafe {
            WinSock::setsockopt(
                self.raw,
                SOL_SOCKET as i32,
                SO_KEEPALIVE as i32,
                &val as *const _ as *const u8,
                mem::size_of::<i32>() as i32,
            )
        };
        if rc == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }

    /// `how` is one of `WinSock::SD_SEND`/`SD_RECEIVE`/`SD_BOTH`.
    pub fn shutdown(&self, how: i32) -> io::Result<()> {
        let rc = unsafe { WinSock::shutdown(self.raw, how) };
        if rc == SOCKET_ERROR {
            Err(last_error())
        } else {
            Ok(())
        }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            WinSock::closesocket(self.raw);
        }
    }
}
