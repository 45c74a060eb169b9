//! Thin non-blocking socket wrapper shared by the acceptor, connector and
//! connection modules on Unix.
//!
//! Grounded on the teacher's `sys/unix/net.rs`/`sys/unix/tcp.rs` (libc
//! syscalls behind `syscall!`), simplified to the IPv4-only `InetAddr` this
//! core uses instead of `std::net::SocketAddr`.

use std::io;
use std::mem::{self, MaybeUninit};
use std::net::SocketAddrV4;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use crate::addr::InetAddr;

#[derive(Debug)]
pub struct Socket {
    fd: OwnedFd,
}

fn to_sockaddr(addr: InetAddr) -> (libc::sockaddr_in, libc::socklen_t) {
    let v4 = SocketAddrV4::from(addr);
    let sockaddr = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: v4.port().to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from_ne_bytes(v4.ip().octets()),
        },
        sin_zero: [0; 8],
        #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
        sin_len: 0,
    };
    (sockaddr, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
}

unsafe fn from_sockaddr(storage: &libc::sockaddr_in) -> InetAddr {
    let ip = u32::from_be_bytes(storage.sin_addr.s_addr.to_ne_bytes());
    let port = u16::from_be(storage.sin_port);
    InetAddr::new(ip, port)
}

impl Socket {
    pub fn new_stream() -> io::Result<Socket> {
        let socket_type = libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;
        let fd = syscall!(socket(libc::AF_INET, socket_type, 0))?;
        Ok(Socket {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    pub fn bind(&self, addr: InetAddr) -> io::Result<()> {
        let (sockaddr, len) = to_sockaddr(addr);
        syscall!(bind(
            self.fd.as_raw_fd(),
            &sockaddr as *const _ as *const libc::sockaddr,
            len,
        ))
        .map(|_| ())
    }

    pub fn set_reuse_address(&self) -> io::Result<()> {
        let val: libc::c_int = 1;
        syscall!(setsockopt(
            self.fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &val as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ))
        .map(|_| ())
    }

    pub fn listen(&self, backlog: i32) -> io::Result<()> {
        syscall!(listen(self.fd.as_raw_fd(), backlog)).map(|_| ())
    }

    /// Starts a non-blocking connect; returns `Ok(())` whether it completed
    /// immediately or is still in progress (`EINPROGRESS`). Completion is
    /// observed later via `SO_ERROR`.
    pub fn connect(&self, addr: InetAddr) -> io::Result<()> {
        let (sockaddr, len) = to_sockaddr(addr);
        match syscall!(connect(
            self.fd.as_raw_fd(),
            &sockaddr as *const _ as *const libc::sockaddr,
            len,
        )) {
            Ok(_) => Ok(()),
            Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Reads and clears the socket's pending error, used after a connect
    /// attempt becomes writable to find out whether it actually succeeded.
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        let mut err: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        syscall!(getsockopt(
            self.fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut err as *mut _ as *mut libc::c_void,
            &mut len,
        ))?;
        if err == 0 {
            Ok(None)
        } else {
            Ok(Some(io::Error::from_raw_os_error(err)))
        }
    }

    pub fn accept(&self) -> io::Result<(Socket, InetAddr)> {
        let mut storage = MaybeUninit::<libc::sockaddr_in>::zeroed();
        let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        let fd = syscall!(accept4(
            self.fd.as_raw_fd(),
            storage.as_mut_ptr() as *mut libc::sockaddr,
            &mut len,
            libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
        ))?;
        let addr = unsafe { from_sockaddr(&storage.assume_init()) };
        Ok((
            Socket {
                fd: unsafe { OwnedFd::from_raw_fd(fd) },
            },
            addr,
        ))
    }

    pub fn local_addr(&self) -> io::Result<InetAddr> {
        let mut storage = MaybeUninit::<libc::sockaddr_in>::zeroed();
        let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        syscall!(getsockname(
            self.fd.as_raw_fd(),
            storage.as_mut_ptr() as *mut libc::sockaddr,
            &mut len,
        ))?;
        Ok(unsafe { from_sockaddr(&storage.assume_init()) })
    }

    pub fn peer_addr(&self) -> io::Result<InetAddr> {
        let mut storage = MaybeUninit::<libc::sockaddr_in>::zeroed();
        let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        syscall!(getpeername(
            self.fd.as_raw_fd(),
            storage.as_mut_ptr() as *mut libc::sockaddr,
            &mut len,
        ))?;
        Ok(unsafe { from_sockaddr(&storage.assume_init()) })
    }

    pub fn set_no_delay(&self, enabled: bool) -> io::Result<()> {
        let val: libc::c_int = enabled as libc::c_int;
        syscall!(setsockopt(
            self.fd.as_raw_fd(),
            libc::IPPROTO_TCP,
            libc::TCP_NODELAY,
            &val as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ))
        .map(|_| ())
    }

    pub fn set_keep_alive(&self, enabled: bool) -> io::Result<()> {
        let val: libc::c_int = enabled as libc::c_int;
        syscall!(setsockopt(
            self.fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            &val as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ))
        .map(|_| ())
    }

    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = syscall!(read(
            self.fd.as_raw_fd(),
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
        ))?;
        Ok(n as usize)
    }

    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let n = syscall!(write(
            self.fd.as_raw_fd(),
            buf.as_ptr() as *const libc::c_void,
            buf.len(),
        ))?;
        Ok(n as usize)
    }

    pub fn shutdown(&self, how: libc::c_int) -> io::Result<()> {
        syscall!(shutdown(self.fd.as_raw_fd(), how)).map(|_| ())
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl FromRawFd for Socket {
    unsafe fn from_raw_fd(fd: RawFd) -> Socket {
        Socket {
            fd: OwnedFd::from_raw_fd(fd),
        }
    }
}

impl IntoRawFd for Socket {
    fn into_raw_fd(self) -> RawFd {
        self.fd.into_raw_fd()
    }
}
