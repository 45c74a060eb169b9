//! IPv4 socket addresses in host byte order, matching the wire-neutral
//! `InetAddress` the rest of the core is built around (see
//! `original_source/Server/BaseLib/include/BaseSocket.h`).

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// An IPv4 `(ip, port)` pair, both stored in host byte order.
///
/// Conversion to/from [`SocketAddr`] (and, on each platform, `sockaddr_in`)
/// happens at the syscall boundary in `sys::unix`/`sys::windows`; nothing in
/// this struct ever touches network byte order.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct InetAddr {
    ip: u32,
    port: u16,
}

impl InetAddr {
    pub const fn new(ip: u32, port: u16) -> InetAddr {
        InetAddr { ip, port }
    }

    pub fn from_parts(a: u8, b: u8, c: u8, d: u8, port: u16) -> InetAddr {
        let ip = u32::from_be_bytes([a, b, c, d]);
        InetAddr { ip, port }
    }

    pub const fn ip(self) -> u32 {
        self.ip
    }

    pub const fn port(self) -> u16 {
        self.port
    }

    pub const fn is_empty(self) -> bool {
        self.ip == 0 && self.port == 0
    }
}

impl fmt::Debug for InetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for InetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", Ipv4Addr::from(self.ip), self.port)
    }
}

impl From<SocketAddrV4> for InetAddr {
    fn from(addr: SocketAddrV4) -> InetAddr {
        InetAddr {
            ip: u32::from_be_bytes(addr.ip().octets()),
            port: addr.port(),
        }
    }
}

impl From<InetAddr> for SocketAddrV4 {
    fn from(addr: InetAddr) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::from(addr.ip), addr.port)
    }
}

impl TryFrom<SocketAddr> for InetAddr {
    type Error = std::io::Error;

    fn try_from(addr: SocketAddr) -> std::io::Result<InetAddr> {
        match addr {
            SocketAddr::V4(v4) => Ok(InetAddr::from(v4)),
            SocketAddr::V6(_) => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "this core only supports IPv4",
            )),
        }
    }
}

impl From<InetAddr> for SocketAddr {
    fn from(addr: InetAddr) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::from(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_socket_addr_v4() {
        let addr = InetAddr::from_parts(127, 0, 0, 1, 9000);
        let std_addr: SocketAddrV4 = addr.into();
        assert_eq!(std_addr.ip(), &Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(std_addr.port(), 9000);
        assert_eq!(InetAddr::from(std_addr), addr);
    }

    #[test]
    fn equality_and_empty() {
        assert!(InetAddr::default().is_empty());
        assert_ne!(InetAddr::new(1, 1), InetAddr::new(1, 2));
    }

    #[test]
    fn display_formats_dotted_quad() {
        let addr = InetAddr::from_parts(10, 0, 0, 1, 80);
        assert_eq!(addr.to_string(), "10.0.0.1:80");
    }
}
