use std::fmt;
use std::ops;

/// Readiness a [`Demultiplexer`](crate::demux::Demultiplexer) registration is
/// interested in.
///
/// Only `READABLE` and `WRITABLE` are meaningful for the Proactor façade:
/// the completion-based variant (IOCP) never arms "interest" at all, it
/// posts concrete send/recv operations instead, but `Interest` is still used
/// to describe what the readiness-based variant (epoll) should currently
/// watch for on a socket.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Interest(u8);

const READABLE: u8 = 0b01;
const WRITABLE: u8 = 0b10;

impl Interest {
    pub const NONE: Interest = Interest(0);
    pub const READABLE: Interest = Interest(READABLE);
    pub const WRITABLE: Interest = Interest(WRITABLE);

    pub const fn is_readable(self) -> bool {
        self.0 & READABLE != 0
    }

    pub const fn is_writable(self) -> bool {
        self.0 & WRITABLE != 0
    }

    pub const fn remove(self, other: Interest) -> Option<Interest> {
        let bits = self.0 & !other.0;
        if bits == 0 {
            None
        } else {
            Some(Interest(bits))
        }
    }
}

impl ops::BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if self.is_readable() {
            write!(f, "READABLE")?;
            first = false;
        }
        if self.is_writable() {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "WRITABLE")?;
        }
        Ok(())
    }
}
