//! Cross-thread wakeup for the readiness-based (epoll) event loop: a pipe
//! whose read end is registered with the selector, matching the original's
//! `EpollObject::wakeup`/`processPipeEvent` (`linux_epoll.h`).

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};

use crate::interest::Interest;
use crate::sys::unix::selector::Selector;
use crate::token::Token;

#[derive(Debug)]
pub struct Waker {
    sender: File,
    receiver: File,
}

impl Waker {
    pub fn new(selector: &Selector, token: Token) -> io::Result<Waker> {
        let mut fds = [0 as RawFd; 2];
        syscall!(pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK))?;
        let receiver = unsafe { File::from_raw_fd(fds[0]) };
        let sender = unsafe { File::from_raw_fd(fds[1]) };
        selector.register(receiver.as_raw_fd(), token, Interest::READABLE)?;
        Ok(Waker { sender, receiver })
    }

    /// Writes one byte to the pipe, waking whatever thread is blocked in
    /// `poll`. Safe to call from any thread, any number of times; a full
    /// pipe is drained and retried rather than treated as an error.
    pub fn wake(&self) -> io::Result<()> {
        match (&self.sender).write(&[1]) {
            Ok(_) => Ok(()),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.drain();
                self.wake()
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => self.wake(),
            Err(e) => Err(e),
        }
    }

    /// Drains the pipe after delivering the wakeup; call once `poll`
    /// reports readiness on the receiver's token.
    pub fn drain(&self) {
        let mut buf = [0u8; 4096];
        loop {
            match (&self.receiver).read(&mut buf) {
                Ok(n) if n > 0 => continue,
                _ => return,
            }
        }
    }
}

impl AsRawFd for Waker {
    fn as_raw_fd(&self) -> RawFd {
        self.receiver.as_raw_fd()
    }
}
