//! Platform backends. Everything above this module talks to
//! [`crate::demux::Demultiplexer`]; nothing else in the crate names `unix`
//! or `windows` directly.

#[cfg(unix)]
pub(crate) mod unix;
#[cfg(unix)]
pub(crate) use unix::{Selector, Socket, Waker};

#[cfg(windows)]
pub(crate) mod windows;
#[cfg(windows)]
pub(crate) use windows::{Selector, Socket};
