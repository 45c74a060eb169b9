//! Windows backend: genuinely completion-based, built directly on IOCP via
//! `windows-sys` (see `selector.rs`). Unlike Unix, registration with the
//! demultiplexer and issuing I/O are not separate steps — posting a recv or
//! send *is* the registration of interest, matching `original_source`'s
//! `IocpObject::send`/`recv` (`win_iocp.h`).

pub(crate) mod overlapped;
pub(crate) mod selector;
pub(crate) mod socket;

pub(crate) use selector::Selector;
pub(crate) use socket::Socket;
