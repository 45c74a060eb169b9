//! A Proactor-style TCP networking core: a single-threaded, wakeable event
//! loop wrapping a platform demultiplexer (epoll on Linux, IOCP on Windows),
//! a connection state machine with buffered send/recv task queues and
//! pluggable packet framing, a listener and an asynchronous connector that
//! round-robin-assign sockets across a fixed pool of loops, and a
//! hierarchical timer queue.
//!
//! Grounded throughout on `original_source`'s `Server/BaseLib` (`TCPServer.h`,
//! `EventLoop.h`, `Timers.h`, `BaseSocket.h`) — this crate is a from-scratch
//! Rust rendition of that design, not a port of its code.
//!
//! # Layout
//!
//! - [`event_loop`] — the run loop itself: poll, delegated work, finalizers,
//!   timers.
//! - [`loop_pool`] — [`loop_pool::TcpEventLoop`], an event loop plus the
//!   connection registry it dispatches into.
//! - [`io_service`] — [`io_service::IoService`], the fixed-size pool of
//!   event loops and the single entry point that admits a socket to one of
//!   them.
//! - [`acceptor`] / [`connector`] — the two ways a socket is born: inbound
//!   via [`acceptor::TcpAcceptor`], outbound via [`connector::TcpConnector`].
//! - [`connection`] — [`connection::TcpConnection`], the per-connection
//!   state machine.
//! - [`splitter`] — pure functions that frame packets out of a byte stream.
//! - [`timer`] / [`timer_manager`] — the timer queue type, and a
//!   process-wide instance of it for code with no loop of its own.
//! - [`callbacks`], [`buffer`], [`addr`], [`token`], [`interest`], [`config`]
//!   — supporting types.

mod acceptor;
mod addr;
mod buffer;
mod callbacks;
mod config;
mod connection;
mod connector;
mod demux;
mod event_loop;
mod interest;
mod io_service;
mod loop_pool;
mod splitter;
mod sys;
mod timer;
mod timer_manager;
mod token;

pub use acceptor::TcpAcceptor;
pub use addr::InetAddr;
pub use buffer::IoBuffer;
pub use callbacks::{Context, TcpCallbacks};
pub use config::{ConnectionConfig, ConnectorConfig, IoServiceConfig, ServerConfig};
pub use connection::{Origin, TcpConnection};
pub use connector::{ConnectComplete, TcpConnector};
pub use event_loop::{EventLoop, EventLoopConfig};
pub use interest::Interest;
pub use io_service::{EventLoopPool, IoService};
pub use loop_pool::TcpEventLoop;
pub use splitter::{any_splitter, byte_splitter, line_splitter, null_terminated_splitter, PacketSplitter};
pub use timer::TimerId;
pub use token::Token;

/// Free functions backed by a single process-wide background event loop,
/// for scheduling timers without owning an [`IoService`].
pub mod timers {
    pub use crate::timer_manager::{cancel_timer, execute_after, execute_at, execute_every};
}
