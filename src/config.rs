//! Ambient configuration knobs for the loop pool, listeners and connections.
//!
//! Grounded on the teacher's `EventLoopConfig`-style plain config structs
//! (`poll.rs`/`config.rs` patterns across the mio family) combined with the
//! bounds the original implementation hard-coded (`LISTEN_QUEUE_SIZE`,
//! `MAX_LOOP_COUNT`) in `original_source`'s `BaseSocket.h`/`EventLoop.h`.

use std::io;

/// Bounds enforced on a `TcpEventLoopList`/`IoService`.
pub const MAX_LOOP_COUNT: usize = 64;

/// Backlog passed to `listen(2)` / Windows `listen`, matching the original's
/// `LISTEN_QUEUE_SIZE`.
pub const DEFAULT_LISTEN_BACKLOG: i32 = 30;

const DEFAULT_RECV_BACKLOG_CAP: usize = 16 * 1024 * 1024;
const DEFAULT_HEARTBEAT_TIMEOUT_MS: i64 = 60_000;

/// Configures an [`IoService`](crate::io_service::IoService): how many event
/// loops it spins up and hands connections to round-robin.
#[derive(Copy, Clone, Debug)]
pub struct IoServiceConfig {
    pub loop_count: usize,
}

impl IoServiceConfig {
    pub fn new(loop_count: usize) -> io::Result<IoServiceConfig> {
        if loop_count == 0 || loop_count > MAX_LOOP_COUNT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("loop_count must be in 1..={MAX_LOOP_COUNT}, got {loop_count}"),
            ));
        }
        Ok(IoServiceConfig { loop_count })
    }
}

impl Default for IoServiceConfig {
    fn default() -> IoServiceConfig {
        IoServiceConfig { loop_count: 1 }
    }
}

/// Configures a [`TcpAcceptor`](crate::acceptor::TcpAcceptor).
#[derive(Copy, Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub listen_backlog: i32,
}

impl ServerConfig {
    pub fn new(port: u16) -> ServerConfig {
        ServerConfig {
            port,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
        }
    }
}

/// Per-connection limits, applied uniformly whether the connection arrived
/// via the acceptor or the connector. `recv_backlog_cap` is the knob
/// spec.md calls `max_buffer_size`: the recv-buffer ceiling past which
/// read interest is paused until the user posts a recv task.
#[derive(Copy, Clone, Debug)]
pub struct ConnectionConfig {
    pub recv_backlog_cap: usize,
    pub heartbeat_timeout_ms: i64,
}

impl Default for ConnectionConfig {
    fn default() -> ConnectionConfig {
        ConnectionConfig {
            recv_backlog_cap: DEFAULT_RECV_BACKLOG_CAP,
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_TIMEOUT_MS,
        }
    }
}

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// How many outstanding connect attempts [`TcpConnector`](crate::connector::TcpConnector)
/// checks for writability in a single `poll`/`WSAPoll` round, mirroring the
/// original's `FD_SETSIZE`-bounded batching of `select`.
pub const DEFAULT_CONNECT_BATCH_SIZE: usize = 64;

/// Configures a [`TcpConnector`](crate::connector::TcpConnector).
#[derive(Copy, Clone, Debug)]
pub struct ConnectorConfig {
    pub connect_timeout_ms: u64,
    pub batch_size: usize,
}

impl Default for ConnectorConfig {
    fn default() -> ConnectorConfig {
        ConnectorConfig {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            batch_size: DEFAULT_CONNECT_BATCH_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_count_out_of_range_is_rejected() {
        assert!(IoServiceConfig::new(0).is_err());
        assert!(IoServiceConfig::new(MAX_LOOP_COUNT + 1).is_err());
        assert!(IoServiceConfig::new(MAX_LOOP_COUNT).is_ok());
    }

    #[test]
    fn server_config_defaults_match_original_bounds() {
        let cfg = ServerConfig::new(9000);
        assert_eq!(cfg.listen_backlog, DEFAULT_LISTEN_BACKLOG);
    }
}
