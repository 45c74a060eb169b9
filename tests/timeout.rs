//! A queued recv that the peer never satisfies is torn down once its
//! timeout elapses, discovered by the owning loop's periodic timeout sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proactor::{
    ConnectionConfig, ConnectorConfig, InetAddr, IoService, IoServiceConfig, ServerConfig,
    TcpAcceptor, TcpCallbacks, TcpConnection, TcpConnector,
};

struct ConnectOnly;
impl TcpCallbacks for ConnectOnly {}

struct RecvWithShortTimeout {
    disconnected: Arc<AtomicBool>,
}

impl TcpCallbacks for RecvWithShortTimeout {
    fn on_connected(&self, conn: &Arc<TcpConnection>) {
        conn.recv_any(None, Some(Duration::from_millis(1)));
    }

    fn on_disconnected(&self, _conn: &Arc<TcpConnection>) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

#[test]
fn recv_task_that_never_completes_times_out_via_sweep() {
    let service = IoService::new(IoServiceConfig::new(1).unwrap()).unwrap();
    service.start();

    let disconnected = Arc::new(AtomicBool::new(false));
    let acceptor = TcpAcceptor::open(
        service.clone(),
        ServerConfig::new(0),
        Arc::new(RecvWithShortTimeout {
            disconnected: disconnected.clone(),
        }),
        ConnectionConfig::default(),
    )
    .unwrap();

    let connector = TcpConnector::new(service.clone(), ConnectorConfig::default());
    connector
        .connect(
            InetAddr::from_parts(127, 0, 0, 1, acceptor.port()),
            Arc::new(ConnectOnly),
            ConnectionConfig::default(),
            None,
            |_success, _conn, _peer, _ctx| {},
        )
        .unwrap();

    // The sweep interval is the dominant cost here, not the 1 ms timeout
    // itself; give it more than one full sweep period to fire.
    std::thread::sleep(Duration::from_secs(6));
    assert!(disconnected.load(Ordering::SeqCst));

    connector.close();
    acceptor.close();
    service.stop();
}
