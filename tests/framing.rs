//! Packet framing: two lines written in a single `send` arrive as two
//! separate `on_recv_complete` calls when the receiver queues
//! `line_splitter` twice.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use proactor::{
    line_splitter, ConnectionConfig, ConnectorConfig, Context, InetAddr, IoService,
    IoServiceConfig, ServerConfig, TcpAcceptor, TcpCallbacks, TcpConnection, TcpConnector,
};

struct SendOnConnect;

impl TcpCallbacks for SendOnConnect {
    fn on_connected(&self, conn: &Arc<TcpConnection>) {
        conn.send(b"first\r\nsecond\r\n", None, None);
    }
}

struct LineCollector {
    lines: mpsc::Sender<Vec<u8>>,
}

impl TcpCallbacks for LineCollector {
    fn on_connected(&self, conn: &Arc<TcpConnection>) {
        conn.recv(line_splitter, None, None);
        conn.recv(line_splitter, None, None);
    }

    fn on_recv_complete(&self, _conn: &Arc<TcpConnection>, packet: &[u8], _context: Option<Context>) {
        let _ = self.lines.send(packet.to_vec());
    }
}

#[test]
fn two_lines_in_one_write_arrive_as_two_packets() {
    let service = IoService::new(IoServiceConfig::new(1).unwrap()).unwrap();
    service.start();

    let (tx, rx) = mpsc::channel();
    let acceptor = TcpAcceptor::open(
        service.clone(),
        ServerConfig::new(0),
        Arc::new(LineCollector { lines: tx }),
        ConnectionConfig::default(),
    )
    .unwrap();

    let connector = TcpConnector::new(service.clone(), ConnectorConfig::default());
    connector
        .connect(
            InetAddr::from_parts(127, 0, 0, 1, acceptor.port()),
            Arc::new(SendOnConnect),
            ConnectionConfig::default(),
            None,
            |_success, _conn, _peer, _ctx| {},
        )
        .unwrap();

    let first = rx.recv_timeout(Duration::from_secs(2)).expect("first line");
    let second = rx.recv_timeout(Duration::from_secs(2)).expect("second line");
    assert_eq!(first, b"first\r\n");
    assert_eq!(second, b"second\r\n");

    connector.close();
    acceptor.close();
    service.stop();
}
