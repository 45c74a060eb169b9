//! End-to-end echo: a connector-opened connection sends bytes, the
//! acceptor-side connection echoes them back verbatim, framed with
//! `any_splitter` on both ends.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use proactor::{
    any_splitter, ConnectionConfig, ConnectorConfig, InetAddr, IoService, IoServiceConfig,
    ServerConfig, TcpAcceptor, TcpCallbacks, TcpConnection, TcpConnector,
};

struct EchoServer;

impl TcpCallbacks for EchoServer {
    fn on_connected(&self, conn: &Arc<TcpConnection>) {
        conn.recv_any(None, None);
    }

    fn on_recv_complete(&self, conn: &Arc<TcpConnection>, packet: &[u8], _context: Option<proactor::Context>) {
        conn.send(packet, None, None);
        conn.recv_any(None, None);
    }
}

struct EchoClient {
    replies: mpsc::Sender<Vec<u8>>,
}

impl TcpCallbacks for EchoClient {
    fn on_connected(&self, conn: &Arc<TcpConnection>) {
        conn.recv(any_splitter, None, None);
    }

    fn on_recv_complete(&self, conn: &Arc<TcpConnection>, packet: &[u8], _context: Option<proactor::Context>) {
        let _ = self.replies.send(packet.to_vec());
        conn.recv(any_splitter, None, None);
    }
}

#[test]
fn echoes_a_single_message_back_to_the_client() {
    let service = IoService::new(IoServiceConfig::new(2).unwrap()).unwrap();
    service.start();

    let acceptor = TcpAcceptor::open(
        service.clone(),
        ServerConfig::new(0),
        Arc::new(EchoServer),
        ConnectionConfig::default(),
    )
    .unwrap();

    let (tx, rx) = mpsc::channel();
    let connector = TcpConnector::new(service.clone(), ConnectorConfig::default());
    connector
        .connect(
            InetAddr::from_parts(127, 0, 0, 1, acceptor.port()),
            Arc::new(EchoClient { replies: tx }),
            ConnectionConfig::default(),
            None,
            |success, conn, _peer, _ctx| {
                if success {
                    if let Some(conn) = conn {
                        conn.send(b"hello, world", None, None);
                    }
                }
            },
        )
        .unwrap();

    let echoed = rx.recv_timeout(Duration::from_secs(2)).expect("echo reply");
    assert_eq!(echoed, b"hello, world");

    connector.close();
    acceptor.close();
    service.stop();
}
