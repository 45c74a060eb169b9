//! A connection that never posts a recv task pauses receiving once its
//! unread recv buffer reaches the configured backlog cap, instead of
//! growing without bound or being torn down; posting a recv resumes the
//! flow and eventually delivers everything that was sent (spec.md §8,
//! scenario 3 "Back-pressure").

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proactor::{
    any_splitter, ConnectionConfig, ConnectorConfig, Context, InetAddr, IoService, IoServiceConfig,
    ServerConfig, TcpAcceptor, TcpCallbacks, TcpConnection, TcpConnector,
};

const PAYLOAD_SIZE: usize = 256 * 1024;
const BACKLOG_CAP: usize = 1024;

struct FloodOnConnect;

impl TcpCallbacks for FloodOnConnect {
    fn on_connected(&self, conn: &Arc<TcpConnection>) {
        conn.send(&vec![b'x'; PAYLOAD_SIZE], None, None);
    }
}

/// Server-side callbacks: never posts a recv until the test explicitly
/// triggers one by calling `start_receiving`, then drains everything that
/// arrives, re-posting a recv after each packet until the whole payload is
/// accounted for.
struct StallThenDrain {
    conn: Arc<Mutex<Option<Arc<TcpConnection>>>>,
    total_received: Arc<AtomicUsize>,
}

impl TcpCallbacks for StallThenDrain {
    fn on_connected(&self, conn: &Arc<TcpConnection>) {
        *self.conn.lock().unwrap() = Some(conn.clone());
        // Deliberately post no recv: inbound bytes pile up in the recv
        // buffer until the backlog cap trips and pauses reads.
    }

    fn on_recv_complete(&self, conn: &Arc<TcpConnection>, packet: &[u8], _context: Option<Context>) {
        self.total_received.fetch_add(packet.len(), Ordering::SeqCst);
        if self.total_received.load(Ordering::SeqCst) < PAYLOAD_SIZE {
            conn.recv(any_splitter, None, None);
        }
    }
}

#[test]
fn exceeding_the_recv_backlog_cap_pauses_rather_than_tearing_down() {
    let service = IoService::new(IoServiceConfig::new(1).unwrap()).unwrap();
    service.start();

    let total_received = Arc::new(AtomicUsize::new(0));
    let server_conn: Arc<Mutex<Option<Arc<TcpConnection>>>> = Arc::new(Mutex::new(None));

    let tight_cap = ConnectionConfig {
        recv_backlog_cap: BACKLOG_CAP,
    };

    let acceptor = TcpAcceptor::open(
        service.clone(),
        ServerConfig::new(0),
        Arc::new(StallThenDrain {
            conn: server_conn.clone(),
            total_received: total_received.clone(),
        }),
        tight_cap,
    )
    .unwrap();

    let connector = TcpConnector::new(service.clone(), ConnectorConfig::default());
    connector
        .connect(
            InetAddr::from_parts(127, 0, 0, 1, acceptor.port()),
            Arc::new(FloodOnConnect),
            ConnectionConfig::default(),
            None,
            |_success, _conn, _peer, _ctx| {},
        )
        .unwrap();

    // Give the flood time to pile up behind the cap; the connection must
    // stay alive and connected throughout, never torn down by overflow.
    std::thread::sleep(Duration::from_millis(300));
    let conn = server_conn.lock().unwrap().clone().expect("server side connected");
    assert!(conn.is_connected(), "connection must not be torn down by back-pressure");
    assert_eq!(
        total_received.load(Ordering::SeqCst),
        0,
        "nothing should have been delivered while paused"
    );

    // Posting a recv must resume the paused read side and, through the
    // re-post loop in `on_recv_complete`, eventually deliver everything.
    conn.recv(any_splitter, None, None);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while total_received.load(Ordering::SeqCst) < PAYLOAD_SIZE && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(total_received.load(Ordering::SeqCst), PAYLOAD_SIZE);
    assert!(conn.is_connected());

    connector.close();
    acceptor.close();
    service.stop();
}
