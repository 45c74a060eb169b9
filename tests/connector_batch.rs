//! Several simultaneous connect attempts — all within one connector poll
//! round's batch size — each complete independently and exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proactor::{
    ConnectionConfig, ConnectorConfig, InetAddr, IoService, IoServiceConfig, ServerConfig,
    TcpAcceptor, TcpCallbacks, TcpConnector,
};

struct AcceptingServer;
impl TcpCallbacks for AcceptingServer {}

#[test]
fn a_batch_of_concurrent_connects_all_complete() {
    const ATTEMPTS: usize = 20;

    let service = IoService::new(IoServiceConfig::new(2).unwrap()).unwrap();
    service.start();

    let acceptor = TcpAcceptor::open(
        service.clone(),
        ServerConfig::new(0),
        Arc::new(AcceptingServer),
        ConnectionConfig::default(),
    )
    .unwrap();

    let connector = TcpConnector::new(service.clone(), ConnectorConfig::default());
    let succeeded = Arc::new(AtomicUsize::new(0));

    for _ in 0..ATTEMPTS {
        let succeeded = succeeded.clone();
        connector
            .connect(
                InetAddr::from_parts(127, 0, 0, 1, acceptor.port()),
                Arc::new(AcceptingServer),
                ConnectionConfig::default(),
                None,
                move |success, _conn, _peer, _ctx| {
                    if success {
                        succeeded.fetch_add(1, Ordering::SeqCst);
                    }
                },
            )
            .unwrap();
    }

    std::thread::sleep(Duration::from_secs(1));
    assert_eq!(succeeded.load(Ordering::SeqCst), ATTEMPTS);
    assert_eq!(acceptor.connection_count(), ATTEMPTS);

    connector.close();
    acceptor.close();
    service.stop();
}
