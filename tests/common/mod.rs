use anyhow::Result;
use log::{debug, LevelFilter};
use log4rs_test_utils::test_logging::init_logging_once_for;
use lurk_socks5::server::{config::LurkServerConfig, LurkServer};
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::{yield_now, JoinHandle},
};
use tokio_util::sync::CancellationToken;
use utils::assertions::assert_eq_vectors;

// :0 tells the OS to pick an open port.
pub const TEST_BIND_IPV4: &str = "127.0.0.1:0";

pub fn init_logging() {
    init_logging_once_for(None, LevelFilter::Debug, "{h({({l}):5.5})} [{M}] {f}:{L}: {m}{n}");
}

/// Proxy server serving in a spawned task.
pub struct LurkServerTask {
    server: Arc<LurkServer>,
    handle: JoinHandle<Result<()>>,
    addr: SocketAddr,
}

impl LurkServerTask {
    pub async fn spawn(config: LurkServerConfig) -> LurkServerTask {
        LurkServerTask::spawn_with(Arc::new(LurkServer::new(config))).await
    }

    /// Serve on a fresh listener with an existing server instance.
    pub async fn spawn_with(server: Arc<LurkServer>) -> LurkServerTask {
        let listener = TcpListener::bind(TEST_BIND_IPV4).await.expect("Expect bound listener");
        let addr = listener.local_addr().unwrap();

        let serving = Arc::clone(&server);
        let handle = tokio::spawn(async move { serving.serve(listener).await });

        // Yield execution until server starts accepting.
        yield_now().await;

        LurkServerTask { server, handle, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn server(&self) -> Arc<LurkServer> {
        Arc::clone(&self.server)
    }

    /// Close the server and wait for serving task termination.
    /// Returns error the serving has finished with.
    pub async fn close(self) -> anyhow::Error {
        self.server.close();
        self.handle
            .await
            .expect("Serving task should not panic")
            .expect_err("Serving should finish with error")
    }
}

/// Spawns TCP echo server. Each connection is echoed until EOF,
/// then write direction is shut down.
pub async fn spawn_tcp_echo_server() -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind(TEST_BIND_IPV4)
        .await
        .expect("[TCP Echo Server] Failed to bind TCP listener");
    let addr = listener.local_addr().unwrap();

    async fn main_loop(listener: TcpListener) {
        loop {
            let (mut stream, addr) = listener
                .accept()
                .await
                .expect("[TCP Echo Server] Failed to accept TCP connection");

            debug!("[TCP Echo Server] Accepted new TCP connection: {}", addr);

            tokio::spawn(async move {
                let (mut rd, mut wr) = stream.split();
                let echoed = tokio::io::copy(&mut rd, &mut wr).await;
                debug!("[TCP Echo Server] Connection with {} finished: {:?}", addr, echoed);
                let _ = wr.shutdown().await;
            });
        }
    }

    // Create cancellation token to track external shutdown request.
    let cancellation_token = CancellationToken::new();

    let task_token = cancellation_token.clone();
    tokio::spawn(async move {
        debug!("[TCP Echo Server] Started. Listening on {}", addr);
        tokio::select! {
            _ = main_loop(listener) => {}
            _ = task_token.cancelled() => {}
        }
        debug!("[TCP Echo Server] Server is shutting down ...");
    });

    (addr, cancellation_token)
}

/// Establish connection with passed `endpoint` through `socks5_proxy`. Then send
/// data and expect it to be fully returned by the endpoint.
pub async fn ping_pong_data_through_socks5(endpoint: SocketAddr, socks5_proxy: SocketAddr, auth: Option<async_socks5::Auth>) {
    // Create TCP stream.
    let mut socks5_stream = TcpStream::connect(socks5_proxy)
        .await
        .expect("Expect successful TCP connection established with proxy");

    // Establish SOCKS5 connection over TCP stream.
    async_socks5::connect(&mut socks5_stream, endpoint, auth)
        .await
        .expect("Expect successfully established SOCKS5 connection");

    // Write generated buffer.
    let write_buff = utils::generate_data(1024);
    socks5_stream.write_all(&write_buff).await.expect("Expect all data to be written");

    // Expect it to be fully received back.
    let mut read_buff = vec![0u8; 1024];
    socks5_stream.read_exact(&mut read_buff).await.expect("Expect all data to be read");

    // Shutdown write direction.
    socks5_stream.shutdown().await.expect("Expect successful TCP stream shutdown");

    // Check that written and read data are equal.
    assert_eq_vectors(&write_buff, &read_buff);
}

/// Send `payload` to `endpoint` through `socks5_proxy`, while reading the echo
/// concurrently. Returns as many bytes as were sent.
pub async fn transfer_through_socks5(endpoint: SocketAddr, socks5_proxy: SocketAddr, payload: Vec<u8>) -> Vec<u8> {
    let mut socks5_stream = TcpStream::connect(socks5_proxy)
        .await
        .expect("Expect successful TCP connection established with proxy");

    async_socks5::connect(&mut socks5_stream, endpoint, None)
        .await
        .expect("Expect successfully established SOCKS5 connection");

    let (mut rd, mut wr) = socks5_stream.into_split();
    let len = payload.len();

    // Write direction is kept open: relay ends as soon as any side finishes.
    let writer = tokio::spawn(async move {
        wr.write_all(&payload).await.expect("Expect all data to be written");
        wr
    });

    let mut received = vec![0u8; len];
    rd.read_exact(&mut received).await.expect("Expect all data to be read");
    drop(writer.await.unwrap());

    received
}

pub mod utils {

    use rand::Rng;

    pub mod assertions {

        use std::fmt::Debug;

        pub fn assert_eq_vectors<T: Eq + Debug>(expected: &[T], actual: &[T]) {
            assert_eq!(expected.len(), actual.len(), "buffers should have equal length");

            if let Some(pos) = expected.iter().zip(actual).position(|(e, a)| e != a) {
                panic!("buffers differ at position {pos}: {:?} != {:?}", expected[pos], actual[pos]);
            }
        }
    }

    pub fn generate_data(len: usize) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.gen::<u8>()).collect()
    }
}
