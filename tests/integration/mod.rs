//! Integration tests for proxy-gateway
//!
//! Every test runs a real gateway accept loop on loopback together with mock
//! origins and mock upstream proxies. No external network access is needed.
//!
//! # Test Organization
//!
//! - `http_inbound`: HTTP CONNECT and forward-proxy clients
//! - `socks5_inbound`: SOCKS5 method selection, routing and failure replies
//! - `chaining`: upstream HTTP/SOCKS5 channels, gateway-to-gateway obfuscation

pub mod chaining;
pub mod http_inbound;
pub mod socks5_inbound;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use proxy_gateway::config::load_config_str;
use proxy_gateway::connection::{run_accept_loop, ConnectionStats};
use proxy_gateway::rules::ChannelRouter;

/// A gateway running on an ephemeral loopback port
pub struct TestGateway {
    pub addr: SocketAddr,
    pub router: Arc<ChannelRouter>,
    pub stats: Arc<ConnectionStats>,
    shutdown: CancellationToken,
}

impl TestGateway {
    /// Start a gateway from a JSON configuration
    pub async fn start(config_json: &str) -> Self {
        let config = load_config_str(config_json).expect("valid test config");
        let router = Arc::new(ChannelRouter::from_config(&config).expect("valid channels"));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = Arc::new(ConnectionStats::new());
        let shutdown = CancellationToken::new();

        tokio::spawn(run_accept_loop(
            listener,
            Arc::clone(&router),
            Arc::clone(&stats),
            shutdown.clone(),
        ));

        Self {
            addr,
            router,
            stats,
            shutdown,
        }
    }

    /// Open a client connection to the gateway
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Reserve a loopback port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a TCP echo server
pub async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut conn, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut rd, mut wr) = conn.split();
                let _ = tokio::io::copy(&mut rd, &mut wr).await;
            });
        }
    });

    addr
}

/// Read an HTTP header block, up to and including the blank line
pub async fn read_header_block<R>(reader: &mut BufReader<R>) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut block = Vec::new();
    loop {
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line).await.unwrap();
        block.extend_from_slice(&line);
        if n == 0 || line == b"\r\n" {
            return block;
        }
    }
}

/// Start an HTTP origin that reports each request header block and answers `ok`
pub async fn spawn_http_origin() -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((conn, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(conn);
                let request = read_header_block(&mut reader).await;
                let _ = tx.send(request);
                let _ = reader
                    .get_mut()
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                    .await;
            });
        }
    });

    (addr, rx)
}

/// Start an upstream HTTP CONNECT proxy that reports each request line
///
/// Accepted tunnels echo their payload instead of reaching the target.
pub async fn spawn_connect_proxy() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((conn, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(conn);
                let request = read_header_block(&mut reader).await;
                let request = String::from_utf8_lossy(&request).into_owned();
                let _ = tx.send(request);

                let mut conn = reader.into_inner();
                if conn
                    .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                    .await
                    .is_err()
                {
                    return;
                }
                let (mut rd, mut wr) = conn.split();
                let _ = tokio::io::copy(&mut rd, &mut wr).await;
            });
        }
    });

    (addr, rx)
}

/// Read until EOF, returning what arrived
pub async fn read_to_close(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    buf
}
