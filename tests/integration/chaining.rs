//! Upstream channels: HTTP CONNECT proxies, plain SOCKS5 servers and
//! gateway-to-gateway chaining with the obfuscated SOCKS5 method

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use proxy_gateway::io::complement;

use super::{spawn_connect_proxy, spawn_echo_server, TestGateway};

const ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Forward one connection to `target`, reporting every client->target chunk
async fn spawn_tap(target: SocketAddr) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (inbound, _) = listener.accept().await.unwrap();
        let outbound = TcpStream::connect(target).await.unwrap();
        let (mut in_rd, mut in_wr) = inbound.into_split();
        let (mut out_rd, mut out_wr) = outbound.into_split();

        tokio::spawn(async move {
            let _ = tokio::io::copy(&mut out_rd, &mut in_wr).await;
        });

        let mut buf = [0u8; 4096];
        loop {
            let n = match in_rd.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let _ = tx.send(buf[..n].to_vec());
            if out_wr.write_all(&buf[..n]).await.is_err() {
                break;
            }
        }
    });

    (addr, rx)
}

/// Plain SOCKS5 server that only offers no-auth, reports the CONNECT request
/// and then echoes
async fn spawn_plain_socks5() -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();

        let mut header = [0u8; 2];
        conn.read_exact(&mut header).await.unwrap();
        let mut methods = vec![0u8; header[1] as usize];
        conn.read_exact(&mut methods).await.unwrap();
        conn.write_all(&[0x05, 0x00]).await.unwrap();

        let mut request = vec![0u8; 5];
        conn.read_exact(&mut request).await.unwrap();
        let mut rest = vec![0u8; request[4] as usize + 2];
        conn.read_exact(&mut rest).await.unwrap();
        request.extend(rest);
        let _ = tx.send(request);

        conn.write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();
        let (mut rd, mut wr) = conn.split();
        let _ = tokio::io::copy(&mut rd, &mut wr).await;
    });

    (addr, rx)
}

async fn connect_tunnel(gateway: &TestGateway, target: &str) -> TcpStream {
    let mut client = gateway.connect().await;
    let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
    client.write_all(request.as_bytes()).await.unwrap();

    let mut reply = vec![0u8; ESTABLISHED.len()];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, ESTABLISHED);
    client
}

#[tokio::test]
async fn test_http_channel_sends_full_connect_request() {
    let (proxy, mut requests) = spawn_connect_proxy().await;
    let gateway = TestGateway::start(&format!(
        r#"{{
            "channels": [
                {{ "domains": ["example.org"], "name": "upstream", "type": "http", "addr": "{proxy}" }}
            ],
            "socks5": {{ "name": "socks5", "type": "direct" }},
            "default": {{ "name": "direct", "type": "direct" }}
        }}"#
    ))
    .await;

    let mut client = connect_tunnel(&gateway, "www.example.org:443").await;

    let seen = requests.recv().await.unwrap();
    assert_eq!(
        seen,
        "CONNECT www.example.org:443 HTTP/1.1\r\nHost: www.example.org:443\r\n\r\n"
    );

    client.write_all(b"tls bytes").await.unwrap();
    let mut buf = [0u8; 9];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"tls bytes");
}

#[tokio::test]
async fn test_plain_socks5_upstream() {
    let (server, mut requests) = spawn_plain_socks5().await;
    let gateway = TestGateway::start(&format!(
        r#"{{
            "socks5": {{ "name": "socks5", "type": "direct" }},
            "default": {{ "name": "upstream", "type": "socks5", "addr": "{server}" }}
        }}"#
    ))
    .await;

    let mut client = connect_tunnel(&gateway, "example.net:8443").await;

    let request = requests.recv().await.unwrap();
    let mut expected = vec![0x05, 0x01, 0x00, 0x03, 11];
    expected.extend_from_slice(b"example.net");
    expected.extend_from_slice(&8443u16.to_be_bytes());
    assert_eq!(request, expected);

    client.write_all(b"clear").await.unwrap();
    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"clear");
}

#[tokio::test]
async fn test_gateway_to_gateway_obfuscation() {
    let echo = spawn_echo_server().await;

    // Exit gateway reaches the echo server directly
    let exit = TestGateway::start(
        r#"{
            "socks5": { "name": "socks5", "type": "direct" },
            "default": { "name": "direct", "type": "direct" }
        }"#,
    )
    .await;

    // Entry gateway chains to the exit gateway through a tap
    let (tap, mut wire) = spawn_tap(exit.addr).await;
    let entry = TestGateway::start(&format!(
        r#"{{
            "socks5": {{ "name": "socks5", "type": "direct" }},
            "default": {{ "name": "chain", "type": "socks5", "addr": "{tap}" }}
        }}"#
    ))
    .await;

    let mut client = connect_tunnel(&entry, &echo.to_string()).await;
    client.write_all(b"secret payload").await.unwrap();
    let mut buf = [0u8; 14];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"secret payload");

    let mut seen = Vec::new();
    while let Ok(chunk) = wire.try_recv() {
        seen.extend(chunk);
    }

    // Greeting offers no-auth and the obfuscated method
    assert!(seen.starts_with(&[0x05, 0x02, 0x00, 0x81]));
    // Neither the destination nor the payload crosses the wire in clear
    let host = echo.ip().to_string();
    assert!(!contains(&seen, host.as_bytes()));
    assert!(contains(&seen, &complement(host.as_bytes())));
    assert!(!contains(&seen, b"secret payload"));
    assert!(contains(&seen, &complement(b"secret payload")));
}
