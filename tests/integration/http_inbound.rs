//! HTTP CONNECT and HTTP forward-proxy clients against a running gateway

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{closed_port, read_to_close, spawn_echo_server, spawn_http_origin, TestGateway};

const DIRECT_CONFIG: &str = r#"{
    "socks5": { "name": "socks5", "type": "direct" },
    "default": { "name": "direct", "type": "direct" }
}"#;

#[tokio::test]
async fn test_connect_round_trip() {
    let echo = spawn_echo_server().await;
    let gateway = TestGateway::start(DIRECT_CONFIG).await;
    let mut client = gateway.connect().await;

    let request = format!("CONNECT {echo} HTTP/1.1\r\nHost: {echo}\r\n\r\n");
    client.write_all(request.as_bytes()).await.unwrap();

    let expected = b"HTTP/1.1 200 Connection established\r\n\r\n";
    let mut reply = vec![0u8; expected.len()];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, expected);

    client.write_all(b"hello through the tunnel").await.unwrap();
    let mut echoed = vec![0u8; 24];
    client.read_exact(&mut echoed).await.unwrap();
    assert_eq!(echoed, b"hello through the tunnel");

    assert_eq!(gateway.router.cached("127.0.0.1").unwrap().name(), "direct");
}

#[tokio::test]
async fn test_connect_failure_closes_without_response() {
    let port = closed_port().await;
    let gateway = TestGateway::start(DIRECT_CONFIG).await;
    let mut client = gateway.connect().await;

    let request = format!("CONNECT 127.0.0.1:{port} HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\n\r\n");
    client.write_all(request.as_bytes()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), read_to_close(&mut client))
        .await
        .unwrap();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_connect_bad_port_dropped() {
    let gateway = TestGateway::start(DIRECT_CONFIG).await;
    let mut client = gateway.connect().await;

    client
        .write_all(b"CONNECT example.com:99999 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    assert!(read_to_close(&mut client).await.is_empty());
    assert_eq!(gateway.router.cache_len(), 0);
}

#[tokio::test]
async fn test_forward_proxy_rewrites_request_line() {
    let (origin, mut requests) = spawn_http_origin().await;
    let gateway = TestGateway::start(DIRECT_CONFIG).await;
    let mut client = gateway.connect().await;

    let request = format!(
        "GET http://{origin}/path?q=1 HTTP/1.1\r\nHost: {origin}\r\nAccept: */*\r\n\r\n"
    );
    client.write_all(request.as_bytes()).await.unwrap();

    let seen = requests.recv().await.unwrap();
    let expected = format!("GET /path?q=1 HTTP/1.1\r\nHost: {origin}\r\nAccept: */*\r\n\r\n");
    assert_eq!(String::from_utf8(seen).unwrap(), expected);

    let response = read_to_close(&mut client).await;
    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with(b"ok"));
}

#[tokio::test]
async fn test_forward_proxy_without_path() {
    let (origin, mut requests) = spawn_http_origin().await;
    let gateway = TestGateway::start(DIRECT_CONFIG).await;
    let mut client = gateway.connect().await;

    let request = format!("HEAD http://{origin} HTTP/1.0\r\n\r\n");
    client.write_all(request.as_bytes()).await.unwrap();

    let seen = requests.recv().await.unwrap();
    assert_eq!(seen, b"HEAD / HTTP/1.0\r\n\r\n");
}

#[tokio::test]
async fn test_unknown_protocol_dropped() {
    let gateway = TestGateway::start(DIRECT_CONFIG).await;
    let mut client = gateway.connect().await;

    client.write_all(&[0x16, 0x03, 0x01, 0x02, 0x00]).await.unwrap();
    assert!(read_to_close(&mut client).await.is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gateway.stats.errored(), 1);
}
