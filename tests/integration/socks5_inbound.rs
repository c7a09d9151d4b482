//! SOCKS5 clients against a running gateway

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use proxy_gateway::io::complement;

use super::{closed_port, read_to_close, spawn_connect_proxy, spawn_echo_server, TestGateway};

const SUCCESS_REPLY: [u8; 10] = [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];

/// Build a domain CONNECT request, complementing the domain when obfuscated
fn domain_request(domain: &str, port: u16, obfuscated: bool) -> Vec<u8> {
    let mut request = vec![0x05, 0x01, 0x00, 0x03, domain.len() as u8];
    if obfuscated {
        request.extend(complement(domain.as_bytes()));
    } else {
        request.extend_from_slice(domain.as_bytes());
    }
    request.extend_from_slice(&port.to_be_bytes());
    request
}

async fn greet(client: &mut TcpStream, methods: &[u8]) -> [u8; 2] {
    let mut greeting = vec![0x05, methods.len() as u8];
    greeting.extend_from_slice(methods);
    client.write_all(&greeting).await.unwrap();

    let mut reply = [0u8; 2];
    client.read_exact(&mut reply).await.unwrap();
    reply
}

fn routing_config(rule_proxy: std::net::SocketAddr, socks5_proxy: std::net::SocketAddr) -> String {
    format!(
        r#"{{
            "channels": [
                {{ "domains": ["foo.bar"], "name": "rule", "type": "http", "addr": "{rule_proxy}" }}
            ],
            "socks5": {{ "name": "socks5", "type": "http", "addr": "{socks5_proxy}" }},
            "default": {{ "name": "direct", "type": "direct" }}
        }}"#
    )
}

#[tokio::test]
async fn test_method_selection() {
    let gateway = TestGateway::start(
        r#"{
            "socks5": { "name": "socks5", "type": "direct" },
            "default": { "name": "direct", "type": "direct" }
        }"#,
    )
    .await;

    let mut client = gateway.connect().await;
    assert_eq!(greet(&mut client, &[0x00, 0x81]).await, [0x05, 0x81]);

    let mut client = gateway.connect().await;
    assert_eq!(greet(&mut client, &[0x00]).await, [0x05, 0x00]);

    let mut client = gateway.connect().await;
    assert_eq!(greet(&mut client, &[0x02]).await, [0x05, 0xFF]);
    assert!(read_to_close(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_no_auth_uses_socks5_channel() {
    let (rule_proxy, mut rule_requests) = spawn_connect_proxy().await;
    let (socks5_proxy, mut socks5_requests) = spawn_connect_proxy().await;
    let gateway = TestGateway::start(&routing_config(rule_proxy, socks5_proxy)).await;

    let mut client = gateway.connect().await;
    assert_eq!(greet(&mut client, &[0x00]).await, [0x05, 0x00]);
    client
        .write_all(&domain_request("foo.bar", 443, false))
        .await
        .unwrap();

    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, SUCCESS_REPLY);

    let seen = socks5_requests.recv().await.unwrap();
    assert!(seen.starts_with("CONNECT foo.bar:443 HTTP/1.1\r\n"));
    assert!(rule_requests.try_recv().is_err());

    // Plain relay through the mock proxy's echo
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    // The SOCKS5 channel never touches the domain cache
    assert!(gateway.router.cached("foo.bar").is_none());
}

#[tokio::test]
async fn test_obfuscated_uses_domain_rules() {
    let (rule_proxy, mut rule_requests) = spawn_connect_proxy().await;
    let (socks5_proxy, mut socks5_requests) = spawn_connect_proxy().await;
    let gateway = TestGateway::start(&routing_config(rule_proxy, socks5_proxy)).await;

    let mut client = gateway.connect().await;
    assert_eq!(greet(&mut client, &[0x00, 0x81]).await, [0x05, 0x81]);
    client
        .write_all(&domain_request("foo.bar", 443, true))
        .await
        .unwrap();

    // The CONNECT reply itself is not obfuscated
    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, SUCCESS_REPLY);

    let seen = rule_requests.recv().await.unwrap();
    assert!(seen.starts_with("CONNECT foo.bar:443 HTTP/1.1\r\n"));
    assert!(socks5_requests.try_recv().is_err());

    // Everything after the reply is complemented on the client side
    client.write_all(&complement(b"ping")).await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf.to_vec(), complement(b"ping"));

    assert_eq!(gateway.router.cached("foo.bar").unwrap().name(), "rule");
}

#[tokio::test]
async fn test_ipv4_request_relays() {
    let echo = spawn_echo_server().await;
    let gateway = TestGateway::start(
        r#"{
            "socks5": { "name": "socks5", "type": "direct" },
            "default": { "name": "direct", "type": "direct" }
        }"#,
    )
    .await;

    let mut client = gateway.connect().await;
    assert_eq!(greet(&mut client, &[0x00]).await, [0x05, 0x00]);

    let mut request = vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1];
    request.extend_from_slice(&echo.port().to_be_bytes());
    client.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, SUCCESS_REPLY);

    client.write_all(b"data").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"data");
}

#[tokio::test]
async fn test_failure_reply_echoes_request() {
    let port = closed_port().await;
    let gateway = TestGateway::start(&format!(
        r#"{{
            "socks5": {{ "name": "socks5", "type": "socks5", "addr": "127.0.0.1:{port}" }},
            "default": {{ "name": "direct", "type": "direct" }}
        }}"#
    ))
    .await;

    let mut client = gateway.connect().await;
    assert_eq!(greet(&mut client, &[0x00]).await, [0x05, 0x00]);

    let request = domain_request("example.com", 8443, false);
    client.write_all(&request).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), read_to_close(&mut client))
        .await
        .unwrap();
    let mut expected = request.clone();
    expected[1] = 0x01;
    assert_eq!(received, expected);
}

#[tokio::test]
async fn test_unsupported_command_dropped() {
    let gateway = TestGateway::start(
        r#"{
            "socks5": { "name": "socks5", "type": "direct" },
            "default": { "name": "direct", "type": "direct" }
        }"#,
    )
    .await;

    let mut client = gateway.connect().await;
    assert_eq!(greet(&mut client, &[0x00]).await, [0x05, 0x00]);

    // BIND
    let mut request = domain_request("example.com", 80, false);
    request[1] = 0x02;
    client.write_all(&request).await.unwrap();

    assert!(read_to_close(&mut client).await.is_empty());
}
