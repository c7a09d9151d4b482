//! Per-connection dispatch
//!
//! Reads the first bytes of an accepted connection, hands it to the matching
//! inbound handler and relays the resulting session until either side closes.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tracing::info;

use crate::error::{GatewayError, InboundError};
use crate::inbound::{
    http_connect, http_proxy, socks5, InboundProtocol, Session, DETECT_LEN, MAX_LINE_LEN,
};
use crate::io::{relay, CopyResult, PrefixedStream};
use crate::rules::ChannelRouter;

/// Handle one client connection from first byte to close
///
/// # Errors
///
/// Returns the error that ended the connection before the relay started.
/// Errors during the relay only end the session and are not returned.
pub async fn handle_connection<S>(
    mut stream: S,
    router: &ChannelRouter,
) -> Result<CopyResult, GatewayError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut head = [0u8; DETECT_LEN];
    stream
        .read_exact(&mut head)
        .await
        .map_err(InboundError::from)?;
    let protocol = InboundProtocol::detect(&head)?;

    let client = BufReader::with_capacity(
        MAX_LINE_LEN,
        PrefixedStream::new(Bytes::copy_from_slice(&head), stream),
    );

    let session = match protocol {
        InboundProtocol::HttpConnect => http_connect::handle(client, router).await?,
        InboundProtocol::HttpProxy => http_proxy::handle(client, router).await?,
        InboundProtocol::Socks5 => socks5::handle(client, router).await?,
    };

    let Session {
        client,
        peer,
        destination,
        channel,
    } = session;

    info!(
        "{} {} via '{}' ({}{})",
        protocol,
        destination,
        channel.name(),
        peer.upstream(),
        if client.is_obfuscated() { ", obfuscated" } else { "" }
    );

    let result = relay(client, peer.into_stream()).await;

    info!(
        "Closed {}: {} up / {} down bytes",
        destination, result.client_to_upstream, result.upstream_to_client
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelDefinition;
    use crate::outbound::Channel;
    use crate::rules::RoutingTable;
    use std::sync::Arc;
    use tokio::io::{duplex, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn direct_router() -> ChannelRouter {
        let channel = |name: &str| {
            Arc::new(Channel::from_definition(ChannelDefinition::direct(name)).unwrap())
        };
        ChannelRouter::new(RoutingTable::new(
            Vec::new(),
            channel("socks5"),
            channel("direct"),
        ))
    }

    #[tokio::test]
    async fn test_unknown_protocol_dropped() {
        let router = direct_router();
        let (server, mut client) = duplex(64);
        client.write_all(&[0x16, 0x03, 0x01, 0x00]).await.unwrap();

        let result = handle_connection(server, &router).await;
        assert!(matches!(
            result,
            Err(GatewayError::Inbound(InboundError::UnknownProtocol(0x16)))
        ));

        // No response, just close
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_short_connection() {
        let router = direct_router();
        let (server, mut client) = duplex(64);
        client.write_all(b"CO").await.unwrap();
        client.shutdown().await.unwrap();

        let result = handle_connection(server, &router).await;
        assert!(result.as_ref().is_err_and(GatewayError::is_disconnect));
    }

    #[tokio::test]
    async fn test_http_connect_relay() {
        let origin = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = origin.local_addr().unwrap().port();
        let echo = tokio::spawn(async move {
            let (mut conn, _) = origin.accept().await.unwrap();
            let mut buf = [0u8; 4];
            conn.read_exact(&mut buf).await.unwrap();
            conn.write_all(&buf).await.unwrap();
        });

        let router = direct_router();
        let (server, mut client) = duplex(1024);
        let task = tokio::spawn(async move { handle_connection(server, &router).await });

        let request = format!("CONNECT 127.0.0.1:{port} HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\n\r\n");
        client.write_all(request.as_bytes()).await.unwrap();

        let mut reply = vec![0u8; http_connect::CONNECT_ESTABLISHED.len()];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, http_connect::CONNECT_ESTABLISHED);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        echo.await.unwrap();
        drop(client);
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.client_to_upstream, 4);
        assert_eq!(result.upstream_to_client, 4);
    }
}
