//! SOCKS5 inbound handler
//!
//! RFC 1928 CONNECT with two accepted methods:
//!
//! - `0x00` (no authentication): routed through the dedicated SOCKS5 channel,
//!   bypassing the domain rules.
//! - `0x81` (obfuscated): the domain in the request is complemented, the
//!   destination is routed through the rules, and every byte after the
//!   CONNECT reply is complemented in both directions.
//!
//! When both are offered `0x81` wins.

use std::net::{Ipv4Addr, Ipv6Addr};

use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::{ClientStream, Destination, Session};
use crate::error::{GatewayError, InboundError};
use crate::io::{complement_in_place, XorStream};
use crate::outbound::socks5_common::{
    ATYP_DOMAIN, ATYP_IPV4, ATYP_IPV6, AUTH_METHOD_NONE, AUTH_METHOD_NO_ACCEPTABLE,
    AUTH_METHOD_OBFUSCATED, CMD_CONNECT, CONNECT_REPLY_SUCCESS, IPV4_ADDR_SIZE, IPV6_ADDR_SIZE,
    REPLY_GENERAL_FAILURE, SOCKS5_VERSION,
};
use crate::rules::ChannelRouter;

/// Pick a method from the client's offer
///
/// `0x00` is taken tentatively; `0x81` is taken as soon as it is seen.
#[must_use]
pub fn select_method(offered: &[u8]) -> Option<u8> {
    let mut selected = None;
    for &method in offered {
        match method {
            AUTH_METHOD_OBFUSCATED => return Some(AUTH_METHOD_OBFUSCATED),
            AUTH_METHOD_NONE => selected = Some(AUTH_METHOD_NONE),
            _ => {}
        }
    }
    selected
}

/// Read the greeting and answer it, returning the selected method
async fn negotiate<S>(client: &mut S) -> Result<u8, InboundError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 2];
    client.read_exact(&mut header).await?;
    if header[0] != SOCKS5_VERSION {
        return Err(InboundError::protocol(format!(
            "unsupported SOCKS version: {}",
            header[0]
        )));
    }

    let mut methods = vec![0u8; usize::from(header[1])];
    client.read_exact(&mut methods).await?;

    let Some(method) = select_method(&methods) else {
        debug!("SOCKS5 no acceptable method in {:02x?}", methods);
        client
            .write_all(&[SOCKS5_VERSION, AUTH_METHOD_NO_ACCEPTABLE])
            .await?;
        client.flush().await?;
        return Err(InboundError::NoAcceptableMethod);
    };

    client.write_all(&[SOCKS5_VERSION, method]).await?;
    client.flush().await?;
    Ok(method)
}

/// Read a CONNECT request
///
/// Returns the destination and the request bytes exactly as they arrived,
/// which become the failure reply.
async fn read_request<S>(
    client: &mut S,
    method: u8,
) -> Result<(Destination, Vec<u8>), InboundError>
where
    S: AsyncBufRead + Unpin,
{
    let mut request = vec![0u8; 4];
    client.read_exact(&mut request).await?;

    if request[1] != CMD_CONNECT {
        return Err(InboundError::UnsupportedCommand(request[1]));
    }

    let host = match request[3] {
        ATYP_IPV4 => {
            let mut octets = [0u8; IPV4_ADDR_SIZE];
            client.read_exact(&mut octets).await?;
            request.extend_from_slice(&octets);
            Ipv4Addr::from(octets).to_string()
        }
        ATYP_IPV6 => {
            let mut octets = [0u8; IPV6_ADDR_SIZE];
            client.read_exact(&mut octets).await?;
            request.extend_from_slice(&octets);
            Ipv6Addr::from(octets).to_string()
        }
        ATYP_DOMAIN => {
            let len = client.read_u8().await?;
            let mut raw = vec![0u8; usize::from(len)];
            client.read_exact(&mut raw).await?;
            request.push(len);
            request.extend_from_slice(&raw);

            if method == AUTH_METHOD_OBFUSCATED {
                complement_in_place(&mut raw);
            }
            String::from_utf8(raw)
                .map_err(|_| InboundError::protocol("SOCKS5 domain is not UTF-8"))?
        }
        other => return Err(InboundError::UnsupportedAddressType(other)),
    };

    let mut port = [0u8; 2];
    client.read_exact(&mut port).await?;
    request.extend_from_slice(&port);

    Ok((Destination::new(host, u16::from_be_bytes(port)), request))
}

/// Handle a SOCKS5 session up to the CONNECT reply
///
/// # Errors
///
/// Returns `GatewayError::Inbound` for protocol violations (after answering
/// `0xFF` when no method is acceptable) and `GatewayError::Outbound` when the
/// channel cannot reach the destination, after sending the failure reply.
pub async fn handle<S>(mut client: S, router: &ChannelRouter) -> Result<Session<S>, GatewayError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let method = negotiate(&mut client).await?;
    let (destination, mut request) = read_request(&mut client, method).await?;

    let channel = if method == AUTH_METHOD_NONE {
        router.socks5_channel()
    } else {
        router.resolve(&destination.host)
    };
    debug!(
        "SOCKS5 {} (method 0x{:02x}) via channel '{}'",
        destination,
        method,
        channel.name()
    );

    let peer = match channel.connect(&destination.host, destination.port).await {
        Ok(peer) => peer,
        Err(e) => {
            request[1] = REPLY_GENERAL_FAILURE;
            if let Err(write_err) = client.write_all(&request).await {
                warn!("SOCKS5 failure reply to client not sent: {}", write_err);
            } else if let Err(flush_err) = client.flush().await {
                warn!("SOCKS5 failure reply to client not sent: {}", flush_err);
            }
            return Err(e.into());
        }
    };

    client
        .write_all(&CONNECT_REPLY_SUCCESS)
        .await
        .map_err(InboundError::from)?;
    client.flush().await.map_err(InboundError::from)?;

    let client = if method == AUTH_METHOD_OBFUSCATED {
        ClientStream::Obfuscated(XorStream::new(client))
    } else {
        ClientStream::Plain(client)
    };

    Ok(Session {
        client,
        peer,
        destination,
        channel,
    })
}
