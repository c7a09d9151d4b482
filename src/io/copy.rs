//! Bidirectional relay between a client and its upstream peer
//!
//! The peer-to-client direction runs in its own task while the
//! client-to-peer direction runs on the caller's task. Whichever direction
//! finishes first (EOF or error) cancels the other, and both streams are
//! dropped together, so each connection is closed exactly once.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default relay buffer size per direction (32 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Result of a relay session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyResult {
    /// Bytes transferred from client to upstream
    pub client_to_upstream: u64,
    /// Bytes transferred from upstream to client
    pub upstream_to_client: u64,
}

impl CopyResult {
    /// Total bytes transferred in both directions
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.client_to_upstream + self.upstream_to_client
    }
}

/// Copy from `reader` to `writer` until EOF, counting bytes as they are written
async fn pipe<R, W>(reader: &mut R, writer: &mut W, transferred: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            writer.flush().await?;
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        *transferred += n as u64;
    }
}

/// Relay bytes between `client` and `peer` until either side ends
///
/// Takes ownership of both streams; they are closed when this returns.
/// Transfer errors end the session and are logged, not returned.
pub async fn relay<C, P>(client: C, peer: P) -> CopyResult
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    P: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut peer_rd, mut peer_wr) = tokio::io::split(peer);
    let done = CancellationToken::new();

    let downstream_done = done.clone();
    let downstream = tokio::spawn(async move {
        let mut transferred = 0u64;
        tokio::select! {
            res = pipe(&mut peer_rd, &mut client_wr, &mut transferred) => {
                if let Err(e) = res {
                    debug!("upstream->client transfer error: {}", e);
                }
                downstream_done.cancel();
            }
            () = downstream_done.cancelled() => {}
        }
        trace!("upstream->client finished after {} bytes", transferred);
        (transferred, peer_rd, client_wr)
    });

    let mut result = CopyResult::default();
    tokio::select! {
        res = pipe(&mut client_rd, &mut peer_wr, &mut result.client_to_upstream) => {
            if let Err(e) = res {
                debug!("client->upstream transfer error: {}", e);
            }
            done.cancel();
        }
        () = done.cancelled() => {}
    }

    match downstream.await {
        Ok((transferred, peer_rd, client_wr)) => {
            result.upstream_to_client = transferred;
            // Both halves of each stream go out of scope together here.
            drop((client_rd, client_wr));
            drop((peer_rd, peer_wr));
        }
        Err(e) => debug!("upstream->client task failed: {}", e),
    }

    result
}
