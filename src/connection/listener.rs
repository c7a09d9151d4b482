//! Accept loop
//!
//! One task per accepted connection, no connection limit. Accept errors are
//! logged and the loop keeps going; only the shutdown token stops it.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::dispatcher::handle_connection;
use super::stats::ConnectionStats;
use crate::rules::ChannelRouter;

/// Accept connections on `listener` until `shutdown` is cancelled
///
/// Connections already being relayed keep running after the loop returns.
pub async fn run_accept_loop(
    listener: TcpListener,
    router: Arc<ChannelRouter>,
    stats: Arc<ConnectionStats>,
    shutdown: CancellationToken,
) {
    match listener.local_addr() {
        Ok(addr) => info!("Accepting connections on {}", addr),
        Err(e) => warn!("Accepting connections on unknown address: {}", e),
    }

    loop {
        let (stream, client_addr) = tokio::select! {
            () = shutdown.cancelled() => {
                info!("Accept loop stopping due to shutdown");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    continue;
                }
            },
        };

        stats.record_accepted();
        let router = Arc::clone(&router);
        let stats = Arc::clone(&stats);
        let span = tracing::info_span!("connection", client = %client_addr);

        tokio::spawn(
            async move {
                match handle_connection(stream, &router).await {
                    Ok(result) => stats.record_completed(&result),
                    Err(e) => {
                        stats.record_error();
                        if e.is_disconnect() {
                            debug!("Client went away: {}", e);
                        } else {
                            warn!("Connection dropped: {}", e);
                        }
                    }
                }
            }
            .instrument(span),
        );
    }
}
