//! JSON front end over the record store.

pub mod handlers;
pub mod listing;
pub mod router;
pub mod state;
pub mod utils;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use state::SharedState;

/// Serve the API on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: SharedState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router::build_router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Shutting down web server");
        })
        .await
        .context("web server failed")
}
