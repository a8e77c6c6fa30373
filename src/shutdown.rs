//! Graceful shutdown trigger for `axum::serve`.

use std::{future::Future, io};

/// Resolves on Ctrl-C.
pub async fn signal() {
    wait_for(tokio::signal::ctrl_c()).await
}

/// Resolves once `signal` fires. If the handler could not be installed the
/// error is logged and this never resolves, so the server keeps running.
async fn wait_for(signal: impl Future<Output = io::Result<()>>) {
    match signal.await {
        Ok(()) => tracing::info!("shutting down"),
        Err(err) => {
            tracing::error!(error = %err, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}
