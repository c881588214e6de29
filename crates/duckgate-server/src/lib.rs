pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use anyhow::Result;
use tokio::net::TcpListener;

pub use routes::{build_router, AppState, InnerAppState};

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = routes::build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler available; run until the process is killed
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
