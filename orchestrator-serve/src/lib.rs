//! Thin HTTP/SSE adapter in front of the orchestrator core (§6 "Inbound
//! HTTP"). Owns no orchestration logic: every handler either spawns a core
//! task or reads from the keyed store through [`orchestrator_core::Context`].

mod app;
mod chat;
mod error;
mod sessions;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use orchestrator_core::{Context, PersonaConfig};

pub use app::{router, AppState};
pub use error::ServeError;

/// Binds `addr` and serves the adapter until the process is killed.
pub async fn run_serve(
    ctx: Context,
    persona: PersonaConfig,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "HTTP adapter listening");
    run_serve_on_listener(listener, ctx, persona).await
}

/// Same as [`run_serve`] but against an existing listener, for tests that
/// bind to `127.0.0.1:0` and inspect the assigned port.
pub async fn run_serve_on_listener(
    listener: TcpListener,
    ctx: Context,
    persona: PersonaConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = Arc::new(AppState { ctx, persona });
    let router = app::router(state);
    axum::serve(listener, router).await?;
    Ok(())
}
