pub mod handlers;
pub mod telegram_update;

use crate::core::{IntakeService, WorkflowEngine};
use crate::utils::error::Result;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// 所有 handler 共用的狀態
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub intake: Arc<IntakeService>,
    pub default_document: Option<String>,
}

impl AppState {
    pub fn new(
        engine: Arc<WorkflowEngine>,
        intake: Arc<IntakeService>,
        default_document: Option<String>,
    ) -> Self {
        Self {
            engine,
            intake,
            default_document,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/telegram", post(handlers::telegram_webhook))
        .route("/api/approve", post(handlers::approve))
        .route(
            "/api/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/api/documents/{document_id}/chapters",
            get(handlers::list_chapters),
        )
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener, state).await
}

/// 在已綁定的 listener 上提供服務，直到 Ctrl-C
pub async fn serve_with_listener(listener: TcpListener, state: AppState) -> Result<()> {
    let local = listener.local_addr()?;
    tracing::info!("🚀 Webhook server listening on http://{}", local);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("⚠️ Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("🛑 Shutting down");
        })
        .await?;
    Ok(())
}
