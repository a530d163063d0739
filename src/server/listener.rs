//! HTTP/WebSocket listener and server main loop

use super::connection::serve_socket;
use crate::config::Config;
use crate::relay::Relay;
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Chat page served when no page file is configured
const BUILTIN_PAGE: &str = include_str!("../../static/chat.html");

/// Per-request state shared by the HTTP handler
#[derive(Clone)]
struct AppState {
    relay: Arc<Relay>,
    page: Option<Arc<PathBuf>>,
    max_message_size: usize,
    outbound_queue: usize,
}

/// Bound chat server, ready to run
pub struct RelayServer {
    listener: TcpListener,
    relay: Arc<Relay>,
    state: AppState,
}

impl RelayServer {
    /// Bind the listening socket. This is the only fatal startup step.
    pub async fn bind(config: &Config) -> Result<Self> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        let relay = Arc::new(Relay::new(config.delivery.policy()));
        let state = AppState {
            relay: Arc::clone(&relay),
            page: config.server.page.clone().map(Arc::new),
            max_message_size: config.server.max_message_size,
            outbound_queue: config.delivery.outbound_queue,
        };

        Ok(Self {
            listener,
            relay,
            state,
        })
    }

    /// Address actually bound, useful when binding port 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared relay state
    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Serve until a shutdown signal arrives
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!("Server listening on {}", addr);

        let app = build_router(self.state);

        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

fn build_router(state: AppState) -> Router {
    Router::new().fallback(handle_request).with_state(state)
}

/// Upgrade WebSocket requests on any path; otherwise serve the chat page
async fn handle_request(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    uri: Uri,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => {
            let relay = Arc::clone(&state.relay);
            let queue = state.outbound_queue;
            ws.max_message_size(state.max_message_size)
                .on_upgrade(move |socket| serve_socket(socket, peer, relay, queue))
        }
        Err(_) if uri.path() == "/" => {
            serve_page(state.page.as_deref().map(PathBuf::as_path)).await
        }
        Err(_) => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_page(page: Option<&Path>) -> Response {
    let Some(path) = page else {
        return (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            BUILTIN_PAGE,
        )
            .into_response();
    };

    match tokio::fs::read(path).await {
        Ok(content) => {
            let content_type = mime_guess::from_path(path)
                .first()
                .map(|mime| mime.to_string())
                .unwrap_or_else(|| "text/html".to_string());
            ([(header::CONTENT_TYPE, content_type)], content).into_response()
        }
        Err(e) => {
            tracing::warn!("Failed to read chat page {:?}: {}", path, e);
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            (
                StatusCode::NOT_FOUND,
                format!("404 Not Found: {} is missing.", name),
            )
                .into_response()
        }
    }
}

/// Log the URLs clients can open
pub fn log_addresses(port: u16) {
    tracing::info!("Open your browser to:");
    tracing::info!("  http://localhost:{}  (for this computer)", port);
    match local_ip_address::local_ip() {
        Ok(ip) => tracing::info!(
            "  http://{}:{}  (for other devices on the same network)",
            ip,
            port
        ),
        Err(e) => tracing::info!("Could not determine local IP for other devices: {}", e),
    }
}
