//! Development server: static files from the output root plus live reload.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use kiln_pipeline::{PathTableError, PipelineContext, TaskTable};

use crate::orchestrator::WatchOrchestrator;
use crate::reload::{inject_client, reload_client_script, ReloadHub, ReloadMessage, SCRIPT_PATH, SOCKET_PATH};
use crate::watcher::FileWatcher;

/// Configuration for the development server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Output directory {0} does not exist; run a build first")]
    MissingOutput(PathBuf),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("File watch error: {0}")]
    Watch(#[source] io::Error),

    #[error(transparent)]
    Paths(#[from] PathTableError),

    #[error("Server error: {0}")]
    Serve(#[source] io::Error),
}

/// Serves the output root, watches the source root, and reloads browsers.
pub struct DevServer {
    config: DevServerConfig,
    ctx: Arc<PipelineContext>,
    tasks: TaskTable,
}

impl DevServer {
    pub fn new(config: DevServerConfig, ctx: Arc<PipelineContext>, tasks: TaskTable) -> Self {
        Self { config, ctx, tasks }
    }

    pub fn config(&self) -> &DevServerConfig {
        &self.config
    }

    /// HTTP routes: the reload socket, its client script, and every file under the output root.
    ///
    /// HTML responses get the client script injected.
    pub fn router(&self, hub: ReloadHub) -> Router {
        Router::new()
            .route(SOCKET_PATH, get(ws_handler))
            .route(SCRIPT_PATH, get(script_handler))
            .fallback_service(ServeDir::new(self.ctx.output_dir()))
            .layer(middleware::map_response(inject_reload))
            .layer(CorsLayer::permissive())
            .with_state(hub)
    }

    /// Start watching and serving. Runs until the listener fails.
    pub async fn start(self) -> Result<(), ServerError> {
        let output_dir = self.ctx.output_dir();
        if !output_dir.is_dir() {
            return Err(ServerError::MissingOutput(output_dir));
        }

        let hub = ReloadHub::new();
        let orchestrator = WatchOrchestrator::new(Arc::clone(&self.ctx), self.tasks.clone())?
            .with_notifier(hub.clone());

        let (watcher, rx) =
            FileWatcher::new(&orchestrator.watch_roots()).map_err(ServerError::Watch)?;

        tokio::spawn(async move {
            orchestrator.run(rx).await;
            // Keep watcher alive
            drop(watcher);
        });

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        let url = format!("http://{}", addr);
        tracing::info!("Serving {} at {}", output_dir.display(), url);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Could not open browser: {}", e);
            }
        }

        axum::serve(listener, self.router(hub))
            .await
            .map_err(ServerError::Serve)
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        let msg = match rx.recv().await {
            Ok(msg) => msg,
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!("Reload client lagged by {} messages", missed);
                ReloadMessage::Reload
            }
            Err(RecvError::Closed) => break,
        };

        if send(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

async fn script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        reload_client_script(),
    )
}

/// Add the reload client to successful HTML responses.
async fn inject_reload(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));

    if !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read response body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_client(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}
