//! Landing page: a single HTML uploader that talks to the WebSocket server.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
};

const INDEX_HTML: &str = include_str!("index.html");

fn hardening_headers() -> [(header::HeaderName, &'static str); 3] {
    [
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::REFERRER_POLICY, "no-referrer"),
    ]
}

/// Fills the page template with the WebSocket endpoint it should dial.
pub fn render_index(ws_port: u16, ws_path: &str) -> String {
    INDEX_HTML
        .replace("{{WS_PORT}}", &ws_port.to_string())
        .replace("{{WS_PATH}}", ws_path)
}

pub async fn serve_index(State(page): State<Arc<str>>) -> impl IntoResponse {
    (hardening_headers(), Html(page.to_string()))
}

/// Builds the landing page router.
pub fn router(ws_port: u16, ws_path: &str) -> Router {
    let page: Arc<str> = render_index(ws_port, ws_path).into();
    Router::new()
        .route("/", get(serve_index))
        .route("/health", get(|| async { "OK" }))
        .with_state(page)
}
