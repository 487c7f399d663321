use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::error::Result;
use crate::events::{RenderEvent, sse_event};
use crate::markdown::process_markdown;
use crate::surface::{RenderSurface, wrap_fragment};
use crate::typing::TypingConfig;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let body_limit = state.config.server.max_body_bytes;
    let static_dir = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/render", post(api_render))
        .route("/api/preview", post(api_preview))
        .route("/api/render/stream", get(api_render_stream))
        .nest_service("/static", static_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        // Bounds the time to produce response headers; SSE bodies may run longer.
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> Result<()> {
    info!(
        name: "typing.config.loaded",
        duration_ms = config.typing.duration_ms,
        fps = config.typing.fps,
        "Typing configuration loaded"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = router(AppState {
        config: Arc::clone(&config),
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Generate the HTML shell for the application.
fn html_shell(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} - Markdown Stream</title>

    <!-- HTMX -->
    <script src="https://unpkg.com/htmx.org@2.0.8" crossorigin="anonymous"></script>

    <!-- Web Components bundle -->
    <script type="module" src="/static/main.js"></script>
    <link rel="stylesheet" href="/static/app.css">
</head>
<body>
    <main id="app">
        {content}
    </main>
</body>
</html>"#
    )
}

/// Preview page content.
fn preview_content() -> &'static str {
    r##"
    <form hx-post="/api/preview" hx-target="#preview" hx-trigger="input changed delay:150ms from:textarea, submit">
        <textarea name="markdown" rows="8" placeholder="Type some markdown..."></textarea>
        <button type="submit">Render</button>
    </form>
    <section id="preview" aria-live="polite"></section>
    <markdown-content stream="/api/render/stream?text=Hello%20**world**%2C%20this%20is%20typed%20out.&chunk_size=6&chunk_delay_ms=40"></markdown-content>
    "##
}

/// Index page handler.
async fn index_handler() -> impl IntoResponse {
    Html(html_shell("Preview", preview_content()))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for the render API.
#[derive(Debug, Deserialize)]
struct RenderRequest {
    /// Markdown source, complete or partial.
    markdown: String,
}

/// Response from the render API.
#[derive(Debug, Serialize)]
struct RenderResponse {
    /// Sanitized HTML.
    html: String,
}

/// POST /api/render - Render markdown to sanitized HTML in one shot.
async fn api_render(Json(req): Json<RenderRequest>) -> Json<RenderResponse> {
    tracing::debug!(markdown_length = req.markdown.len(), "Rendering markdown");
    Json(RenderResponse {
        html: process_markdown(&req.markdown),
    })
}

/// POST /api/preview - Render a form field into the widget container (HTMX fragment).
async fn api_preview(Form(req): Form<RenderRequest>) -> Html<String> {
    Html(wrap_fragment(&process_markdown(&req.markdown), false))
}

/// Query parameters for the render stream endpoint.
#[derive(Debug, Deserialize)]
struct StreamQuery {
    /// Full message text.
    text: String,
    /// Characters per simulated delta; the whole text when absent.
    #[serde(default)]
    chunk_size: Option<usize>,
    /// Pause between deltas.
    #[serde(default)]
    chunk_delay_ms: Option<u64>,
    /// Per-stream typing duration override.
    #[serde(default)]
    duration_ms: Option<u64>,
    /// Per-stream frame rate override.
    #[serde(default)]
    fps: Option<u32>,
}

impl StreamQuery {
    fn typing_config(&self, defaults: TypingConfig) -> Result<TypingConfig> {
        TypingConfig::new(
            self.duration_ms.unwrap_or(defaults.duration_ms),
            self.fps.unwrap_or(defaults.fps),
        )
    }
}

/// Split `text` into deltas of `size` characters.
fn chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut out = Vec::new();
    let mut start = 0;
    for (count, (idx, _)) in text.char_indices().enumerate() {
        if count > 0 && count % size == 0 {
            out.push(&text[start..idx]);
            start = idx;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// GET /api/render/stream - SSE stream of typed-out render frames.
///
/// The text is fed to a fresh [`RenderSurface`] in deltas, the way an agent
/// stream would deliver it, and every published frame is forwarded.
async fn api_render_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let typing = match query.typing_config(state.config.typing) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected render stream");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let request_id = uuid::Uuid::new_v4().to_string();
    let total_chars = query.text.chars().count();

    tracing::info!(
        name: "render.stream.start",
        request_id = %request_id,
        total_chars,
        chunk_size = ?query.chunk_size,
        duration_ms = typing.duration_ms,
        fps = typing.fps,
        "Starting render stream"
    );

    let sse_stream = async_stream::stream! {
        yield Ok::<String, std::convert::Infallible>(sse_event(&RenderEvent::Start {
            request_id: request_id.clone(),
            total_chars,
        }));

        let surface = RenderSurface::with_config(typing);
        let mut frames = surface.subscribe();
        surface.set_streaming(true);

        let size = query.chunk_size.unwrap_or(total_chars);
        let delay = Duration::from_millis(query.chunk_delay_ms.unwrap_or(0));
        let mut fed = String::with_capacity(query.text.len());

        for delta in chunks(&query.text, size) {
            fed.push_str(delta);
            surface.set_content(fed.clone());

            let pause = tokio::time::sleep(delay);
            tokio::pin!(pause);
            loop {
                let changed = tokio::select! {
                    () = &mut pause => false,
                    changed = frames.changed() => changed.is_ok(),
                };
                if !changed {
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                yield Ok(sse_event(&RenderEvent::Frame(frame)));
            }
        }

        surface.set_streaming(false);

        loop {
            let frame = frames.borrow_and_update().clone();
            let finished = frame.complete && !frame.streaming;
            yield Ok(sse_event(&RenderEvent::Frame(frame.clone())));
            if finished {
                tracing::info!(
                    name: "render.stream.done",
                    request_id = %request_id,
                    html_length = frame.html.len(),
                    "Render stream complete"
                );
                yield Ok(sse_event(&RenderEvent::Done {
                    request_id: request_id.clone(),
                    html: frame.html,
                }));
                break;
            }
            if frames.changed().await.is_err() {
                yield Ok(sse_event(&RenderEvent::Error {
                    message: "render surface closed".to_string(),
                }));
                break;
            }
        }
    };

    let body = axum::body::Body::from_stream(sse_stream);
    build_sse_response(body)
}

fn build_sse_response(body: axum::body::Body) -> Response {
    let mut resp = Response::new(body);
    let h = resp.headers_mut();
    h.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    h.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    h.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    h.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    resp
}
