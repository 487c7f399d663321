use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use markdown_stream_wc::{
    AppState,
    config::{AppConfig, ServerConfig},
    server::router,
    typing::TypingConfig,
};
use serde_json::Value;
use tower::ServiceExt;

fn app() -> Router {
    let config = AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            static_dir: "static".to_string(),
            request_timeout_secs: 5,
            max_body_bytes: 64 * 1024,
        },
        typing: TypingConfig::default(),
    };
    router(AppState {
        config: Arc::new(config),
    })
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

/// Split an SSE body into `(event, data)` pairs.
fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let mut name = String::new();
            let mut data = Value::Null;
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event: ") {
                    name = rest.to_string();
                } else if let Some(rest) = line.strip_prefix("data: ") {
                    data = serde_json::from_str(rest).expect("data should be json");
                }
            }
            (name, data)
        })
        .collect()
}

#[tokio::test]
async fn test_index_serves_preview_form() {
    let response = app()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("hx-post=\"/api/preview\""));
    assert!(body.contains("id=\"preview\""));
}

#[tokio::test]
async fn test_render_api_returns_sanitized_html() {
    let request = Request::post("/api/render")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"markdown":"I'm **thinking"}"#,
        ))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["html"], "<p>I'm <strong>thinking</strong></p>");
}

#[tokio::test]
async fn test_render_api_strips_script() {
    let request = Request::post("/api/render")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"markdown":"<script>alert(1)</script>\n\nsafe"}"#,
        ))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    let html = json["html"].as_str().unwrap();
    assert!(!html.contains("script"));
    assert!(!html.contains("alert"));
    assert!(html.contains("<p>safe</p>"));
}

#[tokio::test]
async fn test_preview_returns_fragment() {
    let request = Request::post("/api/preview")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("markdown=%2A%2Abold%2A%2A"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "<div part=\"markdown-content\" class=\"markdown-content\"><p><strong>bold</strong></p></div>"
    );
}

#[tokio::test]
async fn test_render_stream_types_out_message() {
    let request = Request::get(
        "/api/render/stream?text=%2A%2Abold%2A%2A&duration_ms=80&fps=100",
    )
    .body(Body::empty())
    .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let events = parse_sse(&body_text(response).await);
    assert_eq!(events.first().unwrap().0, "render.start");
    assert_eq!(events.first().unwrap().1["total_chars"], 8);

    let (last_name, last_data) = events.last().unwrap();
    assert_eq!(last_name, "render.done");
    assert_eq!(last_data["html"], "<p><strong>bold</strong></p>");

    let frames: Vec<&Value> = events
        .iter()
        .filter(|(name, _)| name == "render.frame")
        .map(|(_, data)| data)
        .collect();
    assert!(!frames.is_empty());
    let final_frame = frames.last().unwrap();
    assert_eq!(final_frame["complete"], true);
    assert_eq!(final_frame["streaming"], false);
    assert_eq!(final_frame["revealed_chars"], 8);
}

#[tokio::test]
async fn test_render_stream_chunked_is_monotonic() {
    let request = Request::get(
        "/api/render/stream?text=Hello%20%2A%2Aworld%2A%2A%20and%20more&chunk_size=4&chunk_delay_ms=5&duration_ms=60&fps=100",
    )
    .body(Body::empty())
    .unwrap();
    let response = app().oneshot(request).await.unwrap();
    let events = parse_sse(&body_text(response).await);

    let revealed: Vec<u64> = events
        .iter()
        .filter(|(name, _)| name == "render.frame")
        .map(|(_, data)| data["revealed_chars"].as_u64().unwrap())
        .collect();
    assert!(revealed.windows(2).all(|w| w[0] <= w[1]));

    let (last_name, last_data) = events.last().unwrap();
    assert_eq!(last_name, "render.done");
    assert_eq!(
        last_data["html"],
        "<p>Hello <strong>world</strong> and more</p>"
    );
}

#[tokio::test]
async fn test_render_stream_rejects_zero_fps() {
    let request = Request::get("/api/render/stream?text=hi&fps=0")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("fps"));
}
