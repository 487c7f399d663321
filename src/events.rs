//! Render events published to browser hosts.
//!
//! A render stream is a sequence of [`RenderEvent`]s framed as server-sent
//! events: one `render.start`, any number of `render.frame`, then either
//! `render.done` or `render.error`. The `<markdown-content>` element swaps
//! the `html` of each frame into its shadow root.
//!
//! # Example
//!
//! ```rust
//! use markdown_stream_wc::events::{RenderEvent, sse_event};
//!
//! let event = RenderEvent::Done {
//!     request_id: "req-1".to_string(),
//!     html: "<p>hi</p>".to_string(),
//! };
//! let sse = sse_event(&event);
//! assert!(sse.starts_with("event: render.done\n"));
//! ```

use serde::{Deserialize, Serialize};

use crate::surface::RenderFrame;

/// Events emitted while a message is rendered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum RenderEvent {
    /// A render stream started.
    #[serde(rename = "render.start")]
    Start {
        /// Unique identifier for this stream.
        request_id: String,
        /// Characters the host is going to feed.
        total_chars: usize,
    },

    /// The revealed text moved.
    #[serde(rename = "render.frame")]
    Frame(RenderFrame),

    /// The whole message has been typed out.
    #[serde(rename = "render.done")]
    Done {
        /// Identifier of the finished stream.
        request_id: String,
        /// Final sanitized HTML.
        html: String,
    },

    /// The stream could not be produced.
    #[serde(rename = "render.error")]
    Error {
        /// Human-readable error message.
        message: String,
    },
}

impl RenderEvent {
    /// SSE event name of this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "render.start",
            Self::Frame(_) => "render.frame",
            Self::Done { .. } => "render.done",
            Self::Error { .. } => "render.error",
        }
    }
}

/// Format a [`RenderEvent`] as a server-sent event.
///
/// The data line carries the serialized `data` field; the `type` tag travels
/// in the `event:` field.
pub fn sse_event(evt: &RenderEvent) -> String {
    let payload = match serde_json::to_value(evt) {
        Ok(serde_json::Value::Object(mut map)) => map.remove("data").unwrap_or_default(),
        Ok(other) => other,
        Err(e) => serde_json::json!({ "message": e.to_string() }),
    };

    format!("event: {}\ndata: {payload}\n\n", evt.event_name())
}
