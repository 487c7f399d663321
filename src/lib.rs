//! Streaming Markdown for Web Components
//!
//! The rendering core behind a chat widget's `<markdown-content>` element:
//! partial assistant text is typed out frame by frame, repaired so it still
//! parses, converted to HTML and sanitized before it reaches the document.
//!
//! # Architecture
//!
//! - **Pipeline**: markdown completion → conversion → sanitization
//! - **Animation**: a per-message typing loop that catches up with the stream
//! - **Server**: Axum host with an HTMX preview and an SSE render stream
//!
//! # Modules
//!
//! - [`markdown`]: Completion, conversion and sanitization
//! - [`typing`]: Typing animation state machine
//! - [`surface`]: Animated render surface for one message
//! - [`events`]: Render events and SSE framing
//! - [`server`]: HTTP routes
//! - [`config`]: Layered configuration

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod error;
pub mod events;
pub mod markdown;
pub mod server;
pub mod surface;
pub mod typing;

use crate::config::AppConfig;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
