//! Render surface: the animated markdown view of one message.
//!
//! A [`RenderSurface`] owns the pair of texts behind a single
//! `<markdown-content>` element: the *source* written by the host whenever
//! more of the message is known, and the *revealed* prefix the
//! [`TypingAnimator`] has typed out so far. Every time the revealed text
//! moves, the surface renders it through
//! [`process_markdown`](crate::markdown::process_markdown) and publishes a
//! [`RenderFrame`] on a [`watch`] channel.
//!
//! # Concurrency
//!
//! At most one frame loop runs per surface. The loop is a tokio task that
//! sleeps one frame interval between steps and holds only a [`Weak`]
//! reference to the surface, so dropping the surface mid-animation ends the
//! loop at its next frame. Surfaces share no state with each other.
//!
//! # Example
//!
//! ```rust
//! use markdown_stream_wc::surface::RenderSurface;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let surface = RenderSurface::new();
//! let mut frames = surface.subscribe();
//! surface.set_content("**bold**");
//!
//! loop {
//!     frames.changed().await.unwrap();
//!     if frames.borrow_and_update().complete {
//!         break;
//!     }
//! }
//! assert_eq!(surface.frame().html, "<p><strong>bold</strong></p>");
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::markdown::process_markdown;
use crate::typing::{Step, TypingAnimator, TypingConfig};

/// One published state of the surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Sanitized HTML for the revealed text.
    pub html: String,
    /// Characters revealed so far.
    pub revealed_chars: usize,
    /// Characters in the source text.
    pub total_chars: usize,
    /// The message is still streaming (hosts show a typing cursor).
    pub streaming: bool,
    /// Revealed text equals the source text.
    pub complete: bool,
}

impl RenderFrame {
    /// Wrap the HTML in the widget container element.
    pub fn fragment(&self) -> String {
        wrap_fragment(&self.html, self.streaming)
    }
}

/// Wrap sanitized HTML in the `<markdown-content>` container markup.
pub fn wrap_fragment(html: &str, streaming: bool) -> String {
    let class = if streaming {
        "markdown-content streaming"
    } else {
        "markdown-content"
    };
    format!(r#"<div part="markdown-content" class="{class}">{html}</div>"#)
}

#[derive(Debug)]
struct SurfaceState {
    source: String,
    animator: TypingAnimator,
    streaming: bool,
}

#[derive(Debug)]
struct SurfaceInner {
    state: Mutex<SurfaceState>,
    output: watch::Sender<RenderFrame>,
}

impl SurfaceInner {
    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        // Poisoning is ignored, every frame republishes the whole state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render and publish while the lock is held so frames go out in order.
    fn publish(&self, state: &SurfaceState) {
        let revealed = state.animator.revealed();
        let revealed_chars = state.animator.revealed_chars();
        let total_chars = state.source.chars().count();
        let frame = RenderFrame {
            html: process_markdown(revealed),
            revealed_chars,
            total_chars,
            streaming: state.streaming,
            complete: revealed_chars == total_chars,
        };
        self.output.send_replace(frame);
    }

    /// Run one animation frame. Returns `false` once caught up.
    fn advance(&self) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.animator.step(&state.source) {
            Step::Revealed { chars } => {
                trace!(
                    name: "typing.frame",
                    chars,
                    revealed = state.animator.revealed_chars(),
                    "Typing frame"
                );
                self.publish(state);
                true
            }
            Step::CaughtUp => false,
        }
    }
}

/// Animated, sanitized markdown view of one message.
#[derive(Debug)]
pub struct RenderSurface {
    inner: Arc<SurfaceInner>,
}

impl Default for RenderSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurface {
    /// Create a surface with the default typing configuration.
    pub fn new() -> Self {
        Self::with_config(TypingConfig::default())
    }

    /// Create a surface with its own typing configuration.
    pub fn with_config(config: TypingConfig) -> Self {
        let (output, _) = watch::channel(RenderFrame {
            complete: true,
            ..RenderFrame::default()
        });
        Self {
            inner: Arc::new(SurfaceInner {
                state: Mutex::new(SurfaceState {
                    source: String::new(),
                    animator: TypingAnimator::new(config),
                    streaming: false,
                }),
                output,
            }),
        }
    }

    /// Subscribe to published frames.
    pub fn subscribe(&self) -> watch::Receiver<RenderFrame> {
        self.inner.output.subscribe()
    }

    /// Latest published frame.
    pub fn frame(&self) -> RenderFrame {
        self.inner.output.borrow().clone()
    }

    pub fn config(&self) -> TypingConfig {
        self.inner.lock().animator.config()
    }

    pub fn source_text(&self) -> String {
        self.inner.lock().source.clone()
    }

    pub fn revealed_text(&self) -> String {
        self.inner.lock().animator.revealed().to_string()
    }

    pub fn is_animating(&self) -> bool {
        self.inner.lock().animator.is_animating()
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.lock().streaming
    }

    /// Replace the source text.
    ///
    /// Starts the typing loop if the revealed text differs from the new
    /// source and no loop is running yet. Without a tokio runtime the text
    /// is revealed at once instead.
    pub fn set_content(&self, text: impl Into<String>) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.source = text.into();

        if state.animator.sync(&state.source) {
            debug!(
                name: "surface.source.rewound",
                revealed = state.animator.revealed_chars(),
                "Source no longer extends revealed text"
            );
            self.inner.publish(state);
        }

        if !state.animator.begin(&state.source) {
            return;
        }

        let interval = state.animator.config().frame_interval();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(
                    name: "typing.loop.start",
                    total = state.source.chars().count(),
                    revealed = state.animator.revealed_chars(),
                    "Starting typing loop"
                );
                handle.spawn(type_out(Arc::downgrade(&self.inner), interval));
            }
            Err(_) => {
                warn!(
                    name: "typing.loop.unavailable",
                    "No async runtime, revealing content immediately"
                );
                state.animator.reveal_all(&state.source);
                // Nothing is left to reveal, so this settles the animator to Idle.
                state.animator.step(&state.source);
                self.inner.publish(state);
            }
        }
    }

    /// Set the streaming flag.
    ///
    /// A rising edge marks the start of a new turn and clears both texts.
    pub fn set_streaming(&self, streaming: bool) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if streaming && !state.streaming {
            state.source.clear();
            state.animator.reset();
            debug!(name: "surface.turn.start", "New turn, texts reset");
        }
        state.streaming = streaming;
        self.inner.publish(state);
    }

    /// Clear both texts for a new turn without touching the streaming flag.
    pub fn begin_turn(&self) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.source.clear();
        state.animator.reset();
        self.inner.publish(state);
    }

    /// Skip the animation and show the whole source now.
    pub fn reveal_all(&self) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.animator.reveal_all(&state.source);
        self.inner.publish(state);
    }
}

/// Frame loop: step, publish, sleep, until caught up or the surface is gone.
async fn type_out(surface: Weak<SurfaceInner>, interval: Duration) {
    loop {
        let Some(inner) = surface.upgrade() else {
            debug!(name: "typing.loop.detached", "Surface dropped, typing loop exits");
            return;
        };
        if !inner.advance() {
            debug!(name: "typing.loop.exit", "Typing caught up");
            return;
        }
        drop(inner);
        tokio::time::sleep(interval).await;
    }
}
