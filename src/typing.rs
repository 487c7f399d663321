//! Typing animation.
//!
//! The [`TypingAnimator`] reveals a source string a few characters per frame
//! so that text appears to be typed, whether it arrived all at once or in
//! many small stream deltas. Speed is not fixed: each frame spreads the
//! current gap over the frames left in the typing budget, and the budget
//! starts over whenever the source grows. A burst of new text therefore
//! makes the reveal speed up and catch up instead of falling behind.
//!
//! The animator is a plain state machine with no timer of its own; the
//! [`RenderSurface`](crate::surface::RenderSurface) drives it once per frame.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default time budget to type out all buffered content.
pub const DEFAULT_TYPING_DURATION_MS: u64 = 300;

/// Default animation frame rate.
pub const DEFAULT_FPS: u32 = 60;

/// Timing parameters of the typing animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Time (ms) to type out whatever is currently buffered.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Frames per second.
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_duration_ms() -> u64 {
    DEFAULT_TYPING_DURATION_MS
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_TYPING_DURATION_MS,
            fps: DEFAULT_FPS,
        }
    }
}

impl TypingConfig {
    /// Create a validated configuration.
    pub fn new(duration_ms: u64, fps: u32) -> Result<Self> {
        let config = Self { duration_ms, fps };
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters describe a runnable animation.
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(Error::InvalidTyping("fps must be greater than zero".into()));
        }
        if self.fps > 1000 {
            return Err(Error::InvalidTyping(format!(
                "fps must be at most 1000, got {}",
                self.fps
            )));
        }
        Ok(())
    }

    /// Interval between frames (`1000 / fps` ms).
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    /// Number of frames that fit in the typing budget
    /// (`duration_ms / frame_interval_ms`).
    pub fn frame_budget(&self) -> f64 {
        self.duration_ms as f64 * f64::from(self.fps.max(1)) / 1000.0
    }

    /// Characters to reveal this frame.
    ///
    /// `remaining` is the hidden gap, `frames_elapsed` the frames already
    /// spent on the current target. Once less than one frame of budget is
    /// left the whole gap is revealed.
    pub fn chars_per_frame(&self, remaining: usize, frames_elapsed: u32) -> usize {
        let frames_left = self.frame_budget() - f64::from(frames_elapsed);
        if frames_left < 1.0 {
            return remaining.max(1);
        }
        ((remaining as f64 / frames_left).ceil() as usize).max(1)
    }
}

/// Animator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypingState {
    /// Not animating.
    #[default]
    Idle,
    /// A frame loop is extending the revealed text.
    Animating,
}

/// Outcome of a single animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The revealed text grew by `chars` characters.
    Revealed {
        /// Characters added this frame.
        chars: usize,
    },
    /// Revealed text already equals the source; the animator is idle now.
    CaughtUp,
}

/// Incrementally reveals a source string.
///
/// Lengths are counted in `char`s so a frame never splits a code point.
#[derive(Debug, Clone, Default)]
pub struct TypingAnimator {
    config: TypingConfig,
    revealed: String,
    revealed_chars: usize,
    /// Source length the current budget was started for.
    target_chars: usize,
    frames_elapsed: u32,
    state: TypingState,
}

impl TypingAnimator {
    /// Create an idle animator with nothing revealed.
    pub fn new(config: TypingConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> TypingConfig {
        self.config
    }

    pub fn state(&self) -> TypingState {
        self.state
    }

    pub fn is_animating(&self) -> bool {
        self.state == TypingState::Animating
    }

    /// Text revealed so far.
    pub fn revealed(&self) -> &str {
        &self.revealed
    }

    /// Length of the revealed text in characters.
    pub fn revealed_chars(&self) -> usize {
        self.revealed_chars
    }

    /// Try to enter [`TypingState::Animating`].
    ///
    /// Returns `true` only on the Idle→Animating transition, i.e. when the
    /// caller must start a frame loop. While a loop is already running, or
    /// when nothing is left to reveal, returns `false`.
    pub fn begin(&mut self, source: &str) -> bool {
        if self.is_animating() || self.revealed == source {
            return false;
        }
        self.state = TypingState::Animating;
        true
    }

    /// Advance one frame towards `source`.
    ///
    /// `source` must extend the revealed text; call [`sync`](Self::sync)
    /// after replacing it.
    pub fn step(&mut self, source: &str) -> Step {
        let total = source.chars().count();
        if self.revealed_chars >= total {
            self.state = TypingState::Idle;
            return Step::CaughtUp;
        }

        if total != self.target_chars {
            self.target_chars = total;
            self.frames_elapsed = 0;
        }

        let remaining = total - self.revealed_chars;
        let chars = self
            .config
            .chars_per_frame(remaining, self.frames_elapsed)
            .min(remaining);
        self.frames_elapsed = self.frames_elapsed.saturating_add(1);

        let start = self.revealed.len();
        let rest = &source[start..];
        let end = rest
            .char_indices()
            .nth(chars)
            .map_or(source.len(), |(i, _)| start + i);

        self.revealed.push_str(&source[start..end]);
        self.revealed_chars += chars;
        Step::Revealed { chars }
    }

    /// Reveal everything at once.
    ///
    /// The state is left alone: a running loop finds nothing left to do and
    /// goes idle on its next frame.
    pub fn reveal_all(&mut self, source: &str) {
        self.revealed.clear();
        self.revealed.push_str(source);
        self.revealed_chars = source.chars().count();
        self.target_chars = self.revealed_chars;
        self.frames_elapsed = 0;
    }

    /// Keep the revealed text a prefix of `source`.
    ///
    /// When the host replaced the source with text that no longer starts
    /// with what is shown, the revealed text is cut back to the longest
    /// common prefix. Returns `true` if anything was cut.
    pub fn sync(&mut self, source: &str) -> bool {
        if source.starts_with(self.revealed.as_str()) {
            return false;
        }

        let mut common_bytes = 0;
        let mut common_chars = 0;
        for ((i, a), b) in self.revealed.char_indices().zip(source.chars()) {
            if a != b {
                break;
            }
            common_bytes = i + a.len_utf8();
            common_chars += 1;
        }

        self.revealed.truncate(common_bytes);
        self.revealed_chars = common_chars;
        true
    }

    /// Forget the revealed text for a new turn.
    ///
    /// The state is left alone: a frame loop still in flight keeps owning
    /// the animation and simply finds less to do.
    pub fn reset(&mut self) {
        self.revealed.clear();
        self.revealed_chars = 0;
        self.target_chars = 0;
        self.frames_elapsed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_end(animator: &mut TypingAnimator, source: &str) -> Vec<usize> {
        let mut frames = Vec::new();
        assert!(animator.begin(source));
        while let Step::Revealed { chars } = animator.step(source) {
            frames.push(chars);
        }
        frames
    }

    #[test]
    fn test_default_config() {
        let config = TypingConfig::default();
        assert_eq!(config.duration_ms, 300);
        assert_eq!(config.fps, 60);
        assert!((config.frame_budget() - 18.0).abs() < 1e-9);
        assert_eq!(config.frame_interval().as_micros(), 16_666);
    }

    #[test]
    fn test_rejects_zero_fps() {
        assert!(matches!(
            TypingConfig::new(300, 0),
            Err(Error::InvalidTyping(_))
        ));
        assert!(TypingConfig::new(0, 30).is_ok());
    }

    #[test]
    fn test_chars_per_frame() {
        let config = TypingConfig::default();
        assert_eq!(config.chars_per_frame(8, 0), 1);
        assert_eq!(config.chars_per_frame(18, 0), 1);
        assert_eq!(config.chars_per_frame(19, 0), 2);
        assert_eq!(config.chars_per_frame(100, 0), 6);
        assert_eq!(config.chars_per_frame(0, 0), 1);
        assert_eq!(config.chars_per_frame(34, 16), 17);
        assert_eq!(config.chars_per_frame(50, 18), 50);
    }

    #[test]
    fn test_short_budget_reveals_in_one_frame() {
        let config = TypingConfig::new(5, 60).unwrap();
        assert_eq!(config.chars_per_frame(40, 0), 40);
    }

    #[test]
    fn test_bold_takes_eight_frames() {
        let mut animator = TypingAnimator::new(TypingConfig::default());
        let frames = run_to_end(&mut animator, "**bold**");
        assert_eq!(frames, vec![1; 8]);
        assert_eq!(animator.revealed(), "**bold**");
        assert_eq!(animator.state(), TypingState::Idle);
    }

    #[test]
    fn test_long_text_fits_budget() {
        let source = "x".repeat(1000);
        let mut animator = TypingAnimator::new(TypingConfig::default());
        let frames = run_to_end(&mut animator, &source);
        assert!(frames.len() <= 18, "took {} frames", frames.len());
        assert_eq!(animator.revealed_chars(), 1000);
    }

    #[test]
    fn test_growth_restarts_budget() {
        let mut animator = TypingAnimator::new(TypingConfig::default());
        let mut source = "a".repeat(36);
        assert!(animator.begin(&source));
        assert_eq!(animator.step(&source), Step::Revealed { chars: 2 });
        source.push_str(&"b".repeat(180));
        // 214 hidden chars spread over a fresh 18 frame budget.
        assert_eq!(animator.step(&source), Step::Revealed { chars: 12 });
    }

    #[test]
    fn test_reentrancy_guard() {
        let mut animator = TypingAnimator::new(TypingConfig::default());
        assert!(animator.begin("abc"));
        assert!(!animator.begin("abcdef"));
        assert!(animator.is_animating());
    }

    #[test]
    fn test_begin_is_noop_when_caught_up() {
        let mut animator = TypingAnimator::new(TypingConfig::default());
        animator.reveal_all("done");
        assert!(!animator.begin("done"));
        assert_eq!(animator.state(), TypingState::Idle);
    }

    #[test]
    fn test_growth_mid_animation_catches_up() {
        let mut animator = TypingAnimator::new(TypingConfig::default());
        let mut source = String::from("Hello");
        assert!(animator.begin(&source));
        let mut last = 0;
        for frame in 0..200 {
            if frame % 2 == 0 && source.len() < 400 {
                source.push_str(" more text");
            }
            match animator.step(&source) {
                Step::Revealed { .. } => {}
                Step::CaughtUp => break,
            }
            let revealed = animator.revealed_chars();
            assert!(revealed >= last);
            assert!(revealed <= source.chars().count());
            assert!(source.starts_with(animator.revealed()));
            last = revealed;
        }
        assert_eq!(animator.revealed(), source);
        assert_eq!(animator.state(), TypingState::Idle);
    }

    #[test]
    fn test_multibyte_reveal() {
        let mut animator = TypingAnimator::new(TypingConfig::default());
        let source = "héllo 🌍 wörld";
        assert!(animator.begin(source));
        assert_eq!(animator.step(source), Step::Revealed { chars: 1 });
        assert_eq!(animator.step(source), Step::Revealed { chars: 1 });
        assert_eq!(animator.revealed(), "hé");
        while animator.step(source) != Step::CaughtUp {}
        assert_eq!(animator.revealed(), source);
    }

    #[test]
    fn test_sync_clamps_to_common_prefix() {
        let mut animator = TypingAnimator::new(TypingConfig::default());
        animator.reveal_all("Hello wörld");
        assert!(!animator.sync("Hello wörld, again"));
        assert!(animator.sync("Hello wörk"));
        assert_eq!(animator.revealed(), "Hello wör");
        assert_eq!(animator.revealed_chars(), 9);
    }

    #[test]
    fn test_reset_keeps_state() {
        let mut animator = TypingAnimator::new(TypingConfig::default());
        assert!(animator.begin("abc"));
        animator.step("abc");
        animator.reset();
        assert_eq!(animator.revealed(), "");
        assert!(animator.is_animating());
        assert_eq!(animator.step(""), Step::CaughtUp);
        assert!(!animator.is_animating());
    }
}
