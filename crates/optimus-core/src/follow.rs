//! Scroll-follow policy for the chat viewport.
//!
//! The viewport stays pinned to the newest content until the operator scrolls
//! away from the bottom. From then on growth no longer moves the viewport and a
//! jump-to-latest affordance is offered instead; taking it (or scrolling back
//! down) re-arms auto-follow.
//!
//! Growth does not scroll synchronously. It marks a scroll as pending and the
//! command is released on the next frame, after layout has accounted for the
//! new content.

/// Distance from the bottom edge, in layout units, still counted as "at the bottom".
pub const DEFAULT_NEAR_BOTTOM_THRESHOLD: u32 = 100;

/// Viewport geometry at the time of a manual scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    /// Total height of the scrollable content.
    pub content_height: u32,
    /// Height of the visible window.
    pub viewport_height: u32,
    /// Offset of the visible window from the top of the content.
    pub offset: u32,
}

impl ScrollMetrics {
    /// Remaining content below the visible window.
    #[must_use]
    pub const fn distance_from_bottom(&self) -> u32 {
        self.content_height
            .saturating_sub(self.offset)
            .saturating_sub(self.viewport_height)
    }
}

/// Instruction for the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCommand {
    /// Move the viewport so the newest content is visible.
    ToBottom,
}

/// Decides when the chat viewport should follow new content.
#[derive(Debug, Clone)]
pub struct ScrollFollow {
    threshold: u32,
    auto_follow: bool,
    show_jump: bool,
    pending: bool,
}

impl Default for ScrollFollow {
    fn default() -> Self {
        Self::new(DEFAULT_NEAR_BOTTOM_THRESHOLD)
    }
}

impl ScrollFollow {
    /// Create a controller with auto-follow armed.
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold,
            auto_follow: true,
            show_jump: false,
            pending: false,
        }
    }

    /// Re-arm auto-follow, as at the start of a session.
    pub fn reset(&mut self) {
        self.auto_follow = true;
        self.show_jump = false;
        self.pending = false;
    }

    /// Whether the viewport is within the threshold of the bottom edge.
    #[must_use]
    pub const fn is_near_bottom(&self, metrics: &ScrollMetrics) -> bool {
        metrics.distance_from_bottom() < self.threshold
    }

    /// The operator moved the viewport.
    pub fn on_user_scroll(&mut self, metrics: ScrollMetrics) {
        let near = self.is_near_bottom(&metrics);
        self.auto_follow = near;
        self.show_jump = !near;
        if !near {
            self.pending = false;
        }
    }

    /// A step was appended, the streaming answer changed, or an entry was committed.
    pub fn on_content_growth(&mut self) {
        if self.auto_follow {
            self.pending = true;
        }
    }

    /// Called once per frame; releases a pending scroll.
    pub fn on_frame(&mut self) -> Option<ScrollCommand> {
        let pending = std::mem::take(&mut self.pending);
        (pending && self.auto_follow).then_some(ScrollCommand::ToBottom)
    }

    /// The operator invoked the jump-to-latest affordance.
    pub fn jump_to_latest(&mut self) -> ScrollCommand {
        self.reset();
        ScrollCommand::ToBottom
    }

    /// Whether new content currently pulls the viewport along.
    #[must_use]
    pub const fn is_following(&self) -> bool {
        self.auto_follow
    }

    /// Whether the jump-to-latest affordance should be shown.
    #[must_use]
    pub const fn shows_jump_to_latest(&self) -> bool {
        self.show_jump
    }

    /// Configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }
}
