//! Application state.
//!
//! Ties the session controller, the scroll-follow policy and the input line
//! together. Rendering reads this state; key handling in `main.rs` mutates it.

use std::time::Duration;

use optimus_core::{ModelOption, ScrollCommand, ScrollFollow, ScrollMetrics};
use optimus_stream::{
    Applied, SessionController, SessionSnapshot, SessionUpdate, StreamError, TimelinePanel,
};
use tokio::sync::watch;

use crate::markdown::MarkdownRenderer;

/// Interval between backend health checks.
pub const HEALTH_INTERVAL: Duration = Duration::from_secs(10);

/// Canned question for demos.
pub const EXAMPLE_QUERY: &str = "A customer named David Kim just called. He wants to know the status of his most recent order. Also, look up our return policy for electronics. Based on his order, calculate the potential restocking fee for returning one item that costs $129.99. Finally, send a summary of this to 'ops-support@example.com' with the subject 'Inquiry for David Kim'.";

/// Application state.
pub struct App {
    controller: SessionController,
    api_base: String,
    /// Model used for the next submission.
    pub model: &'static ModelOption,
    /// Current input buffer.
    pub input: String,
    /// Cursor position in input, in characters.
    pub cursor_position: usize,
    /// Scroll-follow policy for the chat column.
    pub follow: ScrollFollow,
    /// Collapse state of the timeline column.
    pub panel: TimelinePanel,
    /// First visible chat row.
    pub chat_offset: u32,
    /// Chat geometry from the last frame.
    pub chat_metrics: ScrollMetrics,
    /// Set when the next frame must show the newest chat row.
    pub scroll_to_bottom: bool,
    /// Backend reachability; `None` until the first health check returns.
    pub connected: Option<bool>,
    /// Status message to display.
    pub status_message: Option<String>,
    /// Error message to display.
    pub error_message: Option<String>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Animation frame counter for the streaming indicator.
    pub animation_frame: usize,
    /// Markdown renderer for answers.
    pub markdown: MarkdownRenderer,
}

impl App {
    /// Create a new application.
    #[must_use]
    pub fn new(
        controller: SessionController,
        api_base: impl Into<String>,
        model: &'static ModelOption,
        follow_threshold: u32,
    ) -> Self {
        Self {
            controller,
            api_base: api_base.into(),
            model,
            input: String::new(),
            cursor_position: 0,
            follow: ScrollFollow::new(follow_threshold),
            panel: TimelinePanel::new(),
            chat_offset: 0,
            chat_metrics: ScrollMetrics::default(),
            scroll_to_bottom: false,
            connected: None,
            status_message: None,
            error_message: None,
            should_quit: false,
            animation_frame: 0,
            markdown: MarkdownRenderer::new(),
        }
    }

    /// API base for display.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// The session controller.
    #[must_use]
    pub const fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Snapshot of the most recent session.
    #[must_use]
    pub fn session(&self) -> Option<watch::Ref<'_, SessionSnapshot>> {
        self.controller.current()
    }

    /// Whether a session is streaming.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.controller.is_active()
    }

    /// Tick the animation frame (call on each render).
    pub fn tick_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Get current spinner character for the streaming indicator.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Set the status message (also clears any error).
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.error_message = None;
    }

    /// Set the error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.status_message = None;
    }

    /// Clear the error message.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Submit the input line as a new question.
    pub fn submit(&mut self) {
        match self.controller.submit(&self.input, self.model) {
            Ok(handle) => {
                tracing::debug!(session_id = %handle.id(), "submitted query");
                self.clear_input();
                self.error_message = None;
                self.status_message = None;
                self.panel.reset();
                self.follow.reset();
                self.follow.on_content_growth();
            }
            Err(StreamError::EmptyQuery) => {
                self.set_status("Type a question first");
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    /// Wait for the next session update.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        self.controller.next_update().await
    }

    /// Apply a session update and react to its outcome.
    pub fn handle_update(&mut self, update: SessionUpdate) {
        let applied = self.controller.apply(update);
        if applied.is_growth() {
            self.follow.on_content_growth();
        }
        match applied {
            Applied::Failed { message } => self.set_error(message),
            Applied::Aborted => self.set_status("Cancelled"),
            Applied::Completed { .. } => self.status_message = None,
            Applied::Stale | Applied::Progress(_) => {}
        }
    }

    /// Cancel the running session. Returns `true` if one was running.
    pub fn cancel_streaming(&mut self) -> bool {
        if self.controller.cancel_active() {
            self.set_status("Cancelled");
            true
        } else {
            false
        }
    }

    /// Flip the timeline's collapsed state.
    pub fn toggle_timeline(&mut self) {
        if let Some(session) = self.controller.current() {
            self.panel.toggle(&session.timeline);
        }
    }

    /// Switch to the next model in the catalogue.
    pub fn cycle_model(&mut self) {
        self.model = self.model.next();
        self.set_status(format!("Model: {}", self.model.label));
    }

    /// Replace the input with the example question.
    pub fn prefill_example(&mut self) {
        EXAMPLE_QUERY.clone_into(&mut self.input);
        self.move_cursor_end();
    }

    // =========================================================================
    // Chat Scrolling
    // =========================================================================

    /// Release a pending follow scroll; call once per frame before drawing.
    pub fn on_frame(&mut self) {
        if let Some(ScrollCommand::ToBottom) = self.follow.on_frame() {
            self.scroll_to_bottom = true;
        }
    }

    fn max_offset(&self) -> u32 {
        self.chat_metrics
            .content_height
            .saturating_sub(self.chat_metrics.viewport_height)
    }

    fn user_scrolled(&mut self) {
        self.scroll_to_bottom = false;
        self.chat_metrics.offset = self.chat_offset;
        self.follow.on_user_scroll(self.chat_metrics);
    }

    /// Scroll chat up (view older messages).
    pub fn scroll_chat_up(&mut self, amount: u32) {
        self.chat_offset = self.chat_offset.min(self.max_offset()).saturating_sub(amount);
        self.user_scrolled();
    }

    /// Scroll chat down (view newer messages).
    pub fn scroll_chat_down(&mut self, amount: u32) {
        self.chat_offset = self.chat_offset.saturating_add(amount).min(self.max_offset());
        self.user_scrolled();
    }

    /// Take the jump-to-latest affordance.
    pub fn jump_to_latest(&mut self) {
        let ScrollCommand::ToBottom = self.follow.jump_to_latest();
        self.scroll_to_bottom = true;
    }

    /// Record the chat geometry of the frame being drawn and return the
    /// offset to draw it at.
    pub fn layout_chat(&mut self, content_height: u32, viewport_height: u32) -> u32 {
        self.chat_metrics.content_height = content_height;
        self.chat_metrics.viewport_height = viewport_height;
        let max = self.max_offset();
        if std::mem::take(&mut self.scroll_to_bottom) {
            self.chat_offset = max;
        }
        self.chat_offset = self.chat_offset.min(max);
        self.chat_metrics.offset = self.chat_offset;
        self.chat_offset
    }

    // =========================================================================
    // Input Handling
    // =========================================================================

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn input_chars(&self) -> usize {
        self.input.chars().count()
    }

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index();
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index();
            self.input.remove(at);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.input_chars() {
            let at = self.byte_index();
            self.input.remove(at);
        }
    }

    /// Delete the word before the cursor.
    pub fn delete_word(&mut self) {
        while self.cursor_position > 0 {
            self.delete_char();
            let before = self.input.chars().nth(self.cursor_position.wrapping_sub(1));
            if self.cursor_position == 0 || before == Some(' ') {
                break;
            }
        }
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input_chars() {
            self.cursor_position += 1;
        }
    }

    /// Move cursor to the start.
    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to the end.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input_chars();
    }

    /// Clear the input.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt as _;
    use optimus_core::find_model_option;
    use optimus_stream::{AgentQueryRequest, AgentTransport, ByteStream, SessionState};

    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl AgentTransport for Canned {
        async fn open_stream(
            &self,
            _request: &AgentQueryRequest,
        ) -> optimus_stream::Result<ByteStream> {
            let chunk: optimus_stream::Result<Bytes> = Ok(Bytes::from_static(self.0.as_bytes()));
            Ok(futures::stream::iter([chunk]).boxed())
        }
    }

    fn app(body: &'static str) -> App {
        let controller = SessionController::new(Arc::new(Canned(body)), 16);
        App::new(
            controller,
            "http://localhost:8000/api/v1",
            find_model_option("gpt-5"),
            3,
        )
    }

    async fn drain(app: &mut App) {
        while app.is_streaming() {
            let update = app.next_update().await.unwrap();
            app.handle_update(update);
        }
    }

    const ANSWER: &str = "data: {\"type\":\"final_answer\",\"content\":\"Delivered.\"}\n\n";

    #[tokio::test]
    async fn submit_runs_a_session_and_commits_answer() {
        let mut app = app(ANSWER);
        app.input = "  where is my order?  ".to_string();
        app.move_cursor_end();

        app.submit();
        assert!(app.input.is_empty());
        assert!(app.is_streaming());

        drain(&mut app).await;
        let entries = app.controller().transcript().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content(), "where is my order?");
        assert_eq!(entries[1].content(), "Delivered.");
        assert_eq!(app.session().unwrap().state, SessionState::Completed);
        assert!(app.error_message.is_none());
    }

    #[tokio::test]
    async fn blank_submit_only_hints() {
        let mut app = app(ANSWER);
        app.input = "   ".to_string();
        app.submit();

        assert!(app.session().is_none());
        assert_eq!(app.status_message.as_deref(), Some("Type a question first"));
        assert_eq!(app.input, "   ");
    }

    #[tokio::test]
    async fn cancel_marks_session_aborted() {
        let mut app = app(ANSWER);
        app.input = "hello".to_string();
        app.submit();

        assert!(app.cancel_streaming());
        assert!(!app.cancel_streaming());
        drain(&mut app).await;
        assert_eq!(app.session().unwrap().state, SessionState::Aborted);
        assert_eq!(app.controller().transcript().len(), 1);
    }

    #[test]
    fn editing_is_char_aware() {
        let mut app = app(ANSWER);
        for c in "né😀x".chars() {
            app.insert_char(c);
        }
        app.move_cursor_left();
        app.delete_char();
        assert_eq!(app.input, "néx");
        app.move_cursor_start();
        app.delete_char_forward();
        assert_eq!(app.input, "éx");
        app.move_cursor_end();
        assert_eq!(app.cursor_position, 2);
    }

    #[test]
    fn delete_word_stops_at_space() {
        let mut app = app(ANSWER);
        app.input = "order status".to_string();
        app.move_cursor_end();
        app.delete_word();
        assert_eq!(app.input, "order ");
        assert_eq!(app.cursor_position, 6);
    }

    #[test]
    fn model_cycles_and_example_prefills() {
        let mut app = app(ANSWER);
        assert_eq!(app.model.id, "gpt-5");
        app.cycle_model();
        assert_eq!(app.model.id, "gemini-2.5-flash");
        app.cycle_model();
        assert_eq!(app.model.id, "gpt-5");

        app.prefill_example();
        assert_eq!(app.input, EXAMPLE_QUERY);
        assert_eq!(app.cursor_position, EXAMPLE_QUERY.chars().count());
    }

    #[test]
    fn scrolling_up_stops_following_until_jump() {
        let mut app = app(ANSWER);
        app.layout_chat(100, 20);

        app.follow.on_content_growth();
        app.on_frame();
        assert_eq!(app.layout_chat(100, 20), 80);

        app.scroll_chat_up(30);
        assert!(app.follow.shows_jump_to_latest());
        app.follow.on_content_growth();
        app.on_frame();
        assert_eq!(app.layout_chat(120, 20), 50);

        app.jump_to_latest();
        assert_eq!(app.layout_chat(120, 20), 100);
        assert!(app.follow.is_following());
    }

    #[test]
    fn scrolling_back_near_bottom_rearms_follow() {
        let mut app = app(ANSWER);
        app.layout_chat(100, 20);
        app.jump_to_latest();
        app.layout_chat(100, 20);

        app.scroll_chat_up(10);
        assert!(!app.follow.is_following());
        app.scroll_chat_down(9);
        assert!(app.follow.is_following());
    }
}
