//! Step reducer: folds agent events into a [`Timeline`].

use crate::event::{AgentEvent, Step, StepKind, StepStatus};

/// What one applied event changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Change {
    /// A step was appended.
    pub step_appended: bool,
    /// The streaming answer text was replaced.
    pub answer_changed: bool,
    /// The timeline became finalized.
    pub finalized: bool,
}

impl Change {
    /// Whether anything visible grew, for the scroll-follow policy.
    ///
    /// Finalization counts: it settles step statuses and may collapse the
    /// timeline.
    #[must_use]
    pub const fn is_growth(&self) -> bool {
        self.step_appended || self.answer_changed || self.finalized
    }
}

/// Everything one session has shown so far.
///
/// `steps` only grows. `streaming_answer` is always the full latest known
/// answer text, never a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    steps: Vec<Step>,
    streaming_answer: String,
    is_finalized: bool,
    /// Index of the most recently appended non-final step.
    latest_working: Option<usize>,
}

impl Timeline {
    /// Create an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sequence of events into a fresh timeline and finish it.
    #[must_use]
    pub fn replay<I>(events: I) -> Self
    where
        I: IntoIterator<Item = AgentEvent>,
    {
        let mut timeline = events.into_iter().fold(Self::new(), Self::reduce);
        timeline.finish();
        timeline
    }

    /// Pure form of [`Timeline::apply`].
    #[must_use]
    pub fn reduce(mut self, event: AgentEvent) -> Self {
        self.apply(event);
        self
    }

    /// Apply one event.
    pub fn apply(&mut self, event: AgentEvent) -> Change {
        let mut change = Change::default();
        match event {
            AgentEvent::AgentStep { step } => {
                if let Some(answer) = step.last_ai_content() {
                    change.answer_changed = self.replace_answer(answer);
                }
                if step.kind != StepKind::Final {
                    self.latest_working = Some(self.steps.len());
                }
                self.steps.push(step);
                change.step_appended = true;
            }
            AgentEvent::FinalAnswer { content } => {
                change.answer_changed = self.replace_answer(&content);
                change.finalized = !self.is_finalized;
                self.is_finalized = true;
            }
        }
        change
    }

    /// The transfer ended normally.
    pub fn finish(&mut self) {
        self.is_finalized = true;
    }

    fn replace_answer(&mut self, answer: &str) -> bool {
        if self.streaming_answer == answer {
            return false;
        }
        answer.clone_into(&mut self.streaming_answer);
        true
    }

    /// Steps in arrival order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The latest known answer text.
    #[must_use]
    pub fn streaming_answer(&self) -> &str {
        &self.streaming_answer
    }

    /// Whether a final answer arrived or the transfer closed normally.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.is_finalized
    }

    /// Whether any step of kind `final` has been recorded.
    #[must_use]
    pub fn has_final_step(&self) -> bool {
        self.steps.iter().any(|s| s.kind == StepKind::Final)
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step has arrived yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Status to render for the step at `index`.
    ///
    /// An explicit status from the backend always wins. Without one, `final`
    /// steps are done, the most recent non-final step is in progress while the
    /// session is active, and every earlier step is done. A session that stopped
    /// before finalizing leaves its latest step pending.
    #[must_use]
    pub fn display_status(&self, index: usize, active: bool) -> Option<StepStatus> {
        let step = self.steps.get(index)?;
        if let Some(status) = step.status {
            return Some(status);
        }
        if step.kind == StepKind::Final || self.latest_working != Some(index) {
            return Some(StepStatus::Done);
        }
        Some(if active {
            StepStatus::InProgress
        } else if self.is_finalized {
            StepStatus::Done
        } else {
            StepStatus::Pending
        })
    }
}

/// Collapse state of the timeline view.
///
/// The derived part comes from the timeline; the user toggle is kept apart and
/// overrides it once set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelinePanel {
    user_collapsed: Option<bool>,
}

impl TimelinePanel {
    /// Create a panel that follows the derived state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            user_collapsed: None,
        }
    }

    /// Collapsed state derived from the timeline alone.
    #[must_use]
    pub fn derived_collapsed(timeline: &Timeline) -> bool {
        timeline.has_final_step() || timeline.is_finalized()
    }

    /// Effective collapsed state.
    #[must_use]
    pub fn is_collapsed(&self, timeline: &Timeline) -> bool {
        self.user_collapsed
            .unwrap_or_else(|| Self::derived_collapsed(timeline))
    }

    /// Flip the collapsed state as the operator sees it.
    pub fn toggle(&mut self, timeline: &Timeline) {
        self.user_collapsed = Some(!self.is_collapsed(timeline));
    }

    /// Drop the user override, as when a new session starts.
    pub fn reset(&mut self) {
        self.user_collapsed = None;
    }

    /// Whether the step at `index` is expanded by default.
    #[must_use]
    pub fn is_expanded_by_default(timeline: &Timeline, index: usize) -> bool {
        index + 1 == timeline.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{MessageRole, StepMessage};

    fn step(kind: StepKind, status: Option<StepStatus>, ai: Option<&str>) -> Step {
        Step {
            source_node: "agent".to_string(),
            label: format!("{kind:?}"),
            kind,
            status,
            tool_name: None,
            tool_call_id: None,
            preview: None,
            messages: ai
                .map(|content| StepMessage {
                    role: MessageRole::Ai,
                    content: content.to_string(),
                    tool_name: None,
                })
                .into_iter()
                .collect(),
        }
    }

    fn agent_step(kind: StepKind, status: Option<StepStatus>, ai: Option<&str>) -> AgentEvent {
        AgentEvent::AgentStep {
            step: step(kind, status, ai),
        }
    }

    fn final_answer(content: &str) -> AgentEvent {
        AgentEvent::FinalAnswer {
            content: content.to_string(),
        }
    }

    #[test]
    fn tool_call_then_final_answer() {
        let timeline = Timeline::replay([
            agent_step(StepKind::ToolCall, Some(StepStatus::InProgress), None),
            final_answer("Order #123 is Delivered."),
        ]);

        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.steps()[0].kind, StepKind::ToolCall);
        assert_eq!(timeline.streaming_answer(), "Order #123 is Delivered.");
        assert!(timeline.is_finalized());
    }

    #[test]
    fn ai_messages_replace_answer() {
        let mut timeline = Timeline::new();
        let change = timeline.apply(agent_step(StepKind::Thought, None, Some("Looking")));
        assert!(change.step_appended && change.answer_changed);
        assert_eq!(timeline.streaming_answer(), "Looking");

        let change = timeline.apply(agent_step(StepKind::ToolCall, None, None));
        assert!(change.step_appended && !change.answer_changed);
        assert_eq!(timeline.streaming_answer(), "Looking");

        timeline.apply(agent_step(StepKind::Thought, None, Some("Found it")));
        assert_eq!(timeline.streaming_answer(), "Found it");
        assert!(!timeline.is_finalized());
    }

    #[test]
    fn final_answer_reports_finalization_once() {
        let mut timeline = Timeline::new();
        let first = timeline.apply(final_answer("done"));
        assert!(first.finalized && first.answer_changed);
        assert!(first.is_growth());

        let mut silent = Timeline::new();
        let empty = silent.apply(final_answer(""));
        assert!(empty.finalized && !empty.answer_changed);
        assert!(empty.is_growth());

        let again = timeline.apply(final_answer("done"));
        assert_eq!(again, Change::default());
        assert!(!again.is_growth());
    }

    #[test]
    fn positional_status_while_active() {
        let mut timeline = Timeline::new();
        timeline.apply(agent_step(StepKind::ToolCall, None, None));
        timeline.apply(agent_step(StepKind::ToolResult, None, None));

        assert_eq!(timeline.display_status(0, true), Some(StepStatus::Done));
        assert_eq!(timeline.display_status(1, true), Some(StepStatus::InProgress));
        assert_eq!(timeline.display_status(2, true), None);

        // A final step does not take over "most recent".
        timeline.apply(agent_step(StepKind::Final, None, Some("answer")));
        assert_eq!(timeline.display_status(1, true), Some(StepStatus::InProgress));
        assert_eq!(timeline.display_status(2, true), Some(StepStatus::Done));
    }

    #[test]
    fn positional_status_after_session_ends() {
        let mut timeline = Timeline::new();
        timeline.apply(agent_step(StepKind::ToolCall, None, None));
        assert_eq!(timeline.display_status(0, false), Some(StepStatus::Pending));

        timeline.finish();
        assert_eq!(timeline.display_status(0, false), Some(StepStatus::Done));
    }

    #[test]
    fn explicit_status_wins() {
        let mut timeline = Timeline::new();
        timeline.apply(agent_step(StepKind::ToolCall, Some(StepStatus::Error), None));
        timeline.apply(agent_step(StepKind::Thought, Some(StepStatus::Pending), None));

        assert_eq!(timeline.display_status(0, true), Some(StepStatus::Error));
        assert_eq!(timeline.display_status(1, true), Some(StepStatus::Pending));
        timeline.finish();
        assert_eq!(timeline.display_status(0, false), Some(StepStatus::Error));
    }

    #[test]
    fn replay_is_idempotent() {
        let events = vec![
            agent_step(StepKind::ToolCall, Some(StepStatus::Done), None),
            agent_step(StepKind::ToolResult, None, None),
            agent_step(StepKind::Thought, None, Some("partial")),
            agent_step(StepKind::Final, Some(StepStatus::Done), Some("complete")),
            final_answer("complete"),
        ];

        let a = Timeline::replay(events.clone());
        let b = Timeline::replay(events.clone());
        assert_eq!(a, b);

        let folded = events.into_iter().fold(Timeline::new(), Timeline::reduce);
        assert_eq!(folded, a);
    }

    #[test]
    fn panel_collapse_follows_timeline_until_toggled() {
        let mut timeline = Timeline::new();
        let mut panel = TimelinePanel::new();
        timeline.apply(agent_step(StepKind::ToolCall, None, None));
        assert!(!panel.is_collapsed(&timeline));

        timeline.apply(agent_step(StepKind::Final, None, None));
        assert!(panel.is_collapsed(&timeline));

        panel.toggle(&timeline);
        assert!(!panel.is_collapsed(&timeline));

        timeline.finish();
        assert!(!panel.is_collapsed(&timeline));

        panel.reset();
        assert!(panel.is_collapsed(&timeline));
    }

    #[test]
    fn only_newest_step_expanded() {
        let mut timeline = Timeline::new();
        timeline.apply(agent_step(StepKind::ToolCall, None, None));
        timeline.apply(agent_step(StepKind::ToolResult, None, None));
        assert!(!TimelinePanel::is_expanded_by_default(&timeline, 0));
        assert!(TimelinePanel::is_expanded_by_default(&timeline, 1));
    }
}
