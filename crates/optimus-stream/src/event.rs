//! Typed agent events decoded from record payloads.
//!
//! Two payload shapes are recognised, discriminated by `type`:
//!
//! ```text
//! {"type":"agent_step","step":{"node":..,"label":..,"status":..,"kind":..,"messages":[..]}}
//! {"type":"final_answer","content":..}
//! ```
//!
//! Anything else is dropped without interrupting the stream.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::frame::Record;

/// Author of a message inside a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageRole {
    /// The operator's query as seen by the agent.
    Human,
    /// Model output; carries the running answer text.
    Ai,
    /// Output of a tool invocation.
    Tool,
    /// System prompt.
    System,
    /// A role this console does not know about; kept verbatim.
    Other(String),
}

impl MessageRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
            Self::Tool => "tool",
            Self::System => "system",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for MessageRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "human" => Self::Human,
            "ai" => Self::Ai,
            "tool" => Self::Tool,
            "system" => Self::System,
            _ => Self::Other(value),
        }
    }
}

impl From<MessageRole> for String {
    fn from(role: MessageRole) -> Self {
        role.as_str().to_string()
    }
}

/// One role-tagged utterance inside a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMessage {
    /// Who produced the message.
    #[serde(rename = "type")]
    pub role: MessageRole,
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Tool that produced the message, for tool messages.
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// What kind of activity a step records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// The agent invoked a tool.
    ToolCall,
    /// A tool returned.
    ToolResult,
    /// A reasoning note.
    Thought,
    /// The final step of the run.
    Final,
}

impl StepKind {
    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ToolCall => "Tool call",
            Self::ToolResult => "Tool result",
            Self::Thought => "Agent thought",
            Self::Final => "Final answer",
        }
    }
}

/// Progress of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started yet.
    Pending,
    /// Currently running.
    InProgress,
    /// Finished.
    Done,
    /// Failed.
    Error,
}

impl StepStatus {
    /// Legend glyph.
    #[must_use]
    pub const fn icon(&self) -> &'static str {
        match self {
            Self::Pending => "○",
            Self::InProgress => "◐",
            Self::Done => "✔",
            Self::Error => "⚠",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::Done => "Done",
            Self::Error => "Error",
        }
    }

    /// All statuses in legend order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::InProgress, Self::Done, Self::Error];
}

/// One unit of agent activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Graph node that produced the step.
    #[serde(rename = "node")]
    pub source_node: String,
    /// Short description.
    #[serde(default)]
    pub label: String,
    /// Activity kind.
    pub kind: StepKind,
    /// Status reported by the backend, when it sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
    /// Tool involved in a tool call or result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Correlates a tool call with its result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// One-line preview of the step's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Messages exchanged in this step.
    #[serde(default)]
    pub messages: Vec<StepMessage>,
}

impl Step {
    /// Content of the last `ai` message, if the step has one.
    #[must_use]
    pub fn last_ai_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Ai)
            .map(|m| m.content.as_str())
    }
}

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The agent recorded a step.
    AgentStep {
        /// The recorded step.
        step: Step,
    },
    /// The agent produced its final answer.
    FinalAnswer {
        /// Full answer text.
        content: String,
    },
}

impl AgentEvent {
    /// Whether this event ends the run.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. })
    }
}

/// Decode one payload, dropping it when it is not a recognised event.
#[must_use]
pub fn parse_payload(payload: &str) -> Option<AgentEvent> {
    match serde_json::from_str::<AgentEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "dropping malformed record");
            trace!(payload = %payload, "malformed record payload");
            None
        }
    }
}

/// Decode every payload of a record, skipping the ones that do not parse.
pub fn parse_record(record: &Record) -> impl Iterator<Item = AgentEvent> + '_ {
    record.payloads().filter_map(parse_payload)
}
