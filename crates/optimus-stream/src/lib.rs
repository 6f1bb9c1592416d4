//! Streaming agent-event consumer for the Optimus console.
//!
//! Bytes from the agent backend flow through four stages:
//!
//! 1. [`frame`] splits the body into complete records
//! 2. [`event`] decodes each record's payload into an [`AgentEvent`]
//! 3. [`timeline`] folds events into a [`Timeline`]
//! 4. [`session`] runs transfers and guarantees one active session at a time
//!
//! [`client`] holds the HTTP side: the [`AgentClient`] that talks to the
//! backend and implements [`AgentTransport`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod session;
pub mod timeline;

pub use client::{AgentClient, AgentQueryRequest, AgentQueryResponse, OneShotTransport};
pub use config::ClientConfig;
pub use error::{Result, StreamError, FALLBACK_STREAM_ERROR};
pub use event::{
    parse_payload, AgentEvent, MessageRole, Step, StepKind, StepMessage, StepStatus,
};
pub use frame::{records, FrameDecoder, Record};
pub use session::{
    AgentTransport, Applied, ByteStream, SessionController, SessionHandle, SessionSnapshot,
    SessionState, SessionUpdate, UpdateKind,
};
pub use timeline::{Change, Timeline, TimelinePanel};
