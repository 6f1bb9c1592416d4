//! Core types and pure view logic for the Optimus operations console.
//!
//! This crate provides the foundational pieces shared by the streaming engine
//! and the terminal front end:
//!
//! - **Identifiers**: strongly-typed IDs for stream sessions and transcript entries
//! - **Transcript**: the durable, append-only conversation
//! - **Models**: the catalogue of selectable backend models
//! - **Text**: paragraph splitting ahead of markdown rendering
//! - **Follow**: the scroll-follow policy for the chat viewport
//!
//! # Example
//!
//! ```
//! use optimus_core::{ChatTranscript, Role, SessionId};
//!
//! let mut transcript = ChatTranscript::new();
//! transcript.push(Role::User, "Where is order #123?");
//!
//! let a = SessionId::generate();
//! let b = SessionId::generate();
//! assert_ne!(a, b);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod follow;
pub mod ids;
pub mod models;
pub mod text;
pub mod transcript;

pub use error::{CoreError, Result};
pub use follow::{ScrollCommand, ScrollFollow, ScrollMetrics, DEFAULT_NEAR_BOTTOM_THRESHOLD};
pub use ids::{MessageId, SessionId};
pub use models::{find_model_option, ModelOption, Provider, MODEL_OPTIONS};
pub use text::split_paragraphs;
pub use transcript::{ChatEntry, ChatTranscript, Role};
