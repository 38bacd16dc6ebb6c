//! The conversational query pipeline.
//!
//! A query flows through three stages, each usable on its own:
//!
//! 1. **Build context**: read the tenant's projects and tasks into a
//!    [`ContextBundle`] of summary facts and prioritized sources
//! 2. **Assemble**: render a bounded prompt from the bundle, the user's
//!    style profile and the conversation history ([`PromptAssembler`])
//! 3. **Generate and persist**: call the configured [`Generator`] and store
//!    the exchange as a [`ConversationSession`] ([`QueryOrchestrator`])
//!
//! [`Generator`]: pmassist_core::Generator
//! [`ConversationSession`]: pmassist_core::ConversationSession

pub mod context;
pub mod orchestrator;

pub use context::{ContextBuilder, ContextBundle, HistoryMode, PromptAssembler, PromptRequest};
pub use orchestrator::{HistoryQuery, QueryOrchestrator, QueryRequest, SessionView};
