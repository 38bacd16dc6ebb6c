//! Context for a single query, in two separate stages.
//!
//! | Stage | Type | Bounded? |
//! |-------|------|----------|
//! | Read tenant data, derive facts and sources | [`ContextBuilder`] | No, full snapshot |
//! | Render system instructions and user content | [`PromptAssembler`] | Yes, per [`PromptLimits`] |
//!
//! [`PromptLimits`]: pmassist_config::PromptLimits

pub mod assembler;
pub mod builder;

pub use assembler::{HistoryMode, PromptAssembler, PromptRequest};
pub use builder::{ContextBuilder, ContextBundle};
