//! # pmassist Core
//!
//! Domain types, traits, and error definitions for the pmassist project
//! assistant. This crate has **no framework dependencies**: it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every subsystem seam is a trait here. Implementations live in their
//! respective crates:
//! - storage backends (`pmassist-store`) implement [`StorageBackend`]
//! - generation backends (`pmassist-providers`) implement [`Provider`] and [`Generator`]
//!
//! Entities refer to each other by identity only. Traversal (session to
//! parent, project to tasks) goes through explicit store lookups.

pub mod error;
pub mod generation;
pub mod ids;
pub mod interaction;
pub mod model;
pub mod provider;
pub mod session;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError};
pub use generation::{GenerationOptions, GenerationResult, Generator};
pub use ids::{InteractionId, ProfileId, ProjectId, SessionId, TaskId, TenantId, UserId};
pub use interaction::{InteractionLog, InteractionStatus};
pub use model::{
    Principal, Project, ProjectStatus, StyleProfile, StyleProfilePatch, TaskItem, TaskPriority,
    TaskStatus, Tone, User,
};
pub use provider::{Message, Provider, ProviderRequest, ProviderResponse, Role, Usage};
pub use session::{ConversationSession, Source, SourceKind};
pub use store::{
    SessionQuery, SessionStore, StorageBackend, StyleProfileStore, TenantScoped, TenantStore,
};
