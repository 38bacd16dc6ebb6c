//! Text-generation backends for pmassist.
//!
//! Providers implement `pmassist_core::Provider` (one HTTP round trip).
//! Generators implement `pmassist_core::Generator` and never fail; the
//! router picks one from configuration.

pub mod offline;
pub mod openai_compat;
pub mod remote;
pub mod router;

pub use offline::OfflineGenerator;
pub use openai_compat::OpenAiCompatProvider;
pub use remote::RemoteGenerator;
pub use router::{GeneratorKind, build_from_config, remote_from_config};
