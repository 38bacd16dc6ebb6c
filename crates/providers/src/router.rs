//! Generator selection: picks the backend from configuration.
//!
//! An API key selects the remote generator; its absence selects the offline
//! one. Nothing else about the pipeline changes between the two.

use pmassist_config::GenerationConfig;
use pmassist_core::error::ProviderError;
use pmassist_core::generation::Generator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::offline::OfflineGenerator;
use crate::openai_compat::OpenAiCompatProvider;
use crate::remote::RemoteGenerator;

/// Which kind of generator a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Remote,
    Offline,
}

impl GeneratorKind {
    pub fn for_config(config: &GenerationConfig) -> Self {
        if config.has_api_key() {
            Self::Remote
        } else {
            Self::Offline
        }
    }
}

/// Build the generator described by `config`.
pub fn build_from_config(config: &GenerationConfig) -> Arc<dyn Generator> {
    if GeneratorKind::for_config(config) == GeneratorKind::Offline {
        info!("No API key configured, using offline generator");
        return Arc::new(OfflineGenerator::new());
    }

    match remote_from_config(config) {
        Ok(generator) => {
            info!(base_url = %config.base_url, model = %config.model, "Using remote generator");
            Arc::new(generator)
        }
        Err(e) => {
            warn!(error = %e, "Could not create remote provider, using offline generator");
            Arc::new(OfflineGenerator::new())
        }
    }
}

/// The remote generator for `config`, bounded by `generation.timeout_secs`.
pub fn remote_from_config(config: &GenerationConfig) -> Result<RemoteGenerator, ProviderError> {
    let api_key = config
        .api_key
        .as_deref()
        .ok_or_else(|| ProviderError::NotConfigured("generation.api_key is not set".into()))?;
    let provider = OpenAiCompatProvider::new("openai", &config.base_url, api_key)?;
    Ok(RemoteGenerator::new(
        Arc::new(provider),
        Duration::from_secs(config.timeout_secs),
    ))
}
