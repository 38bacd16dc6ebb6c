pub mod ask;
pub mod history;
pub mod init;
pub mod seed;
pub mod serve;
pub mod status;

use pmassist_assistant::QueryOrchestrator;
use pmassist_config::AppConfig;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the configured store and generator and wire up an orchestrator.
pub async fn open_pipeline(
    config: &AppConfig,
) -> Result<QueryOrchestrator, Box<dyn std::error::Error>> {
    let storage = pmassist_store::open(&config.storage)
        .await
        .map_err(|e| format!("Failed to open storage: {e}"))?;
    let generator = pmassist_providers::build_from_config(&config.generation);
    Ok(QueryOrchestrator::from_config(storage, generator, config))
}
