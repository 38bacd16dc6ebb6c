//! Storage backends for pmassist.
//!
//! Both backends implement `pmassist_core::StorageBackend`; [`open`] picks one
//! from configuration.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryBackend;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

use pmassist_config::StorageConfig;
use pmassist_core::error::StoreError;
use pmassist_core::store::StorageBackend;
use std::sync::Arc;
use tracing::info;

/// Open the backend named by `config.backend`.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StoreError> {
    match config.backend.as_str() {
        "memory" => {
            info!("Using in-memory storage; nothing will be persisted");
            Ok(Arc::new(InMemoryBackend::new()))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = config.resolved_path();
            if let Some(dir) = path.parent()
                && !config.path.starts_with("sqlite:")
            {
                std::fs::create_dir_all(dir).map_err(|e| {
                    StoreError::Storage(format!("Cannot create {}: {e}", dir.display()))
                })?;
            }
            Ok(Arc::new(SqliteBackend::new(&config.sqlite_url()).await?))
        }
        other => Err(StoreError::Storage(format!(
            "Unknown storage backend '{other}'"
        ))),
    }
}
