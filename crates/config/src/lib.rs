//! Configuration loading, validation, and management for pmassist.
//!
//! Loads configuration from `~/.pmassist/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.pmassist/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation backend settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Bounds applied when assembling prompts
    #[serde(default)]
    pub prompt: PromptLimits,

    /// Storage backend selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

// ── Generation ───────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API key. Absent means the offline generator is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call deadline for the remote backend
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1500
}
fn default_timeout_secs() -> u64 {
    60
}

impl GenerationConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ── Prompt limits ────────────────────────────────────────────────────────

/// Caps on how much tenant data and history goes into one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptLimits {
    #[serde(default = "default_max_projects")]
    pub max_projects: usize,

    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,

    #[serde(default = "default_max_history_sessions")]
    pub max_history_sessions: usize,

    /// Prior answers are cut to this many characters in ambient history
    #[serde(default = "default_history_answer_chars")]
    pub history_answer_chars: usize,

    #[serde(default = "default_max_source_projects")]
    pub max_source_projects: usize,

    #[serde(default = "default_max_source_tasks")]
    pub max_source_tasks: usize,

    #[serde(default = "default_max_question_chars")]
    pub max_question_chars: usize,

    #[serde(default = "default_history_limit")]
    pub default_history_limit: usize,
}

fn default_max_projects() -> usize {
    10
}
fn default_max_tasks() -> usize {
    20
}
fn default_max_history_sessions() -> usize {
    3
}
fn default_history_answer_chars() -> usize {
    200
}
fn default_max_source_projects() -> usize {
    5
}
fn default_max_source_tasks() -> usize {
    5
}
fn default_max_question_chars() -> usize {
    2000
}
fn default_history_limit() -> usize {
    50
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_projects: default_max_projects(),
            max_tasks: default_max_tasks(),
            max_history_sessions: default_max_history_sessions(),
            history_answer_chars: default_history_answer_chars(),
            max_source_projects: default_max_source_projects(),
            max_source_tasks: default_max_source_tasks(),
            max_question_chars: default_max_question_chars(),
            default_history_limit: default_history_limit(),
        }
    }
}

// ── Storage ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Database file; a leading `~/` expands to the home directory
    #[serde(default = "default_storage_path")]
    pub path: String,
}

pub const STORAGE_BACKENDS: [&str; 2] = ["sqlite", "memory"];

fn default_storage_backend() -> String {
    "sqlite".into()
}
fn default_storage_path() -> String {
    "~/.pmassist/pmassist.db".into()
}

impl StorageConfig {
    /// The database path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        match self.path.strip_prefix("~/") {
            Some(rest) => dirs_home().join(rest),
            None => PathBuf::from(&self.path),
        }
    }

    /// A connection URL for sqlx (`sqlite://<path>?mode=rwc`).
    pub fn sqlite_url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            return self.path.clone();
        }
        format!("sqlite://{}?mode=rwc", self.resolved_path().display())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
        }
    }
}

// ── Gateway ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    5080
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from the default path (~/.pmassist/config.toml).
    ///
    /// Environment overrides, highest priority:
    /// - `PMASSIST_API_KEY`, then `OPENAI_API_KEY`
    /// - `PMASSIST_MODEL`
    /// - `PMASSIST_BASE_URL`
    /// - `PMASSIST_DB`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("PMASSIST_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.generation.api_key = Some(key);
        }
        if let Some(model) = non_empty("PMASSIST_MODEL") {
            self.generation.model = model;
        }
        if let Some(url) = non_empty("PMASSIST_BASE_URL") {
            self.generation.base_url = url;
        }
        if let Some(db) = non_empty("PMASSIST_DB") {
            self.storage.path = db;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".pmassist")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        if !(0.0..=2.0).contains(&g.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if g.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_tokens must be > 0".into(),
            ));
        }
        if g.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_secs must be > 0".into(),
            ));
        }

        let p = &self.prompt;
        let bounds = [
            ("max_projects", p.max_projects),
            ("max_tasks", p.max_tasks),
            ("max_history_sessions", p.max_history_sessions),
            ("history_answer_chars", p.history_answer_chars),
            ("max_source_projects", p.max_source_projects),
            ("max_source_tasks", p.max_source_tasks),
            ("max_question_chars", p.max_question_chars),
            ("default_history_limit", p.default_history_limit),
        ];
        if let Some((name, _)) = bounds.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!(
                "prompt.{name} must be > 0"
            )));
        }

        if !STORAGE_BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be one of {:?}, got '{}'",
                STORAGE_BACKENDS, self.storage.backend
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.model, "gpt-4");
        assert_eq!(config.generation.max_tokens, 1500);
        assert_eq!(config.prompt.max_projects, 10);
        assert_eq!(config.prompt.max_tasks, 20);
        assert_eq!(config.prompt.max_history_sessions, 3);
        assert_eq!(config.prompt.history_answer_chars, 200);
        assert_eq!(config.gateway.port, 5080);
        assert_eq!(config.storage.backend, "sqlite");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.generation.model, config.generation.model);
        assert_eq!(parsed.prompt, config.prompt);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_prompt_bound_rejected() {
        let mut config = AppConfig::default();
        config.prompt.max_tasks = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("prompt.max_tasks"));
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.storage.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.generation.model, "gpt-4");
        assert!(config.generation.api_key.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[generation]\nmodel = \"gpt-4o\"\n\n[prompt]\nmax_projects = 4").unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.generation.model, "gpt-4o");
        assert_eq!(config.generation.max_tokens, 1500);
        assert_eq!(config.prompt.max_projects, 4);
        assert_eq!(config.prompt.max_tasks, 20);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[generation\nmodel = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = [
            ("PMASSIST_API_KEY", "sk-pm"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("PMASSIST_MODEL", "gpt-4o-mini"),
            ("PMASSIST_DB", "/tmp/pm.db"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-pm"));
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.storage.path, "/tmp/pm.db");
        assert_eq!(config.generation.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn openai_key_used_as_fallback() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| (k == "OPENAI_API_KEY").then(|| "sk-openai".to_string()));
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-openai"));
        assert!(config.generation.has_api_key());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.generation.api_key = Some("sk-secret".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4"));
        assert!(toml_str.contains("5080"));
        assert!(!toml_str.contains("api_key"));
    }

    #[test]
    fn sqlite_url_expands_home() {
        let storage = StorageConfig {
            backend: "sqlite".into(),
            path: "/var/lib/pm.db".into(),
        };
        assert_eq!(storage.sqlite_url(), "sqlite:///var/lib/pm.db?mode=rwc");
        let mem = StorageConfig {
            backend: "sqlite".into(),
            path: "sqlite::memory:".into(),
        };
        assert_eq!(mem.sqlite_url(), "sqlite::memory:");
    }
}
