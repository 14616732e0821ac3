use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the per-project configuration file, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "fnsynth.toml";

/// Cache root used when nothing else is configured
pub const DEFAULT_CACHE_DIR: &str = "__fnsynth_cache__";

/// Project-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// LLM provider to use (e.g., "anthropic", "openai")
    #[serde(default)]
    pub provider: Option<String>,

    /// Model used when a declaration does not name one
    #[serde(default)]
    pub model: Option<String>,

    /// Root of the completion cache, implementation files and history
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Reuse cached completions for identical conversations
    #[serde(default)]
    pub completion_cache: Option<bool>,

    /// Record every synthesis in the history database
    #[serde(default)]
    pub save_history: Option<bool>,
}

impl ProjectConfig {
    /// Load configuration with precedence: env > project file > global file > defaults.
    pub fn load() -> Result<Self> {
        let global = Self::global_path();
        let config = Self::load_layers(global.as_deref(), Path::new(PROJECT_CONFIG_FILE))?;
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Merge the global and project files, either of which may be absent.
    pub fn load_layers(global: Option<&Path>, project: &Path) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global) = global.filter(|p| p.exists()) {
            config = config.merge(Self::load_from(global)?);
            debug!(path = %global.display(), "loaded global configuration");
        }

        if project.exists() {
            config = config.merge(Self::load_from(project)?);
            debug!(path = %project.display(), "loaded project configuration");
        }

        Ok(config)
    }

    /// Parse a single configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config: {}", path.display()))
    }

    /// Overlay `other` on top of `self`; set fields in `other` win.
    pub fn merge(self, other: Self) -> Self {
        Self {
            provider: other.provider.or(self.provider),
            model: other.model.or(self.model),
            cache_dir: other.cache_dir.or(self.cache_dir),
            completion_cache: other.completion_cache.or(self.completion_cache),
            save_history: other.save_history.or(self.save_history),
        }
    }

    /// Apply `FNSYNTH_*` overrides read through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(provider) = lookup("FNSYNTH_PROVIDER") {
            self.provider = Some(provider);
        }
        if let Some(model) = lookup("FNSYNTH_MODEL") {
            self.model = Some(model);
        }
        if let Some(dir) = lookup("FNSYNTH_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// ~/.fnsynth/config.toml
    pub fn global_path() -> Option<PathBuf> {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".fnsynth").join("config.toml"))
    }

    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }

    pub fn is_completion_cache(&self) -> bool {
        self.completion_cache.unwrap_or(true)
    }

    pub fn is_save_history(&self) -> bool {
        self.save_history.unwrap_or(true)
    }
}
