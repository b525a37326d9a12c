use crate::constants::{
    CONFIG_DIR_NAME, DEFAULT_API_KEY_ENV, GEMINI_BASE_URL, GEMINI_DEFAULT_MODEL, OLLAMA_BASE_URL,
    OLLAMA_DEFAULT_MODEL, OPENAI_API_KEY_ENV, OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One model backend. Credentials are never stored here, only the name of
/// the environment variable that holds them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub active_model: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Appended to every system prompt sent through this provider.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub active_provider: String,
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_provider: "Gemini".to_string(),
            providers: vec![
                ProviderConfig {
                    name: "Gemini".to_string(),
                    base_url: GEMINI_BASE_URL.to_string(),
                    active_model: GEMINI_DEFAULT_MODEL.to_string(),
                    api_key_env: Some(DEFAULT_API_KEY_ENV.to_string()),
                    system_prompt: None,
                },
                ProviderConfig {
                    name: "OpenAI".to_string(),
                    base_url: OPENAI_BASE_URL.to_string(),
                    active_model: OPENAI_DEFAULT_MODEL.to_string(),
                    api_key_env: Some(OPENAI_API_KEY_ENV.to_string()),
                    system_prompt: None,
                },
                ProviderConfig {
                    name: "Ollama".to_string(),
                    base_url: OLLAMA_BASE_URL.to_string(),
                    active_model: OLLAMA_DEFAULT_MODEL.to_string(),
                    api_key_env: None,
                    system_prompt: None,
                },
            ],
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(CONFIG_DIR_NAME);
        path
    }

    pub fn config_file() -> PathBuf {
        let mut path = Self::config_dir();
        path.push("config.toml");
        path
    }

    /// Loads the user config, writing the defaults on first run.
    ///
    /// A missing or unreadable file never stops the editor from starting.
    pub fn load() -> Self {
        let path = Self::config_file();
        if path.exists() {
            match Self::load_from(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Ignoring config at {:?}: {:#}", path, e),
            }
        }
        let default = Self::default();
        if let Err(e) = default.save() {
            tracing::warn!("Could not write default config: {:#}", e);
        }
        default
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_file())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_active_provider(&self) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.name == self.active_provider)
    }

    /// Resolves the provider to use, applying command-line style overrides.
    ///
    /// `provider` picks an entry by name (case-insensitive); `model` replaces
    /// its active model for this run only.
    pub fn resolve_provider(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> anyhow::Result<ProviderConfig> {
        let mut selected = match provider {
            Some(name) => self
                .providers
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .with_context(|| format!("Unknown provider '{}'", name))?,
            None => self.get_active_provider().with_context(|| {
                format!("Active provider '{}' is not configured", self.active_provider)
            })?,
        }
        .clone();
        if let Some(model) = model {
            selected.active_model = model.to_string();
        }
        Ok(selected)
    }
}
