//! Configuration loading and management

use anyhow::{Context, Result};
use post_batcher_adapters::llm::openai_compat::OPENROUTER_BASE_URL;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    /// Ordered fallback chain; earlier entries are tried first
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderEntry>,

    #[serde(default)]
    pub reserve: ReserveConfig,

    #[serde(default)]
    pub publish: PublishSettings,

    #[serde(default)]
    pub x: XConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            generation: GenerationSettings::default(),
            llm: LlmSettings::default(),
            providers: default_providers(),
            reserve: ReserveConfig::default(),
            publish: PublishSettings::default(),
            x: XConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    Jsonl,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_batch_path")]
    pub batch_path: PathBuf,

    #[serde(default = "default_history_backend")]
    pub history_backend: HistoryBackend,

    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Offset from UTC, in hours, that defines the calendar day
    #[serde(default)]
    pub utc_offset_hours: i8,

    #[serde(default = "default_true")]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Positivity must be strictly greater than this
    #[serde(default = "default_min_positivity")]
    pub min_positivity: f64,

    #[serde(default = "default_true")]
    pub positivity_check: bool,

    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    #[serde(default = "default_round_delay")]
    pub round_delay_secs: u64,

    /// Prompt template; the built-in template is used when unset
    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default = "default_block_label")]
    pub block_label: String,

    #[serde(default = "default_image_marker")]
    pub image_marker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_llm_retries")]
    pub retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions or any compatible endpoint
    Openai,
    Anthropic,
    Gemini,
    Ollama,
    /// Scripted responses, for offline runs and tests
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub name: String,

    pub kind: ProviderKind,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    /// One chain link per model, in order
    #[serde(default)]
    pub models: Vec<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Scripted outputs for `kind = "stub"`
    #[serde(default)]
    pub responses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReserveConfig {
    #[serde(default)]
    pub items: Vec<String>,

    /// Optional file with one item per line
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSettings {
    #[serde(default = "default_max_posts")]
    pub max_posts: usize,

    #[serde(default = "default_publish_delay")]
    pub delay_secs: u64,

    #[serde(default = "default_outbox_path")]
    pub outbox_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_x_user_token_env")]
    pub oauth2_user_token_env: String,

    #[serde(default = "default_x_max_chars")]
    pub max_chars: usize,
}

// Default value functions
fn default_batch_path() -> PathBuf {
    PathBuf::from("./data/batch.json")
}

fn default_history_backend() -> HistoryBackend {
    HistoryBackend::Jsonl
}

fn default_history_path() -> PathBuf {
    PathBuf::from("./data/history.jsonl")
}

fn default_true() -> bool {
    true
}

fn default_target_count() -> usize {
    5
}

fn default_min_chars() -> usize {
    1
}

fn default_max_chars() -> usize {
    280
}

fn default_min_positivity() -> f64 {
    0.1
}

fn default_max_rounds() -> usize {
    5
}

fn default_round_delay() -> u64 {
    2
}

fn default_block_label() -> String {
    "Tweet".to_string()
}

fn default_image_marker() -> Option<String> {
    Some("Image suggestion:".to_string())
}

fn default_temperature() -> f64 {
    0.9
}

fn default_max_output_tokens() -> u32 {
    1500
}

fn default_timeout() -> u64 {
    30
}

fn default_llm_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_max_posts() -> usize {
    1
}

fn default_publish_delay() -> u64 {
    30
}

fn default_outbox_path() -> PathBuf {
    PathBuf::from("./data/outbox.jsonl")
}

fn default_x_user_token_env() -> String {
    "X_USER_TOKEN".to_string()
}

fn default_x_max_chars() -> usize {
    280
}

fn default_providers() -> Vec<ProviderEntry> {
    let entry = |name: &str, kind, key: &str, models: &[&str]| ProviderEntry {
        name: name.to_string(),
        kind,
        api_key_env: Some(key.to_string()),
        base_url: None,
        models: models.iter().map(|m| m.to_string()).collect(),
        headers: BTreeMap::new(),
        responses: vec![],
    };

    let mut openrouter = entry(
        "openrouter",
        ProviderKind::Openai,
        "OPENROUTER_API_KEY",
        &["anthropic/claude-3.5-sonnet"],
    );
    openrouter.base_url = Some(OPENROUTER_BASE_URL.to_string());
    openrouter
        .headers
        .insert("X-Title".to_string(), "post-batcher".to_string());

    vec![
        entry(
            "openai",
            ProviderKind::Openai,
            "OPENAI_API_KEY",
            &["gpt-4o-mini", "gpt-3.5-turbo"],
        ),
        entry(
            "openai_secondary",
            ProviderKind::Openai,
            "OPENAI_SECONDARY_API_KEY",
            &["gpt-4o-mini"],
        ),
        entry(
            "anthropic",
            ProviderKind::Anthropic,
            "ANTHROPIC_API_KEY",
            &["claude-3-5-haiku-latest"],
        ),
        openrouter,
        entry(
            "gemini",
            ProviderKind::Gemini,
            "GEMINI_API_KEY",
            &["gemini-1.5-flash"],
        ),
    ]
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            batch_path: default_batch_path(),
            history_backend: default_history_backend(),
            history_path: default_history_path(),
            utc_offset_hours: 0,
            dry_run: default_true(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            min_positivity: default_min_positivity(),
            positivity_check: true,
            max_rounds: default_max_rounds(),
            round_delay_secs: default_round_delay(),
            prompt: None,
            block_label: default_block_label(),
            image_marker: default_image_marker(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout(),
            retries: default_llm_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            max_posts: default_max_posts(),
            delay_secs: default_publish_delay(),
            outbox_path: default_outbox_path(),
        }
    }
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            oauth2_user_token_env: default_x_user_token_env(),
            max_chars: default_x_max_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("POST_BATCHER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.target_count == 0 {
            anyhow::bail!("generation.target_count must be at least 1");
        }
        if generation.min_chars > generation.max_chars {
            anyhow::bail!(
                "generation.min_chars ({}) exceeds generation.max_chars ({})",
                generation.min_chars,
                generation.max_chars
            );
        }
        for entry in &self.providers {
            if entry.kind != ProviderKind::Stub && entry.models.is_empty() {
                anyhow::bail!("Provider '{}' lists no models", entry.name);
            }
        }
        Ok(())
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# post-batcher configuration

[general]
batch_path = "./data/batch.json"
history_backend = "jsonl"  # jsonl, sqlite, memory
history_path = "./data/history.jsonl"
# Calendar day used for the batch date
utc_offset_hours = 0
dry_run = true

[generation]
target_count = 5
min_chars = 1
max_chars = 280
# Positivity must be strictly greater than this
min_positivity = 0.1
positivity_check = true
max_rounds = 5
round_delay_secs = 2
block_label = "Tweet"
image_marker = "Image suggestion:"
# Placeholders: {count} {min_chars} {max_chars} {format}
# prompt = "Generate {count} witty posts about open source, {min_chars}-{max_chars} characters each.\n\n{format}"

[llm]
temperature = 0.9
max_output_tokens = 1500
timeout_secs = 30
retries = 2
backoff_ms = 500

# Providers are tried in order; a provider whose key variable is unset is skipped.
[[providers]]
name = "openai"
kind = "openai"
api_key_env = "OPENAI_API_KEY"
models = ["gpt-4o-mini", "gpt-3.5-turbo"]

[[providers]]
name = "openai_secondary"
kind = "openai"
api_key_env = "OPENAI_SECONDARY_API_KEY"
models = ["gpt-4o-mini"]

[[providers]]
name = "anthropic"
kind = "anthropic"
api_key_env = "ANTHROPIC_API_KEY"
models = ["claude-3-5-haiku-latest"]

[[providers]]
name = "openrouter"
kind = "openai"
api_key_env = "OPENROUTER_API_KEY"
base_url = "https://openrouter.ai/api/v1"
models = ["anthropic/claude-3.5-sonnet"]
headers = { "X-Title" = "post-batcher" }

[[providers]]
name = "gemini"
kind = "gemini"
api_key_env = "GEMINI_API_KEY"
models = ["gemini-1.5-flash"]

# [[providers]]
# name = "local"
# kind = "ollama"
# base_url = "http://localhost:11434"
# models = ["llama3.2"]

[reserve]
items = [
    "Weekend plan: refactor nothing, ship everything.",
    "Today's bug is tomorrow's war story.",
    "Every expert was once a beginner who kept hitting run.",
    "Coffee compiled. Ready to deploy optimism.",
    "Small commits, big smiles.",
]
# file = "./reserve.txt"

[publish]
max_posts = 1
delay_secs = 30
outbox_path = "./data/outbox.jsonl"

[x]
enabled = false
oauth2_user_token_env = "X_USER_TOKEN"
max_chars = 280
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_toml_parses_to_defaults() {
        let parsed: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(parsed.generation.target_count, defaults.generation.target_count);
        assert_eq!(parsed.general.history_backend, HistoryBackend::Jsonl);
        assert_eq!(parsed.providers.len(), defaults.providers.len());
        assert_eq!(parsed.providers[3].headers["X-Title"], "post-batcher");
        assert_eq!(parsed.providers[3].base_url, defaults.providers[3].base_url);
        assert_eq!(parsed.reserve.items.len(), 5);
        parsed.validate().unwrap();
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/post-batcher.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_min_above_max_is_rejected() {
        let mut config = AppConfig::default();
        config.generation.min_chars = 600;
        config.generation.max_chars = 500;
        assert!(config.validate().is_err());
    }
}
