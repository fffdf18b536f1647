//! Subcommand implementations and the shared dependency builders they use

pub mod batch;
pub mod config;
pub mod doctor;
pub mod generate;
pub mod publish;

use anyhow::{Context, Result};
use post_batcher_adapters::{
    batch::FsBatchStore,
    history::{InMemoryHistoryLog, JsonlHistoryLog, SqliteHistoryLog},
    llm::{
        AnthropicProvider, GeminiProvider, LlmConfig, OllamaProvider, OpenAiCompatProvider,
        StubProvider, UnavailableProvider, gemini::GEMINI_BASE_URL, ollama::OLLAMA_BASE_URL,
        openai_compat::OPENAI_BASE_URL,
    },
    reserve_fs,
};
use post_batcher_domain::{
    HistoryLog, SystemClock, TextProvider,
    policy::AcceptanceConfig,
    usecases::ChainConfig,
};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use time::UtcOffset;

use crate::config::{AppConfig, HistoryBackend, ProviderEntry, ProviderKind};

/// Build the ordered provider chain links, one per (entry, model)
pub(crate) fn build_providers(config: &AppConfig) -> Result<Vec<Arc<dyn TextProvider>>> {
    let mut providers: Vec<Arc<dyn TextProvider>> = Vec::new();

    for entry in &config.providers {
        if entry.kind == ProviderKind::Stub {
            providers.push(Arc::new(StubProvider::new(
                entry.name.clone(),
                entry.responses.clone(),
            )));
            continue;
        }

        let api_key = match entry.kind {
            ProviderKind::Ollama => None,
            _ => match read_api_key(entry) {
                Ok(key) => Some(key),
                Err(reason) => {
                    for model in &entry.models {
                        let name = link_name(entry, model);
                        tracing::debug!(provider = %name, reason = %reason, "Provider unavailable");
                        providers.push(Arc::new(UnavailableProvider::new(name, reason.clone())));
                    }
                    continue;
                }
            },
        };

        for model in &entry.models {
            let name = link_name(entry, model);
            let llm = llm_config(config, model);
            let provider: Arc<dyn TextProvider> = match (entry.kind, api_key.clone()) {
                (ProviderKind::Openai, Some(key)) => Arc::new(
                    OpenAiCompatProvider::new(
                        name.clone(),
                        key,
                        entry.base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
                        llm,
                    )?
                    .with_headers(
                        entry
                            .headers
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    ),
                ),
                (ProviderKind::Anthropic, Some(key)) => Arc::new(match &entry.base_url {
                    Some(url) => AnthropicProvider::with_base_url(name.clone(), key, url, llm)?,
                    None => AnthropicProvider::new(name.clone(), key, llm)?,
                }),
                (ProviderKind::Gemini, Some(key)) => Arc::new(GeminiProvider::with_base_url(
                    name.clone(),
                    key,
                    entry.base_url.as_deref().unwrap_or(GEMINI_BASE_URL),
                    llm,
                )?),
                (ProviderKind::Ollama, _) => Arc::new(OllamaProvider::with_base_url(
                    name.clone(),
                    entry.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL),
                    llm,
                )?),
                _ => continue,
            };
            providers.push(provider);
        }
    }

    Ok(providers)
}

fn link_name(entry: &ProviderEntry, model: &str) -> String {
    format!("{}:{}", entry.name, model)
}

fn llm_config(config: &AppConfig, model: &str) -> LlmConfig {
    LlmConfig {
        model: model.to_string(),
        temperature: config.llm.temperature,
        max_output_tokens: config.llm.max_output_tokens,
        timeout_secs: config.llm.timeout_secs,
    }
}

/// Read the entry's API key; the error string says why it is unavailable
fn read_api_key(entry: &ProviderEntry) -> Result<SecretString, String> {
    let env_var = entry
        .api_key_env
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("No API key env var configured for {}", entry.name))?;

    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(SecretString::new(key.into())),
        Ok(_) => Err(format!("{} is empty", env_var)),
        Err(_) => Err(format!("{} is not set", env_var)),
    }
}

pub(crate) fn chain_config(config: &AppConfig) -> ChainConfig {
    ChainConfig {
        // The HTTP client timeout fires first; this bound also covers non-HTTP links
        timeout: Duration::from_secs(config.llm.timeout_secs.saturating_add(5)),
        retries: config.llm.retries,
        backoff: Duration::from_millis(config.llm.backoff_ms),
    }
}

pub(crate) fn acceptance_config(config: &AppConfig) -> AcceptanceConfig {
    let generation = &config.generation;
    AcceptanceConfig {
        min_chars: generation.min_chars,
        max_chars: generation.max_chars,
        min_positivity: generation
            .positivity_check
            .then_some(generation.min_positivity),
    }
}

pub(crate) fn build_batch_store(config: &AppConfig) -> FsBatchStore {
    FsBatchStore::new(config.general.batch_path.clone())
}

pub(crate) async fn build_history(config: &AppConfig) -> Result<Arc<dyn HistoryLog>> {
    let path = &config.general.history_path;
    Ok(match config.general.history_backend {
        HistoryBackend::Jsonl => Arc::new(JsonlHistoryLog::new(path.clone())),
        HistoryBackend::Sqlite => Arc::new(
            SqliteHistoryLog::new(path)
                .await
                .context("Failed to initialize SQLite history log")?,
        ),
        HistoryBackend::Memory => Arc::new(InMemoryHistoryLog::new()),
    })
}

pub(crate) fn build_clock(config: &AppConfig) -> Result<SystemClock> {
    let offset = UtcOffset::from_hms(config.general.utc_offset_hours, 0, 0)
        .context("general.utc_offset_hours is out of range")?;
    Ok(SystemClock::new(offset))
}

/// Reserve entries from config, followed by those in the reserve file
pub(crate) async fn load_reserve(config: &AppConfig) -> Result<Vec<String>> {
    let mut reserve = config.reserve.items.clone();
    if let Some(ref path) = config.reserve.file {
        let from_file = reserve_fs::load_reserve(path)
            .await
            .with_context(|| format!("Failed to read reserve file: {}", path.display()))?;
        reserve.extend(from_file);
    }
    Ok(reserve)
}
