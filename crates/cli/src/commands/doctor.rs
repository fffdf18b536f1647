//! Doctor command - validate configuration and show status

use anyhow::Result;
use post_batcher_adapters::outbox::read_outbox;
use post_batcher_domain::{BatchStore, TextProvider};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::DoctorArgs;
use crate::commands::{build_batch_store, build_history, build_providers, load_reserve};
use crate::config::{AppConfig, HistoryBackend};

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    providers: CheckResult,
    reserve: CheckResult,
    history: CheckResult,
    batch: CheckResult,
    x_write: CheckResult,
    outbox: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        providers: CheckResult::error("Not checked"),
        reserve: CheckResult::error("Not checked"),
        history: CheckResult::error("Not checked"),
        batch: CheckResult::error("Not checked"),
        x_write: CheckResult::error("Not checked"),
        outbox: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.providers = check_providers(config);
        report.reserve = check_reserve(config).await;
        report.history = check_history(config).await;
        report.batch = check_batch(config).await;
        report.x_write = check_x_write(config);
        report.outbox = check_outbox(config).await;
    }

    let checks = [
        &report.config,
        &report.providers,
        &report.reserve,
        &report.history,
        &report.batch,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_providers(config: &AppConfig) -> CheckResult {
    let providers: Vec<Arc<dyn TextProvider>> = match build_providers(config) {
        Ok(p) => p,
        Err(e) => return CheckResult::error(format!("Failed to build providers: {:#}", e)),
    };

    if providers.is_empty() {
        return CheckResult::error("No providers configured");
    }

    let available: Vec<&str> = providers
        .iter()
        .filter(|p| p.is_available())
        .map(|p| p.name())
        .collect();
    let unavailable: Vec<&str> = providers
        .iter()
        .filter(|p| !p.is_available())
        .map(|p| p.name())
        .collect();

    let details = serde_json::json!({
        "available": available,
        "unavailable": unavailable,
    });

    let message = format!(
        "{} of {} chain links available",
        available.len(),
        providers.len()
    );

    if available.is_empty() {
        CheckResult::error(format!("{} (set an API key env var)", message)).with_details(details)
    } else if unavailable.is_empty() {
        CheckResult::ok(message).with_details(details)
    } else {
        CheckResult::warn(message).with_details(details)
    }
}

async fn check_reserve(config: &AppConfig) -> CheckResult {
    match load_reserve(config).await {
        Ok(items) if items.is_empty() => {
            CheckResult::warn("Reserve is empty; short rounds will leave the batch below target")
        }
        Ok(items) => {
            let target = config.generation.target_count;
            if items.len() < target {
                CheckResult::warn(format!(
                    "{} reserve items (fewer than target {})",
                    items.len(),
                    target
                ))
            } else {
                CheckResult::ok(format!("{} reserve items", items.len()))
            }
        }
        Err(e) => CheckResult::error(format!("{:#}", e)),
    }
}

async fn check_history(config: &AppConfig) -> CheckResult {
    let backend = config.general.history_backend;
    if backend == HistoryBackend::Memory {
        return CheckResult::warn("History backend: memory (duplicates across runs go unnoticed)");
    }

    let history = match build_history(config).await {
        Ok(h) => h,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };

    match history.load_seen().await {
        Ok(seen) => CheckResult::ok(format!(
            "History backend: {:?}, {} known texts at {}",
            backend,
            seen.len(),
            config.general.history_path.display()
        )),
        Err(e) => CheckResult::error(format!("Failed to read history: {}", e)),
    }
}

async fn check_batch(config: &AppConfig) -> CheckResult {
    let store = build_batch_store(config);
    match store.load().await {
        Ok(Some(batch)) => CheckResult::ok(format!(
            "Batch for {}: {} pending, {} published",
            batch.date,
            batch.items.len(),
            batch.published
        )),
        Ok(None) => CheckResult::ok(format!(
            "No batch yet at {}",
            store.path().display()
        )),
        Err(e) => CheckResult::error(format!("Batch file unreadable: {}", e)),
    }
}

fn check_x_write(config: &AppConfig) -> CheckResult {
    if !config.x.enabled {
        return CheckResult::ok("X write disabled");
    }

    let env_var = &config.x.oauth2_user_token_env;

    if env_var.is_empty() {
        return CheckResult::error("No user token env var configured");
    }

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => CheckResult::ok(format!(
            "User token: {} (set), max chars: {}",
            env_var, config.x.max_chars
        )),
        _ => CheckResult::warn(format!("User token: {} (not set)", env_var)),
    }
}

async fn check_outbox(config: &AppConfig) -> CheckResult {
    let path = &config.publish.outbox_path;
    match read_outbox(path).await {
        Ok(entries) if entries.is_empty() => CheckResult::ok("No posts awaiting approval"),
        Ok(entries) => CheckResult::ok(format!(
            "{} post(s) awaiting approval in {}",
            entries.len(),
            path.display()
        ))
        .with_details(serde_json::json!({
            "oldest": entries.first().map(|e| e.queued_at.to_string()),
        })),
        Err(e) => CheckResult::warn(format!("Outbox unreadable: {}", e)),
    }
}

fn print_report(report: &DoctorReport) {
    println!("post-batcher Doctor Report");
    println!("==========================");
    println!();

    print_check("Config", &report.config);
    print_check("Providers", &report.providers);
    print_check("Reserve", &report.reserve);
    print_check("History", &report.history);
    print_check("Batch", &report.batch);
    print_check("X Write", &report.x_write);
    print_check("Outbox", &report.outbox);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall != "error" {
        println!();
        println!("Ready to run! Try: post-batcher generate");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
