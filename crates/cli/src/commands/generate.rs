//! Generate command - build today's batch through the provider chain

use anyhow::{Context, Result};
use post_batcher_adapters::sentiment::VaderScorer;
use post_batcher_domain::{
    BatchStore, GenerationReport, SessionOutcome,
    format::BlockFormat,
    policy::AcceptanceFilter,
    prompt::PromptTemplate,
    usecases::{GenerationConfig, GenerationSession, ProviderChain, SessionError},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::args::GenerateArgs;
use crate::commands::{
    acceptance_config, build_batch_store, build_clock, build_history, build_providers,
    chain_config, load_reserve,
};
use crate::config::AppConfig;

pub async fn execute(args: GenerateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let target_count = args.target.unwrap_or(config.generation.target_count);
    if target_count == 0 {
        anyhow::bail!("--target must be at least 1");
    }

    let chain = ProviderChain::new(build_providers(&config)?, chain_config(&config));
    let filter = AcceptanceFilter::new(acceptance_config(&config), Arc::new(VaderScorer::new()));

    let batch_store: Arc<dyn BatchStore> = Arc::new(build_batch_store(&config));
    let history = build_history(&config).await?;
    let clock = Arc::new(build_clock(&config)?);

    let generation = &config.generation;
    let session_config = GenerationConfig {
        target_count,
        max_rounds: generation.max_rounds,
        round_delay: Duration::from_secs(generation.round_delay_secs),
        prompt: generation
            .prompt
            .as_deref()
            .map(PromptTemplate::new)
            .unwrap_or_default(),
        format: BlockFormat::new(
            generation.block_label.clone(),
            generation.image_marker.clone(),
        ),
        reserve: load_reserve(&config).await?,
        force: args.force,
    };

    tracing::info!(
        target = target_count,
        force = args.force,
        batch_path = %config.general.batch_path.display(),
        "Starting post-batcher generate"
    );

    let session = GenerationSession::new(chain, filter, batch_store, history, clock, session_config);

    let result = match session.run().await {
        Ok(result) => result,
        Err(SessionError::Persistence { source, report }) => {
            println!("{}", report.summary_line("Generation failed"));
            return Err(source).with_context(|| {
                format!(
                    "Failed to write batch file: {}",
                    config.general.batch_path.display()
                )
            });
        }
        Err(e) => {
            let report = GenerationReport {
                target: target_count,
                ..Default::default()
            };
            println!("{}", report.summary_line("Generation aborted"));
            return Err(e).context("Generation session failed");
        }
    };

    let status = match result.outcome {
        SessionOutcome::AlreadySatisfied => "Batch already exists",
        SessionOutcome::TargetMet => "Generation complete",
        SessionOutcome::FilledFromReserve if result.report.shortfall() > 0 => {
            "Generation complete (short of target)"
        }
        SessionOutcome::FilledFromReserve => "Generation complete (reserve used)",
    };
    println!("{}", result.report.summary_line(status));

    Ok(())
}
