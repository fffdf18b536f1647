//! Publish command - post pending batch items

use anyhow::{Context, Result, bail};
use post_batcher_adapters::{outbox::OutboxPublisher, x::XPublisher};
use post_batcher_domain::{
    BatchStore, Publisher,
    usecases::{PublishConfig, PublishUseCase},
};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::args::PublishArgs;
use crate::commands::{build_batch_store, build_clock, build_history};
use crate::config::AppConfig;

pub async fn execute(args: PublishArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let require_approval = args.require_approval;
    if args.outbox.is_some() && !require_approval {
        tracing::warn!("--outbox is ignored without --require-approval");
    }

    let mut dry_run = args.dry_run || config.general.dry_run;
    if require_approval && dry_run {
        tracing::info!("--require-approval overrides dry-run");
        dry_run = false;
    }

    let max_posts = args.count.unwrap_or(config.publish.max_posts);

    tracing::info!(
        dry_run = dry_run,
        require_approval = require_approval,
        max_posts = max_posts,
        batch_path = %config.general.batch_path.display(),
        "Starting post-batcher publish"
    );

    let publisher: Arc<dyn Publisher> = if require_approval {
        let outbox_path = args
            .outbox
            .clone()
            .unwrap_or_else(|| config.publish.outbox_path.clone());
        let outbox = OutboxPublisher::open(&outbox_path, "x")
            .await
            .with_context(|| format!("Failed to open outbox: {}", outbox_path.display()))?;

        tracing::info!(outbox = %outbox.path().display(), "Writing approvals to outbox");
        Arc::new(outbox)
    } else {
        build_x_publisher(&config, dry_run)?
    };

    let batch_store: Arc<dyn BatchStore> = Arc::new(build_batch_store(&config));
    let history = build_history(&config).await?;
    let clock = Arc::new(build_clock(&config)?);

    let use_case = PublishUseCase::new(
        batch_store,
        history,
        publisher,
        clock,
        PublishConfig {
            max_posts,
            delay: Duration::from_secs(config.publish.delay_secs),
            dry_run,
        },
    );

    let report = use_case.run().await.context("Publish run failed")?;

    if dry_run {
        println!(
            "Dry run: would publish {} of {} pending item(s)",
            report.previewed, report.remaining
        );
    } else {
        println!(
            "Published {} item(s), {} remaining",
            report.published, report.remaining
        );
    }

    if report.stopped_on_error {
        bail!("Publishing stopped after a failure; the item stays at the front of the batch");
    }

    Ok(())
}

fn build_x_publisher(config: &AppConfig, dry_run: bool) -> Result<Arc<dyn Publisher>> {
    if dry_run {
        return Ok(Arc::new(XPublisher::disabled()));
    }

    if !config.x.enabled {
        bail!("No publisher enabled: set x.enabled = true or use --require-approval");
    }

    let env_var = &config.x.oauth2_user_token_env;
    let token = std::env::var(env_var)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .with_context(|| format!("Missing X user token env var {}", env_var))?;

    Ok(Arc::new(XPublisher::new(
        SecretString::new(token.into()),
        config.x.max_chars,
    )?))
}
