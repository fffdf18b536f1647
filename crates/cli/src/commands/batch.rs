//! Batch command - inspect the stored batch

use anyhow::{Context, Result};
use post_batcher_domain::{Batch, BatchStore, ItemOrigin};
use std::path::PathBuf;

use crate::args::{BatchArgs, BatchCommands};
use crate::commands::build_batch_store;
use crate::config::AppConfig;

pub async fn execute(args: BatchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    match args.command {
        BatchCommands::Show { json } => show_batch(&config, json).await,
    }
}

async fn show_batch(config: &AppConfig, json: bool) -> Result<()> {
    let store = build_batch_store(config);
    let batch = store
        .load()
        .await
        .with_context(|| format!("Failed to read batch: {}", store.path().display()))?;

    match (batch, json) {
        (Some(batch), true) => println!("{}", serde_json::to_string_pretty(&batch)?),
        (None, true) => println!("null"),
        (Some(batch), false) => print_batch(&batch),
        (None, false) => println!("No batch stored at {}", store.path().display()),
    }

    Ok(())
}

fn print_batch(batch: &Batch) {
    println!(
        "Batch for {} ({} pending, {} published, target {})",
        batch.date,
        batch.items.len(),
        batch.published,
        batch.target_count
    );
    println!();

    for (i, item) in batch.items.iter().enumerate() {
        let origin = match &item.origin {
            ItemOrigin::Generated { provider } => provider.as_str(),
            ItemOrigin::Reserve => "reserve",
        };
        println!("{:>2}. [{}] {}", i + 1, origin, item.text);
        if let Some(ref image) = item.image_suggestion {
            println!("    Image: {}", image);
        }
    }
}
