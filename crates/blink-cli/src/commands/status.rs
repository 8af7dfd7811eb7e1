//! Status command handler

use anyhow::{Context, Result};

use blink_core::{Config, SyncEngine};

use crate::output::{print_json, Output, OutputFormat};

/// Show status information
pub async fn show(engine: &SyncEngine, config: &Config, output: &Output) -> Result<()> {
    let document = engine
        .document()
        .await
        .context("Failed to read local replica")?;

    let total = document.len();
    let starred = document.items.iter().filter(|item| item.starred).count();
    let seen = document.items.iter().filter(|item| item.seen).count();
    let published = config.retention().prune(&document, chrono::Utc::now()).len();
    let updated_at = document.updated_at.map(|at| at.to_rfc3339());

    match output.format {
        OutputFormat::Json => {
            print_json(&serde_json::json!({
                "sync_configured": engine.is_configured(),
                "gist_id": config.gist_id,
                "retention_days": config.retention_days,
                "database": config.sqlite_path(),
                "updated_at": updated_at,
                "counts": {
                    "items": total,
                    "starred": starred,
                    "seen": seen,
                    "published": published
                }
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", starred);
        }
        OutputFormat::Human => {
            println!("Blink Status");
            println!("============");
            println!();
            println!("Sync:");
            println!(
                "  Status:    {}",
                if engine.is_configured() {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            if let Some(ref gist_id) = config.gist_id {
                println!("  Gist:      {}", gist_id);
            }
            println!("  Retention: {} day(s)", config.retention_days);
            println!(
                "  Updated:   {}",
                updated_at.as_deref().unwrap_or("(never)")
            );
            println!();
            println!("Storage:");
            println!("  Database: {}", config.sqlite_path().display());
            println!();
            println!("Contents:");
            println!("  Items:     {}", total);
            println!("  Starred:   {}", starred);
            println!("  Seen:      {}", seen);
            println!("  Published: {}", published);
        }
    }

    Ok(())
}
