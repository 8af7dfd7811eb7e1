//! Item annotation command handlers

use anyhow::{Context, Result};

use blink_core::{ItemMetadata, ItemRecord, SyncEngine};

use super::confirm;
use crate::output::{print_json, Output, OutputFormat};

/// Mark items as seen
pub async fn seen(engine: &SyncEngine, ids: Vec<String>, output: &Output) -> Result<()> {
    let metadata = ItemMetadata::default();
    engine
        .mark_seen_many(ids.iter().map(|id| (id.as_str(), &metadata)))
        .await
        .context("Failed to mark items seen")?;

    output.success(&format!("Marked {} item(s) seen", ids.len()));
    Ok(())
}

/// Star an item, caching its title and URL
pub async fn star(
    engine: &SyncEngine,
    id: String,
    title: Option<String>,
    url: Option<String>,
    output: &Output,
) -> Result<()> {
    let metadata = ItemMetadata {
        title,
        url,
        ..ItemMetadata::default()
    };
    engine
        .set_starred(&id, true, &metadata)
        .await
        .context("Failed to star item")?;

    output.success(&format!("Starred {}", id));
    Ok(())
}

pub async fn unstar(engine: &SyncEngine, id: String, output: &Output) -> Result<()> {
    engine
        .set_starred(&id, false, &ItemMetadata::default())
        .await
        .context("Failed to unstar item")?;

    output.success(&format!("Unstarred {}", id));
    Ok(())
}

/// Flip the star on an item
pub async fn toggle(engine: &SyncEngine, id: String, output: &Output) -> Result<()> {
    let starred = engine
        .toggle_star(&id, &ItemMetadata::default())
        .await
        .context("Failed to toggle star")?;

    match output.format {
        OutputFormat::Json => print_json(&serde_json::json!({"id": id, "starred": starred})),
        OutputFormat::Quiet => println!("{}", starred),
        OutputFormat::Human => {
            let verb = if starred { "Starred" } else { "Unstarred" };
            output.success(&format!("{} {}", verb, id));
        }
    }
    Ok(())
}

/// List starred items
pub async fn starred(engine: &SyncEngine, output: &Output) -> Result<()> {
    let document = engine
        .document()
        .await
        .context("Failed to read local replica")?;

    let items: Vec<ItemRecord> = document
        .items
        .into_iter()
        .filter(|item| item.starred)
        .collect();
    output.print_items(&items);
    Ok(())
}

/// Clear the local replica
pub async fn reset(engine: &SyncEngine, yes: bool, output: &Output) -> Result<()> {
    if !yes && output.should_prompt() {
        println!("This clears every local read and star annotation.");
        if engine.is_configured() {
            println!("The remote copy is kept and restored on the next pull.");
        }
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    engine.reset().await.context("Failed to reset local replica")?;
    output.success("Local replica cleared");
    Ok(())
}
