//! Sync command handlers

use anyhow::{bail, Context, Result};

use blink_core::{SyncEngine, SyncError};

use crate::output::Output;

const NOT_CONFIGURED_HELP: &str = "Sync is not configured. Set it up with:\n  \
     blink config set gist_id <gist-id>\n  \
     blink config set github_token <token>";

fn require_configured(engine: &SyncEngine) -> Result<()> {
    if !engine.is_configured() {
        bail!(NOT_CONFIGURED_HELP);
    }
    Ok(())
}

/// Fetch the remote document and merge it into the local replica
pub async fn pull(engine: &SyncEngine, output: &Output) -> Result<()> {
    require_configured(engine)?;

    match engine.try_pull().await {
        Ok(true) => output.success("Pulled remote changes"),
        Ok(false) => output.success("Already up to date"),
        Err(SyncError::NotConfigured) => bail!(NOT_CONFIGURED_HELP),
        Err(e) => return Err(e).context("Pull failed"),
    }
    Ok(())
}

/// Publish the local replica now
pub async fn push(engine: &SyncEngine, output: &Output) -> Result<()> {
    require_configured(engine)?;

    if !engine.upload().await {
        bail!("Push failed. Run with BLINK_LOG=debug for details.");
    }
    output.success("Pushed local changes");
    Ok(())
}

/// Pull then push
pub async fn sync(engine: &SyncEngine, output: &Output) -> Result<()> {
    require_configured(engine)?;
    output.message("Syncing with gist...");

    let merged = engine.try_pull().await.context("Sync failed")?;
    if !engine.upload().await {
        bail!("Sync failed while pushing. Run with BLINK_LOG=debug for details.");
    }

    if merged {
        output.success("Sync complete - merged remote changes");
    } else {
        output.success("Sync complete - remote was up to date");
    }
    Ok(())
}
