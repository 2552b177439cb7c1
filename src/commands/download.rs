//! Download and resume command handlers.

use std::sync::atomic::Ordering;

use anyhow::{Result, bail};
use tracing::{info, warn};
use vodgrab_core::catalog::CatalogClient;
use vodgrab_core::parser::parse_episode_ranges;
use vodgrab_core::tasks::{AddOutcome, DEFAULT_SHUTDOWN_GRACE, DownloadManager};

use super::search::pick_asset;
use crate::ProcessExit;
use crate::app::exit_handler::exit_outcome_for;
use crate::app::runtime::RunContext;
use crate::app::status_view::{StatusRow, render_table, spawn_live_view};

pub async fn run_download_command(
    ctx: &RunContext,
    keyword: &str,
    pick: u32,
    episodes: Option<&str>,
) -> Result<ProcessExit> {
    let asset = pick_asset(&ctx.catalog, keyword, pick).await?;
    let groups = ctx.catalog.list_groups(&asset).await?;
    if groups.is_empty() {
        bail!("'{}' lists no episodes", asset.title);
    }
    let selected = match episodes {
        Some(selection) => parse_episode_ranges(selection, groups.len())?,
        None => (0..groups.len()).collect(),
    };

    let restored = ctx.manager.restore(&ctx.catalog).await;
    if restored > 0 {
        info!(restored, "resumed tasks from snapshot");
    }

    let mut added = 0_usize;
    for index in selected {
        let group = &groups[index];
        match ctx
            .manager
            .add(&asset, group, index, &ctx.settings.output_dir)?
        {
            AddOutcome::Added => added += 1,
            AddOutcome::AlreadyCompleted => {
                info!(episode = %group.title, "already downloaded, skipping");
            }
            AddOutcome::Duplicate => {
                info!(episode = %group.title, "already queued");
            }
        }
    }
    info!(added, title = %asset.title, "episodes queued");

    watch_until_done(ctx).await
}

pub async fn run_resume_command(ctx: &RunContext) -> Result<ProcessExit> {
    let restored = ctx.manager.restore(&ctx.catalog).await;
    if restored == 0 {
        println!(
            "No resumable tasks in {}.",
            ctx.settings.state_file.display()
        );
        return Ok(ProcessExit::Success);
    }
    info!(restored, "resumed tasks from snapshot");
    watch_until_done(ctx).await
}

/// Shows progress until every task finishes or Ctrl-C, then shuts down.
async fn watch_until_done(ctx: &RunContext) -> Result<ProcessExit> {
    let manager = &ctx.manager;
    manager.start_autosave();
    let (view_handle, stop) = spawn_live_view(ctx.live_view, manager.clone());

    let interrupted = wait_for_completion_or_interrupt(manager).await;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = view_handle {
        let _ = handle.await;
    }
    if !manager.shutdown(DEFAULT_SHUTDOWN_GRACE).await {
        warn!("some workers were still running when the grace period ended");
    }

    let views = manager.status();
    if !ctx.settings.quiet {
        let rows: Vec<StatusRow> = views.iter().map(StatusRow::from).collect();
        print!("{}", render_table(&rows));
    }
    if interrupted {
        info!(
            state_file = %ctx.settings.state_file.display(),
            "interrupted; run `vodgrab resume` to continue"
        );
    }
    Ok(exit_outcome_for(&views))
}

async fn wait_for_completion_or_interrupt(manager: &DownloadManager) -> bool {
    tokio::select! {
        () = manager.wait_until_finished() => false,
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for Ctrl-C");
                manager.wait_until_finished().await;
                return false;
            }
            info!("interrupt received, stopping downloads");
            true
        }
    }
}
