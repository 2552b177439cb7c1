use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use vodgrab_core::catalog::HtmlCatalog;
use vodgrab_core::download::{HttpClient, READ_TIMEOUT_SECS};
use vodgrab_core::tasks::{DownloadManager, ManagerConfig, SegmentPipeline, TaskStore};

use crate::ProcessExit;
use crate::app::config::{Settings, load_default_file_config};
use crate::app::terminal;
use crate::cli::{Args, Command};
use crate::commands;

/// Services shared by the network-facing commands.
pub(crate) struct RunContext {
    pub settings: Settings,
    pub catalog: HtmlCatalog,
    pub manager: DownloadManager,
    pub live_view: bool,
}

impl RunContext {
    fn build(settings: Settings) -> Result<Self> {
        let client = HttpClient::with_timeouts(settings.connect_timeout_secs, READ_TIMEOUT_SECS);
        let catalog = HtmlCatalog::new(client.clone(), &settings.base_url)
            .with_context(|| format!("Invalid catalog base URL '{}'", settings.base_url))?;
        let manager = DownloadManager::new(
            Arc::new(SegmentPipeline::new(client, settings.max_workers)),
            TaskStore::new(&settings.state_file),
            ManagerConfig::default(),
        );
        let live_view = terminal::should_use_live_view(
            io::stderr().is_terminal(),
            settings.quiet,
            terminal::is_dumb_terminal(),
        );
        Ok(Self {
            settings,
            catalog,
            manager,
            live_view,
        })
    }
}

pub(crate) async fn run_vodgrab() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let file_config = load_default_file_config()?;
    let settings = Settings::resolve(&args, file_config.as_ref());
    terminal::init_tracing(settings.log_level, terminal::is_no_color_requested());

    debug!(?args, ?settings, "CLI arguments parsed");
    info!("vodgrab starting");

    if args.command == Command::Tasks {
        return commands::run_tasks_command(&settings);
    }

    let ctx = RunContext::build(settings)?;
    match args.command {
        Command::Search { keyword } => commands::run_search_command(&ctx, &keyword).await,
        Command::Episodes { keyword, pick } => {
            commands::run_episodes_command(&ctx, &keyword, pick).await
        }
        Command::Download {
            keyword,
            pick,
            episodes,
        } => commands::run_download_command(&ctx, &keyword, pick, episodes.as_deref()).await,
        Command::Resume => commands::run_resume_command(&ctx).await,
        Command::Tasks => commands::run_tasks_command(&ctx.settings),
    }
}
