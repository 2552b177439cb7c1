//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resumable concurrent downloader for segmented streaming episodes.
///
/// vodgrab searches a catalog site, lists the episodes of a result and
/// downloads the selected ones as single playable files. Interrupted runs
/// resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "vodgrab")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory that receives downloaded episodes
    #[arg(short = 'o', long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Segment workers per task (1-256, at most 32 run at once)
    #[arg(short = 'w', long, global = true, value_parser = clap::value_parser!(u16).range(1..=256))]
    pub workers: Option<u16>,

    /// Task snapshot file used to resume interrupted downloads
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    /// Catalog site base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Search the catalog and list matching titles
    Search {
        /// Search keyword
        keyword: String,
    },

    /// List the episodes of one search result
    Episodes {
        /// Search keyword
        keyword: String,

        /// 1-based position of the result in the search listing
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        pick: u32,
    },

    /// Download selected episodes of one search result
    Download {
        /// Search keyword
        keyword: String,

        /// 1-based position of the result in the search listing
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        pick: u32,

        /// Episode selection, e.g. "1-3,5,7-9"; all episodes when omitted
        #[arg(short, long)]
        episodes: Option<String>,
    },

    /// Resume the tasks recorded in the snapshot file
    Resume,

    /// Show the tasks recorded in the snapshot file
    Tasks,
}
