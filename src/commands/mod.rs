//! CLI command handlers.

mod download;
mod episodes;
mod search;
mod tasks;

pub use download::{run_download_command, run_resume_command};
pub use episodes::run_episodes_command;
pub use search::run_search_command;
pub use tasks::run_tasks_command;
