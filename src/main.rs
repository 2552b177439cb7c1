//! CLI entry point for vodgrab.

use std::process::ExitCode;

use anyhow::Result;

mod app;
mod cli;
mod commands;

/// Process exit outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// No task failed.
    Success,
    /// Some tasks completed and some failed.
    Partial,
    /// Every finished task failed.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Partial => ExitCode::from(2),
            ProcessExit::Failure => ExitCode::from(1),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let exit = app::runtime::run_vodgrab().await?;
    Ok(exit.into())
}
