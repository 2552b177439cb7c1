//! Tasks command handler: print the persisted snapshot without network access.

use anyhow::Result;
use vodgrab_core::tasks::TaskStore;

use crate::ProcessExit;
use crate::app::config::Settings;
use crate::app::status_view::{StatusRow, render_table};

pub fn run_tasks_command(settings: &Settings) -> Result<ProcessExit> {
    let store = TaskStore::new(settings.state_file.clone());
    let records = store.load()?;
    if records.is_empty() {
        println!("No saved tasks in {}.", store.path().display());
        return Ok(ProcessExit::Success);
    }

    let mut rows: Vec<(chrono::NaiveDateTime, StatusRow)> = records
        .iter()
        .map(|(id, record)| (record.created_at, StatusRow::from_record(id, record)))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
    let rows: Vec<StatusRow> = rows.into_iter().map(|(_, row)| row).collect();
    print!("{}", render_table(&rows));
    Ok(ProcessExit::Success)
}
