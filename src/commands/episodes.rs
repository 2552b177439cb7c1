//! Episodes command handler: list the episodes of one search result.

use anyhow::Result;
use vodgrab_core::catalog::CatalogClient;

use super::search::pick_asset;
use crate::ProcessExit;
use crate::app::runtime::RunContext;

pub async fn run_episodes_command(ctx: &RunContext, keyword: &str, pick: u32) -> Result<ProcessExit> {
    let asset = pick_asset(&ctx.catalog, keyword, pick).await?;
    let groups = ctx.catalog.list_groups(&asset).await?;

    println!("{}", asset.title);
    if groups.is_empty() {
        println!("No episodes listed.");
        return Ok(ProcessExit::Success);
    }
    let width = groups.len().to_string().len();
    for (index, group) in groups.iter().enumerate() {
        println!("{:>width$}. {}", index + 1, group.title);
    }
    Ok(ProcessExit::Success)
}
