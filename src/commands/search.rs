//! Search command handler: list catalog matches for a keyword.

use anyhow::{Result, bail};
use vodgrab_core::catalog::{Asset, CatalogClient};

use crate::ProcessExit;
use crate::app::runtime::RunContext;

pub async fn run_search_command(ctx: &RunContext, keyword: &str) -> Result<ProcessExit> {
    let results = ctx.catalog.search(keyword).await?;
    if results.is_empty() {
        println!("No results for '{keyword}'.");
        return Ok(ProcessExit::Success);
    }

    let width = results.len().to_string().len();
    for (index, asset) in results.iter().enumerate() {
        println!("{:>width$}. {}  {}", index + 1, asset.title, asset.detail_url);
    }
    Ok(ProcessExit::Success)
}

/// Searches and returns the `pick`-th (1-based) result.
pub(crate) async fn pick_asset(
    catalog: &dyn CatalogClient,
    keyword: &str,
    pick: u32,
) -> Result<Asset> {
    let results = catalog.search(keyword).await?;
    select_pick(results, keyword, pick)
}

fn select_pick(results: Vec<Asset>, keyword: &str, pick: u32) -> Result<Asset> {
    if results.is_empty() {
        bail!("No results for '{keyword}'");
    }
    let count = results.len();
    let Some(asset) = usize::try_from(pick)
        .ok()
        .and_then(|pick| pick.checked_sub(1))
        .and_then(|index| results.into_iter().nth(index))
    else {
        bail!("Pick {pick} is out of range: '{keyword}' returned {count} result(s)");
    };
    Ok(asset)
}
