//! Catalog collaborator: finds assets and their episode (segment group) pages.
//!
//! The download core only needs two things from a catalog: a list of assets
//! for a keyword, and the ordered episode entries of one asset. Both are
//! behind the [`CatalogClient`] trait so the task registry can be driven by a
//! stub in tests and by [`HtmlCatalog`] in the binary.

mod html;

pub use html::{DEFAULT_BASE_URL, HtmlCatalog, MAX_SEARCH_PAGES};

use async_trait::async_trait;
use thiserror::Error;

use crate::download::DownloadError;

/// A searchable media asset (a show or a film).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Display title.
    pub title: String,
    /// Absolute URL of the asset's detail page.
    pub detail_url: String,
    /// Poster image URL, when the listing has one.
    pub poster: Option<String>,
}

impl Asset {
    /// Creates an asset without poster.
    pub fn new(title: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail_url: detail_url.into(),
            poster: None,
        }
    }
}

/// One selectable entry of an asset (an episode), pointing at its play page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    /// Display title, used as the artifact file name.
    pub title: String,
    /// Absolute play page URL.
    pub url: String,
}

impl GroupEntry {
    /// Creates an entry.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Errors raised by catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A catalog page could not be fetched.
    #[error("catalog request failed: {source}")]
    Fetch {
        /// The underlying HTTP failure.
        #[source]
        source: DownloadError,
    },

    /// A catalog URL could not be built or parsed.
    #[error("invalid catalog URL '{url}'")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
    },
}

/// Source of assets and their episode entries.
///
/// This trait uses `async_trait` so the registry can hold an
/// `Arc<dyn CatalogClient>`.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Returns every asset matching `keyword`, in listing order.
    async fn search(&self, keyword: &str) -> Result<Vec<Asset>, CatalogError>;

    /// Returns the ordered episode entries of `asset`.
    async fn list_groups(&self, asset: &Asset) -> Result<Vec<GroupEntry>, CatalogError>;
}
