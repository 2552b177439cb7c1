//! Catalog backed by the video site's HTML listing and detail pages.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{Asset, CatalogClient, CatalogError, GroupEntry};
use crate::download::{DownloadError, HttpClient};

/// Default catalog site.
pub const DEFAULT_BASE_URL: &str = "https://vodjp.com";

/// Upper bound on search result pages walked for one keyword.
pub const MAX_SEARCH_PAGES: u32 = 50;

const RESULT_LINK_CLASS: &str = "stui-vodlist__thumb";

/// Compiles a regex at static init; panics on invalid pattern.
fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static ANCHOR_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<a\s+[^>]*>"));
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<a\s+([^>]*)>(.*?)</a>"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
});
static PLAYLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<ul\s[^>]*class\s*=\s*["'][^"']*stui-content__playlist[^"']*["'][^>]*>(.*?)</ul>"#,
    )
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?s)<[^>]*>"));
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));"));

/// Scrapes search listings and episode playlists from the catalog site.
#[derive(Debug, Clone)]
pub struct HtmlCatalog {
    client: HttpClient,
    base_url: Url,
    max_pages: u32,
}

impl HtmlCatalog {
    /// Creates a catalog rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidUrl`] if `base_url` is not an absolute
    /// URL.
    pub fn new(client: HttpClient, base_url: &str) -> Result<Self, CatalogError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|_| {
            CatalogError::InvalidUrl {
                url: base_url.to_string(),
            }
        })?;
        Ok(Self {
            client,
            base_url,
            max_pages: MAX_SEARCH_PAGES,
        })
    }

    /// Overrides the search page cap (minimum one page).
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    fn search_url(&self, keyword: &str, page: u32) -> Result<Url, CatalogError> {
        let raw = format!(
            "{}/jpsearch/{keyword}----------{page}---.html",
            self.base_url.as_str().trim_end_matches('/')
        );
        Url::parse(&raw).map_err(|_| CatalogError::InvalidUrl { url: raw })
    }
}

#[async_trait]
impl CatalogClient for HtmlCatalog {
    #[instrument(skip(self))]
    async fn search(&self, keyword: &str) -> Result<Vec<Asset>, CatalogError> {
        let keyword = keyword.trim().replace('/', " ");
        if keyword.is_empty() {
            return Ok(Vec::new());
        }

        let mut assets = Vec::new();
        for page in 1..=self.max_pages {
            let url = self.search_url(&keyword, page)?;
            let html = match self.client.fetch_text(url.as_str()).await {
                Ok(html) => html,
                Err(DownloadError::HttpStatus { status, .. }) => {
                    debug!(page, status, "search stopped on HTTP status");
                    break;
                }
                Err(source) if page == 1 => return Err(CatalogError::Fetch { source }),
                Err(e) => {
                    warn!(page, error = %e, "search page failed, keeping earlier results");
                    break;
                }
            };

            let found = parse_search_results(&html, &self.base_url);
            if found.is_empty() {
                break;
            }
            debug!(page, found = found.len(), "parsed search page");
            assets.extend(found);
        }
        Ok(assets)
    }

    #[instrument(skip(self), fields(asset = %asset.title))]
    async fn list_groups(&self, asset: &Asset) -> Result<Vec<GroupEntry>, CatalogError> {
        let html = self
            .client
            .fetch_text(&asset.detail_url)
            .await
            .map_err(|source| CatalogError::Fetch { source })?;
        let entries = parse_episode_list(&html, &self.base_url);
        debug!(episodes = entries.len(), "parsed episode list");
        Ok(entries)
    }
}

fn parse_attrs(tag: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(tag)
        .map(|attr| {
            let key = attr
                .get(1)
                .map_or("", |m| m.as_str())
                .trim()
                .to_ascii_lowercase();
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .map_or("", |m| m.as_str())
                .trim()
                .to_string();
            (key, value)
        })
        .collect()
}

fn has_class(attrs: &HashMap<String, String>, class: &str) -> bool {
    attrs
        .get("class")
        .is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

fn absolutize(href: &str, base: &Url) -> Option<String> {
    base.join(href.trim()).ok().map(|url| url.to_string())
}

/// Extracts result anchors (`a.stui-vodlist__thumb`) from a search page.
pub(crate) fn parse_search_results(html: &str, base: &Url) -> Vec<Asset> {
    ANCHOR_TAG_RE
        .find_iter(html)
        .filter_map(|tag| {
            let attrs = parse_attrs(tag.as_str());
            if !has_class(&attrs, RESULT_LINK_CLASS) {
                return None;
            }
            let href = attrs.get("href").filter(|h| !h.is_empty())?;
            let detail_url = absolutize(href, base)?;
            let title = decode_entities(attrs.get("title").map_or("", String::as_str));
            let poster = attrs
                .get("data-original")
                .filter(|p| !p.is_empty())
                .map(|p| decode_entities(p));
            Some(Asset {
                title,
                detail_url,
                poster,
            })
        })
        .collect()
}

/// Extracts episode anchors from the first `ul.stui-content__playlist`.
pub(crate) fn parse_episode_list(html: &str, base: &Url) -> Vec<GroupEntry> {
    let Some(list) = PLAYLIST_RE.captures(html).and_then(|c| c.get(1)) else {
        return Vec::new();
    };

    ANCHOR_RE
        .captures_iter(list.as_str())
        .filter_map(|anchor| {
            let attrs = parse_attrs(anchor.get(1)?.as_str());
            let href = attrs.get("href").filter(|h| !h.is_empty())?;
            let url = absolutize(href, base)?;
            let text = TAG_RE.replace_all(anchor.get(2).map_or("", |m| m.as_str()), "");
            Some(GroupEntry {
                title: decode_entities(&text),
                url,
            })
        })
        .collect()
}

/// Decodes the common named and numeric HTML entities, then trims.
pub(crate) fn decode_entities(value: &str) -> String {
    let numeric = NUMERIC_ENTITY_RE.replace_all(value, |caps: &regex::Captures<'_>| {
        let code = caps
            .get(1)
            .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
            .or_else(|| caps.get(2).and_then(|dec| dec.as_str().parse().ok()));
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });
    numeric
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{00a0}")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
