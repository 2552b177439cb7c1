//! Shared User-Agent string for page, playlist, and segment requests.
//!
//! Catalog sites and their CDNs reject non-browser clients, so every request
//! goes out with the same browser-like header.

/// Browser User-Agent sent with every request.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for all HTTP traffic.
#[must_use]
pub(crate) fn default_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}
