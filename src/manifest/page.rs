//! Player configuration extraction from play pages.

use std::sync::LazyLock;

use regex::Regex;

/// Marker that precedes the embedded player configuration on play pages.
pub const DEFAULT_PLAYER_MARKER: &str = "player_aaaa";

#[allow(clippy::expect_used)]
static URL_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""url"\s*:\s*"([^"]+)""#).expect("url field regex is valid") // Static pattern, safe to panic
});

/// Returns the script text that follows `marker`, up to the closing tag.
pub(crate) fn player_config<'a>(html: &'a str, marker: &str) -> Option<&'a str> {
    let start = html.find(marker)?;
    let rest = &html[start..];
    let end = rest.find("</script>").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Extracts and unescapes the first `"url":"..."` value of a player config.
pub(crate) fn manifest_url_in(config: &str) -> Option<String> {
    let raw = URL_FIELD.captures(config)?.get(1)?.as_str();
    let url = raw.replace("\\/", "/");
    if url.trim().is_empty() {
        None
    } else {
        Some(url)
    }
}
