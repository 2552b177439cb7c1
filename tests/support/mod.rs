//! Shared mock-site helpers for integration tests.
//!
//! Builds a miniature catalog on a wiremock server: search pages, a detail
//! page with an episode playlist, play pages carrying the player config, HLS
//! playlists and segment bodies.

#![allow(dead_code)]

pub mod critical_utils;

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Deterministic body for segment `index` of an episode.
pub fn segment_body(episode: usize, index: usize) -> Vec<u8> {
    format!("episode-{episode}-segment-{index:03}|")
        .repeat(8)
        .into_bytes()
}

/// Concatenation of all segment bodies in playlist order.
pub fn expected_artifact(episode: usize, segments: usize) -> Vec<u8> {
    (0..segments)
        .flat_map(|index| segment_body(episode, index))
        .collect()
}

/// A finished media playlist listing `seg{i}.ts` relative URIs.
pub fn media_playlist(segments: usize) -> String {
    let mut playlist =
        String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:0\n");
    for index in 0..segments {
        playlist.push_str(&format!("#EXTINF:10.0,\nseg{index}.ts\n"));
    }
    playlist.push_str("#EXT-X-ENDLIST\n");
    playlist
}

/// A master playlist whose first variant is `hi/index.m3u8`.
pub fn master_playlist() -> String {
    "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1200000,RESOLUTION=1280x720\nhi/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=600000\nlo/index.m3u8\n"
        .to_string()
}

/// Play page HTML embedding `manifest_url` in the player config.
pub fn play_page(manifest_url: &str) -> String {
    let escaped = manifest_url.replace('/', "\\/");
    format!(
        r#"<html><head><script>var player_aaaa={{"flag":"play","encrypt":0,"url":"{escaped}","from":"m3u8"}}</script></head><body></body></html>"#
    )
}

/// Search results page listing `(title, href)` pairs.
pub fn search_page(items: &[(&str, &str)]) -> String {
    let mut html = String::from(r#"<ul class="stui-vodlist clearfix">"#);
    for (title, href) in items {
        html.push_str(&format!(
            r#"<li class="stui-vodlist__item"><a class="stui-vodlist__thumb lazyload" href="{href}" title="{title}" data-original="/poster.jpg"></a></li>"#
        ));
    }
    html.push_str("</ul>");
    html
}

/// Detail page with one episode playlist of `(title, href)` pairs.
pub fn detail_page(episodes: &[(&str, &str)]) -> String {
    let mut html = String::from(r#"<div><ul class="stui-content__playlist clearfix">"#);
    for (title, href) in episodes {
        html.push_str(&format!(r#"<li><a href="{href}">{title}</a></li>"#));
    }
    html.push_str("</ul></div>");
    html
}

/// Mounts a 200 response with a text body at `at`.
pub async fn mount_text(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts one segment body at `at`, expecting exactly `times` requests.
pub async fn mount_segment(server: &MockServer, at: &str, body: Vec<u8>, times: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts a complete episode: play page `/jpplay/{episode}.html` pointing at a
/// master playlist, whose first variant lists `segments` segments.
///
/// Returns the play page URL.
pub async fn mount_episode(server: &MockServer, episode: usize, segments: usize) -> String {
    let base = format!("/hls/{episode}");
    let master_url = format!("{}{base}/master.m3u8", server.uri());
    mount_text(
        server,
        &format!("/jpplay/{episode}.html"),
        play_page(&master_url),
    )
    .await;
    mount_text(server, &format!("{base}/master.m3u8"), master_playlist()).await;
    mount_text(server, &format!("{base}/hi/index.m3u8"), media_playlist(segments)).await;
    for index in 0..segments {
        Mock::given(method("GET"))
            .and(path(format!("{base}/hi/seg{index}.ts")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(segment_body(episode, index)))
            .mount(server)
            .await;
    }
    format!("{}/jpplay/{episode}.html", server.uri())
}

/// Mounts search page 1 for `keyword` and a detail page for one show.
///
/// Episodes link to `/jpplay/{n}.html` for `n` in `0..episodes`.
pub async fn mount_show(server: &MockServer, keyword: &str, title: &str, episodes: usize) {
    mount_text(
        server,
        &format!("/jpsearch/{keyword}----------1---.html"),
        search_page(&[(title, "/jpvod/1.html")]),
    )
    .await;
    let links: Vec<(String, String)> = (0..episodes)
        .map(|n| (format!("Episode {:02}", n + 1), format!("/jpplay/{n}.html")))
        .collect();
    let borrowed: Vec<(&str, &str)> = links
        .iter()
        .map(|(title, href)| (title.as_str(), href.as_str()))
        .collect();
    mount_text(server, "/jpvod/1.html", detail_page(&borrowed)).await;
}

/// Generous upper bound for a mock-backed download to finish.
pub const FINISH_TIMEOUT: Duration = Duration::from_secs(30);
