//! Play page to ordered segment list.
//!
//! Resolution walks three documents:
//!
//! 1. The play page, whose embedded player configuration (a script starting
//!    with a known marker) carries the playlist URL in a `"url":"..."` field.
//! 2. The playlist at that URL. A master playlist is followed to its **first**
//!    variant, resolved against the master's URL; a media playlist is used as
//!    is.
//! 3. The authoritative media playlist, which must be closed with
//!    `#EXT-X-ENDLIST` and list at least one segment.
//!
//! Segment URIs are resolved against the authoritative playlist's own URL,
//! never against the page URL.

mod error;
mod page;

pub use error::ResolutionError;
pub use page::DEFAULT_PLAYER_MARKER;

use m3u8_rs::{MediaPlaylist, Playlist, parse_playlist_res};
use tracing::{debug, info, instrument};
use url::Url;

use crate::download::HttpClient;

/// One media segment of a resolved playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Zero-based position in the playlist; stable across runs.
    pub index: usize,
    /// URI as written in the playlist (relative or absolute).
    pub uri: String,
    /// Absolute URL resolved against the playlist URL.
    pub url: Url,
}

impl Segment {
    /// Resolves `uri` against `base` into a segment.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::InvalidSegmentUri`] if the URI cannot be
    /// joined onto `base`.
    pub fn new(index: usize, uri: impl Into<String>, base: &Url) -> Result<Self, ResolutionError> {
        let uri = uri.into();
        let url = base
            .join(uri.trim())
            .map_err(|_| ResolutionError::InvalidSegmentUri {
                index,
                uri: uri.clone(),
            })?;
        Ok(Self { index, uri, url })
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    /// URL of the authoritative media playlist.
    pub manifest_url: Url,
    /// Segments in playlist order, indices `0..N`.
    pub segments: Vec<Segment>,
}

/// Resolves play pages into segment lists.
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    client: HttpClient,
    marker: String,
}

impl ManifestResolver {
    /// Creates a resolver that looks for the default player marker.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            marker: DEFAULT_PLAYER_MARKER.to_string(),
        }
    }

    /// Overrides the player configuration marker.
    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Fetches the play page and returns the authoritative segment list.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] if any fetch fails or any document lacks
    /// the expected structure.
    #[instrument(skip(self))]
    pub async fn resolve(&self, play_url: &str) -> Result<ResolvedManifest, ResolutionError> {
        let page_url = Url::parse(play_url).map_err(|_| ResolutionError::InvalidManifestUrl {
            url: play_url.to_string(),
        })?;
        let html = self
            .client
            .fetch_text(play_url)
            .await
            .map_err(|source| ResolutionError::PageFetch { source })?;

        let config = page::player_config(&html, &self.marker).ok_or_else(|| {
            ResolutionError::MarkerNotFound {
                marker: self.marker.clone(),
                url: play_url.to_string(),
            }
        })?;
        let raw = page::manifest_url_in(config).ok_or_else(|| {
            ResolutionError::ManifestUrlMissing {
                url: play_url.to_string(),
            }
        })?;
        let manifest_url =
            page_url
                .join(&raw)
                .map_err(|_| ResolutionError::InvalidManifestUrl { url: raw.clone() })?;
        debug!(manifest = %manifest_url, "found playlist URL on play page");

        self.load_segments(manifest_url).await
    }

    /// Fetches a playlist URL and returns the authoritative segment list.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] on fetch, parse, or structure failures.
    #[instrument(skip(self), fields(url = %manifest_url))]
    pub async fn load_segments(
        &self,
        manifest_url: Url,
    ) -> Result<ResolvedManifest, ResolutionError> {
        let (media, authoritative_url) = match self.fetch_playlist(&manifest_url).await? {
            Playlist::MediaPlaylist(media) => (media, manifest_url),
            Playlist::MasterPlaylist(master) => {
                let first = master
                    .variants
                    .first()
                    .ok_or_else(|| ResolutionError::NoVariants {
                        url: manifest_url.to_string(),
                    })?;
                let variant_url = manifest_url.join(first.uri.trim()).map_err(|_| {
                    ResolutionError::InvalidManifestUrl {
                        url: first.uri.clone(),
                    }
                })?;
                debug!(variant = %variant_url, "following first variant of master playlist");
                match self.fetch_playlist(&variant_url).await? {
                    Playlist::MediaPlaylist(media) => (media, variant_url),
                    Playlist::MasterPlaylist(_) => {
                        return Err(ResolutionError::NestedMaster {
                            url: variant_url.to_string(),
                        });
                    }
                }
            }
        };

        let segments = segments_of(&media, &authoritative_url)?;
        info!(
            manifest = %authoritative_url,
            segments = segments.len(),
            "resolved playlist"
        );
        Ok(ResolvedManifest {
            manifest_url: authoritative_url,
            segments,
        })
    }

    async fn fetch_playlist(&self, url: &Url) -> Result<Playlist, ResolutionError> {
        let body = self
            .client
            .fetch_text(url.as_str())
            .await
            .map_err(|source| ResolutionError::ManifestFetch { source })?;
        parse_playlist_res(body.as_bytes()).map_err(|e| ResolutionError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

fn segments_of(media: &MediaPlaylist, base: &Url) -> Result<Vec<Segment>, ResolutionError> {
    if !media.end_list {
        return Err(ResolutionError::MissingEndList {
            url: base.to_string(),
        });
    }
    if media.segments.is_empty() {
        return Err(ResolutionError::EmptyPlaylist {
            url: base.to_string(),
        });
    }
    media
        .segments
        .iter()
        .enumerate()
        .map(|(index, segment)| Segment::new(index, segment.uri.clone(), base))
        .collect()
}
