//! Error types for manifest resolution.

use thiserror::Error;

use crate::download::DownloadError;

/// The play page or playlist did not have the expected structure.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The play page could not be fetched.
    #[error("failed to fetch play page: {source}")]
    PageFetch {
        /// The underlying HTTP failure.
        #[source]
        source: DownloadError,
    },

    /// The play page has no embedded player configuration.
    #[error("player marker '{marker}' not found in {url}")]
    MarkerNotFound {
        /// Marker substring that was searched for.
        marker: String,
        /// The page URL.
        url: String,
    },

    /// The player configuration has no `"url":"..."` field.
    #[error("no playlist URL in player configuration of {url}")]
    ManifestUrlMissing {
        /// The page URL.
        url: String,
    },

    /// The extracted or variant URL cannot be parsed.
    #[error("invalid playlist URL '{url}'")]
    InvalidManifestUrl {
        /// The offending URL text.
        url: String,
    },

    /// A playlist could not be fetched.
    #[error("failed to fetch playlist: {source}")]
    ManifestFetch {
        /// The underlying HTTP failure.
        #[source]
        source: DownloadError,
    },

    /// The playlist body is not a valid M3U8 document.
    #[error("failed to parse playlist {url}: {message}")]
    Parse {
        /// The playlist URL.
        url: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A master playlist lists no variants.
    #[error("master playlist {url} has no variants")]
    NoVariants {
        /// The master playlist URL.
        url: String,
    },

    /// The first variant of a master playlist is itself a master playlist.
    #[error("variant {url} is a master playlist, expected media segments")]
    NestedMaster {
        /// The variant URL.
        url: String,
    },

    /// The media playlist is still open (no `#EXT-X-ENDLIST`).
    #[error("playlist {url} has no end-of-list marker")]
    MissingEndList {
        /// The media playlist URL.
        url: String,
    },

    /// The media playlist has no segments.
    #[error("playlist {url} has no segments")]
    EmptyPlaylist {
        /// The media playlist URL.
        url: String,
    },

    /// A segment URI cannot be resolved against the playlist URL.
    #[error("segment {index} has unresolvable URI '{uri}'")]
    InvalidSegmentUri {
        /// Zero-based segment index.
        index: usize,
        /// The raw URI from the playlist.
        uri: String,
    },
}
