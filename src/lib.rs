//! vodgrab Core Library
//!
//! This library provides the core functionality for the vodgrab tool, which
//! locates an episode behind a browsable catalog, discovers its HLS manifest,
//! and downloads every segment concurrently into a single playable file,
//! surviving interruption and partial failure.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - Catalog client seam (search, episode lists) and the HTML implementation
//! - [`manifest`] - Play page → master/media playlist → ordered segment list
//! - [`download`] - HTTP client, throughput monitor, progress store, segment pool, assembler
//! - [`tasks`] - Download manager: task state machine, retries, snapshot persistence
//! - [`parser`] - Episode range selection parsing

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod download;
pub mod manifest;
pub mod parser;
pub mod tasks;
mod user_agent;

// Re-export commonly used types
pub use catalog::{Asset, CatalogClient, CatalogError, GroupEntry, HtmlCatalog};
pub use download::{
    AssemblyError, DEFAULT_MAX_WORKERS, DownloadError, HttpClient, MAX_SEGMENT_WORKERS,
    ProgressLog, SegmentDownloader, SegmentFetchError, SegmentReport, ThroughputMonitor,
    assemble_segments,
};
pub use manifest::{ManifestResolver, ResolutionError, ResolvedManifest, Segment};
pub use parser::{RangeError, parse_episode_ranges};
pub use tasks::{
    AddOutcome, DownloadManager, EpisodeFetcher, FetchRequest, ManagerConfig, ManagerError,
    PersistenceError, ProgressUpdate, SegmentPipeline, TaskError, TaskKey, TaskRecord, TaskStatus,
    TaskStore, TaskView, artifact_path, sanitize_title,
};
