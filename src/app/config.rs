//! File configuration and effective settings for CLI runs.
//!
//! Values come from three layers: command-line flags win over the config
//! file, which wins over built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use vodgrab_core::catalog::DEFAULT_BASE_URL;
use vodgrab_core::download::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_WORKERS};
use vodgrab_core::tasks::DEFAULT_STATE_FILE;

use crate::cli::Args;

/// Default directory that receives downloaded episodes.
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// `key = value` file configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileConfig {
    /// Directory that receives downloaded episodes.
    pub output_dir: Option<PathBuf>,
    /// Segment workers per task.
    pub max_workers: Option<usize>,
    /// Task snapshot path.
    pub state_file: Option<PathBuf>,
    /// Catalog site base URL.
    pub base_url: Option<String>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Effective settings after layering flags, file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub output_dir: PathBuf,
    pub max_workers: usize,
    pub state_file: PathBuf,
    pub base_url: String,
    pub connect_timeout_secs: u64,
    /// Tracing level used when `RUST_LOG` is unset.
    pub log_level: &'static str,
    /// True when `-q` was given or the file asks for quiet output.
    pub quiet: bool,
}

impl Settings {
    /// Resolves the effective settings for `args` over an optional file config.
    pub(crate) fn resolve(args: &Args, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        let log_level = if args.quiet {
            "error"
        } else if args.verbose > 0 {
            match args.verbose {
                1 => "debug",
                _ => "trace",
            }
        } else {
            file.verbosity
                .map_or("info", VerbositySetting::log_level)
        };

        Self {
            output_dir: args
                .output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            max_workers: args
                .workers
                .map(usize::from)
                .or(file.max_workers)
                .unwrap_or(DEFAULT_MAX_WORKERS),
            state_file: args
                .state_file
                .clone()
                .or(file.state_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            base_url: args
                .base_url
                .clone()
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            connect_timeout_secs: file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            log_level,
            quiet: log_level == "error",
        }
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/vodgrab/config.toml`
/// 2. `$HOME/.config/vodgrab/config.toml`
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("vodgrab")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("vodgrab")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file from the default path, if one exists.
pub(crate) fn load_default_file_config() -> Result<Option<FileConfig>> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "output_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `output_dir` value on line {line_no}"))?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "state_file" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `state_file` value on line {line_no}"))?;
                cfg.state_file = Some(PathBuf::from(parsed));
            }
            "base_url" => {
                let parsed = parse_string_literal(value)
                    .and_then(|parsed| validate_base_url(&parsed).map(|()| parsed))
                    .with_context(|| format!("Invalid `base_url` value on line {line_no}"))?;
                cfg.base_url = Some(parsed);
            }
            "max_workers" => {
                let parsed = parse_integer_in_range(value, 1, 256)
                    .with_context(|| format!("Invalid `max_workers` value on line {line_no}"))?;
                cfg.max_workers = Some(usize::try_from(parsed)?);
            }
            "connect_timeout_secs" => {
                let parsed = parse_integer_in_range(value, 1, 3600).with_context(|| {
                    format!("Invalid `connect_timeout_secs` value on line {line_no}")
                })?;
                cfg.connect_timeout_secs = Some(parsed);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `verbosity` value on line {line_no}"))?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_in_range(raw_value: &str, min: u64, max: u64) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < i128::from(min) || value > i128::from(max) {
        bail!("{value} is out of range. Expected range: {min}..={max}");
    }
    Ok(u64::try_from(value)?)
}

fn validate_base_url(value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Expected an http or https URL");
    }
    Ok(())
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
