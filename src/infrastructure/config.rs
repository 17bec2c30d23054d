//! Configuration infrastructure
//!
//! Configuration is layered, later sources winning:
//! 1. Built-in defaults (see [`defaults`])
//! 2. Optional config file (TOML, JSON or YAML, chosen by extension)
//! 3. `PHOTO_HARVEST__*` environment variables (`__` separates sections)
//! 4. Command line flags, applied by the binary

#![allow(clippy::derivable_impls)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::SiteKind;
use crate::domain::license;
use crate::infrastructure::parsing::ParsingConfig;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "PHOTO_HARVEST";

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which photo-hosting site to collect from
    pub site: SiteKind,

    pub output: OutputConfig,

    pub http: HttpConfig,

    pub pacing: PacingConfig,

    pub search: SearchConfig,

    pub logging: LoggingConfig,

    /// Selector overrides for HTML extraction
    #[serde(default)]
    pub parsing: ParsingConfig,

    /// Fixed candidates used when a listing yields nothing
    #[serde(default)]
    pub seeds: Vec<SeedPhoto>,
}

/// Output directory and item limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory; photos go to `<dir>/photos`
    pub directory: PathBuf,

    /// Photos to have on disk after the run, downloaded or already present (None = all)
    pub max_items: Option<usize>,
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,

    /// Timeout for page requests in seconds
    pub page_timeout_seconds: u64,

    /// Timeout for image downloads in seconds
    pub download_timeout_seconds: u64,

    pub max_redirects: usize,
}

/// Politeness delays enforced by the rate governor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Minimum spacing between consecutive network operations
    pub request_interval_ms: u64,

    /// Minimum spacing between listing page transitions
    pub page_interval_ms: u64,
}

/// Parameters for a live listing/search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Free-text query
    pub query: String,

    /// Numeric license filter codes
    pub license_codes: Vec<String>,

    pub sort: String,

    pub min_width: Option<u32>,

    pub min_height: Option<u32>,

    /// Listing pages to walk before giving up
    pub max_pages: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files (None = `<output>/logs`)
    pub log_directory: Option<PathBuf>,
}

/// A known photo used as a fallback candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPhoto {
    pub id: String,
    #[serde(default)]
    pub owner: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: SiteKind::default(),
            output: OutputConfig::default(),
            http: HttpConfig::default(),
            pacing: PacingConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
            parsing: ParsingConfig::default(),
            seeds: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::OUTPUT_DIRECTORY),
            max_items: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            page_timeout_seconds: defaults::PAGE_TIMEOUT_SECONDS,
            download_timeout_seconds: defaults::DOWNLOAD_TIMEOUT_SECONDS,
            max_redirects: defaults::MAX_REDIRECTS,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_interval_ms: defaults::REQUEST_INTERVAL_MS,
            page_interval_ms: defaults::PAGE_INTERVAL_MS,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query: defaults::SEARCH_QUERY.to_string(),
            license_codes: license::all_codes(),
            sort: defaults::SEARCH_SORT.to_string(),
            min_width: Some(defaults::MIN_DIMENSION),
            min_height: Some(defaults::MIN_DIMENSION),
            max_pages: defaults::MAX_PAGES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_directory: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default()).context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);
        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_config_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("search.license_codes")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = settings.try_deserialize().context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// `<config_dir>/photo-harvest/config.toml`, if the platform has a config dir
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("photo-harvest").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            anyhow::bail!("http.user_agent must not be empty");
        }
        if self.http.page_timeout_seconds == 0 || self.http.download_timeout_seconds == 0 {
            anyhow::bail!("http timeouts must be greater than 0");
        }
        if self.search.max_pages == 0 {
            anyhow::bail!("search.max_pages must be greater than 0");
        }
        if self.output.max_items == Some(0) {
            anyhow::bail!("output.max_items must be greater than 0 when set");
        }
        for seed in &self.seeds {
            let well_formed = !seed.id.is_empty()
                && seed.id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !well_formed {
                anyhow::bail!("seeds: photo id {:?} must be letters, digits, '_' or '-'", seed.id);
            }
        }
        Ok(())
    }

    pub fn photos_directory(&self) -> PathBuf {
        self.output.directory.join(defaults::PHOTOS_SUBDIRECTORY)
    }

    pub fn log_directory(&self) -> PathBuf {
        self.logging
            .log_directory
            .clone()
            .unwrap_or_else(|| self.output.directory.join("logs"))
    }
}

/// Default configuration values
pub mod defaults {
    pub const OUTPUT_DIRECTORY: &str = "photo_collection";

    pub const PHOTOS_SUBDIRECTORY: &str = "photos";

    pub const LEDGER_FILE: &str = "metadata.json";

    pub const FAILURE_FILE: &str = "failed_downloads.json";

    pub const STATISTICS_FILE: &str = "statistics.json";

    pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    pub const PAGE_TIMEOUT_SECONDS: u64 = 30;

    pub const DOWNLOAD_TIMEOUT_SECONDS: u64 = 60;

    pub const MAX_REDIRECTS: usize = 10;

    pub const REQUEST_INTERVAL_MS: u64 = 1500;

    pub const PAGE_INTERVAL_MS: u64 = 3000;

    pub const SEARCH_QUERY: &str = "scenic landscape nature";

    pub const SEARCH_SORT: &str = "interestingness-desc";

    pub const MIN_DIMENSION: u32 = 1024;

    pub const MAX_PAGES: u32 = 10;

    pub const LOG_LEVEL: &str = "info";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.site, SiteKind::Flickr);
        assert_eq!(config.search.license_codes.join(","), "4,5,9,10,11,12");
        assert_eq!(config.photos_directory(), PathBuf::from("photo_collection/photos"));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
site = "geograph"

[output]
directory = "/tmp/harvest"
max_items = 5

[pacing]
request_interval_ms = 10
page_interval_ms = 20

[[seeds]]
id = "48544525561"
owner = "theocrazzolara"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.site, SiteKind::Geograph);
        assert_eq!(config.output.directory, PathBuf::from("/tmp/harvest"));
        assert_eq!(config.output.max_items, Some(5));
        assert_eq!(config.pacing.request_interval_ms, 10);
        assert_eq!(config.http, HttpConfig::default());
        assert_eq!(config.seeds.len(), 1);
        assert_eq!(config.seeds[0].owner.as_deref(), Some("theocrazzolara"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.http.page_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_path_like_seed_ids() {
        let mut config = AppConfig::default();
        config.seeds = vec![SeedPhoto {
            id: "../../escape".to_string(),
            owner: None,
        }];
        assert!(config.validate().is_err());

        config.seeds[0].id = "48544525561".to_string();
        assert!(config.validate().is_ok());
    }
}
