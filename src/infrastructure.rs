//! Infrastructure layer for network access, parsing and on-disk state
//!
//! This module provides the HTTP client and rate governor, HTML extraction,
//! the download executor, the persistence ledger, configuration and logging.

pub mod config;  // Layered configuration
pub mod download_executor;
pub mod exif_gps;  // GPS position from image EXIF
pub mod harvest_error;  // Run and item error taxonomy
pub mod http_client;
pub mod ledger;  // Ledger, failure list and statistics files
pub mod logging;  // Logging infrastructure
pub mod parsing;  // Strategy-based HTML extraction
pub mod parsing_error;
pub mod rate_governor;

// Re-export commonly used items
pub use config::AppConfig;
pub use download_executor::{DownloadExecutor, DownloadOutcome, DownloadState, StoredFile};
pub use exif_gps::gps_coordinates;
pub use harvest_error::{FetchError, HarvestError, HarvestResult, PersistenceError};
pub use http_client::{FetchedBytes, FetchedPage, HttpClient, PageFetcher};
pub use ledger::{FailureEntry, FailureList, PersistenceLedger};
pub use logging::init_logging_with_config;
pub use parsing::{AssetStrategies, CandidateLister, MetadataExtractor, ParsingConfig, PhotoDocument};
pub use parsing_error::{ParsingError, ParsingResult};
pub use rate_governor::RateGovernor;
