//! Domain module - Core entities of the photo harvest
//!
//! Pure data and lookup tables with no I/O: photo references and metadata,
//! ledger records, the license table and the supported site profiles.

pub mod asset;
pub mod license;
pub mod photo;
pub mod site;

// Re-export commonly used items for convenience
pub use asset::{AssetLocation, AssetStrategyKind};
pub use license::{License, LicenseKind};
pub use photo::{DownloadRecord, ListingHints, PhotoLocation, PhotoMetadata, PhotoReference, RunStatistics};
pub use site::{ListingPattern, SiteKind, SiteProfile, SizeUpgradeRule};
