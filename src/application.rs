//! Application layer module
//!
//! The harvest pipeline stages and the orchestrator that runs them in order:
//! listing, metadata resolution, asset location, then download and ledger.

pub mod asset_locator;
pub mod harvest_orchestrator;
pub mod listing;
pub mod metadata_resolver;

pub use asset_locator::AssetLocator;
pub use harvest_orchestrator::{HarvestOrchestrator, ItemOutcome, NO_ASSET_REASON, RunReport};
pub use listing::{CandidateSource, ListingCursor, ListingService};
pub use metadata_resolver::{MetadataResolver, Resolution};
