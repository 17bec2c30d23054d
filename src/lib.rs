//! Photo Harvest - Resumable photo and attribution metadata collector
//!
//! Walks a listing of photos on a photo-hosting site, resolves attribution
//! metadata for each one, downloads the best available image and records
//! everything in an append-only JSON ledger so interrupted runs can resume.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;
