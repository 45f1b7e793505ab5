// src/fetch/mod.rs

/// Monthly release enumeration and URL/key building
pub mod periods;

/// Cached, validated archive downloads
pub mod zips;

pub use periods::{Period, Periods};
pub use zips::{archive_path, build_client, fetch_archive};
