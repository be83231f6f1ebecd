//! In-memory complaint cache for the active hostel.
//!
//! This module provides `ComplaintCache`, the single source of truth for
//! complaint pages and stats shown by the dashboard. Data is served from
//! memory for five minutes (configurable), concurrent loads of the same
//! resource share one request, and confirmed status changes are applied
//! locally without a re-fetch.

pub mod complaints;
pub mod entry;
pub mod error;

pub use complaints::{CacheConfig, CacheSnapshot, ComplaintCache, DEFAULT_CACHE_TTL, DEFAULT_PAGE_SIZE};
pub use entry::CachedData;
pub use error::CacheError;
