//! Core library for the hostel warden complaint dashboard.
//!
//! `ComplaintCache` keeps the active hostel's complaint pages and stats in
//! memory and is shared by every view; `ApiClient` talks to the complaint,
//! admin and notification workers; `StatusReviewer` confirms status changes
//! with the server before applying them locally.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod review;
pub mod utils;

pub use api::{ApiClient, ApiError, ComplaintSource, Endpoints};
pub use cache::{CacheConfig, CacheError, CacheSnapshot, ComplaintCache};
pub use config::Config;
pub use review::{ReviewError, ReviewOutcome, StatusBackend, StatusReviewer};
