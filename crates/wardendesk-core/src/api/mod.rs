//! REST API client module for the hostel complaint services.
//!
//! This module provides the `ApiClient` for the Cloudflare Worker endpoints
//! behind the dashboard, and the `ComplaintSource` trait the complaint cache
//! reads through.
//!
//! Warden profile endpoints use an opaque bearer token issued at sign-in;
//! complaint endpoints are unauthenticated.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::{ComplaintPage, StatsSnapshot};

pub use client::{ApiClient, Endpoints};
pub use error::ApiError;

/// Read side of the complaint API, as seen by `ComplaintCache`.
#[async_trait]
pub trait ComplaintSource: Send + Sync {
    /// `GET /api/stats/{hostel}`
    async fn fetch_stats(&self, hostel: &str) -> Result<StatsSnapshot, ApiError>;

    /// `GET /api/complaints?hostel_name={hostel}&page={page}&limit={limit}`
    async fn fetch_complaints(
        &self,
        hostel: &str,
        page: u32,
        limit: u32,
    ) -> Result<ComplaintPage, ApiError>;
}
