use std::sync::Arc;

use thiserror::Error;

use crate::api::ApiError;

/// Why a cache load did not produce data.
///
/// Cloneable so one failed fetch can be handed to every caller that was
/// waiting on it, and kept on the cache as the last error for that resource.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("No hostel selected")]
    EmptyScope,

    #[error(transparent)]
    Fetch(Arc<ApiError>),

    /// The cache was cleared or switched hostel while the fetch was running.
    #[error("Fetch result discarded - hostel scope changed")]
    Discarded,

    #[error("Background fetch failed: {0}")]
    TaskFailed(String),
}

impl From<ApiError> for CacheError {
    fn from(e: ApiError) -> Self {
        CacheError::Fetch(Arc::new(e))
    }
}
