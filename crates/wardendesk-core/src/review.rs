//! Accept, reject and resolve complaints.
//!
//! A status change is sent to the server first and reflected in the cache
//! only after the server confirms it. The student is then notified for the
//! transitions they care about.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::cache::ComplaintCache;
use crate::models::{
    ComplaintId, ComplaintRecord, ComplaintStatus, NotificationMessage, NotificationOutcome,
};

/// Server operations a review needs beyond what the cache reads.
#[async_trait]
pub trait StatusBackend: Send + Sync {
    async fn fetch_complaint(&self, id: ComplaintId) -> Result<ComplaintRecord, ApiError>;

    async fn update_complaint_status(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        warden_id: &str,
    ) -> Result<(), ApiError>;

    async fn notify_student(&self, roll_no: &str, message: &NotificationMessage)
        -> NotificationOutcome;
}

#[async_trait]
impl StatusBackend for ApiClient {
    async fn fetch_complaint(&self, id: ComplaintId) -> Result<ComplaintRecord, ApiError> {
        ApiClient::fetch_complaint(self, id).await
    }

    async fn update_complaint_status(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        warden_id: &str,
    ) -> Result<(), ApiError> {
        ApiClient::update_complaint_status(self, id, status, warden_id).await
    }

    async fn notify_student(
        &self,
        roll_no: &str,
        message: &NotificationMessage,
    ) -> NotificationOutcome {
        ApiClient::notify_student(self, roll_no, message).await
    }
}

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Complaint #{id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ComplaintId,
        from: ComplaintStatus,
        to: ComplaintStatus,
    },

    #[error("Complaint #{id} is already {status}")]
    AlreadyClosed {
        id: ComplaintId,
        status: ComplaintStatus,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// What a confirmed status change did.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub id: ComplaintId,
    pub from: ComplaintStatus,
    pub to: ComplaintStatus,
    /// False when the complaint was not in the loaded page; callers should
    /// refresh to see the change.
    pub applied_locally: bool,
    /// `None` when the transition does not notify the student.
    pub notification: Option<NotificationOutcome>,
}

pub struct StatusReviewer {
    backend: Arc<dyn StatusBackend>,
    cache: ComplaintCache,
    warden_id: String,
}

impl StatusReviewer {
    pub fn new(backend: Arc<dyn StatusBackend>, cache: ComplaintCache, warden_id: String) -> Self {
        Self {
            backend,
            cache,
            warden_id,
        }
    }

    /// Start work on a pending complaint.
    pub async fn accept(&self, id: ComplaintId) -> Result<ReviewOutcome, ReviewError> {
        self.transition(id, ComplaintStatus::InProgress).await
    }

    pub async fn reject(&self, id: ComplaintId) -> Result<ReviewOutcome, ReviewError> {
        self.transition(id, ComplaintStatus::Rejected).await
    }

    pub async fn resolve(&self, id: ComplaintId) -> Result<ReviewOutcome, ReviewError> {
        self.transition(id, ComplaintStatus::Resolved).await
    }

    /// Take the one-click action for the complaint's current status.
    pub async fn advance(&self, id: ComplaintId) -> Result<ReviewOutcome, ReviewError> {
        let record = self.lookup(id).await?.0;
        match record.status.next_action() {
            Some(next) => self.transition(id, next).await,
            None => Err(ReviewError::AlreadyClosed {
                id,
                status: record.status,
            }),
        }
    }

    /// The record as the warden currently sees it, and whether it came from
    /// the loaded page.
    async fn lookup(&self, id: ComplaintId) -> Result<(ComplaintRecord, bool), ReviewError> {
        if let Some(record) = self.cache.get_by_id(id) {
            return Ok((record, true));
        }
        debug!(id = %id, "Complaint not in loaded page, fetching it");
        let record = self.backend.fetch_complaint(id).await?;
        Ok((record, false))
    }

    pub async fn transition(
        &self,
        id: ComplaintId,
        to: ComplaintStatus,
    ) -> Result<ReviewOutcome, ReviewError> {
        let (record, loaded) = self.lookup(id).await?;
        let from = record.status;

        if from.is_terminal() {
            return Err(ReviewError::AlreadyClosed { id, status: from });
        }
        if !from.can_transition_to(to) {
            return Err(ReviewError::InvalidTransition { id, from, to });
        }

        self.backend
            .update_complaint_status(id, to, &self.warden_id)
            .await?;
        info!(id = %id, from = %from, to = %to, "Complaint status updated");

        let applied_locally = loaded && self.cache.apply_status_update(id, to);
        if !applied_locally {
            debug!(id = %id, "Status change not reflected in the cache");
        }

        let notification = match NotificationMessage::for_status_change(&record, from, to) {
            Some(message) => match record.student_roll.as_deref() {
                Some(roll_no) => Some(self.backend.notify_student(roll_no, &message).await),
                None => {
                    warn!(id = %id, "Complaint has no roll number, student not notified");
                    None
                }
            },
            None => None,
        };

        Ok(ReviewOutcome {
            id,
            from,
            to,
            applied_locally,
            notification,
        })
    }
}
