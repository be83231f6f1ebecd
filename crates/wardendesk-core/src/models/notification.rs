use serde::{Deserialize, Serialize};

use super::{ComplaintRecord, ComplaintStatus};

/// Channel the student app routes complaint updates to.
pub const COMPLAINT_STATUS_CHANNEL: &str = "complaint_status";

/// A message sent to a student, both in-app and as a push notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub description: String,
    pub channel: String,
    pub complaint_id: String,
}

impl NotificationMessage {
    /// Message for a confirmed status change, if that change is one the
    /// student is told about.
    pub fn for_status_change(
        record: &ComplaintRecord,
        from: ComplaintStatus,
        to: ComplaintStatus,
    ) -> Option<Self> {
        let (suffix, body) = match (from, to) {
            (ComplaintStatus::Pending, ComplaintStatus::InProgress) => {
                ("In Progress", "is currently being processed.")
            }
            (ComplaintStatus::InProgress, ComplaintStatus::Resolved) => {
                ("Resolved", "has been successfully resolved.")
            }
            _ => return None,
        };

        Some(Self {
            title: format!("{} - {}", record.category, suffix),
            description: format!(
                "Complaint #{} regarding {} {}",
                record.id, record.subcategory, body
            ),
            channel: COMPLAINT_STATUS_CHANNEL.to_string(),
            complaint_id: record.id.to_string(),
        })
    }
}

/// Body of `POST /send` on the push worker.
#[derive(Debug, Clone, Serialize)]
pub struct PushRequest<'a> {
    pub to: &'a [String],
    pub title: &'a str,
    pub body: &'a str,
    pub data: PushData<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushData<'a> {
    pub channel: &'a str,
    pub complaint_id: &'a str,
}

impl<'a> PushRequest<'a> {
    pub fn new(tokens: &'a [String], message: &'a NotificationMessage) -> Self {
        Self {
            to: tokens,
            title: &message.title,
            body: &message.description,
            data: PushData {
                channel: &message.channel,
                complaint_id: &message.complaint_id,
            },
        }
    }
}

/// What happened to each leg of a student notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationOutcome {
    pub in_app: Result<(), String>,
    /// `None` when the student has no registered push tokens.
    pub push: Option<Result<(), String>>,
}

impl NotificationOutcome {
    pub fn any_delivered(&self) -> bool {
        self.in_app.is_ok() || matches!(self.push, Some(Ok(())))
    }
}
