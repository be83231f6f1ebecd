//! Complaint records and the paging envelope the complaints API returns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::contains_ignore_case;

/// Identifier of a complaint within a hostel.
///
/// The API is not consistent about sending ids as numbers or numeric
/// strings, so both are accepted on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "IdRepr")]
pub struct ComplaintId(pub i64);

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(i64),
    Text(String),
}

impl TryFrom<IdRepr> for ComplaintId {
    type Error = String;

    fn try_from(repr: IdRepr) -> Result<Self, Self::Error> {
        match repr {
            IdRepr::Number(n) => Ok(ComplaintId(n)),
            IdRepr::Text(s) => s.trim().parse(),
        }
    }
}

impl FromStr for ComplaintId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#')
            .parse::<i64>()
            .map(ComplaintId)
            .map_err(|_| format!("invalid complaint id: {:?}", s))
    }
}

impl fmt::Display for ComplaintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] = [
        ComplaintStatus::Pending,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
        ComplaintStatus::Rejected,
    ];

    /// Wire name, as used in query strings and request bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Rejected => "rejected",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "Pending",
            ComplaintStatus::InProgress => "In Progress",
            ComplaintStatus::Resolved => "Resolved",
            ComplaintStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ComplaintStatus::Resolved | ComplaintStatus::Rejected)
    }

    /// Statuses only move forward: pending -> in_progress -> resolved,
    /// or pending -> rejected.
    pub fn can_transition_to(&self, next: ComplaintStatus) -> bool {
        use ComplaintStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Resolved) | (Pending, Rejected) | (InProgress, Resolved)
        )
    }

    /// The one-click action a warden takes on a complaint in this state.
    pub fn next_action(&self) -> Option<ComplaintStatus> {
        match self {
            ComplaintStatus::Pending => Some(ComplaintStatus::InProgress),
            ComplaintStatus::InProgress => Some(ComplaintStatus::Resolved),
            ComplaintStatus::Resolved | ComplaintStatus::Rejected => None,
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "pending" => Ok(ComplaintStatus::Pending),
            "in_progress" | "inprogress" => Ok(ComplaintStatus::InProgress),
            "resolved" => Ok(ComplaintStatus::Resolved),
            "rejected" => Ok(ComplaintStatus::Rejected),
            other => Err(format!("unknown complaint status: {}", other)),
        }
    }
}

/// A complaint as returned by `GET /api/complaints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub id: ComplaintId,
    pub status: ComplaintStatus,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub student_roll: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    // Sent as a number for most hostels and as a string ("G-12") for others
    #[serde(default, deserialize_with = "string_or_number")]
    pub room_number: Option<String>,
    #[serde(default)]
    pub hostel_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub in_progress_at: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub rejected_at: Option<String>,
}

impl ComplaintRecord {
    /// Move to `status`, stamping the matching transition timestamp.
    pub fn mark(&mut self, status: ComplaintStatus, at: DateTime<Utc>) {
        let stamp = Some(at.to_rfc3339());
        match status {
            ComplaintStatus::InProgress => self.in_progress_at = stamp,
            ComplaintStatus::Resolved => self.resolved_at = stamp,
            ComplaintStatus::Rejected => self.rejected_at = stamp,
            ComplaintStatus::Pending => {}
        }
        self.status = status;
    }

    pub fn student_display(&self) -> String {
        match (&self.student_name, &self.student_roll) {
            (Some(name), Some(roll)) => format!("{} ({})", name, roll),
            (Some(name), None) => name.clone(),
            (None, Some(roll)) => roll.clone(),
            (None, None) => "Unknown".to_string(),
        }
    }

    pub fn category_display(&self) -> String {
        if self.subcategory.is_empty() {
            self.category.clone()
        } else {
            format!("{} / {}", self.category, self.subcategory)
        }
    }

    /// Timestamp of the most recent transition, falling back to creation.
    pub fn last_activity(&self) -> Option<&str> {
        match self.status {
            ComplaintStatus::Resolved => self.resolved_at.as_deref(),
            ComplaintStatus::Rejected => self.rejected_at.as_deref(),
            ComplaintStatus::InProgress => self.in_progress_at.as_deref(),
            ComplaintStatus::Pending => None,
        }
        .or(self.created_at.as_deref())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    }))
}

/// Paging metadata. Field names vary between deployments of the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, alias = "current_page", alias = "currentPage")]
    pub page: u32,
    #[serde(default, alias = "per_page")]
    pub limit: u32,
    #[serde(default, alias = "total_count", alias = "totalCount")]
    pub total: u64,
    #[serde(default, alias = "totalPages", alias = "pages")]
    pub total_pages: u32,
}

impl Pagination {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// One page of complaints plus its paging metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplaintPage {
    #[serde(rename = "data", default)]
    pub records: Vec<ComplaintRecord>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Client-side filter over the loaded page.
#[derive(Debug, Clone, Default)]
pub struct ComplaintFilter {
    pub search: Option<String>,
    pub status: Option<ComplaintStatus>,
    pub category: Option<String>,
}

impl ComplaintFilter {
    pub fn is_empty(&self) -> bool {
        self.search.as_deref().map_or(true, str::is_empty)
            && self.status.is_none()
            && self.category.is_none()
    }

    pub fn matches(&self, record: &ComplaintRecord) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            if !record.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        match self.search.as_deref() {
            Some(query) if !query.is_empty() => Self::search_matches(record, query),
            _ => true,
        }
    }

    fn search_matches(record: &ComplaintRecord, query: &str) -> bool {
        let id = record.id.to_string();
        let fields = [
            Some(id.as_str()),
            record.title.as_deref(),
            record.description.as_deref(),
            record.student_name.as_deref(),
            record.student_roll.as_deref(),
            record.room_number.as_deref(),
            Some(record.category.as_str()),
            Some(record.subcategory.as_str()),
        ];
        fields
            .iter()
            .flatten()
            .any(|field| contains_ignore_case(field, query))
    }

    pub fn apply<'a>(&self, records: &'a [ComplaintRecord]) -> Vec<&'a ComplaintRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}
