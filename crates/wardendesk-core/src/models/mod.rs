//! Data models for the complaint dashboard.
//!
//! - `ComplaintRecord`, `ComplaintStatus`, `ComplaintPage`: complaint lists
//!   and their lifecycle
//! - `StatsSnapshot`: per-status counts for a hostel
//! - `Warden`: the signed-in warden's profile
//! - `NotificationMessage`: status updates pushed to students

pub mod complaint;
pub mod notification;
pub mod stats;
pub mod warden;

pub use complaint::{
    ComplaintFilter, ComplaintId, ComplaintPage, ComplaintRecord, ComplaintStatus, Pagination,
};
pub use notification::{NotificationMessage, NotificationOutcome, PushRequest};
pub use stats::StatsSnapshot;
pub use warden::{Warden, WardenProfileUpdate};
