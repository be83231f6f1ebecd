use serde::{Deserialize, Serialize};

use super::ComplaintStatus;

/// Aggregate complaint counts for one hostel, as served by `/api/stats/{hostel}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(rename = "total_complaints", alias = "total")]
    pub total: u32,
    pub pending: u32,
    pub in_progress: u32,
    pub resolved: u32,
    pub rejected: u32,
}

impl StatsSnapshot {
    pub fn count(&self, status: ComplaintStatus) -> u32 {
        match status {
            ComplaintStatus::Pending => self.pending,
            ComplaintStatus::InProgress => self.in_progress,
            ComplaintStatus::Resolved => self.resolved,
            ComplaintStatus::Rejected => self.rejected,
        }
    }

    fn bucket_mut(&mut self, status: ComplaintStatus) -> &mut u32 {
        match status {
            ComplaintStatus::Pending => &mut self.pending,
            ComplaintStatus::InProgress => &mut self.in_progress,
            ComplaintStatus::Resolved => &mut self.resolved,
            ComplaintStatus::Rejected => &mut self.rejected,
        }
    }

    /// Move one complaint from the `from` bucket to the `to` bucket.
    /// The source bucket saturates at zero; `total` is never touched.
    pub fn shift(&mut self, from: ComplaintStatus, to: ComplaintStatus) {
        if from == to {
            return;
        }
        let source = self.bucket_mut(from);
        *source = source.saturating_sub(1);
        let target = self.bucket_mut(to);
        *target = target.saturating_add(1);
    }

    /// Complaints still waiting on the warden (shown as the sidebar badge).
    pub fn open(&self) -> u32 {
        self.pending + self.in_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stats_payload() {
        let json = r#"{"total_complaints": 12, "pending": 4, "in_progress": 3, "resolved": 4, "rejected": 1}"#;
        let stats: StatsSnapshot = serde_json::from_str(json).expect("stats should parse");
        assert_eq!(stats.total, 12);
        assert_eq!(stats.count(ComplaintStatus::InProgress), 3);
        assert_eq!(stats.open(), 7);
    }

    #[test]
    fn test_missing_bucket_is_rejected() {
        let json = r#"{"total_complaints": 12, "pending": 4}"#;
        assert!(serde_json::from_str::<StatsSnapshot>(json).is_err());
    }

    #[test]
    fn test_shift_moves_one_count() {
        let mut stats = StatsSnapshot {
            total: 10,
            pending: 2,
            in_progress: 3,
            resolved: 5,
            rejected: 0,
        };
        stats.shift(ComplaintStatus::InProgress, ComplaintStatus::Resolved);
        assert_eq!(stats.in_progress, 2);
        assert_eq!(stats.resolved, 6);
        assert_eq!(stats.total, 10);
    }

    #[test]
    fn test_shift_saturates_at_zero() {
        let mut stats = StatsSnapshot::default();
        stats.shift(ComplaintStatus::Pending, ComplaintStatus::Rejected);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.rejected, 1);

        stats.shift(ComplaintStatus::Rejected, ComplaintStatus::Rejected);
        assert_eq!(stats.rejected, 1);
    }
}
