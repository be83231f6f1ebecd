//! Plain-text rendering of cache snapshots and records.
//!
//! Every function returns the full text so it can be tested without a
//! terminal.

use std::fmt::Write;

use chrono::Utc;

use wardendesk_core::cache::CacheSnapshot;
use wardendesk_core::models::{
    ComplaintFilter, ComplaintRecord, ComplaintStatus, StatsSnapshot, Warden,
};
use wardendesk_core::review::ReviewOutcome;
use wardendesk_core::utils::{format_date, time_ago, truncate};

const CATEGORY_WIDTH: usize = 24;
const STUDENT_WIDTH: usize = 28;

pub fn stats(snapshot: &CacheSnapshot) -> String {
    let mut out = String::new();
    let hostel = snapshot.hostel.as_deref().unwrap_or("-");
    let _ = writeln!(out, "Hostel {}", hostel);

    match snapshot.stats {
        Some(ref stats) => {
            out.push_str(&stats_table(stats));
            if let Some(ref age) = snapshot.stats_age {
                let _ = writeln!(out, "Updated {}", age);
            }
        }
        None => out.push_str("No stats loaded\n"),
    }
    out
}

fn stats_table(stats: &StatsSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {:<12} {:>6}", "Total", stats.total);
    for status in ComplaintStatus::ALL {
        let _ = writeln!(out, "  {:<12} {:>6}", status.display_name(), stats.count(status));
    }
    out
}

pub fn complaint_list(
    snapshot: &CacheSnapshot,
    shown: &[ComplaintRecord],
    filter: &ComplaintFilter,
) -> String {
    let mut out = String::new();

    if let Some(ref stats) = snapshot.stats {
        let _ = writeln!(
            out,
            "Hostel {} - {} open of {} ({} pending, {} in progress)",
            snapshot.hostel.as_deref().unwrap_or("-"),
            stats.open(),
            stats.total,
            stats.pending,
            stats.in_progress
        );
    }

    if shown.is_empty() {
        if filter.is_empty() {
            out.push_str("No complaints\n");
        } else {
            out.push_str("No complaints match the filter\n");
        }
    } else {
        let now = Utc::now();
        let _ = writeln!(
            out,
            "{:>6}  {:<11}  {:<cw$}  {:<sw$}  {:>6}  {}",
            "ID",
            "Status",
            "Category",
            "Student",
            "Room",
            "Activity",
            cw = CATEGORY_WIDTH,
            sw = STUDENT_WIDTH
        );
        for record in shown {
            let activity = record
                .last_activity()
                .map(|t| time_ago(t, now))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "{:>6}  {:<11}  {:<cw$}  {:<sw$}  {:>6}  {}",
                record.id,
                record.status.display_name(),
                truncate(&record.category_display(), CATEGORY_WIDTH),
                truncate(&record.student_display(), STUDENT_WIDTH),
                record.room_number.as_deref().unwrap_or("-"),
                activity,
                cw = CATEGORY_WIDTH,
                sw = STUDENT_WIDTH
            );
        }
    }

    if let Some(ref pagination) = snapshot.pagination {
        let mut footer = format!(
            "Page {} of {} ({} complaints)",
            pagination.page,
            pagination.total_pages.max(1),
            pagination.total
        );
        if !filter.is_empty() {
            let _ = write!(footer, ", {} shown", shown.len());
        }
        if pagination.has_next() {
            let _ = write!(footer, " - next: --page {}", pagination.page + 1);
        }
        let _ = writeln!(out, "{}", footer);
    }
    out
}

pub fn complaint_detail(record: &ComplaintRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Complaint #{}", record.id);
    let _ = writeln!(out, "  Status      {}", record.status.display_name());
    let _ = writeln!(out, "  Category    {}", record.category_display());
    if let Some(ref title) = record.title {
        let _ = writeln!(out, "  Title       {}", title);
    }
    let _ = writeln!(out, "  Student     {}", record.student_display());
    if let Some(ref room) = record.room_number {
        let _ = writeln!(out, "  Room        {}", room);
    }
    if let Some(ref hostel) = record.hostel_name {
        let _ = writeln!(out, "  Hostel      {}", hostel);
    }

    let timeline = [
        ("Filed", record.created_at.as_deref()),
        ("Accepted", record.in_progress_at.as_deref()),
        ("Resolved", record.resolved_at.as_deref()),
        ("Rejected", record.rejected_at.as_deref()),
    ];
    for (label, at) in timeline {
        if let Some(at) = at {
            let _ = writeln!(out, "  {:<11} {}", label, format_date(at));
        }
    }

    if let Some(ref description) = record.description {
        let _ = writeln!(out, "\n{}", description);
    }
    if let Some(next) = record.status.next_action() {
        let verb = match next {
            ComplaintStatus::InProgress => "accept",
            _ => "resolve",
        };
        let _ = writeln!(out, "\nNext: wardendesk {} {}", verb, record.id);
    }
    out
}

pub fn review_outcome(outcome: &ReviewOutcome, stats: Option<&StatsSnapshot>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Complaint #{}: {} -> {}",
        outcome.id,
        outcome.from.display_name(),
        outcome.to.display_name()
    );

    match outcome.notification {
        Some(ref n) if n.any_delivered() => out.push_str("Student notified\n"),
        Some(_) => out.push_str("Student could not be notified\n"),
        None => {}
    }

    if !outcome.applied_locally {
        out.push_str("Complaint was not on the loaded page; run `wardendesk list --refresh` to see it\n");
    } else if let Some(stats) = stats {
        out.push_str(&stats_table(stats));
    }
    out
}

pub fn profile(warden: &Warden) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", warden.display_name());
    let fields = [
        ("ID", warden.id.as_deref()),
        ("Hostel", warden.hostel.as_deref()),
        ("Email", warden.email.as_deref()),
        ("Phone", warden.phone.as_deref()),
        ("Gender", warden.gender.as_deref()),
    ];
    for (label, value) in fields {
        let _ = writeln!(out, "  {:<8} {}", label, value.unwrap_or("-"));
    }
    if let Some(ref created) = warden.created_at {
        let _ = writeln!(out, "  {:<8} {}", "Since", format_date(created));
    }
    out
}
