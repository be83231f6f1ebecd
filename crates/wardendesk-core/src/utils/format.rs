use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse the timestamp formats the complaint worker emits: RFC 3339, or the
/// SQLite `YYYY-MM-DD HH:MM:SS` form (interpreted as UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp to a more readable date
pub fn format_date(value: &str) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.format("%b %d, %Y").to_string(),
        None if value.len() >= 10 => value.chars().take(10).collect(),
        None => value.to_string(),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{} {} ago", n, unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

/// Relative age of a timestamp ("3 hours ago"), measured against `now`.
pub fn time_ago(value: &str, now: DateTime<Utc>) -> String {
    let Some(then) = parse_timestamp(value) else {
        return String::new();
    };

    let minutes = (now - then).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        plural(minutes, "minute")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if days < 7 {
        plural(days, "day")
    } else if days / 7 < 4 {
        plural(days / 7, "week")
    } else if days / 30 < 12 {
        plural(days / 30, "month")
    } else {
        plural(days / 365, "year")
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Case-insensitive substring match
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
