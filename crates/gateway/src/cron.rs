//! A minimal 5-field cron evaluator (`minute hour dom month dow`, UTC only
//! — tasks have no per-schedule timezone in this system's data model).
//! Grounded on `runtime/schedules.rs`'s field-matcher and next-occurrence
//! search, with the timezone-aware `chrono_tz` conversion dropped.

use chrono::{DateTime, Datelike, Timelike, Utc};

fn field_matches(field: &str, value: u32) -> bool {
    if field == "*" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        if let Ok(n) = step.parse::<u32>() {
            return n > 0 && value % n == 0;
        }
    }
    for part in field.split(',') {
        if let Some((start_s, end_s)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start_s.parse::<u32>(), end_s.parse::<u32>()) {
                if value >= start && value <= end {
                    return true;
                }
            }
        } else if let Ok(n) = part.parse::<u32>() {
            if value == n {
                return true;
            }
        }
    }
    false
}

fn matches(expr: &str, dt: &chrono::NaiveDateTime) -> bool {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return false;
    }
    field_matches(fields[0], dt.minute())
        && field_matches(fields[1], dt.hour())
        && field_matches(fields[2], dt.day())
        && field_matches(fields[3], dt.month())
        && field_matches(fields[4], dt.weekday().num_days_from_sunday())
}

/// Validate a 5-field cron expression's shape (field count only — ranges
/// are tolerant of any numeric value, matching the teacher's permissive
/// parser rather than rejecting out-of-range fields at write time).
pub fn validate(expr: &str) -> std::result::Result<(), String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 fields (minute hour dom month dow), got {}", fields.len()));
    }
    Ok(())
}

/// Next UTC occurrence strictly after `after`, searching up to one year of
/// minutes before giving up.
pub fn next(expr: &str, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut candidate = (*after + chrono::Duration::seconds(60 - after.second() as i64))
        .naive_utc()
        .with_second(0)
        .unwrap_or_else(|| after.naive_utc());

    for _ in 0..366 * 24 * 60 {
        if matches(expr, &candidate) {
            return Some(DateTime::from_naive_utc_and_offset(candidate, Utc));
        }
        candidate += chrono::Duration::minutes(1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_daily_at_nine_am() {
        let after: DateTime<Utc> = "2026-01-01T08:00:00Z".parse().unwrap();
        let next = next("0 9 * * *", &after).unwrap();
        assert_eq!(next.to_rfc3339(), "2026-01-01T09:00:00+00:00");
    }

    #[test]
    fn next_skips_to_following_day_once_past_today() {
        let after: DateTime<Utc> = "2026-01-01T10:00:00Z".parse().unwrap();
        let next = next("0 9 * * *", &after).unwrap();
        assert_eq!(next.to_rfc3339(), "2026-01-02T09:00:00+00:00");
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(validate("0 9 * *").is_err());
        assert!(validate("0 9 * * *").is_ok());
    }
}
