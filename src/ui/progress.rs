//! Time formatting for progress and status output.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Format a duration for display.
///
/// Creation Kit steps routinely run for tens of minutes, so durations past
/// an hour are shown as hours and minutes.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let total = d.as_secs();
        format!("{}m {:02}s", total / 60, total % 60)
    } else {
        let total = d.as_secs();
        format!("{}h {:02}m", total / 3600, (total % 3600) / 60)
    }
}

/// Format a timestamp relative to now (e.g. "2 minutes ago").
pub fn format_relative_time(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now().signed_duration_since(timestamp).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    const UNITS: [(i64, &str); 5] = [
        (60 * 60 * 24 * 365, "year"),
        (60 * 60 * 24 * 30, "month"),
        (60 * 60 * 24, "day"),
        (60 * 60, "hour"),
        (60, "minute"),
    ];

    for (size, name) in UNITS {
        let count = seconds / size;
        if count >= 1 {
            return match (count, name) {
                (1, "day") => "yesterday".to_string(),
                (1, _) => format!("1 {} ago", name),
                _ => format!("{} {}s ago", count, name),
            };
        }
    }
    "just now".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_scale_units() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 7 * 60)), "3h 07m");
    }

    #[test]
    fn relative_time_just_now() {
        assert_eq!(format_relative_time(Utc::now()), "just now");
        let future = Utc::now() + chrono::Duration::minutes(5);
        assert_eq!(format_relative_time(future), "just now");
    }

    #[test]
    fn relative_time_minutes_and_hours() {
        let ts = Utc::now() - chrono::Duration::minutes(1);
        assert_eq!(format_relative_time(ts), "1 minute ago");
        let ts = Utc::now() - chrono::Duration::minutes(15);
        assert_eq!(format_relative_time(ts), "15 minutes ago");
        let ts = Utc::now() - chrono::Duration::hours(3);
        assert_eq!(format_relative_time(ts), "3 hours ago");
    }

    #[test]
    fn relative_time_days() {
        let ts = Utc::now() - chrono::Duration::days(1);
        assert_eq!(format_relative_time(ts), "yesterday");
        let ts = Utc::now() - chrono::Duration::days(4);
        assert_eq!(format_relative_time(ts), "4 days ago");
    }

    #[test]
    fn relative_time_years() {
        let ts = Utc::now() - chrono::Duration::days(800);
        assert_eq!(format_relative_time(ts), "2 years ago");
    }
}
