//! Human-readable duration formatting
//!
//! Track durations are shown as `MM:SS`, switching to `H:MM:SS` once a
//! value reaches an hour. Unknown durations (0) are left to the caller.

/// Seconds in one hour; values at or above switch to the long format
const LONG_FORMAT_MIN: u64 = 3600;

/// Format seconds as `MM:SS` (or `H:MM:SS` for an hour or more).
///
/// # Examples
///
/// ```
/// use vcmp_common::human_time::format_track_time;
///
/// assert_eq!(format_track_time(0), "00:00");
/// assert_eq!(format_track_time(61), "01:01");
/// assert_eq!(format_track_time(3725), "1:02:05");
/// ```
pub fn format_track_time(seconds: u64) -> String {
    if seconds >= LONG_FORMAT_MIN {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        let secs = seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }
}

/// Format `elapsed / duration`, or just the elapsed time when the duration
/// is unknown.
pub fn format_progress(elapsed_secs: u64, duration_secs: u64) -> String {
    if duration_secs == 0 {
        format_track_time(elapsed_secs)
    } else {
        format!(
            "{} / {}",
            format_track_time(elapsed_secs.min(duration_secs)),
            format_track_time(duration_secs)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_values() {
        assert_eq!(format_track_time(5), "00:05");
        assert_eq!(format_track_time(59), "00:59");
        assert_eq!(format_track_time(60), "01:00");
        assert_eq!(format_track_time(3599), "59:59");
    }

    #[test]
    fn test_long_values() {
        assert_eq!(format_track_time(3600), "1:00:00");
        assert_eq!(format_track_time(36_061), "10:01:01");
    }

    #[test]
    fn test_progress_clamps_elapsed() {
        assert_eq!(format_progress(30, 180), "00:30 / 03:00");
        assert_eq!(format_progress(200, 180), "03:00 / 03:00");
        assert_eq!(format_progress(42, 0), "00:42");
    }
}
