//! Human-readable duration formatting
//!
//! Track lengths are displayed the way chat front-ends show them:
//! `M:SS` below one hour, `H:MM:SS` above.

/// Seconds in one hour; switch point between the two display formats
const HOUR_SECONDS: u64 = 3600;

/// Format a track duration given in whole seconds.
///
/// # Examples
///
/// ```
/// use gmq_common::human_time::format_track_duration;
///
/// assert_eq!(format_track_duration(0), "0:00");
/// assert_eq!(format_track_duration(65), "1:05");
/// assert_eq!(format_track_duration(3599), "59:59");
/// assert_eq!(format_track_duration(3661), "1:01:01");
/// ```
pub fn format_track_duration(seconds: u64) -> String {
    if seconds < HOUR_SECONDS {
        let minutes = seconds / 60;
        let secs = seconds % 60;
        format!("{}:{:02}", minutes, secs)
    } else {
        let hours = seconds / HOUR_SECONDS;
        let mins = (seconds % HOUR_SECONDS) / 60;
        let secs = seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}
