//! Human-readable durations for the CLI views

/// `HH:MM:SS`, hours unbounded. Negative input renders as zero.
pub fn format_clock(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Coarse duration used in history listings
pub fn format_for_display(ms: i64) -> String {
    let seconds = ms.max(0) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if seconds < 60 {
        format!("{} seconds", seconds)
    } else if hours > 0 {
        format!("{}:{:02} minutes", hours, minutes % 60)
    } else {
        format!("{} minutes", minutes)
    }
}
