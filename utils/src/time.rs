//! Time formatting helpers.

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Format the time left until a deadline, or "elapsed" once it has passed.
pub fn format_remaining(now_secs: u64, deadline_secs: u64) -> String {
    match deadline_secs.checked_sub(now_secs) {
        Some(0) | None => "elapsed".to_string(),
        Some(left) => format_duration(left),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_scale() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(70 * 3600 + 60), "2d 22h");
        assert_eq!(format_duration(3 * 3600 + 120), "3h 2m");
    }

    #[test]
    fn remaining_saturates() {
        assert_eq!(format_remaining(100, 50), "elapsed");
        assert_eq!(format_remaining(100, 100), "elapsed");
        assert_eq!(format_remaining(0, 7200), "2h 0m");
    }
}
