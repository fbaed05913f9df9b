//! Presentation helpers for an in-progress or finished workout.

/// Completed share of the target, rounded and clamped to 0..=100.
pub fn completion_percentage(completed: u32, target: u32) -> u32 {
    if target == 0 {
        return 0;
    }
    let pct = (completed as f64 / target as f64 * 100.0).round();
    pct.min(100.0) as u32
}

/// Encouragement for the current progress quartile.
pub fn motivational_message(current: u32, target: u32) -> &'static str {
    if target == 0 {
        return "Let's get started! You can do this!";
    }
    let pct = current as f64 / target as f64 * 100.0;
    if current == 0 {
        "Let's get started! You can do this!"
    } else if pct < 25.0 {
        "Great start! Keep the momentum going!"
    } else if pct < 50.0 {
        "You're doing great! Halfway there!"
    } else if pct < 75.0 {
        "Amazing progress! Keep pushing!"
    } else if pct < 100.0 {
        "Almost there! Finish strong!"
    } else {
        "Incredible work! You did it!"
    }
}

/// `45s`, `5m 30s`.
pub fn format_duration(secs: u64) -> String {
    let mins = secs / 60;
    let rest = secs % 60;
    if mins == 0 {
        format!("{rest}s")
    } else {
        format!("{mins}m {rest}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_clamped() {
        assert_eq!(completion_percentage(0, 0), 0);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 67);
        assert_eq!(completion_percentage(12, 10), 100);
    }

    #[test]
    fn messages_by_quartile() {
        assert_eq!(motivational_message(0, 20), "Let's get started! You can do this!");
        assert_eq!(motivational_message(4, 20), "Great start! Keep the momentum going!");
        assert_eq!(motivational_message(19, 20), "Almost there! Finish strong!");
        assert_eq!(motivational_message(20, 20), "Incredible work! You did it!");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(330), "5m 30s");
        assert_eq!(format_duration(60), "1m 0s");
    }
}
