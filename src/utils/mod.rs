//! Common utilities and helpers

use std::time::Duration;

pub mod logging;
pub mod path;

/// Display helpers shared by the CLI and the logs
pub struct Utils;

impl Utils {
    /// `mm:ss.mmm`, or `hh:mm:ss.mmm` past one hour
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        let milliseconds = duration.subsec_millis();

        if hours > 0 {
            format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, milliseconds)
        } else {
            format!("{:02}:{:02}.{:03}", minutes, seconds, milliseconds)
        }
    }

    /// Seconds as a duration; negative and non-finite values become zero
    pub fn seconds(value: f64) -> Duration {
        if value.is_finite() && value > 0.0 {
            Duration::from_secs_f64(value)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(Utils::format_duration(Duration::from_millis(65_250)), "01:05.250");
        assert_eq!(Utils::format_duration(Duration::from_secs(3725)), "01:02:05.000");
    }

    #[test]
    fn test_seconds_clamps() {
        assert_eq!(Utils::seconds(-1.0), Duration::ZERO);
        assert_eq!(Utils::seconds(f64::NAN), Duration::ZERO);
        assert_eq!(Utils::seconds(1.5), Duration::from_millis(1500));
    }
}
