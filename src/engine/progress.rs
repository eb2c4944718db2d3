//! Encoder progress parsing and throttling
//!
//! The encoder is launched with `-progress pipe:1 -nostats`, which makes it
//! print `key=value` lines on stdout in blocks terminated by a
//! `progress=continue` or `progress=end` line.

use std::sync::Arc;

/// Callback receiving a percentage in [0, 100]
pub type ProgressSink = Arc<dyn Fn(f64) + Send + Sync>;

/// A sink that drops every update
pub fn noop_sink() -> ProgressSink {
    Arc::new(|_| {})
}

/// Latest state reported by the encoder's progress stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncoderProgress {
    /// Output timestamp reached so far, in seconds
    pub out_time_secs: f64,
    pub frame: Option<u64>,
    /// Encoding speed relative to realtime
    pub speed: Option<f64>,
    /// `progress=end` was seen
    pub finished: bool,
}

impl EncoderProgress {
    /// Fold one progress line into the state.
    ///
    /// Returns `true` when the line closes a progress block, which is the
    /// point where a consumer should sample [`EncoderProgress::percent`].
    pub fn apply_line(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.trim().split_once('=') else {
            return false;
        };
        let value = value.trim();

        match key.trim() {
            // out_time_ms is in microseconds despite the name
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<f64>() {
                    if us >= 0.0 {
                        self.out_time_secs = us / 1_000_000.0;
                    }
                }
            }
            "frame" => self.frame = value.parse().ok(),
            "speed" => self.speed = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()),
            "progress" => {
                self.finished = value == "end";
                return true;
            }
            _ => {}
        }
        false
    }

    /// Completion percentage against the expected output duration, clamped to [0, 100].
    pub fn percent(&self, expected_duration_secs: f64) -> f64 {
        if self.finished {
            return 100.0;
        }
        if expected_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_duration_secs * 100.0).clamp(0.0, 100.0)
    }
}

/// Passes a percentage through only when it advanced by at least `step` or reached 100
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    step: f64,
    last: Option<f64>,
}

impl ProgressThrottle {
    pub fn new(step: f64) -> Self {
        Self {
            step: step.max(0.0),
            last: None,
        }
    }

    pub fn admit(&mut self, percent: f64) -> bool {
        let percent = percent.clamp(0.0, 100.0);
        let admit = match self.last {
            None => true,
            Some(last) if percent >= 100.0 => last < 100.0,
            Some(last) => percent - last >= self.step,
        };
        if admit {
            self.last = Some(percent);
        }
        admit
    }
}
