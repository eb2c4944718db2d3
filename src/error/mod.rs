//! Error handling module for ClipMix

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for ClipMix operations
#[derive(Error, Debug)]
pub enum MixerError {
    /// Planner produced a variant with no clips
    #[error("Variant {variant} has no clips to encode")]
    EmptyPlan { variant: usize },

    /// Enumerated setting outside the supported set reached the graph builder
    #[error("Unsupported {setting}: {value}")]
    UnsupportedSettings { setting: String, value: String },

    /// Encoder exited non-zero, crashed, or could not be started
    #[error("Encoding failed: {message}")]
    Encoding { message: String },

    /// Encoder exceeded its wall-clock budget
    #[error("Encoder timed out after {budget:?}")]
    Timeout { budget: Duration },

    /// Temp-file deletion failed (logged, never escalated)
    #[error("Failed to clean up {path}: {message}")]
    Cleanup { path: PathBuf, message: String },

    /// Job was cancelled while its encoder was running
    #[error("Job {job_id} was cancelled")]
    Cancelled { job_id: String },

    /// Project has no source clips
    #[error("no clips found in project {project_id}")]
    NoClips { project_id: String },

    /// Project or status collaborator failure
    #[error("Store error: {message}")]
    Store { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for ClipMix operations
pub type MixerResult<T> = std::result::Result<T, MixerError>;

impl MixerError {
    pub fn unsupported(setting: impl Into<String>, value: impl ToString) -> Self {
        Self::UnsupportedSettings {
            setting: setting.into(),
            value: value.to_string(),
        }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding {
            message: msg.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the job queue may reasonably retry a job that failed with this error.
    ///
    /// The pipeline itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MixerError::Encoding { .. } | MixerError::Timeout { .. } | MixerError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(MixerError::encoding("boom").is_retryable());
        assert!(MixerError::Timeout {
            budget: Duration::from_secs(600)
        }
        .is_retryable());
        assert!(!MixerError::EmptyPlan { variant: 0 }.is_retryable());
        assert!(!MixerError::unsupported("aspect ratio", "3:2").is_retryable());
        assert!(!MixerError::NoClips {
            project_id: "p1".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_timeout_message_keeps_subsecond_budgets() {
        let err = MixerError::Timeout {
            budget: Duration::from_millis(200),
        };
        assert_eq!(err.to_string(), "Encoder timed out after 200ms");
        let err = MixerError::Timeout {
            budget: Duration::from_secs(600),
        };
        assert_eq!(err.to_string(), "Encoder timed out after 600s");
    }

    #[test]
    fn test_no_clips_message() {
        let err = MixerError::NoClips {
            project_id: "p1".to_string(),
        };
        assert!(err.to_string().contains("no clips"));
    }
}
