// Config adapter - Layered configuration from TOML/YAML files and environment

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::supervisor::SupervisorConfig;
use crate::error::{MixerError, MixerResult};
use crate::utils::logging::LoggingConfig;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "CLIPMIX_";

/// Files searched when no explicit config path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/clipmix.toml", "clipmix.toml"];

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub encoder_path: PathBuf,
    /// 0 leaves thread selection to the encoder
    pub encoder_threads: usize,
    pub container: String,
    pub output_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub projects_dir: PathBuf,
    pub status_dir: PathBuf,
    /// Path segment under `upload_dir` for thumbnails
    pub thumbnail_feature: String,
    pub encode_timeout_secs: u64,
    pub kill_grace_ms: u64,
    pub shutdown_grace_ms: u64,
    /// Minimum progress advance, in percent, between pushed updates
    pub progress_step: f64,
    pub logging: LoggingConfig,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            encoder_path: PathBuf::from("ffmpeg"),
            encoder_threads: num_cpus::get(),
            container: "mp4".to_string(),
            output_dir: PathBuf::from("./uploads/outputs"),
            upload_dir: PathBuf::from("./uploads"),
            projects_dir: PathBuf::from("./data/projects"),
            status_dir: PathBuf::from("./data/generations"),
            thumbnail_feature: "video-mixer".to_string(),
            encode_timeout_secs: 600,
            kill_grace_ms: 2000,
            shutdown_grace_ms: 5000,
            progress_step: 10.0,
            logging: LoggingConfig::default(),
        }
    }
}

impl MixerConfig {
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            encoder_path: self.encoder_path.clone(),
            timeout: Duration::from_secs(self.encode_timeout_secs),
            kill_grace: Duration::from_millis(self.kill_grace_ms),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn threads(&self) -> Option<usize> {
        Some(self.encoder_threads).filter(|t| *t > 0)
    }

    pub fn validate(&self) -> MixerResult<()> {
        if self.encode_timeout_secs == 0 {
            return Err(MixerError::config("encode_timeout_secs must be positive"));
        }
        if !(0.0..=100.0).contains(&self.progress_step) {
            return Err(MixerError::config("progress_step must be within 0..=100"));
        }
        if self.container.trim().is_empty() {
            return Err(MixerError::config("container must not be empty"));
        }
        Ok(())
    }
}

/// Builds a [`MixerConfig`] from defaults, a file and the environment
pub struct ConfigLoader {
    config: MixerConfig,
    source: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config: MixerConfig::default(),
            source: None,
        }
    }

    /// Load `path` if given (must exist), otherwise the first default path that exists.
    pub fn with_file(mut self, path: Option<&Path>) -> MixerResult<Self> {
        let candidate = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(MixerError::config(format!(
                        "Config file does not exist: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => DEFAULT_CONFIG_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists()),
        };

        if let Some(path) = candidate {
            info!("Loading configuration from {}", path.display());
            self.config = Self::parse_file(&path)?;
            self.source = Some(path);
        } else {
            debug!("No config file found; using defaults");
        }
        Ok(self)
    }

    /// Apply `CLIPMIX_*` overrides from the process environment
    pub fn with_env(self) -> MixerResult<Self> {
        self.with_vars(std::env::vars())
    }

    /// Apply `CLIPMIX_*` overrides from an explicit variable list
    pub fn with_vars<I>(mut self, vars: I) -> MixerResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut applied = 0;
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if self.apply_override(name, &value)? {
                debug!("Environment override: {}", key);
                applied += 1;
            }
        }
        if applied > 0 {
            info!("Applied {} environment override(s)", applied);
        }
        Ok(self)
    }

    fn apply_override(&mut self, name: &str, value: &str) -> MixerResult<bool> {
        let c = &mut self.config;
        match name {
            "ENCODER_PATH" => c.encoder_path = PathBuf::from(value),
            "ENCODER_THREADS" => c.encoder_threads = parse(name, value)?,
            "CONTAINER" => c.container = value.to_string(),
            "OUTPUT_DIR" => c.output_dir = PathBuf::from(value),
            "UPLOAD_DIR" => c.upload_dir = PathBuf::from(value),
            "PROJECTS_DIR" => c.projects_dir = PathBuf::from(value),
            "STATUS_DIR" => c.status_dir = PathBuf::from(value),
            "THUMBNAIL_FEATURE" => c.thumbnail_feature = value.to_string(),
            "ENCODE_TIMEOUT_SECS" => c.encode_timeout_secs = parse(name, value)?,
            "KILL_GRACE_MS" => c.kill_grace_ms = parse(name, value)?,
            "SHUTDOWN_GRACE_MS" => c.shutdown_grace_ms = parse(name, value)?,
            "PROGRESS_STEP" => c.progress_step = parse(name, value)?,
            "LOG_LEVEL" => c.logging.level = value.parse()?,
            "LOG_FORMAT" => c.logging.format = value.parse()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Apply an in-memory edit, used for CLI flags
    pub fn with_override<F: FnOnce(&mut MixerConfig)>(mut self, edit: F) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn build(self) -> MixerResult<MixerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    fn parse_file(path: &Path) -> MixerResult<MixerConfig> {
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
            "toml" | "" => Ok(toml::from_str(&content)?),
            other => Err(MixerError::config(format!(
                "Unsupported config format: .{}",
                other
            ))),
        }
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> MixerResult<T> {
    value.trim().parse().map_err(|_| {
        MixerError::config(format!("Invalid value for {}{}: {}", ENV_PREFIX, name, value))
    })
}
