//! Grader configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment:
//! - `RENDER_GRADER_THRESHOLD` similarity threshold (0-100)
//! - `RENDER_GRADER_REFERENCE` reference image path
//! - `RENDER_GRADER_ISOLATION` `inline`, `thread` or `process`
//!
//! Process workers do not reload anything: the parent's resolved
//! configuration reaches them as JSON in `RENDER_GRADER_WORKER_CONFIG`.

use crate::error::ConfigError;
use grader_kernel::{ExecutorConfig, Isolation, WorkerCommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding the similarity threshold
pub const ENV_THRESHOLD: &str = "RENDER_GRADER_THRESHOLD";
/// Environment variable overriding the reference image
pub const ENV_REFERENCE: &str = "RENDER_GRADER_REFERENCE";
/// Environment variable overriding the isolation mode
pub const ENV_ISOLATION: &str = "RENDER_GRADER_ISOLATION";
/// Environment variable carrying the resolved configuration to a worker process
pub const ENV_WORKER_CONFIG: &str = "RENDER_GRADER_WORKER_CONFIG";

/// How each submission is isolated from the grader process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// Grade in the caller's context
    Inline,
    /// Grade on a worker thread; contains panics only
    Thread,
    /// Grade in a worker process; contains any crash
    Process,
}

impl FromStr for IsolationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "thread" => Ok(Self::Thread),
            "process" | "subprocess" => Ok(Self::Process),
            other => Err(ConfigError::Invalid {
                field: "isolation",
                reason: format!("unknown mode '{other}'"),
            }),
        }
    }
}

/// Grader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    /// Reference render every submission is compared against
    pub reference_image: PathBuf,
    /// Similarity (0-100) a submission must exceed to pass
    pub similarity_threshold: f64,
    /// Logical filename of the render in `xqueue_files`
    pub artifact_key: String,
    /// Isolation mode
    pub isolation: IsolationMode,
    /// Per-request fetch timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Optional deadline for a whole grading invocation
    pub task_timeout_secs: Option<u64>,
    /// Worker executable for process isolation; defaults to the running binary
    pub worker_program: Option<PathBuf>,
}

impl GraderConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With reference image
    #[inline]
    #[must_use]
    pub fn with_reference_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_image = path.into();
        self
    }

    /// With similarity threshold
    #[inline]
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// With isolation mode
    #[inline]
    #[must_use]
    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    /// With artifact key
    #[inline]
    #[must_use]
    pub fn with_artifact_key(mut self, key: impl Into<String>) -> Self {
        self.artifact_key = key.into();
        self
    }

    /// With task deadline
    #[inline]
    #[must_use]
    pub fn with_task_timeout(mut self, secs: u64) -> Self {
        self.task_timeout_secs = Some(secs);
        self
    }

    /// Read a TOML file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load from an optional file, apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a worker process.
    ///
    /// Uses the configuration handed down by the parent when present, so a
    /// worker grades exactly like the grader that started it. Otherwise falls
    /// back to [`load`](Self::load).
    pub fn for_worker(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::from_worker_env(|key| std::env::var(key).ok())? {
            Some(config) => Ok(config),
            None => Self::load(config_file),
        }
    }

    /// Decode a handed-down configuration from a key lookup
    pub fn from_worker_env<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(raw) = lookup(ENV_WORKER_CONFIG) else {
            return Ok(None);
        };
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(Some(config))
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_THRESHOLD) {
            self.similarity_threshold = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                field: "similarity_threshold",
                reason: format!("'{raw}': {e}"),
            })?;
        }
        if let Some(raw) = lookup(ENV_REFERENCE) {
            self.reference_image = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_ISOLATION) {
            self.isolation = raw.parse()?;
        }
        Ok(self)
    }

    /// Reject values the grader cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.similarity_threshold;
        if !t.is_finite() || !(0.0..=100.0).contains(&t) {
            return Err(ConfigError::Invalid {
                field: "similarity_threshold",
                reason: format!("{t} is not within 0..=100"),
            });
        }
        if self.artifact_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "artifact_key",
                reason: "must not be empty".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Fetch timeout as a duration
    #[inline]
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Executor settings for this configuration.
    ///
    /// Process workers are started as `<worker_program> worker` with this
    /// configuration in their environment.
    pub fn executor_config(&self) -> Result<ExecutorConfig, ConfigError> {
        let isolation = match self.isolation {
            IsolationMode::Inline => Isolation::Inline,
            IsolationMode::Thread => Isolation::Thread,
            IsolationMode::Process => {
                let program = match &self.worker_program {
                    Some(program) => program.clone(),
                    None => std::env::current_exe()?,
                };
                let command = WorkerCommand::new(program)
                    .arg("worker")
                    .env(ENV_WORKER_CONFIG, serde_json::to_string(self)?);
                Isolation::Subprocess(command)
            }
        };

        let mut config = ExecutorConfig::new(isolation);
        if let Some(secs) = self.task_timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            reference_image: PathBuf::from("img/001.png"),
            similarity_threshold: 95.0,
            artifact_key: "render".to_string(),
            isolation: IsolationMode::Process,
            fetch_timeout_secs: 30,
            task_timeout_secs: None,
            worker_program: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn config_defaults() {
        let config = GraderConfig::new();
        assert_eq!(config.similarity_threshold, 95.0);
        assert_eq!(config.artifact_key, "render");
        assert_eq!(config.isolation, IsolationMode::Process);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_partial_toml() {
        let config: GraderConfig = toml::from_str(
            r#"
            similarity_threshold = 94.5
            isolation = "process"
            task_timeout_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.similarity_threshold, 94.5);
        assert_eq!(config.isolation, IsolationMode::Process);
        assert_eq!(config.task_timeout_secs, Some(60));
        assert_eq!(config.reference_image, PathBuf::from("img/001.png"));
    }

    #[test]
    fn config_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_THRESHOLD, "96"),
            (ENV_REFERENCE, "/srv/ref.png"),
            (ENV_ISOLATION, "Inline"),
        ]
        .into_iter()
        .collect();

        let config = GraderConfig::new()
            .apply_overrides(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.similarity_threshold, 96.0);
        assert_eq!(config.reference_image, PathBuf::from("/srv/ref.png"));
        assert_eq!(config.isolation, IsolationMode::Inline);
    }

    #[test]
    fn config_rejects_bad_values() {
        assert!(GraderConfig::new().with_threshold(f64::NAN).validate().is_err());
        assert!(GraderConfig::new().with_threshold(101.0).validate().is_err());
        assert!(GraderConfig::new().with_artifact_key(" ").validate().is_err());

        let bad_env = GraderConfig::new().apply_overrides(|k| (k == ENV_THRESHOLD).then(|| "high".to_string()));
        assert!(bad_env.is_err());
    }

    #[test]
    fn process_isolation_builds_worker_command() {
        let config = GraderConfig {
            worker_program: Some(PathBuf::from("/opt/render-grader")),
            ..GraderConfig::new()
                .with_isolation(IsolationMode::Process)
                .with_reference_image("/srv/ref.png")
                .with_threshold(97.5)
                .with_task_timeout(5)
        };

        let exec = config.executor_config().unwrap();
        match exec.isolation {
            Isolation::Subprocess(cmd) => {
                assert_eq!(cmd.program, PathBuf::from("/opt/render-grader"));
                assert_eq!(cmd.args, vec!["worker"]);

                let env: HashMap<String, String> = cmd.env.into_iter().collect();
                let handed_down = GraderConfig::from_worker_env(|k| env.get(k).cloned())
                    .unwrap()
                    .unwrap();
                assert_eq!(handed_down, config);
            }
            other => panic!("expected subprocess isolation, got {other:?}"),
        }
        assert_eq!(exec.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn default_isolation_is_a_process() {
        let exec = GraderConfig::new().executor_config().unwrap();
        assert!(matches!(exec.isolation, Isolation::Subprocess(_)));
    }

    #[test]
    fn worker_env_is_optional_and_validated() {
        assert!(GraderConfig::from_worker_env(|_| None).unwrap().is_none());

        let invalid = serde_json::to_string(&GraderConfig::new().with_threshold(250.0)).unwrap();
        assert!(GraderConfig::from_worker_env(|_| Some(invalid.clone())).is_err());
        assert!(GraderConfig::from_worker_env(|_| Some("{".to_string())).is_err());
    }
}
