use std::time::Duration;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `4000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for background tasks to drain after shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT verification settings.
    pub jwt: JwtConfig,
    /// External conversion executable settings.
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `4000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "4000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
        }
    }
}

/// How to run the external plan-conversion executable.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Interpreter used to run the script.
    pub runtime: String,
    /// Path of the conversion script.
    pub script_path: String,
    /// Working directory for the child (inherits the server's if `None`).
    pub working_directory: Option<String>,
    /// Maximum number of children running at once; further jobs queue.
    pub max_concurrent: usize,
    /// Per-job wall-clock deadline in seconds; `0` disables it.
    pub job_timeout_secs: u64,
    /// Mark the completion ledger automatically when a job succeeds.
    pub auto_mark_complete: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            runtime: "python".into(),
            script_path: "scripts/pdf_model_conv.py".into(),
            working_directory: None,
            max_concurrent: 4,
            job_timeout_secs: 3600,
            auto_mark_complete: false,
        }
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from environment variables.
    ///
    /// | Env Var                       | Default                     |
    /// |-------------------------------|-----------------------------|
    /// | `PIPELINE_RUNTIME`            | `python`                    |
    /// | `PIPELINE_SCRIPT`             | `scripts/pdf_model_conv.py` |
    /// | `PIPELINE_WORKING_DIR`        | unset                       |
    /// | `PIPELINE_MAX_CONCURRENT`     | `4`                         |
    /// | `PIPELINE_JOB_TIMEOUT_SECS`   | `3600` (`0` = no deadline)  |
    /// | `PIPELINE_AUTO_MARK_COMPLETE` | `false`                     |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let runtime = std::env::var("PIPELINE_RUNTIME").unwrap_or(defaults.runtime);
        let script_path = std::env::var("PIPELINE_SCRIPT").unwrap_or(defaults.script_path);
        let working_directory = std::env::var("PIPELINE_WORKING_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let max_concurrent: usize = std::env::var("PIPELINE_MAX_CONCURRENT")
            .map(|v| v.parse().expect("PIPELINE_MAX_CONCURRENT must be a valid usize"))
            .unwrap_or(defaults.max_concurrent);
        assert!(max_concurrent > 0, "PIPELINE_MAX_CONCURRENT must be at least 1");

        let job_timeout_secs: u64 = std::env::var("PIPELINE_JOB_TIMEOUT_SECS")
            .map(|v| v.parse().expect("PIPELINE_JOB_TIMEOUT_SECS must be a valid u64"))
            .unwrap_or(defaults.job_timeout_secs);

        let auto_mark_complete: bool = std::env::var("PIPELINE_AUTO_MARK_COMPLETE")
            .map(|v| v.parse().expect("PIPELINE_AUTO_MARK_COMPLETE must be true or false"))
            .unwrap_or(defaults.auto_mark_complete);

        Self {
            runtime,
            script_path,
            working_directory,
            max_concurrent,
            job_timeout_secs,
            auto_mark_complete,
        }
    }

    /// The per-job deadline, or `None` when disabled.
    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }
}
