//! Run configuration.
//!
//! Every knob is a CLI flag with an environment fallback. The config is
//! assembled once per invocation and handed to each component explicitly;
//! there are no process-wide clients or module-level singletons.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

pub const DEFAULT_PREFIX: &str = "guardduty-findings/";
const CHECKPOINT_FILE: &str = "last_run";

/// Get the guardpost home directory: ~/.guardpost
pub fn guardpost_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("GUARDPOST_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .map(|home| home.join(".guardpost"))
        .unwrap_or_else(|| PathBuf::from(".guardpost"))
}

/// Get the logs directory: ~/.guardpost/logs
pub fn logs_dir() -> PathBuf {
    guardpost_home().join("logs")
}

/// Default checkpoint path: ~/.guardpost/last_run
pub fn default_checkpoint_path() -> PathBuf {
    guardpost_home().join(CHECKPOINT_FILE)
}

/// Checkpoint path honoring the `GUARDPOST_CHECKPOINT` override, the same
/// resolution `run` applies through its flag/env fallback.
pub fn env_checkpoint_path() -> PathBuf {
    std::env::var("GUARDPOST_CHECKPOINT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_checkpoint_path())
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Args)]
pub struct RunConfig {
    /// Root directory of the findings store (mounted bucket export)
    #[arg(long, env = "GUARDPOST_STORE_ROOT")]
    pub store_root: PathBuf,

    /// Key prefix to scan under
    #[arg(long, env = "GUARDPOST_PREFIX", default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Checkpoint file path (defaults to <home>/last_run)
    #[arg(long, env = "GUARDPOST_CHECKPOINT")]
    pub checkpoint: Option<PathBuf>,

    /// Delivery command; each alert is piped to its stdin. When unset,
    /// alerts are emitted on stdout only.
    #[arg(long, env = "GUARDPOST_ALERT_CMD")]
    pub alert_cmd: Option<String>,

    /// Extra argument for the delivery command (repeatable; the env
    /// fallback is comma-separated, so arguments may contain spaces but
    /// not commas)
    #[arg(
        long = "alert-arg",
        env = "GUARDPOST_ALERT_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub alert_args: Vec<String>,

    /// Delivery timeout in seconds
    #[arg(long, env = "GUARDPOST_ALERT_TIMEOUT", default_value_t = 30)]
    pub alert_timeout_secs: u64,

    /// Emit the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl RunConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint
            .clone()
            .unwrap_or_else(default_checkpoint_path)
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_secs(self.alert_timeout_secs)
    }
}
