use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Client configuration. Every field has a default, so a config file only
/// needs the values it changes.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Seconds to sleep between polls while waiting on a simulation.
    pub poll_interval: f64,
    /// Milliseconds to pause between successive cancellation requests.
    pub cancel_delay: u64,
    /// Consecutive failed polls tolerated before a wait gives up.
    pub max_poll_failures: u32,
    /// Optional bound, in seconds, on a single simulation wait.
    pub wait_timeout: Option<f64>,
    /// Where downloaded result files are written.
    pub user_data_path: PathBuf,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: 5.0,
            cancel_delay: 100,
            max_poll_failures: 5,
            wait_timeout: None,
            user_data_path: std::env::temp_dir().join("additive"),
            log_level: String::from("info"),
        }
    }
}

impl ClientConfig {
    /// Reads a JSON config file, rejecting durations that cannot be represented.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.task_settings()?;
        Ok(config)
    }

    /// The slice of the config every task needs.
    ///
    /// Negative durations count as zero.
    pub fn task_settings(&self) -> Result<TaskSettings, Error> {
        Ok(TaskSettings {
            poll_interval: seconds("poll_interval", self.poll_interval)?,
            max_poll_failures: self.max_poll_failures,
            wait_timeout: self
                .wait_timeout
                .map(|secs| seconds("wait_timeout", secs))
                .transpose()?,
            user_data_path: self.user_data_path.clone(),
        })
    }

    #[inline]
    pub fn cancel_delay(&self) -> Duration {
        Duration::from_millis(self.cancel_delay)
    }
}

/// Describes how a `SimulationTask` polls the server.
#[derive(Clone, PartialEq, Debug)]
pub struct TaskSettings {
    pub poll_interval: Duration,
    pub max_poll_failures: u32,
    pub wait_timeout: Option<Duration>,
    pub user_data_path: PathBuf,
}

impl Default for TaskSettings {
    fn default() -> Self {
        let config = ClientConfig::default();
        Self {
            poll_interval: Duration::from_secs(5),
            max_poll_failures: config.max_poll_failures,
            wait_timeout: None,
            user_data_path: config.user_data_path,
        }
    }
}

fn seconds(field: &str, secs: f64) -> Result<Duration, Error> {
    Duration::try_from_secs_f64(secs.max(0.0))
        .map_err(|e| Error::InvalidConfig(format!("{field} = {secs}: {e}")))
}
