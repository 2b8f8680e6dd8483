//! icstask configuration.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{IcsTaskError, IcsTaskResult};

static DEFAULT_DATA_LOCATION: &str = "~/.task";
static DEFAULT_TASK_BINARY: &str = "task";

fn default_data_location() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_LOCATION)
}

fn default_task_binary() -> String {
    DEFAULT_TASK_BINARY.to_string()
}

fn default_auto_start() -> bool {
    true
}

/// Configuration at ~/.config/icstask/config.toml, overridable with
/// `ICSTASK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct IcsTaskConfig {
    /// Taskwarrior data directory (holds pending.data and completed.data)
    #[serde(default = "default_data_location")]
    pub data_location: PathBuf,

    /// Name or path of the Taskwarrior binary
    #[serde(default = "default_task_binary")]
    pub task_binary: String,

    /// IANA zone used for display and for all-day values. Defaults to the
    /// system zone.
    #[serde(default)]
    pub timezone: Option<String>,

    /// Host part of calendar uids. Defaults to the system hostname.
    #[serde(default)]
    pub host: Option<String>,

    /// Projects listed even while they hold no tasks
    #[serde(default)]
    pub known_projects: Vec<String>,

    /// Stamp a start time on tasks that a client marks IN-PROCESS
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

impl Default for IcsTaskConfig {
    fn default() -> Self {
        IcsTaskConfig {
            data_location: default_data_location(),
            task_binary: default_task_binary(),
            timezone: None,
            host: None,
            known_projects: Vec::new(),
            auto_start: default_auto_start(),
        }
    }
}

impl IcsTaskConfig {
    pub fn config_path() -> IcsTaskResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| IcsTaskError::Config("Could not determine config directory".into()))?
            .join("icstask");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the config file (if any) and environment overrides.
    pub fn load() -> IcsTaskResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> IcsTaskResult<Self> {
        Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("ICSTASK")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("known_projects"),
            )
            .build()
            .map_err(|e| IcsTaskError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| IcsTaskError::Config(e.to_string()))
    }

    /// Data location with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        expand_path(&self.data_location)
    }

    /// Configured zone, else the system zone, else UTC.
    pub fn timezone(&self) -> IcsTaskResult<Tz> {
        match &self.timezone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| IcsTaskError::Config(format!("Unknown timezone '{name}': {e}"))),
            None => Ok(iana_time_zone::get_timezone()
                .ok()
                .and_then(|name| name.parse::<Tz>().ok())
                .unwrap_or(Tz::UTC)),
        }
    }

    /// Configured host, else the system hostname.
    pub fn host(&self) -> String {
        self.host.clone().unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "localhost".to_string())
        })
    }
}

pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
