pub mod ics2task;
pub mod task2ics;

use std::path::PathBuf;

use anyhow::{Context, Result};
use icstask_core::{IcsTask, IcsTaskConfig, TaskwarriorCli};

/// Open the Taskwarrior database, optionally overriding the configured
/// data directory.
pub fn open(data_dir: Option<PathBuf>) -> Result<IcsTask<TaskwarriorCli>> {
    let mut config = IcsTaskConfig::load().context("Failed to load configuration")?;

    if let Some(dir) = data_dir {
        config.data_location = dir;
    }

    let icstask = IcsTask::from_config(&config).with_context(|| {
        format!(
            "Failed to open Taskwarrior data at {}",
            config.data_path().display()
        )
    })?;

    log::debug!(
        "Using {} ({}, uids @{})",
        icstask.data_location().display(),
        icstask.timezone(),
        icstask.host()
    );

    Ok(icstask)
}
