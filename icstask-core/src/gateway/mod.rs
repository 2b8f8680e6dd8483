//! Access to the Taskwarrior database.
//!
//! Everything icstask knows about tasks comes through a `TaskGateway`.
//! `TaskwarriorCli` drives the real `task` binary; tests substitute a fake.
//!
//! Callers must not invoke a gateway concurrently: `task` gives no
//! guarantees when several processes work on one data location.

mod taskwarrior;

pub use taskwarrior::{TaskwarriorCli, parse_import_output};

use async_trait::async_trait;

use crate::error::IcsTaskResult;
use crate::task::Task;

#[async_trait]
pub trait TaskGateway: Send + Sync {
    /// Every task in the database, as `task export` reports them.
    async fn export(&self) -> IcsTaskResult<Vec<Task>>;

    /// Add or update one task. Returns the uuid of the affected task.
    async fn import(&self, task: &Task) -> IcsTaskResult<String>;

    async fn delete(&self, uuid: &str) -> IcsTaskResult<()>;

    /// Move a task to another project; `None` clears the project.
    async fn modify_project(&self, uuid: &str, project: Option<&str>) -> IcsTaskResult<()>;
}
