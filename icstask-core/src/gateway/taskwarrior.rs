//! The `task` command line tool as a gateway.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{IcsTaskError, IcsTaskResult};
use crate::gateway::TaskGateway;
use crate::task::Task;

/// `add  <uuid> ...` / `mod  <uuid> ...` lines printed by `task import`.
static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:add|mod)\s+([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\b",
    )
    .expect("import line pattern is valid")
});

#[derive(Debug, Clone)]
pub struct TaskwarriorCli {
    binary_path: PathBuf,
    data_location: PathBuf,
}

impl TaskwarriorCli {
    /// Look up `binary` in PATH and point it at `data_location`.
    pub fn new(binary: &str, data_location: &Path) -> IcsTaskResult<Self> {
        let binary_path = which::which(binary).map_err(|_| {
            IcsTaskError::ExternalTool(format!("'{binary}' not found in PATH"))
        })?;

        Ok(Self {
            binary_path,
            data_location: data_location.to_path_buf(),
        })
    }

    /// Overrides shared by every invocation: no hooks, no chatter, no prompts.
    fn base_args(&self) -> Vec<String> {
        vec![
            "rc.verbose=nothing".to_string(),
            "rc.hooks=off".to_string(),
            "rc.confirmation=no".to_string(),
            format!("rc.data.location={}", self.data_location.display()),
        ]
    }

    /// Run `task` with `args`, optionally feeding `input` on stdin, and
    /// return its stdout.
    async fn run(&self, args: &[&str], input: Option<&str>) -> IcsTaskResult<String> {
        log::debug!("Running {} {}", self.binary_path.display(), args.join(" "));

        let mut child = Command::new(&self.binary_path)
            .args(self.base_args())
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                IcsTaskError::ExternalTool(format!(
                    "Failed to spawn {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
            stdin.flush().await?;
            // Dropping stdin signals EOF
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(IcsTaskError::ExternalTool(format!(
                "task {} exited with status: {}",
                args.first().copied().unwrap_or_default(),
                output.status.code().unwrap_or(-1)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TaskGateway for TaskwarriorCli {
    async fn export(&self) -> IcsTaskResult<Vec<Task>> {
        let stdout = self.run(&["export"], None).await?;
        let tasks: Vec<Task> = serde_json::from_str(&stdout)
            .map_err(|e| IcsTaskError::Serialization(format!("Failed to parse export: {e}")))?;
        log::debug!("Exported {} tasks", tasks.len());
        Ok(tasks)
    }

    async fn import(&self, task: &Task) -> IcsTaskResult<String> {
        let json = task.to_import_json()?;
        let stdout = self
            .run(&["rc.recurrence.confirmation=no", "import", "-"], Some(&json))
            .await?;
        parse_import_output(&stdout)
    }

    async fn delete(&self, uuid: &str) -> IcsTaskResult<()> {
        self.run(&[uuid, "delete"], None).await?;
        Ok(())
    }

    async fn modify_project(&self, uuid: &str, project: Option<&str>) -> IcsTaskResult<()> {
        let project_arg = format!("project:{}", project.unwrap_or_default());
        self.run(&[uuid, "modify", &project_arg], None).await?;
        Ok(())
    }
}

/// Find the uuid of the first added or modified task in `task import` output.
pub fn parse_import_output(stdout: &str) -> IcsTaskResult<String> {
    IMPORT_LINE
        .captures(stdout)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| IcsTaskError::ImportParse(stdout.trim().to_string()))
}
