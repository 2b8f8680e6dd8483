//! In-memory snapshot of the Taskwarrior database.
//!
//! The snapshot is keyed by project, then uuid. It is only ever replaced as
//! a whole: deletions and project moves done outside this process cannot be
//! patched in safely.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::SystemTime;

use crate::error::{IcsTaskError, IcsTaskResult};
use crate::task::Task;

/// Virtual project containing every task.
pub const ALL_PROJECTS: &str = "all_projects";
/// Virtual project containing tasks without a project.
pub const UNAFFILIATED: &str = "unaffiliated";

/// Files whose modification time signals a change in Taskwarrior's data.
pub const BACKING_FILES: [&str; 2] = ["pending.data", "completed.data"];

#[derive(Debug)]
pub struct TaskCache {
    mtime: SystemTime,
    projects: BTreeMap<String, BTreeMap<String, Task>>,
    /// Every project name any snapshot has held.
    seen: BTreeSet<String>,
}

impl Default for TaskCache {
    fn default() -> Self {
        TaskCache {
            mtime: SystemTime::UNIX_EPOCH,
            projects: BTreeMap::new(),
            seen: BTreeSet::new(),
        }
    }
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freshness timestamp: the newest backing-file mtime reflected here.
    pub fn mtime(&self) -> SystemTime {
        self.mtime
    }

    /// Newest backing-file mtime if it is newer than the snapshot.
    pub fn stale_since(&self, data_location: &Path) -> IcsTaskResult<Option<SystemTime>> {
        let latest = backing_mtime(data_location)?;
        Ok((latest > self.mtime).then_some(latest))
    }

    /// Replace the whole snapshot. The freshness timestamp never moves back.
    pub fn rebuild(&mut self, tasks: Vec<Task>, mtime: SystemTime) {
        let mut projects: BTreeMap<String, BTreeMap<String, Task>> = BTreeMap::new();

        for task in tasks {
            let Some(uuid) = task.uuid.clone() else {
                log::warn!("Skipping exported task without uuid: {}", task.description);
                continue;
            };
            let project = task
                .project
                .clone()
                .unwrap_or_else(|| UNAFFILIATED.to_string());
            projects.entry(project).or_default().insert(uuid, task);
        }

        self.seen.extend(projects.keys().cloned());
        self.projects = projects;
        self.mtime = self.mtime.max(mtime);
    }

    /// Look up a task in a project bucket (`all_projects` searches all).
    pub fn lookup(&self, project: &str, uuid: &str) -> IcsTaskResult<&Task> {
        if project == ALL_PROJECTS {
            return self
                .find(uuid)
                .ok_or_else(|| IcsTaskError::NotFound(format!("task {uuid}")));
        }

        self.projects
            .get(project)
            .ok_or_else(|| IcsTaskError::NotFound(format!("project {project}")))?
            .get(uuid)
            .ok_or_else(|| IcsTaskError::NotFound(format!("task {uuid} in project {project}")))
    }

    /// Find a task in any project.
    pub fn find(&self, uuid: &str) -> Option<&Task> {
        self.projects.values().find_map(|tasks| tasks.get(uuid))
    }

    /// Observed project names, configured known projects and the two
    /// virtual projects, sorted.
    pub fn project_names(&self, known_projects: &[String]) -> Vec<String> {
        let mut names: BTreeSet<String> = self
            .projects
            .keys()
            .filter(|p| p.as_str() != UNAFFILIATED)
            .cloned()
            .collect();
        names.extend(known_projects.iter().cloned());
        names.insert(ALL_PROJECTS.to_string());
        names.insert(UNAFFILIATED.to_string());
        names.into_iter().collect()
    }

    /// Tasks of a project, or of every project for `None`/`all_projects`.
    ///
    /// Projects without tasks are empty if configured in `known_projects`
    /// or held by an earlier snapshot, and an error otherwise.
    pub fn tasks<'a>(
        &'a self,
        project: Option<&str>,
        known_projects: &[String],
    ) -> IcsTaskResult<Vec<&'a Task>> {
        match project {
            None | Some(ALL_PROJECTS) => Ok(self
                .projects
                .values()
                .flat_map(|tasks| tasks.values())
                .collect()),
            Some(project) => match self.projects.get(project) {
                Some(tasks) => Ok(tasks.values().collect()),
                None if project == UNAFFILIATED
                    || self.seen.contains(project)
                    || known_projects.iter().any(|p| p == project) =>
                {
                    Ok(Vec::new())
                }
                None => Err(IcsTaskError::NotFound(format!("project {project}"))),
            },
        }
    }

    /// Uuids of a project, or of the whole collection.
    pub fn all_uids(
        &self,
        project: Option<&str>,
        known_projects: &[String],
    ) -> IcsTaskResult<Vec<String>> {
        Ok(self
            .tasks(project, known_projects)?
            .into_iter()
            .filter_map(|task| task.uuid.clone())
            .collect())
    }
}

/// Newest mtime among the backing files. Missing files count as the epoch.
pub fn backing_mtime(data_location: &Path) -> IcsTaskResult<SystemTime> {
    if !data_location.is_dir() {
        return Err(IcsTaskError::DataUnavailable(format!(
            "{} is not a directory",
            data_location.display()
        )));
    }

    let mut latest = SystemTime::UNIX_EPOCH;
    for name in BACKING_FILES {
        let path = data_location.join(name);
        match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(mtime) => latest = latest.max(mtime),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(IcsTaskError::DataUnavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )));
            }
        }
    }
    Ok(latest)
}
