//! A Taskwarrior database seen as a collection of VTODOs.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use chrono_tz::Tz;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, MutexGuard};

use crate::cache::{ALL_PROJECTS, TaskCache, UNAFFILIATED, backing_mtime};
use crate::config::IcsTaskConfig;
use crate::convert::{ImportContext, to_task, to_todo, uid_for, uuid_from_uid};
use crate::error::{IcsTaskError, IcsTaskResult};
use crate::gateway::{TaskGateway, TaskwarriorCli};
use crate::ics::generate_ics;
use crate::task::format_task_date;
use crate::todo::Todo;

/// Collection metadata: a calendar that only holds VTODOs.
pub const COLLECTION_META: [(&str, &str); 2] = [
    ("tag", "VCALENDAR"),
    ("C:supported-calendar-component-set", "VTODO"),
];

/// Every operation refreshes the cache first. The cache lock is held for
/// the whole operation, which also serializes all gateway calls.
pub struct IcsTask<G: TaskGateway> {
    gateway: G,
    data_location: PathBuf,
    tz: Tz,
    host: String,
    known_projects: Vec<String>,
    auto_start: bool,
    cache: Mutex<TaskCache>,
}

impl IcsTask<TaskwarriorCli> {
    /// Drive the `task` binary named in `config`.
    pub fn from_config(config: &IcsTaskConfig) -> IcsTaskResult<Self> {
        let gateway = TaskwarriorCli::new(&config.task_binary, &config.data_path())?;
        Self::new(gateway, config)
    }
}

impl<G: TaskGateway> IcsTask<G> {
    pub fn new(gateway: G, config: &IcsTaskConfig) -> IcsTaskResult<Self> {
        Ok(IcsTask {
            gateway,
            data_location: config.data_path(),
            tz: config.timezone()?,
            host: config.host(),
            known_projects: config.known_projects.clone(),
            auto_start: config.auto_start,
            cache: Mutex::new(TaskCache::new()),
        })
    }

    pub fn data_location(&self) -> &Path {
        &self.data_location
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Lock the cache, re-exporting first if the backing files changed.
    async fn fresh_cache(&self) -> IcsTaskResult<MutexGuard<'_, TaskCache>> {
        let mut cache = self.cache.lock().await;

        if let Some(mtime) = cache.stale_since(&self.data_location)? {
            log::debug!("Task data changed, reloading {}", self.data_location.display());
            let tasks = self.gateway.export().await?;
            cache.rebuild(tasks, mtime);
        }

        Ok(cache)
    }

    /// Re-export unconditionally, after this process changed the data.
    async fn rebuild(&self, cache: &mut TaskCache) -> IcsTaskResult<()> {
        let mtime = backing_mtime(&self.data_location)?;
        let tasks = self.gateway.export().await?;
        cache.rebuild(tasks, mtime);
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// VTODOs for one task (by uid), one project, or everything.
    ///
    /// In project and collection views, generated instances of recurring
    /// tasks are left out and tasks with an unsupported recurrence are
    /// skipped with a warning.
    pub async fn to_vobject(&self, project: Option<&str>, uid: Option<&str>) -> IcsTaskResult<Vec<Todo>> {
        let cache = self.fresh_cache().await?;

        if let Some(uid) = uid {
            let uuid = uuid_from_uid(uid);
            let task = cache
                .find(uuid)
                .ok_or_else(|| IcsTaskError::NotFound(format!("task {uuid}")))?;
            return Ok(vec![to_todo(task, self.tz, &self.host)?]);
        }

        let tasks = cache.tasks(project.map(basename), &self.known_projects)?;
        let mut todos = Vec::with_capacity(tasks.len());

        for task in tasks.into_iter().filter(|t| !t.is_recurrence_instance()) {
            match to_todo(task, self.tz, &self.host) {
                Ok(todo) => todos.push(todo),
                Err(IcsTaskError::UnsupportedRecurrence(recur)) => {
                    log::warn!(
                        "Skipping task {}: unsupported recurrence '{}'",
                        task.uuid.as_deref().unwrap_or_default(),
                        recur
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(todos)
    }

    /// `to_vobject` rendered as one iCalendar document.
    pub async fn to_ics(&self, project: Option<&str>, uid: Option<&str>) -> IcsTaskResult<String> {
        let todos = self.to_vobject(project, uid).await?;
        Ok(generate_ics(&todos))
    }

    /// Virtual file per project: `data_location/<project>`.
    pub async fn get_filenames(&self) -> IcsTaskResult<Vec<PathBuf>> {
        let cache = self.fresh_cache().await?;

        Ok(cache
            .project_names(&self.known_projects)
            .iter()
            .map(|p| self.data_location.join(p.split_whitespace().next().unwrap_or(p.as_str())))
            .collect())
    }

    /// Calendar uids in a project, or in the whole collection.
    pub async fn get_uids(&self, project: Option<&str>) -> IcsTaskResult<Vec<String>> {
        let cache = self.fresh_cache().await?;

        Ok(cache
            .all_uids(project.map(basename), &self.known_projects)?
            .iter()
            .map(|uuid| uid_for(uuid, &self.host))
            .collect())
    }

    pub fn get_meta(&self) -> Vec<(&'static str, &'static str)> {
        COLLECTION_META.to_vec()
    }

    /// Newest backing-file change reflected in the cache.
    pub async fn last_modified(&self) -> IcsTaskResult<SystemTime> {
        Ok(self.fresh_cache().await?.mtime())
    }

    /// Quoted strong validator derived from the task's modification time.
    pub async fn get_etag(&self, uid: &str, project: Option<&str>) -> IcsTaskResult<String> {
        let cache = self.fresh_cache().await?;
        let uuid = uuid_from_uid(uid);
        let task = cache.lookup(project.map(basename).unwrap_or(ALL_PROJECTS), uuid)?;

        let stamp = task
            .modified
            .or(task.entry)
            .map(|dt| format_task_date(&dt))
            .unwrap_or_default();

        Ok(format!("\"{}\"", hex::encode(Sha256::digest(stamp.as_bytes()))))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Import a VTODO as a new task (no `uuid`) or over an existing one.
    /// Returns the calendar uid of the imported task.
    pub async fn to_task(&self, todo: &Todo, project: Option<&str>, uuid: Option<&str>) -> IcsTaskResult<String> {
        let mut cache = self.fresh_cache().await?;

        let task = {
            let ctx = ImportContext {
                project,
                uuid,
                previous: uuid.and_then(|u| cache.find(u)),
                tz: self.tz,
                auto_start: self.auto_start,
                now: Utc::now(),
            };
            to_task(todo, &ctx)
        };

        let imported = self.gateway.import(&task).await?;
        log::debug!("Imported task {}", imported);
        self.rebuild(&mut cache).await?;

        let task = cache
            .find(&imported)
            .ok_or_else(|| IcsTaskError::NotFound(format!("imported task {imported}")))?;
        let uuid = task.uuid.as_deref().unwrap_or(&imported);
        Ok(uid_for(uuid, &self.host))
    }

    /// Add a VTODO as a new task. `project` may be a virtual file path.
    pub async fn append_vobject(&self, todo: &Todo, project: Option<&str>) -> IcsTaskResult<String> {
        self.to_task(todo, project.map(basename), None).await
    }

    /// Overwrite the task behind `uid` with a VTODO.
    pub async fn replace_vobject(&self, uid: &str, todo: &Todo, project: Option<&str>) -> IcsTaskResult<String> {
        self.to_task(todo, project.map(basename), Some(uuid_from_uid(uid)))
            .await
    }

    /// Delete the task behind `uid`.
    pub async fn remove(&self, uid: &str) -> IcsTaskResult<()> {
        let mut cache = self.fresh_cache().await?;
        let uuid = uuid_from_uid(uid);

        if cache.find(uuid).is_none() {
            return Err(IcsTaskError::NotFound(format!("task {uuid}")));
        }

        self.gateway.delete(uuid).await?;
        log::debug!("Deleted task {}", uuid);
        self.rebuild(&mut cache).await
    }

    /// Move the task behind `uid` to another project. The virtual projects
    /// clear the task's project.
    pub async fn move_task(&self, uid: &str, to_project: &str) -> IcsTaskResult<()> {
        let mut cache = self.fresh_cache().await?;
        let uuid = uuid_from_uid(uid);

        if cache.find(uuid).is_none() {
            return Err(IcsTaskError::NotFound(format!("task {uuid}")));
        }

        let target = basename(to_project);
        let target = (target != ALL_PROJECTS && target != UNAFFILIATED).then_some(target);
        self.gateway.modify_project(uuid, target).await?;
        log::debug!("Moved task {} to {}", uuid, target.unwrap_or(UNAFFILIATED));
        self.rebuild(&mut cache).await
    }
}

/// Project name of a virtual file path.
fn basename(project: &str) -> &str {
    Path::new(project)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Annotation, Task, TaskStatus};
    use crate::todo::TodoStatus;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::{Arc, Mutex as StdMutex};

    const NEW_UUID: &str = "99999999-8888-4777-8666-555555555555";
    const REPORT: &str = "4a5b6c7d-1e2f-4a3b-8c9d-0e1f2a3b4c5d";
    const CHORE: &str = "0f1e2d3c-4b5a-4968-8776-a5b4c3d2e1f0";
    const TEMPLATE: &str = "11111111-2222-4333-8444-555555555555";
    const INSTANCE: &str = "66666666-7777-4888-9999-aaaaaaaaaaaa";
    const ODD: &str = "bbbbbbbb-cccc-4ddd-8eee-ffffffffffff";

    #[derive(Default)]
    struct FakeState {
        tasks: Vec<Task>,
        exports: usize,
        imports: Vec<Task>,
        deleted: Vec<String>,
        moved: Vec<(String, Option<String>)>,
    }

    /// In-memory Taskwarrior. Mutations touch pending.data like the real
    /// tool does.
    #[derive(Clone)]
    struct FakeGateway {
        data_location: PathBuf,
        state: Arc<StdMutex<FakeState>>,
    }

    impl FakeGateway {
        fn touch(&self) {
            std::fs::write(self.data_location.join("pending.data"), "changed").unwrap();
        }
    }

    #[async_trait]
    impl TaskGateway for FakeGateway {
        async fn export(&self) -> IcsTaskResult<Vec<Task>> {
            let mut state = self.state.lock().unwrap();
            state.exports += 1;
            Ok(state.tasks.clone())
        }

        async fn import(&self, task: &Task) -> IcsTaskResult<String> {
            let uuid = {
                let mut state = self.state.lock().unwrap();
                state.imports.push(task.clone());

                let uuid = task.uuid.clone().unwrap_or_else(|| NEW_UUID.to_string());
                let mut stored = task.clone();
                stored.uuid = Some(uuid.clone());
                state.tasks.retain(|t| t.uuid.as_deref() != Some(uuid.as_str()));
                state.tasks.push(stored);
                uuid
            };
            self.touch();
            Ok(uuid)
        }

        async fn delete(&self, uuid: &str) -> IcsTaskResult<()> {
            {
                let mut state = self.state.lock().unwrap();
                state.deleted.push(uuid.to_string());
                for task in state.tasks.iter_mut().filter(|t| t.uuid.as_deref() == Some(uuid)) {
                    task.status = TaskStatus::Deleted;
                }
            }
            self.touch();
            Ok(())
        }

        async fn modify_project(&self, uuid: &str, project: Option<&str>) -> IcsTaskResult<()> {
            {
                let mut state = self.state.lock().unwrap();
                state.moved.push((uuid.to_string(), project.map(str::to_string)));
                for task in state.tasks.iter_mut().filter(|t| t.uuid.as_deref() == Some(uuid)) {
                    task.project = project.map(str::to_string);
                }
            }
            self.touch();
            Ok(())
        }
    }

    fn stamp() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 9, 30, 0).unwrap()
    }

    fn sample_tasks() -> Vec<Task> {
        vec![
            Task {
                uuid: Some(REPORT.to_string()),
                project: Some("work".to_string()),
                description: "Write report".to_string(),
                entry: Some(stamp()),
                modified: Some(stamp() + Duration::hours(1)),
                annotations: Some(vec![
                    Annotation {
                        description: "x".to_string(),
                        entry: stamp() + Duration::minutes(1),
                    },
                    Annotation {
                        description: "x".to_string(),
                        entry: stamp() + Duration::minutes(2),
                    },
                ]),
                ..Default::default()
            },
            Task {
                uuid: Some(CHORE.to_string()),
                description: "Take out trash".to_string(),
                entry: Some(stamp()),
                ..Default::default()
            },
            Task {
                uuid: Some(TEMPLATE.to_string()),
                project: Some("home".to_string()),
                description: "Water plants".to_string(),
                status: TaskStatus::Recurring,
                recur: Some("weekly".to_string()),
                entry: Some(stamp()),
                ..Default::default()
            },
            Task {
                uuid: Some(INSTANCE.to_string()),
                project: Some("home".to_string()),
                description: "Water plants".to_string(),
                recur: Some("weekly".to_string()),
                parent: Some(TEMPLATE.to_string()),
                entry: Some(stamp()),
                ..Default::default()
            },
            Task {
                uuid: Some(ODD.to_string()),
                project: Some("home".to_string()),
                description: "Odd schedule".to_string(),
                recur: Some("biweekly-ish".to_string()),
                entry: Some(stamp()),
                ..Default::default()
            },
        ]
    }

    fn setup() -> (tempfile::TempDir, FakeGateway, IcsTask<FakeGateway>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pending.data"), "initial").unwrap();

        let gateway = FakeGateway {
            data_location: dir.path().to_path_buf(),
            state: Arc::new(StdMutex::new(FakeState {
                tasks: sample_tasks(),
                ..Default::default()
            })),
        };
        let config = IcsTaskConfig {
            data_location: dir.path().to_path_buf(),
            timezone: Some("UTC".to_string()),
            host: Some("host".to_string()),
            known_projects: vec!["errands".to_string()],
            ..Default::default()
        };
        let ics = IcsTask::new(gateway.clone(), &config).unwrap();
        (dir, gateway, ics)
    }

    fn exports(gateway: &FakeGateway) -> usize {
        gateway.state.lock().unwrap().exports
    }

    #[tokio::test]
    async fn test_consecutive_reads_export_once() {
        let (_dir, gateway, ics) = setup();

        ics.get_uids(None).await.unwrap();
        ics.to_vobject(None, None).await.unwrap();
        ics.last_modified().await.unwrap();

        assert_eq!(exports(&gateway), 1);
    }

    #[tokio::test]
    async fn test_writes_force_a_rebuild() {
        let (_dir, gateway, ics) = setup();
        ics.get_uids(None).await.unwrap();

        let todo = Todo {
            summary: Some("Call mom".to_string()),
            dtstamp: Some(stamp()),
            ..Default::default()
        };
        let uid = ics.append_vobject(&todo, Some("/data/errands")).await.unwrap();
        assert_eq!(uid, format!("{NEW_UUID}@host"));
        assert_eq!(exports(&gateway), 2);

        // The rebuild already saw the write; reading again costs nothing
        let uids = ics.get_uids(Some("errands")).await.unwrap();
        assert_eq!(uids, vec![format!("{NEW_UUID}@host")]);
        assert_eq!(exports(&gateway), 2);

        let imported = gateway.state.lock().unwrap().imports[0].clone();
        assert_eq!(imported.project.as_deref(), Some("errands"));
        assert_eq!(imported.uuid, None);
    }

    #[tokio::test]
    async fn test_collection_view_skips_instances_and_bad_recurrences() {
        let (_dir, _gateway, ics) = setup();

        let todos = ics.to_vobject(None, None).await.unwrap();
        let mut uids: Vec<_> = todos.iter().map(|t| t.uid.as_str()).collect();
        uids.sort();

        assert_eq!(
            uids,
            vec![
                format!("{CHORE}@host"),
                format!("{TEMPLATE}@host"),
                format!("{REPORT}@host"),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_task_view() {
        let (_dir, _gateway, ics) = setup();

        let todos = ics.to_vobject(None, Some(&format!("{REPORT}@host"))).await.unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].summary.as_deref(), Some("Write report"));
        assert_eq!(todos[0].description.as_deref(), Some("x\nx"));

        let err = ics.to_vobject(None, Some(&format!("{ODD}@host"))).await.unwrap_err();
        assert!(matches!(err, IcsTaskError::UnsupportedRecurrence(_)));

        let err = ics.to_vobject(None, Some("nope@host")).await.unwrap_err();
        assert!(matches!(err, IcsTaskError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_project_views() {
        let (_dir, _gateway, ics) = setup();

        let work = ics.to_vobject(Some("work"), None).await.unwrap();
        assert_eq!(work.len(), 1);

        let unaffiliated = ics.get_uids(Some(UNAFFILIATED)).await.unwrap();
        assert_eq!(unaffiliated, vec![format!("{CHORE}@host")]);

        assert!(ics.to_vobject(Some("errands"), None).await.unwrap().is_empty());
        assert!(matches!(
            ics.to_vobject(Some("garden"), None).await,
            Err(IcsTaskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_filenames() {
        let (dir, _gateway, ics) = setup();

        assert_eq!(ics.data_location(), dir.path());
        assert_eq!(ics.host(), "host");

        let names = ics.get_filenames().await.unwrap();
        let expected: Vec<PathBuf> = ["all_projects", "errands", "home", "unaffiliated", "work"]
            .iter()
            .map(|p| dir.path().join(p))
            .collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_replace_reuses_annotation_timestamps() {
        let (_dir, gateway, ics) = setup();

        let todo = Todo {
            uid: format!("{REPORT}@host"),
            summary: Some("Write report".to_string()),
            dtstamp: Some(stamp()),
            status: Some(TodoStatus::NeedsAction),
            description: Some("x\nx".to_string()),
            ..Default::default()
        };
        let uid = ics
            .replace_vobject(&format!("{REPORT}@host"), &todo, Some("work"))
            .await
            .unwrap();
        assert_eq!(uid, format!("{REPORT}@host"));

        let imported = gateway.state.lock().unwrap().imports[0].clone();
        assert_eq!(imported.uuid.as_deref(), Some(REPORT));
        let entries: Vec<_> = imported.annotations.unwrap().iter().map(|a| a.entry).collect();
        assert_eq!(
            entries,
            vec![stamp() + Duration::minutes(1), stamp() + Duration::minutes(2)]
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let (_dir, gateway, ics) = setup();

        ics.remove(&format!("{CHORE}@host")).await.unwrap();
        assert_eq!(gateway.state.lock().unwrap().deleted, vec![CHORE.to_string()]);

        assert!(matches!(
            ics.remove("nope@host").await,
            Err(IcsTaskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_move_task() {
        let (_dir, gateway, ics) = setup();

        ics.move_task(&format!("{CHORE}@host"), "/data/errands").await.unwrap();
        assert_eq!(
            ics.get_uids(Some("errands")).await.unwrap(),
            vec![format!("{CHORE}@host")]
        );

        ics.move_task(&format!("{CHORE}@host"), UNAFFILIATED).await.unwrap();
        assert_eq!(
            gateway.state.lock().unwrap().moved,
            vec![
                (CHORE.to_string(), Some("errands".to_string())),
                (CHORE.to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_etag_is_quoted_and_tracks_modified() {
        let (_dir, gateway, ics) = setup();
        let uid = format!("{REPORT}@host");

        let etag = ics.get_etag(&uid, Some("work")).await.unwrap();
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(etag, ics.get_etag(&uid, None).await.unwrap());

        {
            let mut state = gateway.state.lock().unwrap();
            let task = state
                .tasks
                .iter_mut()
                .find(|t| t.uuid.as_deref() == Some(REPORT))
                .unwrap();
            task.modified = Some(stamp() + Duration::hours(2));
        }
        gateway.touch();
        // Make sure the mtime moves even on coarse filesystems
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(gateway.data_location.join("pending.data"))
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert_ne!(etag, ics.get_etag(&uid, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_meta() {
        let (_dir, _gateway, ics) = setup();
        assert_eq!(
            ics.get_meta(),
            vec![
                ("tag", "VCALENDAR"),
                ("C:supported-calendar-component-set", "VTODO"),
            ]
        );
    }

    #[tokio::test]
    async fn test_ics_output_contains_every_todo() {
        let (_dir, _gateway, ics) = setup();

        let text = ics.to_ics(None, None).await.unwrap();
        assert_eq!(text.matches("BEGIN:VTODO").count(), 3);
        assert!(text.contains("RRULE:FREQ=WEEKLY"));
    }
}
