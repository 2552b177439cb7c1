//! Task registry: owns every download task, its retries, and its snapshot.
//!
//! # Architecture
//!
//! - [`DownloadManager`] - cloneable handle to the registry service
//! - [`EpisodeFetcher`] - one attempt of one task ([`SegmentPipeline`] in production)
//! - [`RetryPolicy`] - fixed attempt budget and delay between attempts
//! - [`TaskStore`] - JSON snapshot of unfinished tasks
//!
//! # State machine
//!
//! ```text
//! pending -> downloading -> completed
//!                 |
//!                 +-> waiting-retry(k/max) -> downloading   (while k < max)
//!                 +-> failed                                 (k == max)
//! ```
//!
//! Every transition happens under the registry lock, which is never held
//! across an `.await`. Each task runs on its own spawned worker with a child
//! of the registry's cancellation token.

mod fetcher;
mod item;
mod retry;
mod store;

pub use fetcher::{
    EpisodeFetcher, FetchOutcome, FetchRequest, ProgressSink, ProgressUpdate, SegmentPipeline,
    TaskError,
};
pub use item::{TaskKey, TaskStatus, TaskView, artifact_path, sanitize_title};
pub use retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryDecision, RetryPolicy};
pub use store::{DEFAULT_STATE_FILE, PersistenceError, TaskRecord, TaskStore};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{Asset, CatalogClient, GroupEntry};
use item::{Task, artifact_exists};

/// Default interval between automatic snapshot writes.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Default time workers get to stop after shutdown is requested.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Registry tuning.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Attempt budget and delay between attempts.
    pub retry: RetryPolicy,
    /// Period of the autosave timer.
    pub autosave_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
        }
    }
}

/// Result of an add request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new task was created and its worker started.
    Added,
    /// The artifact already exists; the task was recorded as completed.
    AlreadyCompleted,
    /// A task with the same key exists; nothing changed.
    Duplicate,
}

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The registry no longer accepts work.
    #[error("download manager is shutting down")]
    ShuttingDown,

    /// The output directory could not be made absolute.
    #[error("invalid output directory {path}: {source}")]
    SaveDir {
        /// The directory as given.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Cloneable handle to the task registry.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

struct Inner {
    tasks: Mutex<HashMap<TaskKey, Task>>,
    fetcher: Arc<dyn EpisodeFetcher>,
    store: TaskStore,
    persist_lock: Mutex<()>,
    config: ManagerConfig,
    cancel: CancellationToken,
    tracker: TaskTracker,
    autosave: Mutex<Option<JoinHandle<()>>>,
    changes: watch::Sender<u64>,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("tasks", &self.inner.tasks.lock().len())
            .field("store", &self.inner.store.path())
            .finish_non_exhaustive()
    }
}

impl DownloadManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(fetcher: Arc<dyn EpisodeFetcher>, store: TaskStore, config: ManagerConfig) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(HashMap::new()),
                fetcher,
                store,
                persist_lock: Mutex::new(()),
                config,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                autosave: Mutex::new(None),
                changes,
            }),
        }
    }

    /// Adds a task for episode `group_index` of `asset` and starts it.
    ///
    /// A key that is already registered is rejected. If the artifact already
    /// exists with non-zero size the task is recorded as completed and no
    /// worker is spawned.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ShuttingDown`] after [`shutdown`](Self::shutdown)
    /// and [`ManagerError::SaveDir`] if `save_dir` cannot be made absolute.
    #[instrument(skip(self, asset, group, save_dir), fields(asset = %asset.title, episode = %group.title))]
    pub fn add(
        &self,
        asset: &Asset,
        group: &GroupEntry,
        group_index: usize,
        save_dir: &Path,
    ) -> Result<AddOutcome, ManagerError> {
        if self.inner.cancel.is_cancelled() {
            return Err(ManagerError::ShuttingDown);
        }
        let save_dir = std::path::absolute(save_dir).map_err(|source| ManagerError::SaveDir {
            path: save_dir.to_path_buf(),
            source,
        })?;
        let key = TaskKey::new(&asset.title, group_index);
        let save_path = artifact_path(&save_dir, &asset.title, &group.title);

        let outcome = {
            let mut tasks = self.inner.tasks.lock();
            if tasks.contains_key(&key) {
                debug!(task = %key, "task already registered");
                return Ok(AddOutcome::Duplicate);
            }
            let completed = artifact_exists(&save_path);
            tasks.insert(
                key.clone(),
                Task {
                    key: key.clone(),
                    asset: asset.clone(),
                    group: group.clone(),
                    save_dir,
                    save_path,
                    status: if completed {
                        TaskStatus::Completed
                    } else {
                        TaskStatus::Pending
                    },
                    progress: if completed { 100.0 } else { 0.0 },
                    throughput: "-".to_string(),
                    created_at: Local::now().naive_local(),
                    last_error: None,
                    relaunched: false,
                },
            );
            if completed {
                AddOutcome::AlreadyCompleted
            } else {
                AddOutcome::Added
            }
        };

        self.inner.notify();
        self.inner.persist_quietly();
        match outcome {
            AddOutcome::Added => {
                info!(task = %key, "task added");
                self.spawn_worker(key);
            }
            AddOutcome::AlreadyCompleted => info!(task = %key, "artifact exists, task completed"),
            AddOutcome::Duplicate => {}
        }
        Ok(outcome)
    }

    /// Reloads the snapshot and relaunches every resumable task.
    ///
    /// Each entry's episode list is fetched again through `catalog` and the
    /// episode is located by its stored play page URL. The stored status and
    /// progress are kept. Returns the number of relaunched tasks; snapshot or
    /// catalog failures are logged and skip the affected entries.
    #[instrument(skip_all)]
    pub async fn restore(&self, catalog: &dyn CatalogClient) -> usize {
        let records = match self.inner.store.load() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to load task snapshot");
                return 0;
            }
        };

        let mut episode_lists: HashMap<String, Vec<GroupEntry>> = HashMap::new();
        let mut restored = 0;
        for (id, record) in records {
            if self.inner.cancel.is_cancelled() {
                break;
            }
            let asset = Asset::new(&record.video_title, &record.video_url);
            if !episode_lists.contains_key(&record.video_url) {
                match catalog.list_groups(&asset).await {
                    Ok(groups) => {
                        episode_lists.insert(record.video_url.clone(), groups);
                    }
                    Err(e) => {
                        warn!(task = %id, error = %e, "cannot restore task, episode list unavailable");
                        continue;
                    }
                }
            }
            let groups = episode_lists
                .get(&record.video_url)
                .map_or(&[][..], Vec::as_slice);
            let Some(index) = groups.iter().position(|g| g.url == record.episode_url) else {
                warn!(task = %id, episode = %record.episode_url, "cannot restore task, episode not found");
                continue;
            };

            let status = record.status.parse::<TaskStatus>().unwrap_or_else(|e| {
                warn!(task = %id, error = %e, "unknown stored status, using pending");
                TaskStatus::Pending
            });
            let status = if status == TaskStatus::Completed {
                TaskStatus::Pending
            } else {
                status
            };
            let key = TaskKey::new(&record.video_title, index);
            {
                let mut tasks = self.inner.tasks.lock();
                if tasks.contains_key(&key) {
                    continue;
                }
                tasks.insert(
                    key.clone(),
                    Task {
                        key: key.clone(),
                        asset,
                        group: groups[index].clone(),
                        save_dir: record.save_dir,
                        save_path: record.save_path,
                        status,
                        progress: record.progress.clamp(0.0, 100.0),
                        throughput: "-".to_string(),
                        created_at: record.created_at,
                        last_error: None,
                        relaunched: status.is_terminal(),
                    },
                );
            }
            info!(task = %key, status = %status, progress = record.progress, "restored task");
            self.spawn_worker(key);
            restored += 1;
        }

        if restored > 0 {
            self.inner.notify();
            self.inner.persist_quietly();
        }
        restored
    }

    /// Returns every task, oldest first.
    #[must_use]
    pub fn status(&self) -> Vec<TaskView> {
        let mut views: Vec<TaskView> = self.inner.tasks.lock().values().map(Task::view).collect();
        views.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.key.cmp(&b.key)));
        views
    }

    /// Number of tasks currently `downloading`.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .values()
            .filter(|task| task.status == TaskStatus::Downloading)
            .count()
    }

    /// True when every task is `completed` or `failed`.
    ///
    /// A restored `failed` task counts as unfinished until its relaunched
    /// worker starts an attempt.
    #[must_use]
    pub fn is_all_finished(&self) -> bool {
        self.inner
            .tasks
            .lock()
            .values()
            .all(Task::is_finished)
    }

    /// Resolves once every task is `completed` or `failed`.
    pub async fn wait_until_finished(&self) {
        let mut changes = self.inner.changes.subscribe();
        loop {
            if self.is_all_finished() {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// Receiver that changes whenever any task changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Persisted form of every non-completed task, keyed by task id.
    #[must_use]
    pub fn snapshot_records(&self) -> Vec<(String, TaskRecord)> {
        self.inner.snapshot_records()
    }

    /// Writes the snapshot now.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the snapshot cannot be written.
    pub fn persist(&self) -> Result<(), PersistenceError> {
        self.inner.persist()
    }

    /// Starts the periodic snapshot writer. Calling it again is a no-op.
    pub fn start_autosave(&self) {
        let mut slot = self.inner.autosave.lock();
        if slot.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let period = inner.config.autosave_interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    () = inner.cancel.cancelled() => break,
                    _ = ticker.tick() => inner.persist_quietly(),
                }
            }
            debug!("autosave stopped");
        }));
    }

    /// Cancels every worker, waits up to `grace` for them to stop, then writes
    /// the snapshot. Returns false if workers were still running at the end
    /// of the grace period.
    ///
    /// Interrupted tasks keep their last non-terminal status so the next run
    /// resumes them.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, grace: Duration) -> bool {
        info!("shutting down download manager");
        self.inner.cancel.cancel();
        self.inner.tracker.close();

        let drained = tokio::time::timeout(grace, self.inner.tracker.wait())
            .await
            .is_ok();
        if !drained {
            warn!(
                in_flight = self.inner.tracker.len(),
                "grace period elapsed with workers still running"
            );
        }

        let autosave = self.inner.autosave.lock().take();
        if let Some(handle) = autosave {
            handle.abort();
        }
        if let Err(e) = self.inner.persist() {
            warn!(error = %e, "failed to persist task snapshot on shutdown");
        }
        drained
    }

    fn spawn_worker(&self, key: TaskKey) {
        let inner = Arc::clone(&self.inner);
        let cancel = self.inner.cancel.child_token();
        self.inner.tracker.spawn(run_task(inner, key, cancel));
    }
}

impl Inner {
    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn snapshot_records(&self) -> Vec<(String, TaskRecord)> {
        self.tasks
            .lock()
            .values()
            .filter(|task| task.status != TaskStatus::Completed)
            .map(|task| {
                (
                    task.key.to_string(),
                    TaskRecord {
                        video_title: task.asset.title.clone(),
                        video_url: task.asset.detail_url.clone(),
                        episode_title: task.group.title.clone(),
                        episode_url: task.group.url.clone(),
                        save_dir: task.save_dir.clone(),
                        save_path: task.save_path.clone(),
                        status: task.status.label(),
                        progress: task.progress,
                        created_at: task.created_at,
                    },
                )
            })
            .collect()
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        // Snapshot under the write lock so a stale snapshot never overwrites a newer one
        let _guard = self.persist_lock.lock();
        self.store.save(self.snapshot_records())
    }

    fn persist_quietly(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist task snapshot");
        }
    }

    fn begin_attempt(&self, key: &TaskKey) -> Option<FetchRequest> {
        let request = {
            let mut tasks = self.tasks.lock();
            let task = tasks.get_mut(key)?;
            task.status = TaskStatus::Downloading;
            task.relaunched = false;
            task.throughput = "-".to_string();
            FetchRequest {
                key: key.clone(),
                play_url: task.group.url.clone(),
                save_path: task.save_path.clone(),
            }
        };
        self.notify();
        Some(request)
    }

    fn update_progress(&self, key: &TaskKey, update: ProgressUpdate) {
        {
            let mut tasks = self.tasks.lock();
            let Some(task) = tasks.get_mut(key) else {
                return;
            };
            if task.status != TaskStatus::Downloading {
                return;
            }
            task.progress = update.percent;
            task.throughput = update.throughput;
        }
        self.notify();
    }

    fn set_status(&self, key: &TaskKey, status: TaskStatus, error: Option<String>) {
        {
            let mut tasks = self.tasks.lock();
            let Some(task) = tasks.get_mut(key) else {
                return;
            };
            task.status = status;
            task.throughput = "-".to_string();
            if status == TaskStatus::Completed {
                task.progress = 100.0;
            }
            if error.is_some() {
                task.last_error = error;
            }
        }
        self.notify();
        self.persist_quietly();
    }
}

/// Worker loop of one task: attempts, fixed-delay waits, terminal state.
#[instrument(skip(inner, cancel), fields(task = %key))]
async fn run_task(inner: Arc<Inner>, key: TaskKey, cancel: CancellationToken) {
    let policy = inner.config.retry.clone();
    let mut failed: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        let Some(request) = inner.begin_attempt(&key) else {
            return;
        };
        inner.persist_quietly();
        debug!(attempt = failed + 1, "starting attempt");

        let sink: ProgressSink = {
            let inner = Arc::clone(&inner);
            let key = key.clone();
            Arc::new(move |update: ProgressUpdate| inner.update_progress(&key, update))
        };

        match inner.fetcher.fetch(request, cancel.clone(), sink).await {
            Ok(FetchOutcome::Completed { bytes }) => {
                info!(bytes, "task completed");
                inner.set_status(&key, TaskStatus::Completed, None);
                return;
            }
            Ok(FetchOutcome::Cancelled) => {
                info!("task interrupted");
                return;
            }
            Err(error) => {
                failed += 1;
                warn!(attempt = failed, error = %error, "attempt failed");
                match policy.after_failure(failed) {
                    RetryDecision::Retry { delay, attempt } => {
                        inner.set_status(&key, policy.waiting_status(failed), Some(error.to_string()));
                        debug!(next_attempt = attempt, delay_ms = delay.as_millis(), "waiting before retry");
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => return,
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                    RetryDecision::GiveUp { attempts } => {
                        warn!(attempts, "task failed, attempts exhausted");
                        inner.set_status(&key, TaskStatus::Failed, Some(error.to_string()));
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::catalog::CatalogError;

    enum Behavior {
        /// Fail this many times, then complete.
        FailTimes(u32),
        /// Report 40% and wait for cancellation.
        Block,
    }

    struct ScriptedFetcher {
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EpisodeFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            request: FetchRequest,
            cancel: CancellationToken,
            progress: ProgressSink,
        ) -> Result<FetchOutcome, TaskError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.behavior {
                Behavior::FailTimes(n) if call <= n => Err(TaskError::Incomplete {
                    missing: 1,
                    total: 4,
                }),
                Behavior::FailTimes(_) => {
                    std::fs::create_dir_all(request.save_path.parent().unwrap()).unwrap();
                    std::fs::write(&request.save_path, b"movie").unwrap();
                    Ok(FetchOutcome::Completed { bytes: 5 })
                }
                Behavior::Block => {
                    progress(ProgressUpdate {
                        percent: 40.0,
                        throughput: "1.00 KB/s".to_string(),
                    });
                    cancel.cancelled().await;
                    Ok(FetchOutcome::Cancelled)
                }
            }
        }
    }

    struct StubCatalog {
        groups: Vec<GroupEntry>,
    }

    #[async_trait]
    impl CatalogClient for StubCatalog {
        async fn search(&self, _keyword: &str) -> Result<Vec<Asset>, CatalogError> {
            Ok(Vec::new())
        }

        async fn list_groups(&self, _asset: &Asset) -> Result<Vec<GroupEntry>, CatalogError> {
            Ok(self.groups.clone())
        }
    }

    fn asset() -> Asset {
        Asset::new("Show", "https://vod.example/jpvod/1.html")
    }

    fn episode(n: usize) -> GroupEntry {
        GroupEntry::new(format!("Ep {n}"), format!("https://vod.example/jpplay/1-1-{n}.html"))
    }

    fn manager(fetcher: Arc<ScriptedFetcher>, temp: &TempDir) -> DownloadManager {
        DownloadManager::new(
            fetcher,
            TaskStore::new(temp.path().join("tasks.json")),
            ManagerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_duplicate_add_is_rejected() {
        let temp = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(Behavior::Block);
        let manager = manager(Arc::clone(&fetcher), &temp);

        let first = manager.add(&asset(), &episode(1), 0, temp.path()).unwrap();
        let second = manager.add(&asset(), &episode(1), 0, temp.path()).unwrap();

        assert_eq!(first, AddOutcome::Added);
        assert_eq!(second, AddOutcome::Duplicate);
        assert_eq!(manager.status().len(), 1);
        assert!(manager.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_existing_artifact_is_completed_without_worker() {
        let temp = TempDir::new().unwrap();
        let path = artifact_path(temp.path(), "Show", "Ep 1");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"done").unwrap();
        let fetcher = ScriptedFetcher::new(Behavior::FailTimes(0));
        let manager = manager(Arc::clone(&fetcher), &temp);

        let outcome = manager.add(&asset(), &episode(1), 0, temp.path()).unwrap();
        tokio::task::yield_now().await;

        assert_eq!(outcome, AddOutcome::AlreadyCompleted);
        assert_eq!(fetcher.calls(), 0);
        let views = manager.status();
        assert_eq!(views[0].status, TaskStatus::Completed);
        assert!((views[0].progress - 100.0).abs() < f64::EPSILON);
        assert!(manager.snapshot_records().is_empty());
        assert!(manager.is_all_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_fails_after_max_attempts() {
        let temp = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(Behavior::FailTimes(u32::MAX));
        let manager = manager(Arc::clone(&fetcher), &temp);
        let started = tokio::time::Instant::now();

        manager.add(&asset(), &episode(1), 0, temp.path()).unwrap();
        manager.wait_until_finished().await;

        assert_eq!(fetcher.calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(20));
        let view = &manager.status()[0];
        assert_eq!(view.status, TaskStatus::Failed);
        assert!(view.last_error.as_deref().unwrap().contains("segments missing"));

        // No further automatic retry
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.calls(), 3);

        // Failed tasks stay in the snapshot
        let records = manager.snapshot_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.status, "failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_retry_then_success() {
        let temp = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(Behavior::FailTimes(1));
        let manager = manager(Arc::clone(&fetcher), &temp);

        manager.add(&asset(), &episode(1), 0, temp.path()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let view = &manager.status()[0];
        assert_eq!(view.status.label(), "waiting-retry(1/3)");
        let stored = TaskStore::new(temp.path().join("tasks.json")).load().unwrap();
        assert_eq!(stored["Show_0"].status, "waiting-retry(1/3)");

        manager.wait_until_finished().await;
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(manager.status()[0].status, TaskStatus::Completed);
        assert!(manager.snapshot_records().is_empty());
        assert!(!temp.path().join("tasks.json").exists());
    }

    #[tokio::test]
    async fn test_shutdown_persists_interrupted_task() {
        let temp = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(Behavior::Block);
        let manager = manager(Arc::clone(&fetcher), &temp);
        manager.add(&asset(), &episode(1), 0, temp.path()).unwrap();

        let mut changes = manager.subscribe();
        while manager.status()[0].progress < 40.0 {
            changes.changed().await.unwrap();
        }
        assert_eq!(manager.active_count(), 1);

        assert!(manager.shutdown(Duration::from_secs(1)).await);
        let stored = TaskStore::new(temp.path().join("tasks.json")).load().unwrap();
        let record = &stored["Show_0"];
        assert_eq!(record.status, "downloading");
        assert!((record.progress - 40.0).abs() < f64::EPSILON);

        let err = manager.add(&asset(), &episode(2), 1, temp.path()).unwrap_err();
        assert!(matches!(err, ManagerError::ShuttingDown));
    }

    #[tokio::test]
    async fn test_restore_preserves_status_and_skips_unmatched() {
        let temp = TempDir::new().unwrap();
        let store = TaskStore::new(temp.path().join("tasks.json"));
        let record = |ep: usize, status: &str| TaskRecord {
            video_title: "Show".to_string(),
            video_url: "https://vod.example/jpvod/1.html".to_string(),
            episode_title: format!("Ep {ep}"),
            episode_url: episode(ep).url,
            save_dir: temp.path().to_path_buf(),
            save_path: artifact_path(temp.path(), "Show", &format!("Ep {ep}")),
            status: status.to_string(),
            progress: 55.0,
            created_at: Local::now().naive_local(),
        };
        let mut unknown = record(9, "pending");
        unknown.episode_url = "https://vod.example/jpplay/gone.html".to_string();
        store
            .save([
                ("Show_1".to_string(), record(2, "waiting-retry(1/3)")),
                ("Show_8".to_string(), unknown),
            ])
            .unwrap();

        let fetcher = ScriptedFetcher::new(Behavior::Block);
        let manager = manager(Arc::clone(&fetcher), &temp);
        let catalog = StubCatalog {
            groups: vec![episode(1), episode(2)],
        };

        let restored = manager.restore(&catalog).await;

        assert_eq!(restored, 1);
        let views = manager.status();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].key, TaskKey::new("Show", 1));
        assert_eq!(views[0].status, TaskStatus::WaitingRetry { failed: 1, max: 3 });
        assert!((views[0].progress - 55.0).abs() < f64::EPSILON);
        assert!(manager.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_restored_failed_task_gets_a_new_attempt() {
        let temp = TempDir::new().unwrap();
        let store = TaskStore::new(temp.path().join("tasks.json"));
        store
            .save([(
                "Show_0".to_string(),
                TaskRecord {
                    video_title: "Show".to_string(),
                    video_url: "https://vod.example/jpvod/1.html".to_string(),
                    episode_title: "Ep 1".to_string(),
                    episode_url: episode(1).url,
                    save_dir: temp.path().to_path_buf(),
                    save_path: artifact_path(temp.path(), "Show", "Ep 1"),
                    status: "failed".to_string(),
                    progress: 0.0,
                    created_at: Local::now().naive_local(),
                },
            )])
            .unwrap();

        let fetcher = ScriptedFetcher::new(Behavior::FailTimes(0));
        let manager = manager(Arc::clone(&fetcher), &temp);
        let catalog = StubCatalog {
            groups: vec![episode(1)],
        };

        assert_eq!(manager.restore(&catalog).await, 1);
        assert_eq!(manager.status()[0].status, TaskStatus::Failed);
        assert!(!manager.is_all_finished());

        manager.wait_until_finished().await;
        assert!(manager.shutdown(Duration::from_secs(1)).await);

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(manager.status()[0].status, TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_writes_snapshot() {
        let temp = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new(Behavior::Block);
        let manager = manager(Arc::clone(&fetcher), &temp);
        manager.add(&asset(), &episode(1), 0, temp.path()).unwrap();
        manager.start_autosave();
        let mut changes = manager.subscribe();
        while manager.status()[0].progress < 40.0 {
            changes.changed().await.unwrap();
        }

        std::fs::remove_file(temp.path().join("tasks.json")).unwrap();
        tokio::time::sleep(DEFAULT_AUTOSAVE_INTERVAL + Duration::from_millis(100)).await;
        assert!(temp.path().join("tasks.json").exists());

        assert!(manager.shutdown(Duration::from_secs(1)).await);
    }
}
