//! # Batch Runner
//!
//! Orchestratore di un batch: per ogni livello di directory esegue
//! `listing → partizionamento → catene per partizione → drenaggio`.
//!
//! ## Catene
//! Ogni partizione è una coda consumata da un singolo task tokio: il file
//! successivo parte solo dopo che il precedente (inclusi i sotto-passi di
//! post-processing e le eventuali sotto-directory) è terminato. Le K catene
//! girano in parallelo e il livello termina solo quando tutte sono state
//! joinate.
//!
//! ## Errori
//! - listing, creazione directory target, check locale: fatali per il batch
//! - errori per file: registrati nel report, la catena prosegue
//!   (oppure abort immediato con `fail_fast`)

use crate::batch::{ActionExecutor, FileTask, TaskOutcome};
use crate::config::{CheckFailurePolicy, Config};
use crate::error::{BatchError, Result};
use crate::existence::{Existence, ExistenceOracle};
use crate::file_manager::{CatalogEntry, FileManager};
use crate::progress::{BatchReport, ProgressManager};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::partition;

/// Scheduling and skip policy of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Number of partitions per directory level
    pub concurrency: usize,
    pub overwrite: bool,
    pub fail_fast: bool,
    pub check_failure: CheckFailurePolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            overwrite: false,
            fail_fast: false,
            check_failure: CheckFailurePolicy::Upload,
        }
    }
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.threads.max(1),
            overwrite: config.overwrite,
            fail_fast: config.fail_fast,
            check_failure: config.check_failure,
        }
    }
}

/// State shared by every chain of one batch
struct RunContext {
    executor: Arc<dyn ActionExecutor>,
    oracle: Arc<dyn ExistenceOracle>,
    options: BatchOptions,
    report: Mutex<BatchReport>,
    progress: ProgressManager,
}

/// Walks one source directory and applies an action to every file
pub struct BatchRunner {
    source_dir: PathBuf,
    executor: Arc<dyn ActionExecutor>,
    oracle: Arc<dyn ExistenceOracle>,
    options: BatchOptions,
    progress: ProgressManager,
}

impl BatchRunner {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        executor: Arc<dyn ActionExecutor>,
        oracle: Arc<dyn ExistenceOracle>,
        options: BatchOptions,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            executor,
            oracle,
            options,
            progress: ProgressManager::hidden(),
        }
    }

    /// Draw a progress bar while the batch runs
    pub fn with_progress(mut self, progress: ProgressManager) -> Self {
        self.progress = progress;
        self
    }

    /// Run the whole batch
    ///
    /// `on_complete` is called exactly once, after every partition and every
    /// nested directory batch has finished. It is not called when the batch
    /// aborts with an error.
    pub async fn run<F>(&self, on_complete: Option<F>) -> Result<BatchReport>
    where
        F: FnOnce(&BatchReport),
    {
        let ctx = Arc::new(RunContext {
            executor: self.executor.clone(),
            oracle: self.oracle.clone(),
            options: self.options,
            report: Mutex::new(BatchReport::new()),
            progress: self.progress.clone(),
        });

        info!(
            "Starting {} batch in: {} ({} threads)",
            ctx.executor.name(),
            self.source_dir.display(),
            ctx.options.concurrency
        );

        process_dir(ctx.clone(), self.source_dir.clone()).await?;

        let report = ctx.report.lock().await.clone();
        ctx.progress.finish(&report.format_summary());

        if let Some(on_complete) = on_complete {
            on_complete(&report);
        }

        Ok(report)
    }
}

/// One directory level: list, partition, run the chains and join them all
fn process_dir(ctx: Arc<RunContext>, dir: PathBuf) -> BoxFuture<'static, Result<()>> {
    async move {
        let entries = FileManager::list_directory(&dir)?;
        ctx.executor.prepare().await?;

        let files = entries.iter().filter(|entry| !entry.is_dir()).count();
        ctx.progress.add_pending(files as u64);
        info!(
            "Processing directory {} ({} entries, {} threads)",
            dir.display(),
            entries.len(),
            ctx.options.concurrency
        );

        let mut chains = JoinSet::new();
        for (index, queue) in chain_queues(entries, ctx.options.concurrency) {
            chains.spawn(run_chain(ctx.clone(), index, queue));
        }

        while let Some(joined) = chains.join_next().await {
            let result = joined.map_err(|e| BatchError::Worker(e.to_string())).and_then(|r| r);
            if let Err(e) = result {
                chains.abort_all();
                return Err(e);
            }
        }

        debug!("Finished directory {}", dir.display());
        Ok(())
    }
    .boxed()
}

/// Non-empty partitions as chain queues, tagged with their partition index
fn chain_queues(entries: Vec<CatalogEntry>, concurrency: usize) -> Vec<(usize, VecDeque<CatalogEntry>)> {
    partition(entries, concurrency)
        .into_iter()
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(index, part)| (index, part.into()))
        .collect()
}

/// Consume one partition strictly in order
async fn run_chain(ctx: Arc<RunContext>, index: usize, mut queue: VecDeque<CatalogEntry>) -> Result<()> {
    debug!("Chain {} started with {} entries", index, queue.len());

    while let Some(entry) = queue.pop_front() {
        if entry.is_dir() {
            if ctx.executor.recurses() {
                process_dir(ctx.clone(), entry.path.clone()).await?;
            } else {
                debug!("Skipping directory {}", entry.path.display());
            }
            continue;
        }

        if !ctx.executor.accepts(&entry.name) {
            debug!("Ignoring {}", entry.name);
            ctx.progress.update(&entry.name);
            continue;
        }

        let task = ctx.executor.plan(&entry);
        let outcome = process_task(&ctx, &task).await?;
        ctx.report.lock().await.record(&task.name, &outcome);
        ctx.progress.update(&task.name);
    }

    debug!("Chain {} drained", index);
    Ok(())
}

/// Skip check plus execution; `Err` only for errors that abort the batch
async fn process_task(ctx: &RunContext, task: &FileTask) -> Result<TaskOutcome> {
    if !ctx.options.overwrite {
        match ctx.oracle.check(task).await? {
            Existence::Exists(_) => {
                info!("Skipping {}", task.name);
                return Ok(TaskOutcome::Skipped);
            }
            Existence::NotFound => {}
            Existence::CheckFailed(reason) => match ctx.options.check_failure {
                CheckFailurePolicy::Upload => {
                    warn!("Existence check for {} failed ({}), processing anyway", task.name, reason);
                }
                CheckFailurePolicy::Skip => {
                    warn!("Existence check for {} failed ({}), skipping", task.name, reason);
                    return Ok(TaskOutcome::Skipped);
                }
                CheckFailurePolicy::Abort => {
                    return Err(BatchError::Remote(format!(
                        "Existence check for {} failed: {}",
                        task.name, reason
                    )));
                }
            },
        }
    }

    match ctx.executor.execute(task).await {
        Ok(()) => Ok(TaskOutcome::Succeeded),
        Err(e) if e.is_fatal() || ctx.options.fail_fast => Err(e),
        Err(e) => {
            error!("Failed to {} {}: {}", ctx.executor.name(), task.name, e);
            Ok(TaskOutcome::Failed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::existence::LocalExistence;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Copies files and records every execution
    struct CopyAction {
        target: PathBuf,
        recurse: bool,
        executed: StdMutex<Vec<String>>,
        fail_on: Option<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl CopyAction {
        fn new(target: PathBuf, recurse: bool) -> Self {
            Self {
                target,
                recurse,
                executed: StdMutex::new(Vec::new()),
                fail_on: None,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn executed(&self) -> Vec<String> {
            let mut names = self.executed.lock().unwrap().clone();
            names.sort();
            names
        }
    }

    #[async_trait]
    impl ActionExecutor for CopyAction {
        fn name(&self) -> &'static str {
            "copy"
        }

        fn recurses(&self) -> bool {
            self.recurse
        }

        fn accepts(&self, name: &str) -> bool {
            FileManager::has_extension(name, ".jpg")
        }

        fn plan(&self, entry: &CatalogEntry) -> FileTask {
            FileTask::new(&entry.name, &entry.path, self.target.join(&entry.name), "")
        }

        async fn execute(&self, task: &FileTask) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.executed.lock().unwrap().push(task.name.clone());
            if self.fail_on.as_deref() == Some(task.name.as_str()) {
                return Err(BatchError::ExternalTool {
                    command: "copy".into(),
                    message: "exit code 1".into(),
                });
            }
            tokio::fs::copy(&task.source_path, &task.target_path).await?;
            Ok(())
        }
    }

    fn fixture(files: &[&str]) -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        std::fs::create_dir(&source).unwrap();
        std::fs::create_dir(&target).unwrap();
        for file in files {
            let path = source.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, file.as_bytes()).unwrap();
        }
        (temp_dir, source, target)
    }

    fn options(concurrency: usize, overwrite: bool) -> BatchOptions {
        BatchOptions {
            concurrency,
            overwrite,
            ..Default::default()
        }
    }

    fn runner(source: &PathBuf, action: &Arc<CopyAction>, options: BatchOptions) -> BatchRunner {
        BatchRunner::new(source.clone(), action.clone(), Arc::new(LocalExistence), options)
    }

    #[tokio::test]
    async fn test_every_file_processed_exactly_once() {
        let (_tmp, source, target) = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        let action = Arc::new(CopyAction::new(target.clone(), false));

        let report = runner(&source, &action, options(2, false))
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();

        assert_eq!(action.executed(), vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(report.succeeded, 3);
        assert!(action.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert!(target.join("c.jpg").exists());
    }

    #[test]
    fn test_empty_partitions_get_no_chain() {
        let entries: Vec<CatalogEntry> = ["a.jpg", "b.jpg"]
            .iter()
            .map(|name| CatalogEntry {
                name: name.to_string(),
                path: PathBuf::from(name),
                kind: crate::file_manager::EntryKind::File,
            })
            .collect();

        let queues = chain_queues(entries, 64);
        let indices: Vec<usize> = queues.iter().map(|(index, _)| *index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert!(queues.iter().all(|(_, queue)| queue.len() == 1));

        assert!(chain_queues(Vec::new(), 8).is_empty());
    }

    #[tokio::test]
    async fn test_huge_thread_count_processes_everything() {
        let (_tmp, source, target) = fixture(&["a.jpg", "b.jpg", "c.jpg"]);
        let action = Arc::new(CopyAction::new(target, false));

        let report = runner(&source, &action, options(10_000, false))
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(action.executed(), vec!["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[tokio::test]
    async fn test_chains_bound_concurrency() {
        let files: Vec<String> = (0..9).map(|i| format!("{}.jpg", i)).collect();
        let names: Vec<&str> = files.iter().map(String::as_str).collect();
        let (_tmp, source, target) = fixture(&names);
        let action = Arc::new(CopyAction::new(target, false));

        runner(&source, &action, options(3, true))
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();

        assert_eq!(action.executed().len(), 9);
        assert!(action.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_completion_callback_fires_once() {
        let (_tmp, source, target) = fixture(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "sub/e.jpg"]);
        let action = Arc::new(CopyAction::new(target, true));
        let calls = AtomicUsize::new(0);

        let report = runner(&source, &action, options(4, true))
            .run(Some(|report: &BatchReport| {
                assert_eq!(report.succeeded, 5);
                calls.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.total(), 5);
    }

    #[tokio::test]
    async fn test_skip_existing_and_overwrite() {
        let (_tmp, source, target) = fixture(&["a.jpg", "b.jpg"]);
        std::fs::write(target.join("a.jpg"), b"old").unwrap();

        let action = Arc::new(CopyAction::new(target.clone(), false));
        let report = runner(&source, &action, options(1, false))
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();
        assert_eq!(action.executed(), vec!["b.jpg"]);
        assert_eq!((report.succeeded, report.skipped), (1, 1));
        assert_eq!(std::fs::read(target.join("a.jpg")).unwrap(), b"old");

        // Second run: everything exists now, nothing is written again
        let again = Arc::new(CopyAction::new(target.clone(), false));
        let report = runner(&source, &again, options(2, false))
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();
        assert!(again.executed().is_empty());
        assert_eq!(report.skipped, 2);

        let forced = Arc::new(CopyAction::new(target.clone(), false));
        let report = runner(&source, &forced, options(2, true))
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();
        assert_eq!(forced.executed(), vec!["a.jpg", "b.jpg"]);
        assert_eq!(report.succeeded, 2);
        assert_eq!(std::fs::read(target.join("a.jpg")).unwrap(), b"a.jpg");
    }

    #[tokio::test]
    async fn test_directories_skipped_unless_recursing() {
        let (_tmp, source, target) = fixture(&["a.jpg", "nested/b.jpg", "nested/deeper/c.jpg", "notes.txt"]);

        let flat = Arc::new(CopyAction::new(target.clone(), false));
        runner(&source, &flat, options(2, true))
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();
        assert_eq!(flat.executed(), vec!["a.jpg"]);

        let recursive = Arc::new(CopyAction::new(target, true));
        runner(&source, &recursive, options(2, true))
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();
        assert_eq!(recursive.executed(), vec!["a.jpg", "b.jpg", "c.jpg"]);
    }

    #[tokio::test]
    async fn test_failures_isolated_or_fail_fast() {
        let (_tmp, source, target) = fixture(&["a.jpg", "b.jpg", "c.jpg"]);

        let mut isolated = CopyAction::new(target.clone(), false);
        isolated.fail_on = Some("b.jpg".into());
        let isolated = Arc::new(isolated);
        let report = runner(&source, &isolated, options(1, true))
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();
        assert_eq!((report.succeeded, report.failed), (2, 1));
        assert_eq!(report.failures[0].name, "b.jpg");

        let mut strict = CopyAction::new(target, false);
        strict.fail_on = Some("b.jpg".into());
        let strict = Arc::new(strict);
        let called = AtomicUsize::new(0);
        let result = runner(
            &source,
            &strict,
            BatchOptions {
                fail_fast: true,
                ..options(1, true)
            },
        )
        .run(Some(|_: &BatchReport| {
            called.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

        assert!(matches!(result, Err(BatchError::ExternalTool { .. })));
        assert_eq!(strict.executed(), vec!["a.jpg", "b.jpg"]);
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let action = Arc::new(CopyAction::new(temp_dir.path().to_path_buf(), false));
        let result = runner(&temp_dir.path().join("missing"), &action, options(2, false))
            .run(None::<fn(&BatchReport)>)
            .await;
        assert!(matches!(result, Err(BatchError::NotADirectory(_))));
    }

    struct FailingOracle;

    #[async_trait]
    impl ExistenceOracle for FailingOracle {
        async fn check(&self, _task: &FileTask) -> Result<Existence> {
            Ok(Existence::CheckFailed("timeout".into()))
        }
    }

    #[tokio::test]
    async fn test_check_failure_policies() {
        let (_tmp, source, target) = fixture(&["a.jpg"]);

        for (policy, executed, skipped) in [
            (CheckFailurePolicy::Upload, 1, 0),
            (CheckFailurePolicy::Skip, 0, 1),
        ] {
            let action = Arc::new(CopyAction::new(target.clone(), false));
            let report = BatchRunner::new(
                source.clone(),
                action.clone(),
                Arc::new(FailingOracle),
                BatchOptions {
                    check_failure: policy,
                    ..options(1, false)
                },
            )
            .run(None::<fn(&BatchReport)>)
            .await
            .unwrap();
            assert_eq!(action.executed().len(), executed, "{:?}", policy);
            assert_eq!(report.skipped, skipped, "{:?}", policy);
        }

        let action = Arc::new(CopyAction::new(target, false));
        let result = BatchRunner::new(
            source,
            action.clone(),
            Arc::new(FailingOracle),
            BatchOptions {
                check_failure: CheckFailurePolicy::Abort,
                ..options(1, false)
            },
        )
        .run(None::<fn(&BatchReport)>)
        .await;
        assert!(matches!(result, Err(BatchError::Remote(_))));
        assert!(action.executed().is_empty());
    }
}
