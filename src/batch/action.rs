//! The [`ActionExecutor`] trait: the side-effecting step applied to each file.
//!
//! The runner decides *whether* a file is processed; the executor decides
//! *what* the task looks like and performs it.

use crate::batch::FileTask;
use crate::error::Result;
use crate::file_manager::CatalogEntry;
use async_trait::async_trait;

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Short name used in log lines ("upload", "resize")
    fn name(&self) -> &'static str;

    /// Whether a subdirectory starts a nested batch; otherwise it is skipped
    fn recurses(&self) -> bool {
        false
    }

    /// Whether a file entry is handled at all
    fn accepts(&self, _name: &str) -> bool {
        true
    }

    /// Build the task for a file entry
    fn plan(&self, entry: &CatalogEntry) -> FileTask;

    /// Called once per directory level before any of its tasks run
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Perform the action; returns once every sub-step has finished
    async fn execute(&self, task: &FileTask) -> Result<()>;
}
