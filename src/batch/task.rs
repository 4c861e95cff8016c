use std::path::PathBuf;

/// One unit of work: created from a catalog entry, consumed by exactly one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    /// File name, also the object key for uploads
    pub name: String,
    pub source_path: PathBuf,
    /// Local output file, or `<bucket>/<folder>/<name>` for uploads
    pub target_path: PathBuf,
    /// Directory label: the upload folder, or the source-relative directory for resizes
    pub folder: String,
}

impl FileTask {
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        target_path: impl Into<PathBuf>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            target_path: target_path.into(),
            folder: folder.into(),
        }
    }
}

/// Result of one task inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Skipped,
    Failed(String),
}
