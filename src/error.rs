//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della pipeline.
//!
//! ## Categorie di errori:
//! - `Config` / `InvalidSizeDefinition`: configurazione invalida, fatale prima di iniziare
//! - `NotADirectory`: directory sorgente assente, fatale per il batch
//! - `Io`: errori di I/O (lettura sorgente, scrittura target)
//! - `ExternalTool`: il tool di conversione è uscito con errore
//! - `Remote`: errore dell'object store durante l'upload
//! - `Worker`: una catena di lavoro è terminata in modo anomalo (panic)
//!
//! ## Esempio:
//! ```rust,ignore
//! if !path.is_dir() {
//!     return Err(BatchError::NotADirectory(path.to_path_buf()));
//! }
//! ```

use std::path::PathBuf;

/// Result type alias for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Custom error types for the batch pipeline
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid size definition for \"{profile}\": {reason}")]
    InvalidSizeDefinition { profile: String, reason: String },

    #[error("Source path does not exist: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("External tool failed: {command}: {message}")]
    ExternalTool { command: String, message: String },

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl BatchError {
    /// Errors that must abort the whole batch regardless of `fail_fast`
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BatchError::Config(_)
                | BatchError::InvalidSizeDefinition { .. }
                | BatchError::NotADirectory(_)
        )
    }
}

impl From<reqwest::Error> for BatchError {
    fn from(err: reqwest::Error) -> Self {
        BatchError::Remote(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BatchError::Config("missing".into()).is_fatal());
        assert!(BatchError::NotADirectory(PathBuf::from("/nope")).is_fatal());
        assert!(!BatchError::Remote("503".into()).is_fatal());
        assert!(!BatchError::ExternalTool {
            command: "convert".into(),
            message: "exit 1".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_not_a_directory_message() {
        let err = BatchError::NotADirectory(PathBuf::from("/data/missing"));
        assert_eq!(err.to_string(), "Source path does not exist: /data/missing");
    }
}
