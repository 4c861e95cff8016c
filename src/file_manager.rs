//! # File Management Module
//!
//! Questo modulo gestisce il listing delle directory e la classificazione dei file.
//!
//! ## Responsabilità:
//! - Elenca i figli diretti di una directory (nessuna ricorsione)
//! - Classifica ogni entry come file o directory (senza seguire i link)
//! - Filtra per estensione e ricava il content type per l'upload
//!
//! ## Esempio:
//! ```rust,ignore
//! for entry in FileManager::list_directory(&dir)? {
//!     if entry.is_dir() {
//!         // nested batch
//!     }
//! }
//! ```

use crate::error::{BatchError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Kind of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl CatalogEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Directory listing and file classification
pub struct FileManager;

impl FileManager {
    /// List the immediate children of `dir`, sorted by name
    ///
    /// Symlinks are classified by the link itself, so a link to a directory
    /// is listed as a file.
    pub fn list_directory(dir: &Path) -> Result<Vec<CatalogEntry>> {
        let metadata = std::fs::symlink_metadata(dir)
            .map_err(|_| BatchError::NotADirectory(dir.to_path_buf()))?;
        if !metadata.is_dir() {
            return Err(BatchError::NotADirectory(dir.to_path_buf()));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => BatchError::Io(io),
                None => BatchError::NotADirectory(dir.to_path_buf()),
            })?;

            let kind = if entry.file_type().is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            entries.push(CatalogEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_path_buf(),
                kind,
            });
        }

        Ok(entries)
    }

    /// Check the extension of `name` against a configured filter like `.jpg`
    pub fn has_extension(name: &str, extension: &str) -> bool {
        let wanted = extension.trim_start_matches('.');
        match Path::new(name).extension() {
            Some(ext) => ext.to_string_lossy() == wanted,
            None => wanted.is_empty(),
        }
    }

    /// Content type derived from the file extension
    pub fn mime_type(name: &str) -> &'static str {
        mime_guess::from_path(name)
            .first_raw()
            .unwrap_or("application/octet-stream")
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_directory_classifies_entries() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("b.jpg"), b"b").unwrap();
        std::fs::write(temp_dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::create_dir(temp_dir.path().join("nested")).unwrap();
        std::fs::write(temp_dir.path().join("nested").join("deep.jpg"), b"d").unwrap();

        let entries = FileManager::list_directory(temp_dir.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "nested"]);
        assert_eq!(entries[0].kind, EntryKind::File);
        assert!(entries[2].is_dir());
        assert_eq!(entries[1].path, temp_dir.path().join("b.jpg"));
    }

    #[test]
    fn test_list_directory_rejects_missing_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(matches!(
            FileManager::list_directory(&missing),
            Err(BatchError::NotADirectory(_))
        ));

        let file = temp_dir.path().join("plain.jpg");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FileManager::list_directory(&file),
            Err(BatchError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_has_extension() {
        assert!(FileManager::has_extension("photo.jpg", ".jpg"));
        assert!(FileManager::has_extension("photo.jpg", "jpg"));
        assert!(!FileManager::has_extension("photo.JPG", ".jpg"));
        assert!(!FileManager::has_extension("photo.png", ".jpg"));
        assert!(!FileManager::has_extension("README", ".jpg"));
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(FileManager::mime_type("a.jpg"), "image/jpeg");
        assert_eq!(FileManager::mime_type("a.PNG"), "image/png");
        assert_eq!(FileManager::mime_type("a.webp"), "image/webp");
        assert_eq!(FileManager::mime_type("archive.qqq9"), "application/octet-stream");
        assert_eq!(FileManager::mime_type("noext"), "application/octet-stream");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
    }
}
