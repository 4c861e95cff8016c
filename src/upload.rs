//! # Upload Module
//!
//! Carica i file di un profilo (`<target>/<profilo>`) nell'object store.
//!
//! ## Richiesta per file:
//! - scope `<bucket>/<profilo>`, chiave = nome del file
//! - content type dalla tabella delle estensioni
//! - ACL configurata (default `public-read`)
//! - `Cache-Control` / `Expires` calcolati una sola volta all'avvio del batch

use crate::batch::{ActionExecutor, FileTask};
use crate::config::Config;
use crate::error::Result;
use crate::file_manager::{CatalogEntry, FileManager};
use crate::object_store::{self, ObjectStore, PutObjectRequest};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Upload settings resolved for one profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub source_dir: PathBuf,
    pub bucket: String,
    pub folder: String,
    pub acl: String,
    pub cache_seconds: Option<u64>,
}

impl UploadSettings {
    pub fn from_config(config: &Config, profile: &str, bucket: &str) -> Result<Self> {
        Ok(Self {
            source_dir: config.target_dir()?.join(profile),
            bucket: bucket.to_string(),
            folder: profile.to_string(),
            acl: config.acl.clone(),
            cache_seconds: config.cache,
        })
    }
}

/// Cache headers shared by every object of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeaders {
    pub cache_control: String,
    pub expires: String,
}

impl CacheHeaders {
    /// `max-age=<seconds>` and `now + seconds` as an HTTP-date
    pub fn snapshot(seconds: u64, now: DateTime<Utc>) -> Self {
        let expires = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            cache_control: format!("max-age={}", seconds),
            expires: expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        }
    }
}

pub struct Uploader {
    settings: UploadSettings,
    store: Arc<dyn ObjectStore>,
    cache: Option<CacheHeaders>,
}

impl Uploader {
    pub fn new(settings: UploadSettings, store: Arc<dyn ObjectStore>) -> Self {
        Self::with_clock(settings, store, Utc::now())
    }

    /// Cache headers are computed from `now` and reused for every file
    pub fn with_clock(settings: UploadSettings, store: Arc<dyn ObjectStore>, now: DateTime<Utc>) -> Self {
        let cache = settings
            .cache_seconds
            .map(|seconds| CacheHeaders::snapshot(seconds, now));
        Self {
            settings,
            store,
            cache,
        }
    }

    fn scope(&self, folder: &str) -> String {
        object_store::scope(&self.settings.bucket, folder)
    }
}

#[async_trait]
impl ActionExecutor for Uploader {
    fn name(&self) -> &'static str {
        "upload"
    }

    fn plan(&self, entry: &CatalogEntry) -> FileTask {
        FileTask::new(
            &entry.name,
            &entry.path,
            PathBuf::from(self.scope(&self.settings.folder)).join(&entry.name),
            &self.settings.folder,
        )
    }

    async fn execute(&self, task: &FileTask) -> Result<()> {
        let body = tokio::fs::read(&task.source_path).await?;
        info!("Uploading {} ({})", task.name, FileManager::format_size(body.len() as u64));

        let request = PutObjectRequest {
            scope: self.scope(&task.folder),
            key: task.name.clone(),
            body,
            content_type: FileManager::mime_type(&task.name).to_string(),
            acl: self.settings.acl.clone(),
            cache_control: self.cache.as_ref().map(|c| c.cache_control.clone()),
            expires: self.cache.as_ref().map(|c| c.expires.clone()),
        };

        let output = self.store.put_object(request).await?;
        info!(" -> OK / Tag: {}", output.etag.as_deref().unwrap_or("-"));
        Ok(())
    }
}
