//! # Existence Checks
//!
//! Decide se l'artefatto di destinazione di un task esiste già.
//! Il controllo remoto distingue "non trovato" da "controllo fallito";
//! cosa fare nel secondo caso lo decide il runner tramite
//! [`CheckFailurePolicy`](crate::config::CheckFailurePolicy).

use crate::batch::FileTask;
use crate::error::Result;
use crate::object_store::{self, ObjectStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Metadata of an artifact that already exists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactMeta {
    pub size: Option<u64>,
    pub etag: Option<String>,
}

/// Outcome of an existence check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    Exists(ArtifactMeta),
    NotFound,
    CheckFailed(String),
}

impl Existence {
    pub fn exists(&self) -> bool {
        matches!(self, Existence::Exists(_))
    }
}

/// Answers whether the target of a task already exists; never mutates anything
#[async_trait]
pub trait ExistenceOracle: Send + Sync {
    async fn check(&self, task: &FileTask) -> Result<Existence>;
}

/// Looks up `<bucket>/<folder>` + file name in the object store
pub struct RemoteExistence {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl RemoteExistence {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ExistenceOracle for RemoteExistence {
    async fn check(&self, task: &FileTask) -> Result<Existence> {
        let scope = object_store::scope(&self.bucket, &task.folder);
        match self.store.head_object(&scope, &task.name).await {
            Ok(Some(head)) => Ok(Existence::Exists(ArtifactMeta {
                size: head.content_length,
                etag: head.etag,
            })),
            Ok(None) => Ok(Existence::NotFound),
            Err(e) => Ok(Existence::CheckFailed(e.to_string())),
        }
    }
}

/// Checks the local target path; I/O errors other than "not found" are fatal
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExistence;

#[async_trait]
impl ExistenceOracle for LocalExistence {
    async fn check(&self, task: &FileTask) -> Result<Existence> {
        match tokio::fs::metadata(&task.target_path).await {
            Ok(metadata) => Ok(Existence::Exists(ArtifactMeta {
                size: Some(metadata.len()),
                etag: None,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Existence::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
