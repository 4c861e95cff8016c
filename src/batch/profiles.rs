//! Runs an action over one profile or over every configured profile.
//!
//! All runners are built up front, so a broken profile definition is
//! reported before any file is touched. Profiles then run one after the
//! other, in name order.

use crate::batch::{ActionExecutor, BatchOptions, BatchRunner};
use crate::config::Config;
use crate::error::{BatchError, Result};
use crate::existence::{ExistenceOracle, LocalExistence, RemoteExistence};
use crate::object_store::ObjectStore;
use crate::platform::CommandRunner;
use crate::progress::{BatchReport, ProgressManager};
use crate::resize::{ResizeSettings, Resizer};
use crate::upload::{UploadSettings, Uploader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Which profiles a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSelector {
    All,
    Named(String),
}

impl ProfileSelector {
    /// An empty name selects every profile
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            None | Some("") => Self::All,
            Some(name) => Self::Named(name.to_string()),
        }
    }

    pub fn resolve(&self, config: &Config) -> Result<Vec<String>> {
        let profiles = config.profiles()?;
        match self {
            Self::All => Ok(profiles),
            Self::Named(name) if profiles.contains(name) => Ok(vec![name.clone()]),
            Self::Named(name) => Err(BatchError::Config(format!(
                "No target size specified for \"{}\"",
                name
            ))),
        }
    }
}

/// The action applied to every file of the selected profiles
#[derive(Clone)]
pub enum Action {
    Upload {
        store: Arc<dyn ObjectStore>,
        bucket: String,
    },
    Resize {
        runner: Arc<dyn CommandRunner>,
    },
}

impl Action {
    fn runner(&self, config: &Config, profile: &str) -> Result<BatchRunner> {
        let (source, executor, oracle): (PathBuf, Arc<dyn ActionExecutor>, Arc<dyn ExistenceOracle>) = match self {
            Action::Upload { store, bucket } => {
                let settings = UploadSettings::from_config(config, profile, bucket)?;
                (
                    settings.source_dir.clone(),
                    Arc::new(Uploader::new(settings, store.clone())),
                    Arc::new(RemoteExistence::new(store.clone(), bucket.clone())),
                )
            }
            Action::Resize { runner } => {
                let settings = ResizeSettings::from_config(config, profile)?;
                (
                    settings.source_dir.clone(),
                    Arc::new(Resizer::new(settings, runner.clone())?),
                    Arc::new(LocalExistence),
                )
            }
        };

        Ok(BatchRunner::new(source, executor, oracle, BatchOptions::from_config(config)))
    }
}

/// Run `action` for the selected profiles and collect one report per profile
pub async fn run_profiles(
    config: &Config,
    selector: &ProfileSelector,
    action: &Action,
    show_progress: bool,
) -> Result<Vec<(String, BatchReport)>> {
    let runners = selector
        .resolve(config)?
        .into_iter()
        .map(|profile| action.runner(config, &profile).map(|runner| (profile, runner)))
        .collect::<Result<Vec<_>>>()?;

    let mut reports = Vec::with_capacity(runners.len());
    for (profile, runner) in runners {
        let runner = if show_progress {
            runner.with_progress(ProgressManager::new())
        } else {
            runner
        };

        let report = runner
            .run(Some(|report: &BatchReport| {
                info!("Profile \"{}\" done. {}", profile, report.format_summary());
            }))
            .await?;
        reports.push((profile, report));
    }

    Ok(reports)
}
