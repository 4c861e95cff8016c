//! # Image Resize Module
//!
//! Questo modulo ridimensiona le immagini di un profilo usando il **tool esterno**
//! configurato (`convertbin`, default ImageMagick `convert`).
//!
//! ## Pipeline per file
//! 1. **Colore di sfondo**: `bgcolor` se configurato, altrimenti campiona il
//!    pixel (1,1) con `<convertbin> <input> -crop 1x1+1+1 txt:-` e cerca un
//!    token `#RRGGBB`; se non c'è, usa `#FFFFFF`
//! 2. **Resize**: il template del profilo (o `resizecmd`) con i placeholder
//!    `input`, `output`, `source`, `target`, `convertbin`, `bgcolor`, `dimensions`
//! 3. **Post-processing**: tutti i comandi `magick` del profilo in parallelo;
//!    il file è completo solo quando sono terminati tutti
//!
//! ## Struttura Output
//! ```text
//! <target>/<profilo>/foto1.jpg
//! <target>/<profilo>/foto2.jpg   (anche da sottocartelle della sorgente)
//! ```

use crate::batch::{ActionExecutor, FileTask};
use crate::config::Config;
use crate::error::{BatchError, Result};
use crate::file_manager::{CatalogEntry, FileManager};
use crate::platform::CommandRunner;
use crate::template::{Bindings, CommandLine, CommandTemplate};
use crate::args;
use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Background used when the sampled pixel yields no color token
pub const FALLBACK_BGCOLOR: &str = "#FFFFFF";

const HEX_COLOR: &str = r"(?i)#[0-9a-f]{6}";

/// Resize settings resolved for one profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeSettings {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub extension: String,
    pub dimensions: String,
    pub command: CommandTemplate,
    pub convertbin: String,
    pub bgcolor: Option<String>,
    pub post_commands: Vec<CommandTemplate>,
}

impl ResizeSettings {
    /// Resolve the profile; any configuration problem surfaces here, before work starts
    pub fn from_config(config: &Config, profile: &str) -> Result<Self> {
        let size = config.size(profile)?;
        let command = size.command.clone().unwrap_or_else(|| config.resizecmd.clone());

        Ok(Self {
            source_dir: config.source_dir()?.to_path_buf(),
            target_dir: config.target_dir()?.join(profile),
            extension: config.extension.clone(),
            dimensions: size.dimensions(),
            command: CommandTemplate::parse(command)?,
            convertbin: config.convertbin.clone(),
            bgcolor: config.bgcolor.clone(),
            post_commands: config
                .post_commands(profile)?
                .into_iter()
                .map(CommandTemplate::parse)
                .collect::<Result<_>>()?,
        })
    }
}

pub struct Resizer {
    settings: ResizeSettings,
    runner: Arc<dyn CommandRunner>,
    hex_color: Regex,
}

impl Resizer {
    pub fn new(settings: ResizeSettings, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let hex_color = Regex::new(HEX_COLOR).map_err(|e| BatchError::Config(e.to_string()))?;
        Ok(Self {
            settings,
            runner,
            hex_color,
        })
    }

    /// Configured background, or the color of the pixel at (1,1)
    async fn background_color(&self, input: &Path) -> Result<String> {
        if let Some(color) = &self.settings.bgcolor {
            return Ok(color.clone());
        }

        let input = input.display().to_string();
        let command = CommandLine::new(
            self.settings.convertbin.clone(),
            args![input.as_str(), "-crop", "1x1+1+1", "txt:-"],
        );
        let output = self.runner.run(&command).await?.check(&command)?;

        match self.hex_color.find(&output.stdout) {
            Some(color) => Ok(color.as_str().to_string()),
            None => {
                debug!("No color token in pixel sample of {}, using {}", input, FALLBACK_BGCOLOR);
                Ok(FALLBACK_BGCOLOR.to_string())
            }
        }
    }

    fn bindings(&self, task: &FileTask, bgcolor: &str) -> Bindings {
        Bindings::new()
            .bind("input", task.source_path.display().to_string())
            .bind("output", task.target_path.display().to_string())
            .bind("source", self.settings.source_dir.display().to_string())
            .bind("target", self.settings.target_dir.display().to_string())
            .bind("convertbin", self.settings.convertbin.clone())
            .bind("bgcolor", bgcolor)
            .bind("dimensions", self.settings.dimensions.clone())
    }

    /// Run every post-process command concurrently and wait for all of them
    async fn run_post_commands(&self, bindings: &Bindings) -> Result<()> {
        let total = self.settings.post_commands.len();
        if total == 0 {
            return Ok(());
        }

        let completed = AtomicUsize::new(0);
        let results = join_all(self.settings.post_commands.iter().map(|template| {
            let completed = &completed;
            async move {
                let command = template.build(bindings);
                let result = match self.runner.run(&command).await {
                    Ok(output) => output.check(&command).map(|_| ()),
                    Err(e) => Err(e),
                };
                completed.fetch_add(1, Ordering::SeqCst);
                result
            }
        }))
        .await;

        debug!(
            "{}/{} post-process commands finished",
            completed.load(Ordering::SeqCst),
            total
        );
        results.into_iter().collect()
    }
}

#[async_trait]
impl ActionExecutor for Resizer {
    fn name(&self) -> &'static str {
        "resize"
    }

    fn recurses(&self) -> bool {
        true
    }

    fn accepts(&self, name: &str) -> bool {
        FileManager::has_extension(name, &self.settings.extension)
    }

    fn plan(&self, entry: &CatalogEntry) -> FileTask {
        let folder = entry
            .path
            .parent()
            .and_then(|parent| parent.strip_prefix(&self.settings.source_dir).ok())
            .map(|relative| relative.display().to_string())
            .unwrap_or_default();

        FileTask::new(
            &entry.name,
            &entry.path,
            self.settings.target_dir.join(&entry.name),
            folder,
        )
    }

    /// Create the (single level) target directory if absent
    async fn prepare(&self) -> Result<()> {
        match tokio::fs::create_dir(&self.settings.target_dir).await {
            Ok(()) => {
                info!("Created target directory {}", self.settings.target_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn execute(&self, task: &FileTask) -> Result<()> {
        let bgcolor = self.background_color(&task.source_path).await?;
        let bindings = self.bindings(task, &bgcolor);

        let command = self.settings.command.build(&bindings);
        self.runner.run(&command).await?.check(&command)?;

        self.run_post_commands(&bindings).await?;

        info!("Writing {}", task.name);
        Ok(())
    }
}
